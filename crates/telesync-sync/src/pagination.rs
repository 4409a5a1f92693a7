//! Backward pagination over the saved history
//!
//! [`HistoryPager`] turns the page-at-a-time source port into a lazy,
//! finite, non-restartable sequence of pages. Each call to
//! [`next_page`](HistoryPager::next_page) issues at most one fetch; the
//! cursor moves to the oldest id of every page handed out, so the next
//! fetch only sees strictly older entries.
//!
//! No retry happens at this layer: a failed fetch is returned as-is and
//! ends the run. Retry policy belongs to the source adapter.

use anyhow::{bail, Result};
use telesync_core::domain::{RemoteItem, SyncCursor};
use telesync_core::ports::IPayloadSource;
use tracing::debug;

/// Default number of items requested per fetch
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Walks the history from the most recent entry until the source runs dry
pub struct HistoryPager<'a> {
    source: &'a dyn IPayloadSource,
    cursor: SyncCursor,
    page_size: u32,
    pages_fetched: u64,
    exhausted: bool,
}

impl<'a> HistoryPager<'a> {
    /// Creates a pager positioned at the most recent entry
    pub fn new(source: &'a dyn IPayloadSource, page_size: u32) -> Self {
        Self {
            source,
            cursor: SyncCursor::MostRecent,
            page_size: page_size.max(1),
            pages_fetched: 0,
            exhausted: false,
        }
    }

    /// Returns the current cursor position
    pub fn cursor(&self) -> SyncCursor {
        self.cursor
    }

    /// Returns how many non-empty pages have been handed out
    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched
    }

    /// Returns true once an empty page has been seen
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Fetches the next page, newest entry first
    ///
    /// Returns `Ok(None)` when the history is exhausted; after that no
    /// further fetches are issued. A page containing an id at or above the
    /// cursor bound is rejected, since walking it would never terminate.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RemoteItem>>> {
        if self.exhausted {
            return Ok(None);
        }

        let page = self
            .source
            .fetch_history_page(self.cursor.before_id(), self.page_size)
            .await?;

        let Some(last) = page.last() else {
            debug!(cursor = %self.cursor, "History exhausted");
            self.exhausted = true;
            return Ok(None);
        };

        if let Some(stale) = page.iter().find(|item| !self.cursor.admits(item.id())) {
            bail!(
                "source returned item {} which is not older than the cursor ({})",
                stale.id(),
                self.cursor
            );
        }

        let last_id = last.id();
        self.cursor.advance(last_id);
        self.pages_fetched += 1;

        debug!(
            page = self.pages_fetched,
            items = page.len(),
            next_cursor = %self.cursor,
            "Fetched history page"
        );

        Ok(Some(page))
    }
}
