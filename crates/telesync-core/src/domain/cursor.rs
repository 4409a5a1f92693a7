//! Pagination cursor over the saved history

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::newtypes::MessageId;

/// Position of a backward walk through the history
///
/// Local to one run; never persisted. Every run starts from
/// [`SyncCursor::MostRecent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncCursor {
    /// Nothing consumed yet; the next page starts at the newest entry
    #[default]
    MostRecent,
    /// The next page must contain only entries strictly older than this id
    Before(MessageId),
}

impl SyncCursor {
    /// Moves the cursor past the oldest entry of the page just consumed
    pub fn advance(&mut self, last_id: MessageId) {
        *self = SyncCursor::Before(last_id);
    }

    /// Returns the exclusive upper bound for the next fetch, if any
    pub fn before_id(&self) -> Option<MessageId> {
        match self {
            SyncCursor::MostRecent => None,
            SyncCursor::Before(id) => Some(*id),
        }
    }

    /// Returns true if `id` may appear in the next page
    pub fn admits(&self, id: MessageId) -> bool {
        match self {
            SyncCursor::MostRecent => true,
            SyncCursor::Before(bound) => id < *bound,
        }
    }
}

impl Display for SyncCursor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SyncCursor::MostRecent => write!(f, "most recent"),
            SyncCursor::Before(id) => write!(f, "before {id}"),
        }
    }
}
