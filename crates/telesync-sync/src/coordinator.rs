//! Run coordinator: one full pass over the saved history
//!
//! The coordinator opens a single destination session, pulls pages from
//! the [`HistoryPager`], runs each attachment-bearing item through the
//! [`DedupPolicy`] and the [`TransferPipeline`], and closes the session
//! exactly once on every exit path.

use std::sync::Arc;
use std::time::Instant;

use telesync_core::config::{Config, DestinationConfig};
use telesync_core::domain::{DerivedFileName, RemoteItem, RunId, RunResult, RunState};
use telesync_core::ports::{IDestinationSession, IDestinationStore, IPayloadSource};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::dedup::{DedupDecision, DedupPolicy};
use crate::pagination::HistoryPager;
use crate::transfer::{TransferError, TransferPipeline};
use crate::{ItemTransferError, SyncError, TransferStage};

/// Orchestrates sync runs between a payload source and a destination store
///
/// At most one run is in flight per coordinator; `run_sync` takes
/// `&mut self` so overlapping runs on the same instance are impossible.
pub struct RunCoordinator {
    source: Arc<dyn IPayloadSource>,
    store: Arc<dyn IDestinationStore>,
    destination: DestinationConfig,
    page_size: u32,
    state: RunState,
}

impl RunCoordinator {
    /// Creates a coordinator from its adapters and the loaded configuration
    pub fn new(
        source: Arc<dyn IPayloadSource>,
        store: Arc<dyn IDestinationStore>,
        config: &Config,
    ) -> Self {
        Self {
            source,
            store,
            destination: config.destination.clone(),
            page_size: config.source.page_size,
            state: RunState::Idle,
        }
    }

    /// Returns the state of the current (or last) run
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Performs one sync pass
    ///
    /// An incomplete destination configuration makes the run a no-op that
    /// returns zero counters without touching either adapter. Otherwise the
    /// session is released before this returns, whatever the outcome.
    ///
    /// # Errors
    ///
    /// - [`SyncError::Session`] if the session cannot be opened
    /// - [`SyncError::Pagination`] if a history page cannot be fetched
    /// - [`SyncError::DirectoryCreation`] if the upload directory cannot be created
    /// - [`SyncError::Cancelled`] if `shutdown` fires mid-run
    ///
    /// Item failures are never errors; they are counted in the result.
    #[tracing::instrument(skip_all, fields(run_id = %RunId::new()))]
    pub async fn run_sync(&mut self, shutdown: &CancellationToken) -> Result<RunResult, SyncError> {
        let started = Instant::now();

        if !self.destination.is_complete() {
            info!(
                missing = ?self.destination.missing_fields(),
                "Destination not configured, skipping sync"
            );
            return Ok(RunResult::default());
        }

        if shutdown.is_cancelled() {
            return Err(SyncError::Cancelled {
                partial: RunResult::default(),
            });
        }

        self.state.transition_to(RunState::SessionOpening)?;
        let mut session = match self.store.open().await {
            Ok(session) => session,
            Err(source) => {
                self.state.transition_to(RunState::Failed)?;
                let err = SyncError::Session { source };
                error!(error = %err, "Sync run failed");
                return Err(err);
            }
        };
        self.state.transition_to(RunState::Paginating)?;
        info!(
            host = self.destination.host.as_deref().unwrap_or_default(),
            share = self.destination.share.as_deref().unwrap_or_default(),
            "Destination session opened"
        );

        let mut counters = RunResult::default();
        let outcome = self
            .drive(session.as_mut(), &mut counters, shutdown)
            .await;

        let closing = self.state.transition_to(RunState::SessionClosing);
        if let Err(err) = session.close().await {
            warn!(error = %format!("{err:#}"), "Failed to close destination session");
        }
        closing?;

        counters.duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                self.state.transition_to(RunState::Done)?;
                info!(
                    examined = counters.examined,
                    transferred = counters.transferred,
                    skipped = counters.skipped,
                    failed = counters.failed(),
                    bytes = counters.bytes_transferred,
                    duration_ms = counters.duration_ms,
                    "Sync run complete"
                );
                Ok(counters)
            }
            Err(err) => {
                self.state.transition_to(RunState::Failed)?;
                let err = err.with_partial(&counters);
                if matches!(err, SyncError::Cancelled { .. }) {
                    warn!(
                        examined = counters.examined,
                        transferred = counters.transferred,
                        "Sync run cancelled"
                    );
                } else {
                    error!(
                        error = %err,
                        examined = counters.examined,
                        transferred = counters.transferred,
                        "Sync run failed"
                    );
                }
                Err(err)
            }
        }
    }

    /// Pagination loop; returns with the state back at `Paginating`
    async fn drive(
        &mut self,
        session: &mut dyn IDestinationSession,
        counters: &mut RunResult,
        shutdown: &CancellationToken,
    ) -> Result<(), SyncError> {
        let source = Arc::clone(&self.source);
        let path = self.destination.destination_path();
        let dedup = DedupPolicy::new(path.clone());
        let mut pipeline = TransferPipeline::new(path);
        let mut pager = HistoryPager::new(source.as_ref(), self.page_size);

        debug!(path = %pipeline.path(), page_size = self.page_size, "Starting history walk");

        loop {
            let cursor = pager.cursor();
            let fetched = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                page = pager.next_page() => Some(page),
            };

            let page = match fetched {
                None => return Err(cancelled()),
                Some(Ok(Some(page))) => page,
                Some(Ok(None)) => break,
                Some(Err(source)) => {
                    return Err(SyncError::Pagination {
                        cursor,
                        partial: RunResult::default(),
                        source,
                    });
                }
            };

            for item in &page {
                if shutdown.is_cancelled() {
                    return Err(cancelled());
                }
                if !item.media_kind().has_payload() {
                    trace!(item_id = %item.id(), "No attachment, passing over");
                    continue;
                }

                self.state.transition_to(RunState::TransferringItem)?;
                let step = tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => None,
                    result = process_item(
                        source.as_ref(),
                        session,
                        &dedup,
                        &mut pipeline,
                        item,
                        counters,
                    ) => Some(result),
                };
                self.state.transition_to(RunState::Paginating)?;

                match step {
                    None => return Err(cancelled()),
                    Some(Ok(())) => {}
                    Some(Err(TransferError::DirectoryCreation { path, source })) => {
                        return Err(SyncError::DirectoryCreation {
                            path: path.to_string(),
                            partial: RunResult::default(),
                            source,
                        });
                    }
                    Some(Err(TransferError::Item(failure))) => {
                        counters.record_failure(failure.to_string());
                    }
                }
            }
        }

        Ok(())
    }
}

fn cancelled() -> SyncError {
    SyncError::Cancelled {
        partial: RunResult::default(),
    }
}

/// Dedup-then-transfer for one item, updating the counters
///
/// Only a directory-creation failure escapes; lookup failures are recorded
/// here and transfer failures are handed back as [`TransferError::Item`].
async fn process_item(
    source: &dyn IPayloadSource,
    session: &mut dyn IDestinationSession,
    dedup: &DedupPolicy,
    pipeline: &mut TransferPipeline,
    item: &RemoteItem,
    counters: &mut RunResult,
) -> Result<(), TransferError> {
    let decision = match dedup.check(session, item).await {
        Ok(decision) => decision,
        Err(err) => {
            let name = DerivedFileName::for_item(item);
            let failure = ItemTransferError::new(item.id(), &name, TransferStage::Lookup, &err);
            warn!(error = %failure, "Existence check failed");
            counters.record_failure(failure.to_string());
            return Ok(());
        }
    };

    match decision {
        DedupDecision::AlreadyMirrored(name) => {
            debug!(item_id = %item.id(), name = %name, "Already mirrored, skipping");
            counters.record_skip();
        }
        DedupDecision::Eligible(name) => {
            let bytes = pipeline.transfer(source, session, item, &name).await?;
            counters.record_transfer(bytes);
        }
    }
    Ok(())
}
