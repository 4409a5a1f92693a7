//! TeleSync Sync - Saved-history to file-share synchronization engine
//!
//! Provides:
//! - Backward pagination over the saved history
//! - Name-based dedup against the destination
//! - Streaming transfer with per-item failure isolation
//! - A run coordinator that owns one destination session per run
//!
//! ## Modules
//!
//! - [`pagination`] - Lazy page walk driven by a [`SyncCursor`]
//! - [`dedup`] - Derived-filename existence check
//! - [`transfer`] - Source-to-destination streaming for one item
//! - [`coordinator`] - One full sync pass
//! - [`scheduler`] - Run-on-start plus daily trigger
//! - [`share`] - Destination adapter over a mounted share
//! - [`export`] - Source adapter over an exported chat archive

pub mod coordinator;
pub mod dedup;
pub mod export;
pub mod pagination;
pub mod scheduler;
pub mod share;
pub mod transfer;

use std::fmt;

use telesync_core::domain::{DerivedFileName, MessageId, RunResult, SyncCursor};
use thiserror::Error;

/// Errors that end a sync run early
///
/// Every variant raised after the session was opened carries the counters
/// accumulated up to the failure; the session has already been released
/// when one of these is returned.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The destination session could not be opened or authenticated
    #[error("Failed to open destination session: {source:#}")]
    Session {
        #[source]
        source: anyhow::Error,
    },

    /// A history page could not be fetched
    #[error("Failed to fetch history page ({cursor}): {source:#}")]
    Pagination {
        cursor: SyncCursor,
        partial: RunResult,
        #[source]
        source: anyhow::Error,
    },

    /// A segment of the destination path could not be created
    #[error("Failed to create destination directory '{path}': {source:#}")]
    DirectoryCreation {
        path: String,
        partial: RunResult,
        #[source]
        source: anyhow::Error,
    },

    /// The run was interrupted by a shutdown request
    #[error("Sync run cancelled")]
    Cancelled { partial: RunResult },

    /// A domain-level error propagated from telesync-core
    #[error("Domain error: {0}")]
    DomainError(#[from] telesync_core::domain::DomainError),
}

impl SyncError {
    /// Counters accumulated before the run stopped, if any work was done
    pub fn partial(&self) -> Option<&RunResult> {
        match self {
            SyncError::Pagination { partial, .. }
            | SyncError::DirectoryCreation { partial, .. }
            | SyncError::Cancelled { partial } => Some(partial),
            SyncError::Session { .. } | SyncError::DomainError(_) => None,
        }
    }

    pub(crate) fn with_partial(mut self, counters: &RunResult) -> Self {
        match &mut self {
            SyncError::Pagination { partial, .. }
            | SyncError::DirectoryCreation { partial, .. }
            | SyncError::Cancelled { partial } => *partial = counters.clone(),
            SyncError::Session { .. } | SyncError::DomainError(_) => {}
        }
        self
    }
}

/// Step of an item transfer that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStage {
    /// Checking whether the derived name already exists
    Lookup,
    /// Opening the attachment at the source
    Download,
    /// Streaming bytes into the destination
    Upload,
}

impl fmt::Display for TransferStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferStage::Lookup => write!(f, "lookup"),
            TransferStage::Download => write!(f, "download"),
            TransferStage::Upload => write!(f, "upload"),
        }
    }
}

/// Failure of a single item; recorded in the run counters, never propagated
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{stage} failed for item {item_id} ('{name}'): {message}")]
pub struct ItemTransferError {
    pub item_id: MessageId,
    pub name: DerivedFileName,
    pub stage: TransferStage,
    pub message: String,
}

impl ItemTransferError {
    pub(crate) fn new(
        item_id: MessageId,
        name: &DerivedFileName,
        stage: TransferStage,
        err: &anyhow::Error,
    ) -> Self {
        Self {
            item_id,
            name: name.clone(),
            stage,
            message: format!("{err:#}"),
        }
    }
}
