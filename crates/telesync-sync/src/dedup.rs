//! Dedup policy: has this item already been mirrored?
//!
//! The dedup key is the derived filename only, not a content hash. An
//! object with the same name under the destination path is an
//! authoritative skip even if its bytes differ from the remote item.

use anyhow::{Context, Result};
use telesync_core::domain::{DerivedFileName, DestinationPath, RemoteItem};
use telesync_core::ports::IDestinationSession;
use tracing::trace;

/// Outcome of the dedup check for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupDecision {
    /// No object with this name yet; the item should be transferred
    Eligible(DerivedFileName),
    /// An object with this name already exists at the destination
    AlreadyMirrored(DerivedFileName),
}

impl DedupDecision {
    /// Returns true if the item should be transferred
    pub fn is_eligible(&self) -> bool {
        matches!(self, DedupDecision::Eligible(_))
    }

    /// Returns the derived name the decision was made for
    pub fn name(&self) -> &DerivedFileName {
        match self {
            DedupDecision::Eligible(name) | DedupDecision::AlreadyMirrored(name) => name,
        }
    }
}

/// Name-based dedup against the run's destination session
#[derive(Debug, Clone)]
pub struct DedupPolicy {
    path: DestinationPath,
}

impl DedupPolicy {
    /// Creates a policy checking names under `path`
    pub fn new(path: DestinationPath) -> Self {
        Self { path }
    }

    /// Derives the item's name and asks the destination whether it exists
    pub async fn check(
        &self,
        session: &mut dyn IDestinationSession,
        item: &RemoteItem,
    ) -> Result<DedupDecision> {
        let name = DerivedFileName::for_item(item);
        let exists = session
            .object_exists(&self.path, &name)
            .await
            .with_context(|| format!("existence check for '{}'", self.path.object_path(&name)))?;

        trace!(item_id = %item.id(), name = %name, exists, "Dedup check");

        Ok(if exists {
            DedupDecision::AlreadyMirrored(name)
        } else {
            DedupDecision::Eligible(name)
        })
    }
}
