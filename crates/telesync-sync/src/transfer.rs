//! Transfer pipeline: stream one item from the source into the share
//!
//! The attachment is never materialized: the source hands out a reader
//! and the destination session pulls from it with a bounded buffer.
//!
//! ## Failure isolation
//!
//! Download and upload failures are item failures ([`TransferError::Item`]);
//! the coordinator records them and moves on. The only fatal outcome is a
//! destination directory that cannot be created
//! ([`TransferError::DirectoryCreation`]), since every later write would
//! fail the same way.

use telesync_core::domain::{DerivedFileName, DestinationPath, RemoteItem};
use telesync_core::ports::{IDestinationSession, IPayloadSource};
use tracing::{debug, info, instrument, warn};

use crate::{ItemTransferError, TransferStage};

/// Why a transfer did not complete
#[derive(Debug)]
pub enum TransferError {
    /// The item could not be downloaded or uploaded; the run continues
    Item(ItemTransferError),
    /// A destination directory could not be created; the run must stop
    DirectoryCreation {
        path: DestinationPath,
        source: anyhow::Error,
    },
}

/// Streams eligible items into one destination directory
///
/// Lives for a single run. Destination directories are created lazily,
/// right before the first write, and only once per run.
#[derive(Debug)]
pub struct TransferPipeline {
    path: DestinationPath,
    path_ready: bool,
}

impl TransferPipeline {
    /// Creates a pipeline writing under `path`
    pub fn new(path: DestinationPath) -> Self {
        Self {
            path,
            path_ready: false,
        }
    }

    /// Returns the directory items are written to
    pub fn path(&self) -> &DestinationPath {
        &self.path
    }

    /// Makes sure every segment of the destination path exists
    ///
    /// Each segment is checked and created if absent. A failed creation is
    /// still success when the segment exists afterwards (someone else made
    /// it first).
    pub async fn ensure_destination_path(
        &mut self,
        session: &mut dyn IDestinationSession,
    ) -> Result<(), TransferError> {
        if self.path_ready {
            return Ok(());
        }

        for segment in self.path.prefixes() {
            match session.path_exists(&segment).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    debug!(
                        path = %segment,
                        error = %err,
                        "Existence check failed, attempting create"
                    );
                }
            }

            match session.create_path(&segment).await {
                Ok(()) => info!(path = %segment, "Created destination directory"),
                Err(err) => {
                    if matches!(session.path_exists(&segment).await, Ok(true)) {
                        debug!(path = %segment, "Destination directory appeared concurrently");
                        continue;
                    }
                    return Err(TransferError::DirectoryCreation {
                        path: segment,
                        source: err,
                    });
                }
            }
        }

        self.path_ready = true;
        Ok(())
    }

    /// Streams one item's attachment to `path/name`
    ///
    /// Returns the number of bytes written.
    #[instrument(skip_all, fields(item_id = %item.id(), name = %name))]
    pub async fn transfer(
        &mut self,
        source: &dyn IPayloadSource,
        session: &mut dyn IDestinationSession,
        item: &RemoteItem,
        name: &DerivedFileName,
    ) -> Result<u64, TransferError> {
        self.ensure_destination_path(session).await?;

        let mut stream = source.fetch_attachment(item).await.map_err(|err| {
            let failure = ItemTransferError::new(item.id(), name, TransferStage::Download, &err);
            warn!(error = %failure, "Download failed");
            TransferError::Item(failure)
        })?;

        let bytes = session
            .write_object(&self.path, name, &mut stream)
            .await
            .map_err(|err| {
                let failure = ItemTransferError::new(item.id(), name, TransferStage::Upload, &err);
                warn!(error = %failure, "Upload failed");
                TransferError::Item(failure)
            })?;

        info!(
            path = %self.path.object_path(name),
            bytes,
            "Uploaded to destination"
        );
        Ok(bytes)
    }
}
