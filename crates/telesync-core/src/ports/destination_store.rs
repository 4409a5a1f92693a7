//! Destination store port (driven/secondary port)
//!
//! Write access to the network share. A store hands out sessions; the run
//! coordinator opens exactly one session per run and is its only owner.
//!
//! ## Design Notes
//!
//! - Session methods take `&mut self`: a session is never shared and never
//!   used for concurrent writes.
//! - [`IDestinationSession::close`] consumes the boxed session, so a closed
//!   session cannot be used or closed again.

use crate::domain::{DerivedFileName, DestinationPath};
use crate::ports::payload_source::AttachmentStream;

/// Port trait for opening destination sessions
#[async_trait::async_trait]
pub trait IDestinationStore: Send + Sync {
    /// Connects and authenticates against the share
    async fn open(&self) -> anyhow::Result<Box<dyn IDestinationSession>>;
}

/// An open, authenticated connection to the share
#[async_trait::async_trait]
pub trait IDestinationSession: Send {
    /// Returns true if the directory exists
    async fn path_exists(&mut self, path: &DestinationPath) -> anyhow::Result<bool>;

    /// Creates one directory; its parent must already exist
    async fn create_path(&mut self, path: &DestinationPath) -> anyhow::Result<()>;

    /// Returns true if an object named `name` exists under `path`
    async fn object_exists(
        &mut self,
        path: &DestinationPath,
        name: &DerivedFileName,
    ) -> anyhow::Result<bool>;

    /// Streams `reader` into `path/name`, returning the number of bytes written
    ///
    /// Implementations must not leave a visible object under `name` when
    /// the write fails part-way.
    async fn write_object(
        &mut self,
        path: &DestinationPath,
        name: &DerivedFileName,
        reader: &mut AttachmentStream,
    ) -> anyhow::Result<u64>;

    /// Releases the connection
    async fn close(self: Box<Self>) -> anyhow::Result<()>;
}
