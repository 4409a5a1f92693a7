//! Mounted share adapter (secondary/driven adapter)
//!
//! Implements [`IDestinationStore`] over a local directory where the
//! network share is mounted (for example a CIFS mount of `//host/share`).
//! The mount itself is the operator's job; this adapter only needs the
//! mount point.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: objects are streamed into `<name>.part` and renamed
//!   onto the final name, so an interrupted transfer never leaves a file
//!   that the dedup check would mistake for a mirrored item.
//! - **Bounded buffering**: `tokio::io::copy` moves bytes through a fixed
//!   size buffer; an attachment is never held in memory whole.
//! - **Containment**: `..` segments and names are rejected so nothing is
//!   written outside the mount root.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use telesync_core::domain::{DerivedFileName, DestinationPath};
use telesync_core::ports::{AttachmentStream, IDestinationSession, IDestinationStore};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

/// Suffix of in-progress objects
const PARTIAL_SUFFIX: &str = ".part";

/// Destination store backed by a mounted share
#[derive(Debug, Clone)]
pub struct MountedShareStore {
    root: PathBuf,
}

impl MountedShareStore {
    /// Creates a store writing below `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the mount point
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait::async_trait]
impl IDestinationStore for MountedShareStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn open(&self) -> anyhow::Result<Box<dyn IDestinationSession>> {
        let metadata = tokio::fs::metadata(&self.root)
            .await
            .with_context(|| format!("share mount '{}' is not reachable", self.root.display()))?;
        if !metadata.is_dir() {
            bail!("share mount '{}' is not a directory", self.root.display());
        }

        debug!("share session opened");
        Ok(Box::new(MountedShareSession {
            root: self.root.clone(),
            written: 0,
        }))
    }
}

/// One run's view of the mounted share
#[derive(Debug)]
pub struct MountedShareSession {
    root: PathBuf,
    written: u64,
}

impl MountedShareSession {
    fn resolve_dir(&self, path: &DestinationPath) -> anyhow::Result<PathBuf> {
        let mut dir = self.root.clone();
        for segment in path.segments() {
            if segment == ".." {
                bail!("destination path '{path}' escapes the share root");
            }
            dir.push(segment);
        }
        Ok(dir)
    }

    fn resolve_object(
        &self,
        path: &DestinationPath,
        name: &DerivedFileName,
    ) -> anyhow::Result<PathBuf> {
        if name.as_str() == ".." || name.as_str().contains(['/', '\\']) {
            bail!("object name '{name}' is not a plain file name");
        }
        Ok(self.resolve_dir(path)?.join(name.as_str()))
    }
}

#[async_trait::async_trait]
impl IDestinationSession for MountedShareSession {
    async fn path_exists(&mut self, path: &DestinationPath) -> anyhow::Result<bool> {
        let dir = self.resolve_dir(path)?;
        match tokio::fs::metadata(&dir).await {
            Ok(metadata) => Ok(metadata.is_dir()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("stat '{}'", dir.display())),
        }
    }

    #[instrument(skip_all, fields(path = %path))]
    async fn create_path(&mut self, path: &DestinationPath) -> anyhow::Result<()> {
        let dir = self.resolve_dir(path)?;
        tokio::fs::create_dir(&dir)
            .await
            .with_context(|| format!("mkdir '{}'", dir.display()))?;
        debug!("directory created");
        Ok(())
    }

    async fn object_exists(
        &mut self,
        path: &DestinationPath,
        name: &DerivedFileName,
    ) -> anyhow::Result<bool> {
        let target = self.resolve_object(path, name)?;
        tokio::fs::try_exists(&target)
            .await
            .with_context(|| format!("stat '{}'", target.display()))
    }

    #[instrument(skip_all, fields(path = %path, name = %name))]
    async fn write_object(
        &mut self,
        path: &DestinationPath,
        name: &DerivedFileName,
        reader: &mut AttachmentStream,
    ) -> anyhow::Result<u64> {
        let target = self.resolve_object(path, name)?;
        let tmp_path = {
            let mut p = target.as_os_str().to_owned();
            p.push(PARTIAL_SUFFIX);
            PathBuf::from(p)
        };

        debug!(?tmp_path, "streaming to temporary file");
        let written = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            let bytes = tokio::io::copy(reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, &target).await?;
            Ok::<u64, std::io::Error>(bytes)
        }
        .await;

        match written {
            Ok(bytes) => {
                self.written += bytes;
                debug!(bytes, "write complete");
                Ok(bytes)
            }
            Err(e) => {
                // Best effort; the .part name is never picked up by dedup.
                let _ = tokio::fs::remove_file(&tmp_path).await;
                Err(e).with_context(|| format!("write '{}'", target.display()))
            }
        }
    }

    async fn close(self: Box<Self>) -> anyhow::Result<()> {
        info!(
            root = %self.root.display(),
            bytes_written = self.written,
            "Share session closed"
        );
        Ok(())
    }
}

// ============================================================================
// Unit tests
// ============================================================================
