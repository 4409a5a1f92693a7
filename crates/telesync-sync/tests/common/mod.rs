//! In-memory adapters shared by the integration tests
//!
//! `MemorySource` serves a scripted history; `MemoryStore` keeps objects in
//! a map that survives across sessions, so consecutive runs observe each
//! other's writes.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use telesync_core::config::{Config, ConfigBuilder};
use telesync_core::domain::{DerivedFileName, DestinationPath, MessageId, RemoteItem};
use telesync_core::ports::{
    AttachmentStream, IDestinationSession, IDestinationStore, IPayloadSource,
};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Configuration helpers
// ============================================================================

/// Complete destination settings writing below `subpath` on share `Media`
pub fn configured(subpath: &str) -> Config {
    ConfigBuilder::new()
        .destination_host("nas.local")
        .destination_share("Media")
        .destination_credentials("alice", "secret", "WORKGROUP")
        .destination_subpath(subpath)
        .source_page_size(100)
        .build()
}

/// Photos with ids `count..=1`, newest first
pub fn photos(count: i64) -> Vec<RemoteItem> {
    (1..=count)
        .rev()
        .map(|id| RemoteItem::photo(MessageId::new(id)))
        .collect()
}

pub fn payload_for(id: MessageId) -> Vec<u8> {
    format!("payload-{id}").into_bytes()
}

// ============================================================================
// MemorySource
// ============================================================================

#[derive(Default)]
pub struct MemorySource {
    /// Newest first
    items: Vec<RemoteItem>,
    page_requests: Mutex<usize>,
    fail_on_request: Option<usize>,
    cancel_on_request: Option<(usize, CancellationToken)>,
    failing_downloads: HashSet<MessageId>,
    hanging_download: Option<MessageId>,
}

impl MemorySource {
    pub fn new(items: Vec<RemoteItem>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    /// The n-th page request (1-based) fails
    pub fn fail_on_request(mut self, n: usize) -> Self {
        self.fail_on_request = Some(n);
        self
    }

    /// The n-th page request (1-based) cancels `token` and still returns its page
    pub fn cancel_on_request(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_on_request = Some((n, token));
        self
    }

    pub fn fail_download(mut self, id: i64) -> Self {
        self.failing_downloads.insert(MessageId::new(id));
        self
    }

    /// Downloading this item never completes
    pub fn hang_download(mut self, id: i64) -> Self {
        self.hanging_download = Some(MessageId::new(id));
        self
    }

    pub fn page_requests(&self) -> usize {
        *self.page_requests.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl IPayloadSource for MemorySource {
    async fn fetch_history_page(
        &self,
        before_id: Option<MessageId>,
        page_size: u32,
    ) -> Result<Vec<RemoteItem>> {
        let n = {
            let mut requests = self.page_requests.lock().unwrap();
            *requests += 1;
            *requests
        };

        if self.fail_on_request == Some(n) {
            return Err(anyhow!("FLOOD_WAIT_420"));
        }
        if let Some((at, token)) = &self.cancel_on_request {
            if *at == n {
                token.cancel();
            }
        }

        Ok(self
            .items
            .iter()
            .filter(|item| before_id.map_or(true, |before| item.id() < before))
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn fetch_attachment(&self, item: &RemoteItem) -> Result<AttachmentStream> {
        if self.hanging_download == Some(item.id()) {
            std::future::pending::<()>().await;
        }
        if self.failing_downloads.contains(&item.id()) {
            return Err(anyhow!("FILE_REFERENCE_EXPIRED"));
        }
        Ok(Box::new(std::io::Cursor::new(payload_for(item.id()))))
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

#[derive(Default)]
struct StoreState {
    dirs: HashSet<String>,
    objects: HashMap<String, Vec<u8>>,
    opens: usize,
    closes: usize,
    refuse_open: bool,
    refuse_create: bool,
    failing_writes: HashSet<String>,
    failing_lookups: HashSet<String>,
}

/// Destination whose contents persist across sessions
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refuse_open(self) -> Self {
        self.state.lock().unwrap().refuse_open = true;
        self
    }

    pub fn refuse_create(self) -> Self {
        self.state.lock().unwrap().refuse_create = true;
        self
    }

    /// Writes to an object with this file name fail
    pub fn fail_write(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_writes
            .insert(name.to_string());
        self
    }

    /// Existence checks for this file name fail
    pub fn fail_lookup(self, name: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_lookups
            .insert(name.to_string());
        self
    }

    pub fn put_object(&self, path: &str, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(path.to_string(), bytes.to_vec());
    }

    pub fn put_dir(&self, path: &str) {
        self.state.lock().unwrap().dirs.insert(path.to_string());
    }

    pub fn object(&self, path: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().objects.get(path).cloned()
    }

    pub fn object_count(&self) -> usize {
        self.state.lock().unwrap().objects.len()
    }

    pub fn has_dir(&self, path: &str) -> bool {
        self.state.lock().unwrap().dirs.contains(path)
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

#[async_trait::async_trait]
impl IDestinationStore for MemoryStore {
    async fn open(&self) -> Result<Box<dyn IDestinationSession>> {
        let mut state = self.state.lock().unwrap();
        state.opens += 1;
        if state.refuse_open {
            return Err(anyhow!("NT_STATUS_LOGON_FAILURE"));
        }
        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MemorySession {
    state: Arc<Mutex<StoreState>>,
}

#[async_trait::async_trait]
impl IDestinationSession for MemorySession {
    async fn path_exists(&mut self, path: &DestinationPath) -> Result<bool> {
        Ok(self.state.lock().unwrap().dirs.contains(path.as_str()))
    }

    async fn create_path(&mut self, path: &DestinationPath) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_create {
            return Err(anyhow!("NT_STATUS_ACCESS_DENIED"));
        }
        state.dirs.insert(path.as_str().to_string());
        Ok(())
    }

    async fn object_exists(
        &mut self,
        path: &DestinationPath,
        name: &DerivedFileName,
    ) -> Result<bool> {
        let state = self.state.lock().unwrap();
        if state.failing_lookups.contains(name.as_str()) {
            return Err(anyhow!("NT_STATUS_IO_TIMEOUT"));
        }
        Ok(state.objects.contains_key(&path.object_path(name)))
    }

    async fn write_object(
        &mut self,
        path: &DestinationPath,
        name: &DerivedFileName,
        reader: &mut AttachmentStream,
    ) -> Result<u64> {
        use tokio::io::AsyncReadExt;

        let fails = self
            .state
            .lock()
            .unwrap()
            .failing_writes
            .contains(name.as_str());
        if fails {
            return Err(anyhow!("NT_STATUS_DISK_FULL"));
        }
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        let len = buf.len() as u64;
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(path.object_path(name), buf);
        Ok(len)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}
