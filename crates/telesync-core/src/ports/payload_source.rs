//! Payload source port (driven/secondary port)
//!
//! Read-only access to one account's saved history. Implementations own
//! the wire protocol, authentication and any retry policy; the core only
//! pages through items and opens attachment streams.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and the core only distinguishes them by where they occur.
//! - Attachments are exposed as a readable-once [`AttachmentStream`] so the
//!   payload never has to be held in memory as a whole.

use tokio::io::AsyncRead;

use crate::domain::{MessageId, RemoteItem};

/// A readable-once byte stream carrying one attachment
pub type AttachmentStream = Box<dyn AsyncRead + Send + Unpin>;

/// Port trait for the saved-history source
#[async_trait::async_trait]
pub trait IPayloadSource: Send + Sync {
    /// Fetches up to `page_size` items strictly older than `before_id`
    ///
    /// `None` means "start from the most recent item". Items are returned
    /// newest first. An empty page signals that the history is exhausted.
    async fn fetch_history_page(
        &self,
        before_id: Option<MessageId>,
        page_size: u32,
    ) -> anyhow::Result<Vec<RemoteItem>>;

    /// Opens the attachment bytes of one item for streaming
    async fn fetch_attachment(&self, item: &RemoteItem) -> anyhow::Result<AttachmentStream>;
}
