//! Export archive adapter (secondary/driven adapter)
//!
//! Implements [`IPayloadSource`] over a Telegram Desktop JSON export of
//! the saved messages: a `result.json` index plus the media files it
//! references by relative path.
//!
//! Both export shapes are accepted:
//!
//! - single-chat export: `messages` at the top level
//! - full account export: the chat of type `saved_messages` under
//!   `chats.list`
//!
//! Media classification happens once, while loading the index. Service
//! entries (pins, joins, ...) are dropped; regular messages without an
//! attachment are kept as [`MediaKind::None`] items.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use telesync_core::domain::{MediaKind, MessageId, RemoteItem};
use telesync_core::ports::{AttachmentStream, IPayloadSource};
use tracing::{debug, info, instrument};

/// Name of the index file inside an export directory
pub const INDEX_FILE: &str = "result.json";

/// Chat type of the saved messages in a full account export
const SAVED_MESSAGES: &str = "saved_messages";

#[derive(Debug, Deserialize)]
struct ExportIndex {
    #[serde(default)]
    messages: Option<Vec<ExportMessage>>,
    #[serde(default)]
    chats: Option<ExportChatList>,
}

#[derive(Debug, Deserialize)]
struct ExportChatList {
    #[serde(default)]
    list: Vec<ExportChat>,
}

#[derive(Debug, Deserialize)]
struct ExportChat {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    messages: Vec<ExportMessage>,
}

#[derive(Debug, Deserialize)]
struct ExportMessage {
    id: i64,
    #[serde(rename = "type", default)]
    kind: String,
    photo: Option<String>,
    file: Option<String>,
    file_name: Option<String>,
}

impl ExportMessage {
    fn classify(self) -> (RemoteItem, Option<String>) {
        let id = MessageId::new(self.id);
        if let Some(photo) = self.photo {
            (RemoteItem::photo(id), Some(photo))
        } else if let Some(file) = self.file {
            (RemoteItem::document(id, self.file_name), Some(file))
        } else {
            (RemoteItem::without_media(id), None)
        }
    }
}

/// Payload source reading a local export of the saved messages
#[derive(Debug)]
pub struct ExportArchiveSource {
    dir: PathBuf,
    /// Newest first
    items: Vec<RemoteItem>,
    files: HashMap<MessageId, String>,
}

impl ExportArchiveSource {
    /// Loads `dir/result.json`
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub async fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref();
        let index_path = dir.join(INDEX_FILE);
        let raw = tokio::fs::read_to_string(&index_path)
            .await
            .with_context(|| format!("reading '{}'", index_path.display()))?;

        let source = Self::from_index(dir, &raw)
            .with_context(|| format!("parsing '{}'", index_path.display()))?;

        info!(
            items = source.items.len(),
            attachments = source.files.len(),
            "Export archive loaded"
        );
        Ok(source)
    }

    /// Builds the source from an already-read index
    pub fn from_index(dir: impl Into<PathBuf>, raw: &str) -> anyhow::Result<Self> {
        let index: ExportIndex = serde_json::from_str(raw)?;

        let messages = match (index.messages, index.chats) {
            (Some(messages), _) => messages,
            (None, Some(chats)) => chats
                .list
                .into_iter()
                .find(|chat| chat.kind == SAVED_MESSAGES)
                .map(|chat| chat.messages)
                .ok_or_else(|| anyhow!("export contains no saved messages chat"))?,
            (None, None) => bail!("export has neither 'messages' nor 'chats'"),
        };

        let mut items = Vec::with_capacity(messages.len());
        let mut files = HashMap::new();
        for message in messages.into_iter().filter(|m| m.kind == "message") {
            let (item, file) = message.classify();
            if let Some(file) = file {
                files.insert(item.id(), file);
            }
            items.push(item);
        }
        items.sort_by(|a, b| b.id().cmp(&a.id()));
        items.dedup_by_key(|item| item.id());

        Ok(Self {
            dir: dir.into(),
            items,
            files,
        })
    }

    /// Number of history entries in the archive
    pub fn entry_count(&self) -> usize {
        self.items.len()
    }

    fn resolve(&self, item: &RemoteItem) -> anyhow::Result<PathBuf> {
        let relative = self
            .files
            .get(&item.id())
            .ok_or_else(|| anyhow!("item {} has no attachment in the export", item.id()))?;

        // Telegram writes a parenthesized note instead of a path when the
        // file was skipped by the export settings.
        if relative.starts_with('(') {
            bail!("attachment of item {} was not included in the export", item.id());
        }

        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            bail!(
                "attachment path '{}' of item {} leaves the export directory",
                relative.display(),
                item.id()
            );
        }
        Ok(self.dir.join(relative))
    }
}

#[async_trait::async_trait]
impl IPayloadSource for ExportArchiveSource {
    async fn fetch_history_page(
        &self,
        before_id: Option<MessageId>,
        page_size: u32,
    ) -> anyhow::Result<Vec<RemoteItem>> {
        let start = match before_id {
            Some(before) => self.items.partition_point(|item| item.id() >= before),
            None => 0,
        };
        let page: Vec<RemoteItem> = self.items[start..]
            .iter()
            .take(page_size as usize)
            .cloned()
            .collect();

        debug!(?before_id, returned = page.len(), "served history page");
        Ok(page)
    }

    async fn fetch_attachment(&self, item: &RemoteItem) -> anyhow::Result<AttachmentStream> {
        if item.media_kind() == MediaKind::None {
            bail!("item {} carries no attachment", item.id());
        }
        let path = self.resolve(item)?;
        let file = tokio::fs::File::open(&path)
            .await
            .with_context(|| format!("opening '{}'", path.display()))?;
        Ok(Box::new(file))
    }
}

// ============================================================================
// Unit tests
// ============================================================================
