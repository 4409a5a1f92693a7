//! History items and their destination names
//!
//! A [`RemoteItem`] is produced once by the payload source, with its
//! [`MediaKind`] already classified. Every later decision (naming, dedup,
//! transfer) works from that closed variant.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::newtypes::MessageId;

/// Kind of attachment carried by a history entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// A document (any file sent as a file)
    Document,
    /// A compressed photo
    Photo,
    /// No binary attachment
    None,
}

impl MediaKind {
    /// Returns true if the entry carries bytes worth mirroring
    pub fn has_payload(&self) -> bool {
        !matches!(self, MediaKind::None)
    }
}

impl Display for MediaKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Document => write!(f, "document"),
            MediaKind::Photo => write!(f, "photo"),
            MediaKind::None => write!(f, "none"),
        }
    }
}

/// One entry of the saved history
///
/// Immutable: the source history is read-only from this system's side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    id: MessageId,
    media_kind: MediaKind,
    original_name: Option<String>,
}

impl RemoteItem {
    /// Creates a document item, optionally carrying the sender's filename
    pub fn document(id: MessageId, original_name: Option<String>) -> Self {
        Self {
            id,
            media_kind: MediaKind::Document,
            original_name,
        }
    }

    /// Creates a photo item (photos never carry a filename)
    pub fn photo(id: MessageId) -> Self {
        Self {
            id,
            media_kind: MediaKind::Photo,
            original_name: None,
        }
    }

    /// Creates an entry without an attachment
    pub fn without_media(id: MessageId) -> Self {
        Self {
            id,
            media_kind: MediaKind::None,
            original_name: None,
        }
    }

    /// Returns the history id
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the attachment kind
    pub fn media_kind(&self) -> MediaKind {
        self.media_kind
    }

    /// Returns the sender's filename, present only for documents
    pub fn original_name(&self) -> Option<&str> {
        self.original_name.as_deref()
    }
}

/// Name under which an item is stored at the destination
///
/// This is also the dedup key: an object with this name at the destination
/// path means the item is already mirrored, whatever its content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DerivedFileName(String);

impl DerivedFileName {
    /// Derives the destination name for an item
    ///
    /// `original_name` wins when usable and is kept verbatim; otherwise
    /// `photo_{id}.jpg` for photos and `file_{id}` for everything else. An
    /// original name holding separators is rewritten to a single path
    /// segment and prefixed with the id, so it cannot collide with another
    /// item's verbatim name.
    pub fn for_item(item: &RemoteItem) -> Self {
        if let Some(raw) = item.original_name().filter(|raw| is_usable(raw)) {
            if !raw.contains(FORBIDDEN) {
                return Self(raw.to_string());
            }
            return Self(format!("{}_{}", item.id(), raw.replace(FORBIDDEN, "_")));
        }

        match item.media_kind() {
            MediaKind::Photo => Self(format!("photo_{}.jpg", item.id())),
            MediaKind::Document | MediaKind::None => Self(format!("file_{}", item.id())),
        }
    }

    /// Returns the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DerivedFileName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for DerivedFileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Characters that cannot appear inside a single path segment
const FORBIDDEN: [char; 3] = ['/', '\\', '\0'];

fn is_usable(raw: &str) -> bool {
    !raw.trim().is_empty() && !raw.chars().all(|c| c == '.')
}
