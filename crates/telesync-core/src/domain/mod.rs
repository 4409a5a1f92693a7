//! Domain entities and business rules
//!
//! This module contains the core domain types for TeleSync:
//! - Newtypes for message and run identifiers
//! - History items and the filenames derived from them
//! - Pagination cursor and normalized destination path
//! - Run counters and the run state machine
//! - Domain-specific error types

pub mod cursor;
pub mod destination_path;
pub mod errors;
pub mod item;
pub mod newtypes;
pub mod run;

// Re-export commonly used types
pub use cursor::SyncCursor;
pub use destination_path::DestinationPath;
pub use errors::DomainError;
pub use item::{DerivedFileName, MediaKind, RemoteItem};
pub use newtypes::{MessageId, RunId};
pub use run::{RunResult, RunState};
