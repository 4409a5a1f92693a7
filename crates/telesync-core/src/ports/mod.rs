//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. The synchronization core depends on these
//! interfaces; their implementations live in adapter modules.
//!
//! ## Ports Overview
//!
//! - [`IPayloadSource`] - Paged read access to the saved history and its attachments
//! - [`IDestinationStore`] / [`IDestinationSession`] - Write access to the file share

pub mod destination_store;
pub mod payload_source;

pub use destination_store::{IDestinationSession, IDestinationStore};
pub use payload_source::{AttachmentStream, IPayloadSource};
