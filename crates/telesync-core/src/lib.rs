//! TeleSync Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `RemoteItem`, `DerivedFileName`, `SyncCursor`, `DestinationPath`, `RunResult`
//! - **Port definitions** - Traits for adapters: `IPayloadSource`, `IDestinationStore`, `IDestinationSession`
//! - **State machine** - Lifecycle of a single sync run (`RunState`)
//!
//! # Architecture
//!
//! The domain module contains pure value types with no I/O.
//! Ports define trait interfaces that adapter crates implement.
//! The synchronization core in `telesync-sync` orchestrates domain values
//! through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
