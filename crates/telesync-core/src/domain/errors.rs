//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! covering invalid run state transitions and malformed schedule times.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// Invalid wall-clock time of day (expected `HH:MM`)
    #[error("Invalid time of day: {0}")]
    InvalidTimeOfDay(String),
}
