//! Run counters and the run state machine

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Summary of one sync pass
///
/// Only entries that carry an attachment are examined. Every examined item
/// ends up transferred, skipped (already mirrored) or failed, and each
/// failure leaves one message in `errors`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    /// Attachment-bearing items looked at
    pub examined: u64,
    /// Items streamed to the destination
    pub transferred: u64,
    /// Items whose derived name already existed at the destination
    pub skipped: u64,
    /// Payload bytes written during the run
    pub bytes_transferred: u64,
    /// Wall-clock duration of the run in milliseconds
    pub duration_ms: u64,
    /// One message per failed item (non-fatal)
    pub errors: Vec<String>,
}

impl RunResult {
    /// Items that were examined but neither transferred nor skipped
    pub fn failed(&self) -> u64 {
        self.examined
            .saturating_sub(self.transferred)
            .saturating_sub(self.skipped)
    }

    /// Returns true if every examined item was transferred or skipped
    pub fn is_clean(&self) -> bool {
        self.failed() == 0
    }

    /// Records a successful transfer of `bytes`
    pub fn record_transfer(&mut self, bytes: u64) {
        self.examined += 1;
        self.transferred += 1;
        self.bytes_transferred += bytes;
    }

    /// Records an item that was already mirrored
    pub fn record_skip(&mut self) {
        self.examined += 1;
        self.skipped += 1;
    }

    /// Records an item whose transfer failed
    pub fn record_failure(&mut self, message: impl Into<String>) {
        self.examined += 1;
        self.errors.push(message.into());
    }
}

/// Lifecycle of a single run
///
/// ```text
/// Idle → SessionOpening → Paginating ⇄ TransferringItem → SessionClosing → Done
///              │               │
///              └──→ Failed ←───┘
/// ```
///
/// `TransferringItem` always returns to `Paginating`; item failures never
/// fail the run. A run that failed while paginating still passes through
/// `SessionClosing` before ending in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    SessionOpening,
    Paginating,
    TransferringItem,
    SessionClosing,
    Done,
    Failed,
}

impl RunState {
    /// Returns the state name for logs and errors
    pub fn name(&self) -> &'static str {
        match self {
            RunState::Idle => "Idle",
            RunState::SessionOpening => "SessionOpening",
            RunState::Paginating => "Paginating",
            RunState::TransferringItem => "TransferringItem",
            RunState::SessionClosing => "SessionClosing",
            RunState::Done => "Done",
            RunState::Failed => "Failed",
        }
    }

    /// Returns true once the run has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    /// Checks whether moving to `target` is allowed
    pub fn can_transition_to(&self, target: RunState) -> bool {
        use RunState::*;

        matches!(
            (self, target),
            (Idle, SessionOpening)
                | (Done | Failed, SessionOpening)
                | (SessionOpening, Paginating)
                | (SessionOpening, Failed)
                | (Paginating, TransferringItem)
                | (Paginating, SessionClosing)
                | (TransferringItem, Paginating)
                | (SessionClosing, Done)
                | (SessionClosing, Failed)
        )
    }

    /// Moves to `target`, rejecting transitions the lifecycle does not allow
    pub fn transition_to(&mut self, target: RunState) -> Result<(), DomainError> {
        if !self.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.name().to_string(),
                to: target.name().to_string(),
            });
        }
        *self = target;
        Ok(())
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
