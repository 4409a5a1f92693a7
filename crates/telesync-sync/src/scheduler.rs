//! Daily scheduler - triggers sync runs at a fixed wall-clock time
//!
//! The [`DailyScheduler`] owns the [`RunCoordinator`] and calls
//! [`run_sync`](RunCoordinator::run_sync) once at startup (when enabled)
//! and then once per day at the configured local time.
//!
//! ## Flow
//!
//! ```text
//! start ──→ [run_on_start] ──→ sleep until daily_at ──→ run_sync ──┐
//!                                   ↑                              │
//!                                   └──────────────────────────────┘
//! ```
//!
//! A failed run is logged and the schedule carries on. Missed runs (the
//! machine was asleep) are not caught up; the next occurrence is always
//! computed from the current time.

use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime, TimeZone};
use telesync_core::config::ScheduleConfig;
use telesync_core::domain::{DomainError, RunResult};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::coordinator::RunCoordinator;

/// Runs the coordinator on start and then every day at `daily_at`
pub struct DailyScheduler {
    coordinator: RunCoordinator,
    run_on_start: bool,
    daily_at: NaiveTime,
    runs: u64,
    last_result: Option<RunResult>,
}

impl DailyScheduler {
    /// Creates a scheduler from the schedule section of the configuration
    ///
    /// Fails if `daily_at` is not a valid `HH:MM` time.
    pub fn new(
        coordinator: RunCoordinator,
        schedule: &ScheduleConfig,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            coordinator,
            run_on_start: schedule.run_on_start,
            daily_at: schedule.daily_time()?,
            runs: 0,
            last_result: None,
        })
    }

    /// Number of runs triggered so far
    pub fn runs(&self) -> u64 {
        self.runs
    }

    /// Counters of the last run that completed without a fatal error
    pub fn last_result(&self) -> Option<&RunResult> {
        self.last_result.as_ref()
    }

    /// Main loop; returns once `shutdown` is cancelled
    pub async fn run(&mut self, shutdown: CancellationToken) {
        info!(
            daily_at = %self.daily_at.format("%H:%M"),
            run_on_start = self.run_on_start,
            "Scheduler starting"
        );

        if self.run_on_start {
            self.trigger(&shutdown).await;
        }

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            let now = Local::now();
            let next = next_occurrence(&now, self.daily_at);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(
                next_run = %next.format("%Y-%m-%d %H:%M:%S %Z"),
                wait_secs = wait.as_secs(),
                "Next sync scheduled"
            );

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {
                    self.trigger(&shutdown).await;
                }
            }
        }

        info!(runs = self.runs, "Scheduler stopped");
    }

    async fn trigger(&mut self, shutdown: &CancellationToken) {
        self.runs += 1;
        debug!(run = self.runs, "Triggering sync run");

        match self.coordinator.run_sync(shutdown).await {
            Ok(result) => self.last_result = Some(result),
            Err(err) => {
                // The coordinator has already logged it at error level.
                debug!(run = self.runs, error = %err, "Scheduled sync run did not complete");
            }
        }
    }
}

/// Next instant strictly after `now` whose local wall-clock time is `at`
///
/// A time that falls into a DST gap is moved one hour forward; an ambiguous
/// time resolves to its earlier instant.
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut date = now.date_naive();

    for _ in 0..3 {
        let wall = date.and_time(at);
        let candidate = tz
            .from_local_datetime(&wall)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(wall + chrono::Duration::hours(1))).earliest());

        if let Some(candidate) = candidate {
            if candidate > *now {
                return candidate;
            }
        }

        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }

    now.clone() + chrono::Duration::days(1)
}
