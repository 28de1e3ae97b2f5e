//! Sync domain models shared by the worker and scheduler.

use serde::{Deserialize, Serialize};

/// Single logical queue key for expense uploads. Requests under this key
/// coalesce: at most one pass is queued ahead of the one currently running.
pub const SYNC_QUEUE_KEY: &str = "expense-sync";

/// Result of one sync pass over the outbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Every pending row uploaded (or there was nothing to do).
    Success,
    /// At least one row failed and stays pending; the scheduler applies
    /// backoff and runs another pass.
    Retry,
}

/// Per-pass accounting emitted by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRunReport {
    pub outcome: SyncOutcome,
    pub uploaded: usize,
    pub failed: usize,
    /// Pending rows excluded from this pass because they reached the
    /// configured attempt ceiling.
    pub dead_lettered: usize,
}

impl SyncRunReport {
    pub fn empty() -> Self {
        SyncRunReport {
            outcome: SyncOutcome::Success,
            uploaded: 0,
            failed: 0,
            dead_lettered: 0,
        }
    }
}

/// Retry budget for pending rows.
///
/// The default is unlimited: a row that keeps failing is retried on every
/// pass, matching the engine's original contract. Deployments that want a
/// ceiling set `max_attempts`; rows at or over it are dead-lettered (skipped
/// by the worker, still pending and queryable). The ceiling never changes
/// what happens to rows that upload successfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncPolicy {
    pub max_attempts: Option<u32>,
}

impl SyncPolicy {
    pub fn unlimited() -> Self {
        SyncPolicy { max_attempts: None }
    }

    pub fn with_max_attempts(max_attempts: u32) -> Self {
        SyncPolicy {
            max_attempts: Some(max_attempts),
        }
    }

    /// Ceiling as stored in the per-row attempt counter.
    pub fn attempt_ceiling(&self) -> Option<i32> {
        self.max_attempts
            .map(|n| i32::try_from(n).unwrap_or(i32::MAX))
    }
}

/// Scheduler status snapshot published over a watch channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub running: bool,
    pub consecutive_failures: i32,
    pub last_outcome: Option<SyncOutcome>,
    pub last_duration_ms: Option<i64>,
    pub last_finished_at: Option<String>,
    pub next_retry_at: Option<String>,
}
