//! Expense domain models.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Two-state lifecycle of a cached expense row.
///
/// `Pending` iff `remote_id` is null, `Synced` iff it is set; the store
/// enforces the pairing so the two fields can never disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Pending,
    Synced,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Pending => "pending",
            SyncState::Synced => "synced",
        }
    }
}

/// One spending transaction, either fetched from the remote system or
/// created offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// Locally assigned identity, stable for the life of the row.
    pub local_id: i64,
    /// Server-assigned identity; set exactly once when the upload is
    /// confirmed.
    pub remote_id: Option<String>,
    pub amount: Decimal,
    pub category: String,
    pub description: String,
    /// Epoch milliseconds; ordering and range queries key off this.
    pub timestamp_ms: i64,
    pub sync_state: SyncState,
    /// Number of failed upload attempts so far.
    pub sync_attempts: i32,
    pub last_sync_error: Option<String>,
}

impl Expense {
    pub fn is_pending(&self) -> bool {
        self.sync_state == SyncState::Pending
    }
}

/// Insert payload for a locally created expense. Enters the store `Pending`
/// with no remote id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub amount: Decimal,
    pub category: String,
    pub description: String,
    pub timestamp_ms: i64,
}

/// Insert payload for one refresh-fetched expense. Enters the store `Synced`
/// because the remote is authoritative for its own records.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncedExpense {
    pub remote_id: String,
    pub amount: Decimal,
    pub category: String,
    pub description: String,
    pub timestamp_ms: i64,
}

/// Summary returned by a successful refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    /// Rows fetched from the remote and inserted as synced.
    pub fetched: usize,
    /// Previously synced rows dropped in the same transaction.
    pub replaced: usize,
}
