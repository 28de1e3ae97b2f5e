//! Storage port for expense rows.

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::watch;

use crate::errors::Result;
use crate::expenses::{Expense, NewExpense, NewSyncedExpense};

/// Local-store contract for the expense table.
///
/// Reads run against the connection pool and return immediately; mutations go
/// through the serialized writer and are individually atomic. Every mutation
/// re-publishes the watch snapshot before it resolves.
#[async_trait]
pub trait ExpenseRepositoryTrait: Send + Sync {
    /// Inserts a locally created row as `Pending` and returns it with the
    /// assigned identity.
    async fn insert_pending_expense(&self, new_expense: NewExpense) -> Result<Expense>;

    /// Replaces the synced portion of the cache: deletes every `Synced` row
    /// and inserts `rows` as `Synced`, in one transaction. Pending rows are
    /// untouched. Returns the number of rows deleted.
    async fn replace_synced_expenses(&self, rows: Vec<NewSyncedExpense>) -> Result<usize>;

    /// Full table, newest first.
    fn get_all_expenses(&self) -> Result<Vec<Expense>>;

    /// Pending rows in ascending timestamp order. With an attempt ceiling,
    /// rows whose counter reached it are excluded (dead-lettered).
    fn get_pending_expenses(&self, attempt_ceiling: Option<i32>) -> Result<Vec<Expense>>;

    /// Pending rows at or over the attempt ceiling.
    fn get_dead_lettered_expenses(&self, attempt_ceiling: i32) -> Result<Vec<Expense>>;

    /// Transitions one row `Pending -> Synced` and records its remote id in
    /// the same update. Returns false when no pending row with `local_id`
    /// exists any more (e.g. wiped by a concurrent logout).
    async fn mark_synced(&self, local_id: i64, remote_id: &str) -> Result<bool>;

    /// Records a failed upload attempt: bumps the attempt counter and stores
    /// the error. The row stays `Pending`.
    async fn mark_sync_failed(&self, local_id: i64, error: &str) -> Result<()>;

    /// Deletes all `Synced` rows. Returns the number deleted.
    async fn delete_synced_expenses(&self) -> Result<usize>;

    /// Full wipe. Returns the number deleted.
    async fn delete_all_expenses(&self) -> Result<usize>;

    /// Sum of `amount` over all rows in `category`.
    fn sum_by_category(&self, category: &str) -> Result<Decimal>;

    /// Rows with `start_ms <= timestamp_ms <= end_ms`, newest first.
    fn get_expenses_in_range(&self, start_ms: i64, end_ms: i64) -> Result<Vec<Expense>>;

    /// Reactive snapshot of the full table, newest first. Emits the current
    /// value on subscribe and again after every committed write.
    fn subscribe_expenses(&self) -> watch::Receiver<Vec<Expense>>;
}
