//! Mediator between callers, the local store and the sync engine.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info};
use rust_decimal::Decimal;
use tokio::sync::watch;

use crate::errors::{Error, Result};
use crate::expenses::{
    Expense, ExpenseRepositoryTrait, NewExpense, NewSyncedExpense, RefreshReport,
};
use crate::gateway::{parse_remote_date_ms, RemoteGateway};
use crate::sync::SyncHandle;
use crate::users::UserRepositoryTrait;

/// Refresh pulls at most this many days of history to bound cache size.
pub const REFRESH_HORIZON_DAYS: i64 = 365;

/// The only read/write surface the rest of the application may use for
/// expenses. Reads come from the local store; the network is reached solely
/// through `refresh` and the background sync passes this service requests.
#[async_trait]
pub trait ExpenseServiceTrait: Send + Sync {
    /// Reactive snapshot of all cached expenses, newest first. Never touches
    /// the network.
    fn observe_expenses(&self) -> watch::Receiver<Vec<Expense>>;

    /// Current cached expenses, newest first.
    fn get_all_expenses(&self) -> Result<Vec<Expense>>;

    /// Validates and stores a new expense as `Pending`, then requests a sync
    /// pass (fire-and-forget). The row is visible via `observe_expenses`
    /// before this returns.
    async fn add_expense(
        &self,
        amount: Decimal,
        category: &str,
        description: &str,
    ) -> Result<Expense>;

    /// Pulls the remote expense list for `account` (bounded by the fetch
    /// horizon) and swaps it in for the currently synced rows, atomically.
    /// Pending rows are untouched; on failure local data is left unchanged.
    async fn refresh(&self, account: &str) -> Result<RefreshReport>;

    /// Wipes both cache tables. Safe to call while a sync pass is in flight:
    /// the pass finds its rows gone and swallows the result.
    async fn clear_user_data(&self) -> Result<()>;

    /// Sum of amounts in one category.
    fn sum_by_category(&self, category: &str) -> Result<Decimal>;

    /// Expenses with `start_ms <= timestamp_ms <= end_ms`, newest first.
    fn get_expenses_in_range(&self, start_ms: i64, end_ms: i64) -> Result<Vec<Expense>>;
}

#[derive(Clone)]
pub struct ExpenseService {
    expense_repository: Arc<dyn ExpenseRepositoryTrait>,
    user_repository: Arc<dyn UserRepositoryTrait>,
    gateway: Arc<dyn RemoteGateway>,
    sync: SyncHandle,
}

impl ExpenseService {
    pub fn new(
        expense_repository: Arc<dyn ExpenseRepositoryTrait>,
        user_repository: Arc<dyn UserRepositoryTrait>,
        gateway: Arc<dyn RemoteGateway>,
        sync: SyncHandle,
    ) -> Self {
        Self {
            expense_repository,
            user_repository,
            gateway,
            sync,
        }
    }
}

#[async_trait]
impl ExpenseServiceTrait for ExpenseService {
    fn observe_expenses(&self) -> watch::Receiver<Vec<Expense>> {
        self.expense_repository.subscribe_expenses()
    }

    fn get_all_expenses(&self) -> Result<Vec<Expense>> {
        self.expense_repository.get_all_expenses()
    }

    async fn add_expense(
        &self,
        amount: Decimal,
        category: &str,
        description: &str,
    ) -> Result<Expense> {
        if amount <= Decimal::ZERO {
            return Err(Error::validation(format!(
                "Expense amount must be positive, got {}",
                amount
            )));
        }

        let new_expense = NewExpense {
            amount,
            category: category.to_string(),
            description: description.to_string(),
            timestamp_ms: Utc::now().timestamp_millis(),
        };
        let expense = self
            .expense_repository
            .insert_pending_expense(new_expense)
            .await?;

        debug!(
            "[ExpenseService] Added expense {} ({} '{}'); requesting sync",
            expense.local_id, expense.amount, expense.category
        );
        self.sync.request_sync();

        Ok(expense)
    }

    async fn refresh(&self, account: &str) -> Result<RefreshReport> {
        let since = Utc::now().date_naive() - chrono::Duration::days(REFRESH_HORIZON_DAYS);
        debug!(
            "[ExpenseService] Refreshing expenses for '{}' since {}",
            account, since
        );

        let remote = self.gateway.list_expenses(account, since).await?;
        let fetched = remote.len();
        let rows = remote
            .into_iter()
            .map(|r| NewSyncedExpense {
                remote_id: r.id,
                amount: r.amount,
                category: r.category,
                description: r.title,
                timestamp_ms: parse_remote_date_ms(&r.date),
            })
            .collect();

        let replaced = self.expense_repository.replace_synced_expenses(rows).await?;
        info!(
            "[ExpenseService] Refresh complete for '{}': {} fetched, {} replaced",
            account, fetched, replaced
        );

        Ok(RefreshReport { fetched, replaced })
    }

    async fn clear_user_data(&self) -> Result<()> {
        let expenses = self.expense_repository.delete_all_expenses().await?;
        let users = self.user_repository.delete_all_users().await?;
        info!(
            "[ExpenseService] Cleared user data: {} expense row(s), {} user row(s)",
            expenses, users
        );
        Ok(())
    }

    fn sum_by_category(&self, category: &str) -> Result<Decimal> {
        self.expense_repository.sum_by_category(category)
    }

    fn get_expenses_in_range(&self, start_ms: i64, end_ms: i64) -> Result<Vec<Expense>> {
        self.expense_repository.get_expenses_in_range(start_ms, end_ms)
    }
}
