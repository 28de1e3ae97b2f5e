//! SQLite-backed expense repository.
//!
//! Reads go straight to the pool; every mutation runs on the writer thread in
//! an immediate transaction and then re-publishes the watch snapshot, so
//! subscribers only ever observe committed state.

use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use rust_decimal::Decimal;
use tokio::sync::watch;

use spendlog_core::expenses::{
    Expense, ExpenseRepositoryTrait, NewExpense, NewSyncedExpense, SyncState,
};
use spendlog_core::Result;

use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::expenses;

use super::model::{parse_amount, ExpenseDB, NewExpenseDB};

pub struct ExpenseRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
    events: watch::Sender<Vec<Expense>>,
}

impl ExpenseRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        let initial = Self::load_all(&pool).unwrap_or_else(|e| {
            warn!("[Storage] Could not load the initial expense snapshot: {}", e);
            Vec::new()
        });
        let (events, _) = watch::channel(initial);
        ExpenseRepository {
            pool,
            writer,
            events,
        }
    }

    fn load_all(pool: &Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>) -> Result<Vec<Expense>> {
        let mut conn = get_connection(pool)?;
        let rows = expenses::table
            .order((expenses::timestamp_ms.desc(), expenses::local_id.desc()))
            .load::<ExpenseDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(Expense::try_from).collect()
    }

    fn publish_snapshot(&self) {
        match Self::load_all(&self.pool) {
            Ok(snapshot) => {
                self.events.send_replace(snapshot);
            }
            Err(e) => warn!("[Storage] Could not refresh the expense snapshot: {}", e),
        }
    }
}

#[async_trait]
impl ExpenseRepositoryTrait for ExpenseRepository {
    async fn insert_pending_expense(&self, new_expense: NewExpense) -> Result<Expense> {
        let inserted = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<Expense> {
                let new_db: NewExpenseDB = new_expense.into();
                let row = diesel::insert_into(expenses::table)
                    .values(&new_db)
                    .returning(ExpenseDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                Expense::try_from(row)
            })
            .await?;
        self.publish_snapshot();
        Ok(inserted)
    }

    async fn replace_synced_expenses(&self, rows: Vec<NewSyncedExpense>) -> Result<usize> {
        let deleted = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let deleted = diesel::delete(
                    expenses::table.filter(expenses::sync_state.eq(SyncState::Synced.as_str())),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                if !rows.is_empty() {
                    let new_rows: Vec<NewExpenseDB> =
                        rows.into_iter().map(NewExpenseDB::from).collect();
                    diesel::insert_into(expenses::table)
                        .values(&new_rows)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(deleted)
            })
            .await?;
        self.publish_snapshot();
        Ok(deleted)
    }

    fn get_all_expenses(&self) -> Result<Vec<Expense>> {
        Self::load_all(&self.pool)
    }

    fn get_pending_expenses(&self, attempt_ceiling: Option<i32>) -> Result<Vec<Expense>> {
        let mut conn = get_connection(&self.pool)?;
        let mut query = expenses::table
            .filter(expenses::sync_state.eq(SyncState::Pending.as_str()))
            .into_boxed();
        if let Some(ceiling) = attempt_ceiling {
            query = query.filter(expenses::sync_attempts.lt(ceiling));
        }
        let rows = query
            .order((expenses::timestamp_ms.asc(), expenses::local_id.asc()))
            .load::<ExpenseDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(Expense::try_from).collect()
    }

    fn get_dead_lettered_expenses(&self, attempt_ceiling: i32) -> Result<Vec<Expense>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = expenses::table
            .filter(expenses::sync_state.eq(SyncState::Pending.as_str()))
            .filter(expenses::sync_attempts.ge(attempt_ceiling))
            .order((expenses::timestamp_ms.asc(), expenses::local_id.asc()))
            .load::<ExpenseDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(Expense::try_from).collect()
    }

    async fn mark_synced(&self, local_id: i64, remote_id: &str) -> Result<bool> {
        let remote = remote_id.to_string();
        let marked = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<bool> {
                let affected = diesel::update(
                    expenses::table
                        .filter(expenses::local_id.eq(local_id))
                        .filter(expenses::sync_state.eq(SyncState::Pending.as_str())),
                )
                .set((
                    expenses::sync_state.eq(SyncState::Synced.as_str()),
                    expenses::remote_id.eq(remote),
                    expenses::last_sync_error.eq::<Option<String>>(None),
                ))
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(affected > 0)
            })
            .await?;
        self.publish_snapshot();
        Ok(marked)
    }

    async fn mark_sync_failed(&self, local_id: i64, error: &str) -> Result<()> {
        let message = error.to_string();
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::update(
                    expenses::table
                        .filter(expenses::local_id.eq(local_id))
                        .filter(expenses::sync_state.eq(SyncState::Pending.as_str())),
                )
                .set((
                    expenses::sync_attempts.eq(expenses::sync_attempts + 1),
                    expenses::last_sync_error.eq(message),
                ))
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(())
            })
            .await?;
        self.publish_snapshot();
        Ok(())
    }

    async fn delete_synced_expenses(&self) -> Result<usize> {
        let deleted = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let deleted = diesel::delete(
                    expenses::table.filter(expenses::sync_state.eq(SyncState::Synced.as_str())),
                )
                .execute(conn)
                .map_err(StorageError::from)?;
                Ok(deleted)
            })
            .await?;
        self.publish_snapshot();
        Ok(deleted)
    }

    async fn delete_all_expenses(&self) -> Result<usize> {
        let deleted = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let deleted = diesel::delete(expenses::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(deleted)
            })
            .await?;
        self.publish_snapshot();
        Ok(deleted)
    }

    fn sum_by_category(&self, category: &str) -> Result<Decimal> {
        // SQL SUM would coerce the TEXT amounts to floats; fold exact
        // decimals in Rust instead.
        let mut conn = get_connection(&self.pool)?;
        let amounts = expenses::table
            .filter(expenses::category.eq(category))
            .select(expenses::amount)
            .load::<String>(&mut conn)
            .map_err(StorageError::from)?;
        let mut total = Decimal::ZERO;
        for raw in &amounts {
            total += parse_amount(raw)?;
        }
        Ok(total)
    }

    fn get_expenses_in_range(&self, start_ms: i64, end_ms: i64) -> Result<Vec<Expense>> {
        let mut conn = get_connection(&self.pool)?;
        let rows = expenses::table
            .filter(expenses::timestamp_ms.ge(start_ms))
            .filter(expenses::timestamp_ms.le(end_ms))
            .order((expenses::timestamp_ms.desc(), expenses::local_id.desc()))
            .load::<ExpenseDB>(&mut conn)
            .map_err(StorageError::from)?;
        rows.into_iter().map(Expense::try_from).collect()
    }

    fn subscribe_expenses(&self) -> watch::Receiver<Vec<Expense>> {
        self.events.subscribe()
    }
}
