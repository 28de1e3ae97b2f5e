//! Database models for the local expense cache.

use diesel::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use spendlog_core::expenses::{Expense, NewExpense, NewSyncedExpense, SyncState};
use spendlog_core::{Error, Result};

use crate::errors::StorageError;

#[derive(
    Queryable,
    Identifiable,
    Insertable,
    AsChangeset,
    Selectable,
    Debug,
    Clone,
    Serialize,
    Deserialize,
)]
#[diesel(primary_key(local_id))]
#[diesel(table_name = crate::schema::expenses)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ExpenseDB {
    pub local_id: i64,
    pub remote_id: Option<String>,
    pub amount: String,
    pub category: String,
    pub description: String,
    pub timestamp_ms: i64,
    pub sync_state: String,
    pub sync_attempts: i32,
    pub last_sync_error: Option<String>,
}

/// Insert shape without the rowid; SQLite assigns `local_id`.
#[derive(Insertable, Debug, Clone)]
#[diesel(table_name = crate::schema::expenses)]
pub struct NewExpenseDB {
    pub remote_id: Option<String>,
    pub amount: String,
    pub category: String,
    pub description: String,
    pub timestamp_ms: i64,
    pub sync_state: String,
    pub sync_attempts: i32,
    pub last_sync_error: Option<String>,
}

pub(crate) fn parse_amount(raw: &str) -> Result<Decimal> {
    raw.parse::<Decimal>().map_err(|_| {
        Error::from(StorageError::Corrupt(format!(
            "Stored amount '{}' is not a decimal",
            raw
        )))
    })
}

pub(crate) fn parse_sync_state(raw: &str) -> Result<SyncState> {
    match raw {
        "pending" => Ok(SyncState::Pending),
        "synced" => Ok(SyncState::Synced),
        other => Err(Error::from(StorageError::Corrupt(format!(
            "Unknown sync state '{}'",
            other
        )))),
    }
}

impl TryFrom<ExpenseDB> for Expense {
    type Error = Error;

    fn try_from(db: ExpenseDB) -> Result<Self> {
        Ok(Expense {
            local_id: db.local_id,
            remote_id: db.remote_id,
            amount: parse_amount(&db.amount)?,
            category: db.category,
            description: db.description,
            timestamp_ms: db.timestamp_ms,
            sync_state: parse_sync_state(&db.sync_state)?,
            sync_attempts: db.sync_attempts,
            last_sync_error: db.last_sync_error,
        })
    }
}

impl From<NewExpense> for NewExpenseDB {
    fn from(new: NewExpense) -> Self {
        NewExpenseDB {
            remote_id: None,
            amount: new.amount.to_string(),
            category: new.category,
            description: new.description,
            timestamp_ms: new.timestamp_ms,
            sync_state: SyncState::Pending.as_str().to_string(),
            sync_attempts: 0,
            last_sync_error: None,
        }
    }
}

impl From<NewSyncedExpense> for NewExpenseDB {
    fn from(new: NewSyncedExpense) -> Self {
        NewExpenseDB {
            remote_id: Some(new.remote_id),
            amount: new.amount.to_string(),
            category: new.category,
            description: new.description,
            timestamp_ms: new.timestamp_ms,
            sync_state: SyncState::Synced.as_str().to_string(),
            sync_attempts: 0,
            last_sync_error: None,
        }
    }
}
