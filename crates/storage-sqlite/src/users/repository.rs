//! SQLite-backed user repository.
//!
//! The users table holds at most one row. Upserts rewrite it wholesale so a
//! profile refresh for a different account can never leave two rows behind.

use diesel::prelude::*;
use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use tokio::sync::watch;

use spendlog_core::users::{UserProfile, UserRepositoryTrait};
use spendlog_core::Result;

use crate::db::{get_connection, WriteHandle};
use crate::errors::StorageError;
use crate::schema::users;

use super::model::UserDB;

pub struct UserRepository {
    pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    writer: WriteHandle,
    events: watch::Sender<Option<UserProfile>>,
}

impl UserRepository {
    pub fn new(
        pool: Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
        writer: WriteHandle,
    ) -> Self {
        let initial = Self::load_user(&pool).unwrap_or_else(|e| {
            warn!("[Storage] Could not load the cached user profile: {}", e);
            None
        });
        let (events, _) = watch::channel(initial);
        UserRepository {
            pool,
            writer,
            events,
        }
    }

    fn load_user(
        pool: &Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    ) -> Result<Option<UserProfile>> {
        let mut conn = get_connection(pool)?;
        let row = users::table
            .first::<UserDB>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        row.map(UserProfile::try_from).transpose()
    }

    fn publish_snapshot(&self) {
        match Self::load_user(&self.pool) {
            Ok(snapshot) => {
                self.events.send_replace(snapshot);
            }
            Err(e) => warn!("[Storage] Could not refresh the user snapshot: {}", e),
        }
    }
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn upsert_user(&self, user: UserProfile) -> Result<UserProfile> {
        let stored = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<UserProfile> {
                diesel::delete(users::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                let row = diesel::insert_into(users::table)
                    .values(UserDB::from(user))
                    .returning(UserDB::as_returning())
                    .get_result(conn)
                    .map_err(StorageError::from)?;
                UserProfile::try_from(row)
            })
            .await?;
        self.publish_snapshot();
        Ok(stored)
    }

    fn get_user(&self) -> Result<Option<UserProfile>> {
        Self::load_user(&self.pool)
    }

    async fn delete_all_users(&self) -> Result<usize> {
        let deleted = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                let deleted = diesel::delete(users::table)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(deleted)
            })
            .await?;
        self.publish_snapshot();
        Ok(deleted)
    }

    fn subscribe_user(&self) -> watch::Receiver<Option<UserProfile>> {
        self.events.subscribe()
    }
}
