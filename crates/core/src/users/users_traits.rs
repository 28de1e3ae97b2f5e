//! Storage port for the cached user profile.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::errors::Result;
use crate::users::UserProfile;

/// Local-store contract for the single-row user table.
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    /// Replaces the cached profile wholesale, enforcing the single-row
    /// invariant in one transaction.
    async fn upsert_user(&self, user: UserProfile) -> Result<UserProfile>;

    /// Current cached profile, or `None` when signed out.
    fn get_user(&self) -> Result<Option<UserProfile>>;

    /// Wipes the user table. Returns the number of rows deleted.
    async fn delete_all_users(&self) -> Result<usize>;

    /// Reactive view of the cached profile. Emits the current value on
    /// subscribe and again after every committed write.
    fn subscribe_user(&self) -> watch::Receiver<Option<UserProfile>>;
}
