use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use tokio::sync::watch;

use crate::errors::Result;
use crate::gateway::RemoteGateway;
use crate::users::{
    default_budget_limit, user_id_from_email, UserProfile, UserRepositoryTrait,
};

/// Read surface for the cached profile plus the one operation that refreshes
/// it from the remote system.
#[async_trait]
pub trait UserServiceTrait: Send + Sync {
    /// Reactive view of the cached profile. `None` while signed out.
    fn observe_user(&self) -> watch::Receiver<Option<UserProfile>>;

    /// Current cached profile, if any. Never touches the network.
    fn get_user(&self) -> Result<Option<UserProfile>>;

    /// Fetches the remote profile for `account` and overwrites the single
    /// cached row wholesale. Callers that want offline tolerance catch the
    /// error and fall back to `get_user`.
    async fn refresh_profile(&self, account: &str) -> Result<UserProfile>;
}

#[derive(Clone)]
pub struct UserService {
    user_repository: Arc<dyn UserRepositoryTrait>,
    gateway: Arc<dyn RemoteGateway>,
}

impl UserService {
    pub fn new(user_repository: Arc<dyn UserRepositoryTrait>, gateway: Arc<dyn RemoteGateway>) -> Self {
        Self {
            user_repository,
            gateway,
        }
    }
}

#[async_trait]
impl UserServiceTrait for UserService {
    fn observe_user(&self) -> watch::Receiver<Option<UserProfile>> {
        self.user_repository.subscribe_user()
    }

    fn get_user(&self) -> Result<Option<UserProfile>> {
        self.user_repository.get_user()
    }

    async fn refresh_profile(&self, account: &str) -> Result<UserProfile> {
        debug!("[UserService] Refreshing profile for '{}'", account);
        let remote = self.gateway.get_user_profile(account).await?;

        let profile = UserProfile {
            id: user_id_from_email(account),
            email: account.to_string(),
            display_name: remote.display_name,
            experience_points: remote.experience_points.max(0),
            budget_limit: remote.budget_limit.unwrap_or_else(default_budget_limit),
            profile_picture: remote.profile_picture,
        };

        let stored = self.user_repository.upsert_user(profile).await?;
        info!(
            "[UserService] Profile refreshed for '{}' ({} XP)",
            stored.email, stored.experience_points
        );
        Ok(stored)
    }
}
