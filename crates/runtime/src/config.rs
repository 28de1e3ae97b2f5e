//! Bootstrap configuration.

use spendlog_core::sync::{SyncPolicy, SyncSchedulerConfig};

/// Environment variable consulted when no API base URL is set explicitly.
pub const API_URL_ENV: &str = "SPENDLOG_API_URL";

const DEFAULT_API_URL: &str = "https://api.spendlog.app";

fn api_base_url_from_env() -> String {
    std::env::var(API_URL_ENV)
        .ok()
        .map(|v| v.trim().trim_end_matches('/').to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

/// Everything [`ServiceContext::bootstrap`](crate::ServiceContext::bootstrap)
/// needs to assemble a process.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Directory the SQLite database lives in; created when missing.
    pub app_data_dir: String,
    /// Base URL of the remote expense service.
    pub api_base_url: String,
    /// Static bearer token attached to every API request when set.
    pub bearer_token: Option<String>,
    /// Upload attempt ceiling; unlimited by default.
    pub sync_policy: SyncPolicy,
    /// Backoff tuning for failed sync passes.
    pub scheduler: SyncSchedulerConfig,
    /// Connectivity assumption until the host reports otherwise.
    pub assume_online: bool,
}

impl RuntimeConfig {
    /// Defaults: API URL from `SPENDLOG_API_URL` (or the public endpoint),
    /// unlimited retries, assumed online.
    pub fn new(app_data_dir: impl Into<String>) -> Self {
        RuntimeConfig {
            app_data_dir: app_data_dir.into(),
            api_base_url: api_base_url_from_env(),
            bearer_token: None,
            sync_policy: SyncPolicy::default(),
            scheduler: SyncSchedulerConfig::default(),
            assume_online: true,
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.api_base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn with_sync_policy(mut self, policy: SyncPolicy) -> Self {
        self.sync_policy = policy;
        self
    }

    pub fn with_scheduler(mut self, scheduler: SyncSchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Hold queued sync passes until the host reports connectivity.
    pub fn starting_offline(mut self) -> Self {
        self.assume_online = false;
        self
    }
}
