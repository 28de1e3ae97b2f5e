//! Composition root: builds and owns the process-wide service graph.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

use spendlog_api_client::ExpenseApiClient;
use spendlog_core::expenses::{
    ExpenseRepositoryTrait, ExpenseService, ExpenseServiceTrait,
};
use spendlog_core::gateway::RemoteGateway;
use spendlog_core::sync::{
    SyncHandle, SyncScheduler, SyncWorker, SYNC_NUDGE_INTERVAL_SECS, SYNC_NUDGE_JITTER_SECS,
};
use spendlog_core::users::{UserRepositoryTrait, UserService, UserServiceTrait};
use spendlog_core::Result;
use spendlog_storage_sqlite::db::{create_pool, init, run_migrations, spawn_writer};
use spendlog_storage_sqlite::expenses::ExpenseRepository;
use spendlog_storage_sqlite::users::UserRepository;

use crate::config::RuntimeConfig;
use crate::connectivity::ConnectivityMonitor;

/// Process-wide service graph.
///
/// Built once at startup and shared by `Arc`; `logout` resets the cached data
/// but leaves the pool, writer and scheduler alive for the next session.
pub struct ServiceContext {
    pub instance_id: Arc<String>,
    pub connectivity: Arc<ConnectivityMonitor>,

    // Services
    pub expense_service: Arc<dyn ExpenseServiceTrait>,
    pub user_service: Arc<dyn UserServiceTrait>,

    // Storage ports, shared with the services
    pub expense_repository: Arc<dyn ExpenseRepositoryTrait>,
    pub user_repository: Arc<dyn UserRepositoryTrait>,

    sync_handle: SyncHandle,
    background_task: Mutex<Option<JoinHandle<()>>>,
}

impl ServiceContext {
    /// Opens the database, runs migrations, spawns the writer thread and the
    /// sync scheduler, and wires every service to its dependencies. Must run
    /// inside a tokio runtime; the scheduler task is spawned onto it.
    pub fn bootstrap(config: RuntimeConfig) -> Result<Arc<Self>> {
        let gateway: Arc<dyn RemoteGateway> = Arc::new(ExpenseApiClient::with_bearer_token(
            &config.api_base_url,
            config.bearer_token.clone(),
        ));
        Self::bootstrap_with_gateway(config, gateway)
    }

    /// Same bootstrap with a caller-supplied gateway, so embedders and tests
    /// can substitute the remote transport.
    pub fn bootstrap_with_gateway(
        config: RuntimeConfig,
        gateway: Arc<dyn RemoteGateway>,
    ) -> Result<Arc<Self>> {
        let instance_id = Arc::new(Uuid::new_v4().to_string());
        info!(
            "[Runtime] Bootstrapping service context (instance {})",
            instance_id
        );

        let db_path = init(&config.app_data_dir)?;
        run_migrations(&db_path)?;
        let pool = create_pool(&db_path)?;
        let writer = spawn_writer(pool.as_ref().clone());

        let expense_repository: Arc<dyn ExpenseRepositoryTrait> =
            Arc::new(ExpenseRepository::new(Arc::clone(&pool), writer.clone()));
        let user_repository: Arc<dyn UserRepositoryTrait> =
            Arc::new(UserRepository::new(pool, writer));

        let connectivity = Arc::new(ConnectivityMonitor::new(config.assume_online));

        let worker = SyncWorker::new(
            Arc::clone(&expense_repository),
            Arc::clone(&user_repository),
            Arc::clone(&gateway),
            config.sync_policy,
        );
        let scheduler = SyncScheduler::new(worker, connectivity.subscribe(), config.scheduler);
        let sync_handle = scheduler.handle();
        scheduler.spawn();

        let expense_service: Arc<dyn ExpenseServiceTrait> = Arc::new(ExpenseService::new(
            Arc::clone(&expense_repository),
            Arc::clone(&user_repository),
            Arc::clone(&gateway),
            sync_handle.clone(),
        ));
        let user_service: Arc<dyn UserServiceTrait> = Arc::new(UserService::new(
            Arc::clone(&user_repository),
            Arc::clone(&gateway),
        ));

        // Rows written while the previous process was offline are still in
        // the outbox; get them moving without waiting for the first nudge.
        match expense_repository.get_pending_expenses(None) {
            Ok(pending) if !pending.is_empty() => {
                info!(
                    "[Runtime] {} pending row(s) found at startup; requesting a sync pass",
                    pending.len()
                );
                sync_handle.request_sync();
            }
            Ok(_) => {}
            Err(e) => warn!("[Runtime] Could not inspect the outbox at startup: {}", e),
        }

        Ok(Arc::new(ServiceContext {
            instance_id,
            connectivity,
            expense_service,
            user_service,
            expense_repository,
            user_repository,
            sync_handle,
            background_task: Mutex::new(None),
        }))
    }

    pub fn expense_service(&self) -> Arc<dyn ExpenseServiceTrait> {
        Arc::clone(&self.expense_service)
    }

    pub fn user_service(&self) -> Arc<dyn UserServiceTrait> {
        Arc::clone(&self.user_service)
    }

    pub fn connectivity(&self) -> Arc<ConnectivityMonitor> {
        Arc::clone(&self.connectivity)
    }

    pub fn sync_handle(&self) -> SyncHandle {
        self.sync_handle.clone()
    }

    /// Starts the periodic nudge that re-requests a sync pass while pending
    /// rows exist. Idempotent; a finished task is respawned.
    pub async fn ensure_background_sync_started(&self) {
        let mut guard = self.background_task.lock().await;
        if let Some(handle) = guard.as_ref() {
            if !handle.is_finished() {
                return;
            }
            guard.take();
        }

        let expense_repository = Arc::clone(&self.expense_repository);
        let sync_handle = self.sync_handle.clone();
        let handle = tokio::spawn(async move {
            loop {
                let jitter_bound = SYNC_NUDGE_JITTER_SECS.saturating_mul(1000);
                let jitter_ms = if jitter_bound > 0 {
                    Utc::now().timestamp_millis().unsigned_abs() % jitter_bound
                } else {
                    0
                };
                let delay_ms = SYNC_NUDGE_INTERVAL_SECS.saturating_mul(1000) + jitter_ms;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                match expense_repository.get_pending_expenses(None) {
                    Ok(pending) if !pending.is_empty() => {
                        debug!(
                            "[Runtime] Nudge: {} row(s) still pending, requesting a pass",
                            pending.len()
                        );
                        sync_handle.request_sync();
                    }
                    Ok(_) => {}
                    Err(e) => warn!("[Runtime] Nudge could not read the outbox: {}", e),
                }
            }
        });
        *guard = Some(handle);
    }

    pub async fn ensure_background_sync_stopped(&self) {
        let mut guard = self.background_task.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
    }

    /// Wipes all cached user data and stops the background nudge. The pool,
    /// writer and scheduler stay alive, so a new sign-in continues on the
    /// same context.
    pub async fn logout(&self) -> Result<()> {
        info!(
            "[Runtime] Logout: wiping the local cache (instance {})",
            self.instance_id
        );
        self.ensure_background_sync_stopped().await;
        self.expense_service.clear_user_data().await
    }
}
