//! Network-gated, coalescing runner for the sync worker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

use crate::sync::{SyncOutcome, SyncStatus, SyncWorker, SYNC_QUEUE_KEY};

/// Baseline cadence for the background nudge that re-requests a pass while
/// rows are still pending.
pub const SYNC_NUDGE_INTERVAL_SECS: u64 = 45;
/// Jitter bound added to the nudge interval to avoid synchronized wakeups.
pub const SYNC_NUDGE_JITTER_SECS: u64 = 5;

/// Tuning for the delay between failed passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSchedulerConfig {
    /// Delay after the first failed pass; doubles per consecutive failure.
    pub base_retry_delay: Duration,
    /// Upper bound for the doubled delay.
    pub max_retry_delay: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        SyncSchedulerConfig {
            base_retry_delay: Duration::from_secs(5),
            max_retry_delay: Duration::from_secs(1280),
        }
    }
}

impl SyncSchedulerConfig {
    /// Exponential backoff with cap.
    pub fn retry_delay(&self, consecutive_failures: i32) -> Duration {
        const MAX_EXPONENT: i32 = 8;

        let capped = consecutive_failures.clamp(0, MAX_EXPONENT) as u32;
        self.base_retry_delay
            .saturating_mul(2_u32.saturating_pow(capped))
            .min(self.max_retry_delay)
    }
}

/// Cheap cloneable handle for enqueueing sync passes.
#[derive(Clone)]
pub struct SyncHandle {
    requests: Arc<Notify>,
    status_tx: Arc<watch::Sender<SyncStatus>>,
}

impl SyncHandle {
    /// Fire-and-forget enqueue under the single logical queue key. Requests
    /// arriving while a pass runs collapse into one queued follow-up pass.
    pub fn request_sync(&self) {
        debug!("[SyncScheduler] Sync requested for '{}'", SYNC_QUEUE_KEY);
        self.requests.notify_one();
    }

    /// Live scheduler status snapshots.
    pub fn status(&self) -> watch::Receiver<SyncStatus> {
        self.status_tx.subscribe()
    }
}

/// Single-consumer queue that runs the worker at most once at a time.
///
/// A `Notify` permit is the single queue slot: a request while idle stores
/// one permit, requests while running coalesce into that same permit and
/// trigger exactly one follow-up pass. Passes only start while the
/// connectivity signal reads online; going offline mid-pass does not cancel
/// it. A `Retry` outcome re-enqueues automatically after exponential backoff.
///
/// The loop stops when the connectivity sender is dropped, which is how the
/// owning context winds the queue down.
pub struct SyncScheduler {
    worker: SyncWorker,
    connectivity: watch::Receiver<bool>,
    config: SyncSchedulerConfig,
    requests: Arc<Notify>,
    status_tx: Arc<watch::Sender<SyncStatus>>,
}

impl SyncScheduler {
    pub fn new(
        worker: SyncWorker,
        connectivity: watch::Receiver<bool>,
        config: SyncSchedulerConfig,
    ) -> Self {
        let (status_tx, _) = watch::channel(SyncStatus::default());
        Self {
            worker,
            connectivity,
            config,
            requests: Arc::new(Notify::new()),
            status_tx: Arc::new(status_tx),
        }
    }

    pub fn handle(&self) -> SyncHandle {
        SyncHandle {
            requests: Arc::clone(&self.requests),
            status_tx: Arc::clone(&self.status_tx),
        }
    }

    /// Consumes the scheduler and runs its loop on a background task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!("[SyncScheduler] Queue '{}' started", SYNC_QUEUE_KEY);
        let mut consecutive_failures: i32 = 0;

        loop {
            let request_ready = tokio::select! {
                _ = self.requests.notified() => true,
                changed = self.connectivity.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    false
                }
            };
            if !request_ready {
                continue;
            }
            if !self.wait_until_online().await {
                break;
            }

            self.status_tx.send_modify(|status| {
                status.running = true;
                status.next_retry_at = None;
            });

            let started = Instant::now();
            let result = self.worker.run_once().await;
            let duration_ms = started.elapsed().as_millis() as i64;
            let finished_at = Utc::now().to_rfc3339();

            match result {
                Ok(report) if report.outcome == SyncOutcome::Success => {
                    consecutive_failures = 0;
                    debug!("[SyncScheduler] Pass finished clean in {} ms", duration_ms);
                    self.status_tx.send_modify(|status| {
                        status.running = false;
                        status.consecutive_failures = 0;
                        status.last_outcome = Some(SyncOutcome::Success);
                        status.last_duration_ms = Some(duration_ms);
                        status.last_finished_at = Some(finished_at);
                        status.next_retry_at = None;
                    });
                }
                other => {
                    let delay = self.config.retry_delay(consecutive_failures);
                    consecutive_failures += 1;
                    match &other {
                        Ok(report) => warn!(
                            "[SyncScheduler] Pass left {} row(s) pending; retrying in {:?}",
                            report.failed, delay
                        ),
                        Err(e) => error!(
                            "[SyncScheduler] Pass failed: {}; retrying in {:?}",
                            e, delay
                        ),
                    }
                    let next_retry_at = (Utc::now()
                        + chrono::Duration::milliseconds(delay.as_millis() as i64))
                    .to_rfc3339();
                    self.status_tx.send_modify(|status| {
                        status.running = false;
                        status.consecutive_failures = consecutive_failures;
                        status.last_outcome = Some(SyncOutcome::Retry);
                        status.last_duration_ms = Some(duration_ms);
                        status.last_finished_at = Some(finished_at);
                        status.next_retry_at = Some(next_retry_at);
                    });
                    tokio::time::sleep(delay).await;
                    self.requests.notify_one();
                }
            }
        }
        info!("[SyncScheduler] Queue '{}' stopped", SYNC_QUEUE_KEY);
    }

    /// Returns `false` once the connectivity sender is gone.
    async fn wait_until_online(&mut self) -> bool {
        loop {
            if *self.connectivity.borrow_and_update() {
                return true;
            }
            debug!("[SyncScheduler] Offline; holding queued pass until connectivity returns");
            if self.connectivity.changed().await.is_err() {
                warn!("[SyncScheduler] Connectivity signal closed; dropping the queued pass");
                return false;
            }
        }
    }
}
