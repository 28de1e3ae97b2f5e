//! Outbox drain: uploads pending expenses to the remote service.

use std::sync::Arc;

use chrono::DateTime;
use log::{debug, error, info, warn};

use crate::errors::Result;
use crate::expenses::ExpenseRepositoryTrait;
use crate::gateway::{CreateExpenseRequest, GatewayError, RemoteGateway};
use crate::sync::{SyncOutcome, SyncPolicy, SyncRunReport};
use crate::users::UserRepositoryTrait;

/// Uploads pending rows one at a time, in ascending timestamp order.
///
/// Sequential on purpose: upload order stays deterministic and a burst of
/// offline writes cannot fan out into parallel calls against the remote. A
/// failing row is recorded and skipped past; it never blocks the rest of the
/// batch.
pub struct SyncWorker {
    expense_repository: Arc<dyn ExpenseRepositoryTrait>,
    user_repository: Arc<dyn UserRepositoryTrait>,
    gateway: Arc<dyn RemoteGateway>,
    policy: SyncPolicy,
}

impl SyncWorker {
    pub fn new(
        expense_repository: Arc<dyn ExpenseRepositoryTrait>,
        user_repository: Arc<dyn UserRepositoryTrait>,
        gateway: Arc<dyn RemoteGateway>,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            expense_repository,
            user_repository,
            gateway,
            policy,
        }
    }

    /// Runs one pass over the outbox.
    ///
    /// Returns `Success` when nothing was pending or every row uploaded;
    /// `Retry` when at least one row failed and stays pending. Store-level
    /// failures while reading the batch surface as errors.
    pub async fn run_once(&self) -> Result<SyncRunReport> {
        let ceiling = self.policy.attempt_ceiling();
        let pending = self.expense_repository.get_pending_expenses(ceiling)?;

        let dead_lettered = match ceiling {
            Some(limit) => self
                .expense_repository
                .get_dead_lettered_expenses(limit)?
                .len(),
            None => 0,
        };
        if dead_lettered > 0 {
            warn!(
                "[SyncWorker] {} row(s) reached the attempt ceiling and are excluded from upload",
                dead_lettered
            );
        }

        if pending.is_empty() {
            debug!("[SyncWorker] Outbox empty; nothing to upload");
            return Ok(SyncRunReport {
                dead_lettered,
                ..SyncRunReport::empty()
            });
        }

        let user = match self.user_repository.get_user()? {
            Some(user) => user,
            None => {
                // Logout raced the pass; without an account there is nobody
                // to attribute the rows to.
                info!(
                    "[SyncWorker] {} pending row(s) but no signed-in user; skipping pass",
                    pending.len()
                );
                return Ok(SyncRunReport {
                    dead_lettered,
                    ..SyncRunReport::empty()
                });
            }
        };

        let total = pending.len();
        let mut uploaded = 0usize;
        let mut failed = 0usize;

        for row in pending {
            let request = CreateExpenseRequest {
                title: row.description.clone(),
                amount: row.amount,
                category: row.category.clone(),
                account: user.email.clone(),
                date: expense_date(row.timestamp_ms),
            };

            match self.gateway.create_expense(&request).await {
                Ok(ack) => match ack.id {
                    Some(remote_id) => {
                        match self
                            .expense_repository
                            .mark_synced(row.local_id, &remote_id)
                            .await
                        {
                            Ok(true) => {
                                debug!(
                                    "[SyncWorker] Expense {} synced as '{}'",
                                    row.local_id, remote_id
                                );
                                uploaded += 1;
                            }
                            Ok(false) => {
                                // Row vanished mid-pass (logout wipe); the
                                // acknowledgement has nothing to attach to.
                                info!(
                                    "[SyncWorker] Expense {} no longer pending; dropping acknowledgement",
                                    row.local_id
                                );
                            }
                            Err(e) => {
                                error!(
                                    "[SyncWorker] Failed to record synced state for expense {}: {}",
                                    row.local_id, e
                                );
                                failed += 1;
                            }
                        }
                    }
                    None => {
                        let err = GatewayError::contract(
                            "acknowledgement did not include an expense id",
                        );
                        warn!(
                            "[SyncWorker] Upload of expense {} acknowledged without an id ({}); leaving it pending",
                            row.local_id,
                            err.retry_class().as_str()
                        );
                        self.record_failure(row.local_id, &err.to_string()).await;
                        failed += 1;
                    }
                },
                Err(e) => {
                    warn!(
                        "[SyncWorker] Upload of expense {} failed ({}): {}",
                        row.local_id,
                        e.retry_class().as_str(),
                        e
                    );
                    self.record_failure(row.local_id, &e.to_string()).await;
                    failed += 1;
                }
            }
        }

        let outcome = if failed == 0 {
            SyncOutcome::Success
        } else {
            SyncOutcome::Retry
        };
        info!(
            "[SyncWorker] Pass complete: {}/{} uploaded, {} failed",
            uploaded, total, failed
        );

        Ok(SyncRunReport {
            outcome,
            uploaded,
            failed,
            dead_lettered,
        })
    }

    async fn record_failure(&self, local_id: i64, error: &str) {
        if let Err(store_err) = self
            .expense_repository
            .mark_sync_failed(local_id, error)
            .await
        {
            error!(
                "[SyncWorker] Failed to record upload failure for expense {}: {}",
                local_id, store_err
            );
        }
    }
}

/// Calendar date (UTC) for the upload payload; `None` for timestamps chrono
/// cannot represent.
fn expense_date(timestamp_ms: i64) -> Option<String> {
    DateTime::from_timestamp_millis(timestamp_ms).map(|dt| dt.date_naive().to_string())
}
