//! In-memory stand-ins for the storage and gateway ports, shared by the
//! service and sync tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::watch;

use crate::errors::Result;
use crate::expenses::{Expense, ExpenseRepositoryTrait, NewExpense, NewSyncedExpense, SyncState};
use crate::gateway::{
    CreateExpenseAck, CreateExpenseRequest, GatewayError, GatewayResult, RemoteExpense,
    RemoteGateway, RemoteUserProfile,
};
use crate::users::{default_budget_limit, user_id_from_email, UserProfile, UserRepositoryTrait};

fn newest_first(rows: &[Expense]) -> Vec<Expense> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| (b.timestamp_ms, b.local_id).cmp(&(a.timestamp_ms, a.local_id)));
    sorted
}

struct ExpenseTable {
    rows: Vec<Expense>,
    next_id: i64,
}

/// Expense repository backed by a `Vec`, with the same ordering and watch
/// semantics as the SQLite implementation.
pub(crate) struct MemoryExpenseRepository {
    table: Mutex<ExpenseTable>,
    events: watch::Sender<Vec<Expense>>,
    pending_reads: AtomicUsize,
}

impl MemoryExpenseRepository {
    pub(crate) fn new() -> Self {
        let (events, _) = watch::channel(Vec::new());
        Self {
            table: Mutex::new(ExpenseTable {
                rows: Vec::new(),
                next_id: 1,
            }),
            events,
            pending_reads: AtomicUsize::new(0),
        }
    }

    pub(crate) fn seed_pending(
        &self,
        amount: Decimal,
        category: &str,
        description: &str,
        timestamp_ms: i64,
    ) -> Expense {
        self.seed_pending_with_attempts(amount, category, description, timestamp_ms, 0)
    }

    pub(crate) fn seed_pending_with_attempts(
        &self,
        amount: Decimal,
        category: &str,
        description: &str,
        timestamp_ms: i64,
        sync_attempts: i32,
    ) -> Expense {
        let expense = {
            let mut table = self.table.lock().unwrap();
            let local_id = table.next_id;
            table.next_id += 1;
            let expense = Expense {
                local_id,
                remote_id: None,
                amount,
                category: category.to_string(),
                description: description.to_string(),
                timestamp_ms,
                sync_state: SyncState::Pending,
                sync_attempts,
                last_sync_error: None,
            };
            table.rows.push(expense.clone());
            expense
        };
        self.publish();
        expense
    }

    pub(crate) fn seed_synced(
        &self,
        remote_id: &str,
        amount: Decimal,
        category: &str,
        description: &str,
        timestamp_ms: i64,
    ) -> Expense {
        let expense = {
            let mut table = self.table.lock().unwrap();
            let local_id = table.next_id;
            table.next_id += 1;
            let expense = Expense {
                local_id,
                remote_id: Some(remote_id.to_string()),
                amount,
                category: category.to_string(),
                description: description.to_string(),
                timestamp_ms,
                sync_state: SyncState::Synced,
                sync_attempts: 0,
                last_sync_error: None,
            };
            table.rows.push(expense.clone());
            expense
        };
        self.publish();
        expense
    }

    /// Number of times the worker asked for the pending batch; one read per
    /// pass, so this counts passes.
    pub(crate) fn pending_read_count(&self) -> usize {
        self.pending_reads.load(Ordering::SeqCst)
    }

    fn publish(&self) {
        let rows = newest_first(&self.table.lock().unwrap().rows);
        self.events.send_replace(rows);
    }
}

#[async_trait]
impl ExpenseRepositoryTrait for MemoryExpenseRepository {
    async fn insert_pending_expense(&self, new_expense: NewExpense) -> Result<Expense> {
        Ok(self.seed_pending(
            new_expense.amount,
            &new_expense.category,
            &new_expense.description,
            new_expense.timestamp_ms,
        ))
    }

    async fn replace_synced_expenses(&self, rows: Vec<NewSyncedExpense>) -> Result<usize> {
        let removed = {
            let mut table = self.table.lock().unwrap();
            let before = table.rows.len();
            table.rows.retain(|e| e.sync_state != SyncState::Synced);
            let removed = before - table.rows.len();
            for row in rows {
                let local_id = table.next_id;
                table.next_id += 1;
                table.rows.push(Expense {
                    local_id,
                    remote_id: Some(row.remote_id),
                    amount: row.amount,
                    category: row.category,
                    description: row.description,
                    timestamp_ms: row.timestamp_ms,
                    sync_state: SyncState::Synced,
                    sync_attempts: 0,
                    last_sync_error: None,
                });
            }
            removed
        };
        self.publish();
        Ok(removed)
    }

    fn get_all_expenses(&self) -> Result<Vec<Expense>> {
        Ok(newest_first(&self.table.lock().unwrap().rows))
    }

    fn get_pending_expenses(&self, attempt_ceiling: Option<i32>) -> Result<Vec<Expense>> {
        self.pending_reads.fetch_add(1, Ordering::SeqCst);
        let mut pending: Vec<Expense> = self
            .table
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|e| e.is_pending())
            .filter(|e| attempt_ceiling.map_or(true, |limit| e.sync_attempts < limit))
            .cloned()
            .collect();
        pending.sort_by_key(|e| (e.timestamp_ms, e.local_id));
        Ok(pending)
    }

    fn get_dead_lettered_expenses(&self, attempt_ceiling: i32) -> Result<Vec<Expense>> {
        let mut rows: Vec<Expense> = self
            .table
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|e| e.is_pending() && e.sync_attempts >= attempt_ceiling)
            .cloned()
            .collect();
        rows.sort_by_key(|e| (e.timestamp_ms, e.local_id));
        Ok(rows)
    }

    async fn mark_synced(&self, local_id: i64, remote_id: &str) -> Result<bool> {
        let marked = {
            let mut table = self.table.lock().unwrap();
            match table
                .rows
                .iter_mut()
                .find(|e| e.local_id == local_id && e.is_pending())
            {
                Some(row) => {
                    row.sync_state = SyncState::Synced;
                    row.remote_id = Some(remote_id.to_string());
                    row.last_sync_error = None;
                    true
                }
                None => false,
            }
        };
        if marked {
            self.publish();
        }
        Ok(marked)
    }

    async fn mark_sync_failed(&self, local_id: i64, error: &str) -> Result<()> {
        {
            let mut table = self.table.lock().unwrap();
            if let Some(row) = table
                .rows
                .iter_mut()
                .find(|e| e.local_id == local_id && e.is_pending())
            {
                row.sync_attempts += 1;
                row.last_sync_error = Some(error.to_string());
            }
        }
        self.publish();
        Ok(())
    }

    async fn delete_synced_expenses(&self) -> Result<usize> {
        let removed = {
            let mut table = self.table.lock().unwrap();
            let before = table.rows.len();
            table.rows.retain(|e| e.sync_state != SyncState::Synced);
            before - table.rows.len()
        };
        self.publish();
        Ok(removed)
    }

    async fn delete_all_expenses(&self) -> Result<usize> {
        let removed = {
            let mut table = self.table.lock().unwrap();
            let removed = table.rows.len();
            table.rows.clear();
            removed
        };
        self.publish();
        Ok(removed)
    }

    fn sum_by_category(&self, category: &str) -> Result<Decimal> {
        Ok(self
            .table
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|e| e.category == category)
            .map(|e| e.amount)
            .sum())
    }

    fn get_expenses_in_range(&self, start_ms: i64, end_ms: i64) -> Result<Vec<Expense>> {
        let rows: Vec<Expense> = self
            .table
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|e| e.timestamp_ms >= start_ms && e.timestamp_ms <= end_ms)
            .cloned()
            .collect();
        Ok(newest_first(&rows))
    }

    fn subscribe_expenses(&self) -> watch::Receiver<Vec<Expense>> {
        self.events.subscribe()
    }
}

/// Single-row user repository backed by an `Option`.
pub(crate) struct MemoryUserRepository {
    user: Mutex<Option<UserProfile>>,
    events: watch::Sender<Option<UserProfile>>,
}

impl MemoryUserRepository {
    pub(crate) fn new() -> Self {
        let (events, _) = watch::channel(None);
        Self {
            user: Mutex::new(None),
            events,
        }
    }

    pub(crate) fn seed_signed_in(&self, email: &str) -> UserProfile {
        let profile = UserProfile {
            id: user_id_from_email(email),
            email: email.to_string(),
            display_name: "Test User".to_string(),
            experience_points: 0,
            budget_limit: default_budget_limit(),
            profile_picture: None,
        };
        *self.user.lock().unwrap() = Some(profile.clone());
        self.events.send_replace(Some(profile.clone()));
        profile
    }
}

#[async_trait]
impl UserRepositoryTrait for MemoryUserRepository {
    async fn upsert_user(&self, user: UserProfile) -> Result<UserProfile> {
        *self.user.lock().unwrap() = Some(user.clone());
        self.events.send_replace(Some(user.clone()));
        Ok(user)
    }

    fn get_user(&self) -> Result<Option<UserProfile>> {
        Ok(self.user.lock().unwrap().clone())
    }

    async fn delete_all_users(&self) -> Result<usize> {
        let removed = {
            let mut user = self.user.lock().unwrap();
            let removed = usize::from(user.is_some());
            *user = None;
            removed
        };
        self.events.send_replace(None);
        Ok(removed)
    }

    fn subscribe_user(&self) -> watch::Receiver<Option<UserProfile>> {
        self.events.subscribe()
    }
}

#[derive(Default)]
struct GatewayScript {
    create_requests: Vec<CreateExpenseRequest>,
    next_remote_id: u64,
    fail_titles: HashSet<String>,
    ack_without_id_titles: HashSet<String>,
    fail_create: Option<(u16, String)>,
    create_delay: Option<Duration>,
    remote_expenses: Vec<RemoteExpense>,
    fail_list: Option<(u16, String)>,
    user_profile: Option<RemoteUserProfile>,
    fail_profile: Option<(u16, String)>,
}

/// Scriptable gateway double. By default every call succeeds; individual
/// operations can be told to fail, stall or misbehave.
pub(crate) struct ScriptedGateway {
    script: Mutex<GatewayScript>,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self {
            script: Mutex::new(GatewayScript::default()),
        }
    }

    /// Every create request whose title matches fails with a 500.
    pub(crate) fn fail_title(&self, title: &str) {
        self.script
            .lock()
            .unwrap()
            .fail_titles
            .insert(title.to_string());
    }

    /// Create requests whose title matches are acknowledged without an id.
    pub(crate) fn ack_without_id_for(&self, title: &str) {
        self.script
            .lock()
            .unwrap()
            .ack_without_id_titles
            .insert(title.to_string());
    }

    /// Every create request fails until `clear_create_failure`.
    pub(crate) fn fail_create_expense(&self, status: u16, message: &str) {
        self.script.lock().unwrap().fail_create = Some((status, message.to_string()));
    }

    pub(crate) fn clear_create_failure(&self) {
        self.script.lock().unwrap().fail_create = None;
    }

    /// Stalls every create request, keeping a sync pass in flight.
    pub(crate) fn set_create_delay(&self, delay: Duration) {
        self.script.lock().unwrap().create_delay = Some(delay);
    }

    /// Scripts `count` remote expenses dated consecutively from 2026-01-01.
    pub(crate) fn script_remote_expenses(&self, count: usize) {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).expect("valid date");
        let rows = (0..count)
            .map(|i| RemoteExpense {
                id: format!("r-{}", i + 1),
                title: format!("Remote expense {}", i + 1),
                amount: Decimal::from(i as i64 + 1),
                category: "Imported".to_string(),
                date: (start + chrono::Duration::days(i as i64)).to_string(),
            })
            .collect();
        self.script.lock().unwrap().remote_expenses = rows;
    }

    pub(crate) fn fail_list_expenses(&self, status: u16, message: &str) {
        self.script.lock().unwrap().fail_list = Some((status, message.to_string()));
    }

    pub(crate) fn script_user_profile(&self, profile: RemoteUserProfile) {
        self.script.lock().unwrap().user_profile = Some(profile);
    }

    pub(crate) fn fail_user_profile(&self, status: u16, message: &str) {
        self.script.lock().unwrap().fail_profile = Some((status, message.to_string()));
    }

    /// Uploads received so far, in call order.
    pub(crate) fn create_requests(&self) -> Vec<CreateExpenseRequest> {
        self.script.lock().unwrap().create_requests.clone()
    }
}

#[async_trait]
impl RemoteGateway for ScriptedGateway {
    async fn create_expense(
        &self,
        request: &CreateExpenseRequest,
    ) -> GatewayResult<CreateExpenseAck> {
        let (delay, response) = {
            let mut script = self.script.lock().unwrap();
            script.create_requests.push(request.clone());
            let response = if let Some((status, message)) = script.fail_create.clone() {
                Err(GatewayError::api(status, message))
            } else if script.fail_titles.contains(&request.title) {
                Err(GatewayError::api(
                    500,
                    format!("injected failure for '{}'", request.title),
                ))
            } else if script.ack_without_id_titles.contains(&request.title) {
                Ok(CreateExpenseAck {
                    message: "expense recorded".to_string(),
                    id: None,
                })
            } else {
                script.next_remote_id += 1;
                Ok(CreateExpenseAck {
                    message: "expense recorded".to_string(),
                    id: Some(format!("srv-{}", script.next_remote_id)),
                })
            };
            (script.create_delay, response)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }

    async fn list_expenses(
        &self,
        _account: &str,
        _since: NaiveDate,
    ) -> GatewayResult<Vec<RemoteExpense>> {
        let script = self.script.lock().unwrap();
        if let Some((status, message)) = script.fail_list.clone() {
            return Err(GatewayError::api(status, message));
        }
        Ok(script.remote_expenses.clone())
    }

    async fn get_user_profile(&self, _account: &str) -> GatewayResult<RemoteUserProfile> {
        let script = self.script.lock().unwrap();
        if let Some((status, message)) = script.fail_profile.clone() {
            return Err(GatewayError::api(status, message));
        }
        Ok(script
            .user_profile
            .clone()
            .unwrap_or_else(|| RemoteUserProfile {
                display_name: "Remote User".to_string(),
                experience_points: 0,
                budget_limit: None,
                profile_picture: None,
            }))
    }
}
