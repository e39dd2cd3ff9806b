//! Top-level sync engine: lifecycle, ordered passes, watermarks, status.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use tokio::sync::watch;
use uuid::Uuid;

use hearth_core::clock::Clock;
use hearth_core::errors::{user_facing_message, Error, Result, RetryClass};
use hearth_core::meta::SyncState;
use hearth_core::remote::{
    settings_keys, AuthSession, CompatRpc, ObjectStorage, Persistence, RealtimeTransport,
    SettingsStore, TableApi,
};
use hearth_core::retry::{self, AUTO_RECOVERY_COOLDOWN_SECS, MAX_RETRIES};
use hearth_core::store::Store;
use hearth_core::tables::{Table, CORE_TABLES};

use crate::breaker::{BreakerPhase, CircuitBreaker};
use crate::compat::AppCompatGate;
use crate::handlers::activities::ActivitySync;
use crate::handlers::assignees::{
    sync_up_activity_assignees, sync_up_task_assignees, ActivityAssigneeSync, TaskAssigneeSync,
};
use crate::handlers::listings::ListingSync;
use crate::handlers::notes::{sync_up_notes, NoteSync};
use crate::handlers::properties::PropertySync;
use crate::handlers::reference::{
    sync_down_activity_templates, ActivityTemplateSync, ListingTypeSync,
};
use crate::handlers::tasks::TaskSync;
use crate::handlers::users::{sync_up_users, UserSync};
use crate::handlers::{dispatch, sync_down, sync_up, PushOutcome, SyncCx};
use crate::queue::CoalescingQueue;
use crate::realtime::channel::ChannelManager;
use crate::reconcile::{
    orphan_sweep, reconcile_legacy_local_users, reconcile_missing_core, reconcile_relationships,
};
use crate::resolver::ConflictResolver;
use crate::status::{ConnectionState, SyncActivity};

/// Skew allowance when comparing locally- and remotely-stamped timestamps.
const CLOCK_SKEW_BUFFER_SECS: i64 = 2;
/// Window in which relationship-induced listing drift is repaired by the
/// finalize pass rather than treated as a user edit.
const LISTING_FINALIZE_WINDOW_SECS: i64 = 30;
/// Quiescence budget enforced on shutdown in test mode.
const TEST_SHUTDOWN_TIMEOUT: StdDuration = StdDuration::from_secs(2);

/// Execution mode, captured at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineMode {
    /// Real network, real timers, durable settings.
    Live,
    /// No network, no timers, no persistence.
    Preview,
    /// Deterministic: delays computed but never awaited, in-memory only.
    Test,
}

impl EngineMode {
    pub fn is_live(&self) -> bool {
        matches!(self, EngineMode::Live)
    }

    pub fn is_test(&self) -> bool {
        matches!(self, EngineMode::Test)
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub platform: String,
    pub client_version: String,
    pub mode: EngineMode,
}

/// Everything the engine talks to, injected at construction.
pub struct Collaborators {
    pub remote: Arc<dyn TableApi>,
    pub storage: Arc<dyn ObjectStorage>,
    pub realtime: Arc<dyn RealtimeTransport>,
    pub compat: Arc<dyn CompatRpc>,
    pub settings: Arc<dyn SettingsStore>,
    pub auth: Arc<dyn AuthSession>,
    pub persistence: Arc<dyn Persistence>,
    pub clock: Arc<dyn Clock>,
}

/// Accumulated outcome of one sync run.
#[derive(Debug, Default)]
struct RunReport {
    first_error: Option<String>,
    down_failed: bool,
    transport_failure: bool,
    downloaded: usize,
    pushed: usize,
    failed_rows: usize,
}

impl RunReport {
    fn record_down(&mut self, result: Result<usize>, table: Option<Table>) {
        match result {
            Ok(applied) => self.downloaded += applied,
            Err(err) => {
                warn!("[Sync] syncDown step failed: {}", err);
                self.down_failed = true;
                if err.retry_class() == RetryClass::Retryable {
                    self.transport_failure = true;
                }
                if self.first_error.is_none() {
                    self.first_error = Some(match table {
                        Some(table) => user_facing_message(&err, table),
                        None => format!("Sync failed: {}", err),
                    });
                }
            }
        }
    }

    fn record_push(&mut self, outcome: PushOutcome, table: Table) {
        self.pushed += outcome.pushed;
        self.failed_rows += outcome.failed;
        if let Some(err) = outcome.transport_error {
            self.transport_failure = true;
            if self.first_error.is_none() {
                self.first_error = Some(user_facing_message(&err, table));
            }
        } else if outcome.failed > 0 && self.first_error.is_none() {
            self.first_error = Some(format!(
                "Sync failed: {} {} row(s) could not be pushed",
                outcome.failed, table
            ));
        }
    }
}

/// The process-wide sync engine. Construct once and thread through the app;
/// collaborators (clock, store, transports) are injected so unit tests stay
/// deterministic.
pub struct SyncEngine {
    mode: EngineMode,
    store: Arc<Store>,
    cx: SyncCx,
    storage: Arc<dyn ObjectStorage>,
    settings: Arc<dyn SettingsStore>,
    auth: Arc<dyn AuthSession>,
    persistence: Arc<dyn Persistence>,
    compat: AppCompatGate,
    breaker: CircuitBreaker,
    channel: Arc<ChannelManager>,
    queue: CoalescingQueue,
    run_id: AtomicU64,
    syncing: AtomicBool,
    requested_during_sync: AtomicBool,
    activity_tx: watch::Sender<SyncActivity>,
    last_error: StdMutex<Option<String>>,
    last_success: StdMutex<Option<DateTime<Utc>>>,
}

impl SyncEngine {
    pub fn new(config: EngineConfig, store: Arc<Store>, collab: Collaborators) -> Arc<Self> {
        let resolver = Arc::new(ConflictResolver::new());
        let cx = SyncCx {
            store: Arc::clone(&store),
            remote: Arc::clone(&collab.remote),
            resolver,
            clock: Arc::clone(&collab.clock),
        };
        let channel = Arc::new(ChannelManager::new(
            Arc::clone(&collab.realtime),
            cx.clone(),
            Arc::clone(&collab.auth),
            config.mode.is_test(),
        ));
        let (activity_tx, _) = watch::channel(SyncActivity::Idle);

        Arc::new(Self {
            mode: config.mode,
            store,
            cx,
            storage: collab.storage,
            settings: collab.settings,
            auth: collab.auth,
            persistence: collab.persistence,
            compat: AppCompatGate::new(collab.compat, &config.platform, &config.client_version),
            breaker: CircuitBreaker::new(),
            channel,
            queue: CoalescingQueue::new(),
            run_id: AtomicU64::new(0),
            syncing: AtomicBool::new(false),
            requested_during_sync: AtomicBool::new(false),
            activity_tx,
            last_error: StdMutex::new(None),
            last_success: StdMutex::new(None),
        })
    }

    // ─────────────────────────────────────────────────────────────────────
    // Status surface
    // ─────────────────────────────────────────────────────────────────────

    pub fn activity(&self) -> watch::Receiver<SyncActivity> {
        self.activity_tx.subscribe()
    }

    pub fn connection(&self) -> watch::Receiver<ConnectionState> {
        self.channel.connection()
    }

    pub fn breaker_phases(&self) -> watch::Receiver<BreakerPhase> {
        self.breaker.phase_changes()
    }

    pub fn last_sync_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_successful_sync(&self) -> Option<DateTime<Utc>> {
        *self
            .last_success
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn last_run_id(&self) -> u64 {
        self.run_id.load(Ordering::SeqCst)
    }

    fn set_activity(&self, activity: SyncActivity) {
        self.activity_tx.send_replace(activity);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Request coalescing
    // ─────────────────────────────────────────────────────────────────────

    /// Ask for a sync. Any number of callers may request concurrently; at
    /// most one run executes at a time and the last request always runs.
    pub fn request_sync(self: &Arc<Self>) {
        if matches!(self.mode, EngineMode::Preview) {
            return;
        }
        if self.queue.request() {
            let engine = Arc::clone(self);
            let handle = tokio::spawn(async move {
                loop {
                    while engine.queue.try_begin() {
                        engine.sync().await;
                    }
                    if !engine.queue.finish() {
                        break;
                    }
                }
            });
            self.queue.store_loop_task(handle);
        }
    }

    /// Run a full sync now. A call arriving while a run is active flags the
    /// running call to loop once more instead of interleaving.
    pub async fn sync(&self) {
        if self.queue.is_cancelled() {
            return;
        }
        if self.syncing.swap(true, Ordering::SeqCst) {
            self.requested_during_sync.store(true, Ordering::SeqCst);
            return;
        }
        loop {
            self.sync_pass().await;
            if !self.requested_during_sync.swap(false, Ordering::SeqCst) {
                break;
            }
        }
        self.syncing.store(false, Ordering::SeqCst);
    }

    // ─────────────────────────────────────────────────────────────────────
    // The sync pass
    // ─────────────────────────────────────────────────────────────────────

    async fn sync_pass(&self) {
        let run_id = self.run_id.fetch_add(1, Ordering::SeqCst) + 1;
        if matches!(self.mode, EngineMode::Preview) {
            debug!("[Sync] Run {} skipped in preview mode", run_id);
            return;
        }

        let Some(user_id) = self.auth.current_user_id() else {
            debug!("[Sync] Run {}: no signed-in user; idle", run_id);
            self.set_activity(SyncActivity::Idle);
            return;
        };

        let now = self.cx.clock.now();
        if !self.breaker.should_allow_sync(now) {
            debug!("[Sync] Run {}: circuit breaker open", run_id);
            self.set_activity(SyncActivity::Blocked {
                message: "Sync paused after repeated failures".to_string(),
            });
            return;
        }
        if !self.compat.can_proceed(now).await {
            self.set_activity(SyncActivity::Blocked {
                message: "App update required before sync can continue".to_string(),
            });
            return;
        }

        info!("[Sync] Run {} started", run_id);
        self.set_activity(SyncActivity::Syncing);
        let mut report = RunReport::default();

        let pass_started_at = self.cx.clock.now();
        let last_sync_time = self.get_time_setting(settings_keys::LAST_SYNC_TIME);
        let first_sync = last_sync_time.is_none();
        let global_since = last_sync_time
            .map(|t| t - Duration::seconds(1))
            .unwrap_or(DateTime::UNIX_EPOCH);

        self.sync_down_all(global_since, pass_started_at, first_sync, &mut report)
            .await;
        self.sync_up_all(user_id, &mut report).await;

        let finished_at = self.cx.clock.now();
        if !report.down_failed {
            self.set_time_setting(settings_keys::LAST_SYNC_TIME, finished_at);
        }

        if report.transport_failure {
            self.breaker.record_failure(finished_at);
        } else if report.first_error.is_none() {
            self.breaker.record_success();
        }

        match report.first_error {
            None => {
                *self
                    .last_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = None;
                *self
                    .last_success
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(finished_at);
                self.set_activity(SyncActivity::Synced { at: finished_at });
                info!(
                    "[Sync] Run {} finished: {} down, {} pushed",
                    run_id, report.downloaded, report.pushed
                );
            }
            Some(message) => {
                warn!("[Sync] Run {} finished with errors: {}", run_id, message);
                *self
                    .last_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(message.clone());
                self.set_activity(SyncActivity::Failed { message });
            }
        }

        // one store commit per run
        if self.mode.is_live() {
            if let Err(err) = self.persistence.commit(&self.store) {
                warn!("[Sync] Store commit failed: {}", err);
            }
        }
    }

    async fn sync_down_all(
        &self,
        global_since: DateTime<Utc>,
        pass_started_at: DateTime<Utc>,
        first_sync: bool,
        report: &mut RunReport,
    ) {
        let cx = &self.cx;

        let types_since =
            self.table_since(settings_keys::LAST_SYNC_LISTING_TYPES, global_since);
        let result = sync_down::<ListingTypeSync>(cx, types_since).await;
        if result.is_ok() {
            self.set_time_setting(settings_keys::LAST_SYNC_LISTING_TYPES, pass_started_at);
        }
        report.record_down(result, Some(Table::ListingTypes));

        let templates_since =
            self.table_since(settings_keys::LAST_SYNC_ACTIVITY_TEMPLATES, global_since);
        let result = sync_down_activity_templates(cx, templates_since).await;
        if result.is_ok() {
            self.set_time_setting(settings_keys::LAST_SYNC_ACTIVITY_TEMPLATES, pass_started_at);
        }
        report.record_down(result, Some(Table::ActivityTemplates));

        report.record_down(sync_down::<UserSync>(cx, global_since).await, Some(Table::Users));
        report.record_down(
            sync_down::<PropertySync>(cx, global_since).await,
            Some(Table::Properties),
        );
        report.record_down(
            sync_down::<ListingSync>(cx, global_since).await,
            Some(Table::Listings),
        );
        report.record_down(sync_down::<TaskSync>(cx, global_since).await, Some(Table::Tasks));
        report.record_down(
            sync_down::<ActivitySync>(cx, global_since).await,
            Some(Table::Activities),
        );
        report.record_down(
            sync_down::<TaskAssigneeSync>(cx, global_since).await,
            Some(Table::TaskAssignees),
        );
        report.record_down(
            sync_down::<ActivityAssigneeSync>(cx, global_since).await,
            Some(Table::ActivityAssignees),
        );

        let notes_since = self.table_since(settings_keys::LAST_SYNC_NOTES, global_since);
        let result = sync_down::<NoteSync>(cx, notes_since).await;
        if result.is_ok() {
            self.set_time_setting(settings_keys::LAST_SYNC_NOTES, pass_started_at);
        }
        report.record_down(result, Some(Table::Notes));

        report.record_down(reconcile_missing_core(cx).await, None);
        reconcile_relationships(cx);

        if first_sync {
            report.record_down(orphan_sweep(cx).await.map(|_| 0), None);
        }
    }

    async fn sync_up_all(&self, user_id: Uuid, report: &mut RunReport) {
        let cx = &self.cx;

        if self.settings.get(settings_keys::LEGACY_USERS_MIGRATED).as_deref() != Some("true") {
            reconcile_legacy_local_users(cx);
            self.settings.set(settings_keys::LEGACY_USERS_MIGRATED, "true");
        }

        let is_admin = cx
            .store
            .users
            .get(user_id)
            .map(|user| user.is_admin())
            .unwrap_or(false);
        if is_admin {
            report.record_push(sync_up::<ListingTypeSync>(cx).await, Table::ListingTypes);
            report.record_push(
                sync_up::<ActivityTemplateSync>(cx).await,
                Table::ActivityTemplates,
            );
        }

        // capture before the parent push flips them to synced
        let captured_tasks: BTreeSet<Uuid> =
            cx.store.tasks.dirty().iter().map(|row| row.id).collect();
        let captured_activities: BTreeSet<Uuid> = cx
            .store
            .activities
            .dirty()
            .iter()
            .map(|row| row.id)
            .collect();

        report.record_push(sync_up_users(cx, &self.storage).await, Table::Users);
        report.record_push(sync_up::<PropertySync>(cx).await, Table::Properties);
        report.record_push(sync_up::<ListingSync>(cx).await, Table::Listings);
        report.record_push(sync_up::<TaskSync>(cx).await, Table::Tasks);
        report.record_push(sync_up::<ActivitySync>(cx).await, Table::Activities);
        report.record_push(
            sync_up_task_assignees(cx, &captured_tasks).await,
            Table::TaskAssignees,
        );
        report.record_push(
            sync_up_activity_assignees(cx, &captured_activities).await,
            Table::ActivityAssignees,
        );
        report.record_push(sync_up_notes(cx).await, Table::Notes);

        self.finalize(&captured_tasks, &captured_activities);
    }

    /// Re-assert `synced` on rows whose dirty bit was flipped by
    /// relationship-only mutations during this run. Idempotent.
    fn finalize(&self, captured_tasks: &BTreeSet<Uuid>, captured_activities: &BTreeSet<Uuid>) {
        for id in captured_tasks {
            self.store.tasks.update(*id, |task| {
                if task.meta.state == SyncState::Pending {
                    task.meta.state = SyncState::Synced;
                }
            });
        }
        for id in captured_activities {
            self.store.activities.update(*id, |activity| {
                if activity.meta.state == SyncState::Pending {
                    activity.meta.state = SyncState::Synced;
                }
            });
        }

        let now = self.cx.clock.now();
        for listing in self.store.listings.all() {
            if listing.meta.state != SyncState::Pending {
                continue;
            }
            let Some(synced_at) = listing.meta.synced_at else {
                continue;
            };
            let drifted_recently =
                (now - synced_at).num_seconds() <= LISTING_FINALIZE_WINDOW_SECS;
            let edited_locally = listing.meta.updated_at
                > synced_at + Duration::seconds(CLOCK_SKEW_BUFFER_SECS);
            if drifted_recently && !edited_locally {
                self.store.listings.update(listing.id, |row| {
                    row.meta.state = SyncState::Synced;
                });
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Row-level retry & auto-recovery
    // ─────────────────────────────────────────────────────────────────────

    /// Manually retry one failed row. Refuses once the attempt cap is hit.
    pub async fn retry_row(self: &Arc<Self>, table: Table, id: Uuid) -> Result<()> {
        let meta = dispatch::get_meta(&self.store, table, id)
            .ok_or_else(|| Error::internal(format!("No local {} row {}", table, id)))?;
        if !retry::can_retry(meta.retry_count) {
            return Err(Error::internal(format!(
                "Row {} has exhausted its {} retry attempts",
                id, MAX_RETRIES
            )));
        }

        let delay = retry::delay(meta.retry_count.max(0) as u32);
        if !self.mode.is_test() {
            tokio::time::sleep(delay).await;
        }

        dispatch::update_meta(&self.store, table, id, |meta| {
            meta.retry_count += 1;
            meta.state = SyncState::Pending;
        });
        self.request_sync();
        Ok(())
    }

    /// Re-queue permanently failed rows whose auto-recovery cooldown elapsed.
    pub fn recover_failed_rows(self: &Arc<Self>) -> usize {
        let now = self.cx.clock.now();
        let mut recovered = 0usize;
        for table in CORE_TABLES {
            for (id, meta) in dispatch::all_metas(&self.store, table) {
                if meta.state != SyncState::Failed || meta.retry_count < MAX_RETRIES {
                    continue;
                }
                let eligible = meta
                    .last_reset_attempt
                    .map(|at| (now - at).num_seconds() > AUTO_RECOVERY_COOLDOWN_SECS)
                    .unwrap_or(true);
                if eligible {
                    dispatch::update_meta(&self.store, table, id, |meta| {
                        meta.retry_count = 0;
                        meta.state = SyncState::Pending;
                        meta.last_reset_attempt = Some(now);
                    });
                    recovered += 1;
                }
            }
        }
        if recovered > 0 {
            info!("[Sync] Auto-recovery re-queued {} rows", recovered);
            self.request_sync();
        }
        recovered
    }

    // ─────────────────────────────────────────────────────────────────────
    // Realtime lifecycle
    // ─────────────────────────────────────────────────────────────────────

    pub async fn start_listening(&self) {
        if matches!(self.mode, EngineMode::Preview) {
            return;
        }
        self.channel.start_listening().await;
    }

    pub async fn stop_listening(&self) {
        self.channel.stop_listening().await;
    }

    pub async fn reset_and_reconnect(&self) {
        if matches!(self.mode, EngineMode::Preview) {
            return;
        }
        self.channel.reset_and_reconnect().await;
    }

    pub fn is_listening(&self) -> bool {
        self.channel.is_listening()
    }

    // ─────────────────────────────────────────────────────────────────────
    // Shutdown
    // ─────────────────────────────────────────────────────────────────────

    /// Strict ordering: stop listening, cancel the loop, await quiescence.
    pub async fn shutdown(&self) {
        self.channel.stop_listening().await;
        self.queue.cancel();
        if let Some(handle) = self.queue.take_loop_task() {
            if self.mode.is_test() {
                if tokio::time::timeout(TEST_SHUTDOWN_TIMEOUT, handle).await.is_err() {
                    log::error!("[Sync] Sync loop failed to quiesce within shutdown budget");
                    debug_assert!(false, "sync loop failed to quiesce within 2 s");
                }
            } else {
                let _ = handle.await;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Settings helpers
    // ─────────────────────────────────────────────────────────────────────

    fn get_time_setting(&self, key: &str) -> Option<DateTime<Utc>> {
        let raw = self.settings.get(key)?;
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(err) => {
                warn!("[Sync] Ignoring malformed setting {}={}: {}", key, raw, err);
                None
            }
        }
    }

    fn set_time_setting(&self, key: &str, value: DateTime<Utc>) {
        self.settings.set(key, &value.to_rfc3339());
    }

    /// Per-table watermark with the 2-second skew buffer, falling back to the
    /// global since.
    fn table_since(&self, key: &str, global_since: DateTime<Utc>) -> DateTime<Utc> {
        self.get_time_setting(key)
            .map(|t| t - Duration::seconds(CLOCK_SKEW_BUFFER_SECS))
            .unwrap_or(global_since)
    }
}
