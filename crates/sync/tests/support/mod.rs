//! Shared in-memory fakes for engine scenario tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::channel::mpsc;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::oneshot;
use uuid::Uuid;

use hearth_core::clock::{Clock, ManualClock};
use hearth_core::errors::{Error, Result};
use hearth_core::meta::SyncMeta;
use hearth_core::model::{
    Listing, ListingStage, ListingStatus, Note, NoteParent, Task, TaskAssignee, User, UserRole,
    WorkStatus,
};
use hearth_core::remote::{
    AuthSession, ChannelStatus, ChannelStreams, CompatRpc, NoopPersistence, ObjectStorage,
    RealtimeChannel, RealtimeTransport, RowChange, SettingsStore, TableApi, UploadOptions,
    VersionCompatResponse,
};
use hearth_core::store::Store;
use hearth_core::tables::Table;

use hearth_sync::{Collaborators, EngineConfig, EngineMode, SyncEngine};

pub const BASE_TIME: &str = "2026-03-01T10:00:00Z";

pub fn base_time() -> DateTime<Utc> {
    BASE_TIME.parse().unwrap()
}

pub fn at_offset(secs: i64) -> DateTime<Utc> {
    base_time() + chrono::Duration::seconds(secs)
}

// ─────────────────────────────────────────────────────────────────────────────
// Remote table API fake
// ─────────────────────────────────────────────────────────────────────────────

pub struct UpsertGate {
    pub table: Table,
    pub entered: Option<oneshot::Sender<()>>,
    pub resume: Option<oneshot::Receiver<()>>,
}

#[derive(Default)]
pub struct MockRemote {
    tables: Mutex<BTreeMap<Table, BTreeMap<Uuid, Value>>>,
    pub select_calls: Mutex<Vec<(Table, DateTime<Utc>)>>,
    pub upsert_calls: Mutex<Vec<(Table, usize)>>,
    pub insert_calls: Mutex<Vec<Table>>,
    pub patch_calls: Mutex<Vec<(Table, Uuid, Value)>>,
    rejected: Mutex<HashSet<Uuid>>,
    offline: AtomicBool,
    gate: Mutex<Option<UpsertGate>>,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, table: Table, row: Value) {
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .expect("seed row needs an id");
        self.tables
            .lock()
            .unwrap()
            .entry(table)
            .or_default()
            .insert(id, row);
    }

    pub fn remove(&self, table: Table, id: Uuid) {
        if let Some(rows) = self.tables.lock().unwrap().get_mut(&table) {
            rows.remove(&id);
        }
    }

    pub fn row(&self, table: Table, id: Uuid) -> Option<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(&table)
            .and_then(|rows| rows.get(&id).cloned())
    }

    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(&table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn reject_id(&self, id: Uuid) {
        self.rejected.lock().unwrap().insert(id);
    }

    pub fn set_upsert_gate(&self, gate: UpsertGate) {
        *self.gate.lock().unwrap() = Some(gate);
    }

    fn check_offline(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::offline("no route to host"));
        }
        Ok(())
    }

    fn row_updated_at(row: &Value) -> Option<DateTime<Utc>> {
        row.get("updated_at")?
            .as_str()?
            .parse::<DateTime<Utc>>()
            .ok()
    }

    fn check_rejects(&self, rows: &[Value]) -> Result<()> {
        let rejected = self.rejected.lock().unwrap();
        for row in rows {
            if let Some(id) = row
                .get("id")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
            {
                if rejected.contains(&id) {
                    return Err(Error::api(
                        403,
                        Some("42501".to_string()),
                        "permission denied",
                    ));
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TableApi for MockRemote {
    async fn select_updated_since(&self, table: Table, since: DateTime<Utc>) -> Result<Vec<Value>> {
        self.check_offline()?;
        self.select_calls.lock().unwrap().push((table, since));
        let mut rows: Vec<Value> = self
            .tables
            .lock()
            .unwrap()
            .get(&table)
            .map(|rows| {
                rows.values()
                    .filter(|row| {
                        Self::row_updated_at(row)
                            .map(|at| at > since)
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by_key(|row| Self::row_updated_at(row));
        Ok(rows)
    }

    async fn select_ids(&self, table: Table) -> Result<Vec<Uuid>> {
        self.check_offline()?;
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(&table)
            .map(|rows| rows.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn select_by_ids(&self, table: Table, ids: &[Uuid]) -> Result<Vec<Value>> {
        self.check_offline()?;
        let wanted: HashSet<Uuid> = ids.iter().copied().collect();
        Ok(self
            .tables
            .lock()
            .unwrap()
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|(id, _)| wanted.contains(id))
                    .map(|(_, row)| row.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, table: Table, row: Value) -> Result<()> {
        self.check_offline()?;
        self.insert_calls.lock().unwrap().push(table);
        self.check_rejects(std::slice::from_ref(&row))?;
        let id = row
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| Error::api(400, None, "row without id"))?;

        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table).or_default();
        if rows.contains_key(&id) {
            return Err(Error::api(
                409,
                Some("23505".to_string()),
                "duplicate key value violates unique constraint",
            ));
        }
        rows.insert(id, row);
        Ok(())
    }

    async fn upsert(&self, table: Table, rows: Vec<Value>) -> Result<()> {
        let gate = {
            let mut slot = self.gate.lock().unwrap();
            match slot.as_ref() {
                Some(gate) if gate.table == table => slot.take(),
                _ => None,
            }
        };
        if let Some(mut gate) = gate {
            if let Some(entered) = gate.entered.take() {
                let _ = entered.send(());
            }
            if let Some(resume) = gate.resume.take() {
                let _ = resume.await;
            }
        }

        self.check_offline()?;
        self.upsert_calls.lock().unwrap().push((table, rows.len()));
        self.check_rejects(&rows)?;
        let mut tables = self.tables.lock().unwrap();
        let stored = tables.entry(table).or_default();
        for row in rows {
            if let Some(id) = row
                .get("id")
                .and_then(Value::as_str)
                .and_then(|s| Uuid::parse_str(s).ok())
            {
                stored.insert(id, row);
            }
        }
        Ok(())
    }

    async fn update_by_id(&self, table: Table, id: Uuid, patch: Value) -> Result<()> {
        self.check_offline()?;
        self.patch_calls
            .lock()
            .unwrap()
            .push((table, id, patch.clone()));
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table).or_default();
        let Some(existing) = rows.get_mut(&id) else {
            return Err(Error::api(404, None, "row not found"));
        };
        if let (Some(existing), Some(patch)) = (existing.as_object_mut(), patch.as_object()) {
            for (key, value) in patch {
                existing.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Realtime fake
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct ChannelSenders {
    pub rows: mpsc::UnboundedSender<RowChange>,
    pub broadcasts: mpsc::UnboundedSender<Value>,
    pub status: mpsc::UnboundedSender<ChannelStatus>,
}

#[derive(Default)]
pub struct MockRealtime {
    fail_subscribes: AtomicUsize,
    pub subscribe_calls: AtomicUsize,
    pub unsubscribes: AtomicUsize,
    senders: Mutex<Option<ChannelSenders>>,
}

impl MockRealtime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make the next `n` subscribe calls fail.
    pub fn fail_next_subscribes(&self, n: usize) {
        self.fail_subscribes.store(n, Ordering::SeqCst);
    }

    pub fn senders(&self) -> ChannelSenders {
        self.senders
            .lock()
            .unwrap()
            .clone()
            .expect("no live channel")
    }

    pub fn send_broadcast(&self, message: Value) {
        let _ = self.senders().broadcasts.unbounded_send(message);
    }

    pub fn send_row_change(&self, change: RowChange) {
        let _ = self.senders().rows.unbounded_send(change);
    }
}

struct MockChannel {
    streams: Option<ChannelStreams>,
    owner: Arc<MockRealtime>,
}

#[async_trait]
impl RealtimeChannel for MockChannel {
    fn take_streams(&mut self) -> Option<ChannelStreams> {
        self.streams.take()
    }

    async fn unsubscribe(&mut self) -> Result<()> {
        self.owner.unsubscribes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Newtype wrapper so `RealtimeTransport` (defined in `hearth-core`) can be
/// implemented for an `Arc<MockRealtime>` handle without violating the
/// orphan rule.
pub struct MockRealtimeHandle(pub Arc<MockRealtime>);

#[async_trait]
impl RealtimeTransport for MockRealtimeHandle {
    async fn subscribe(&self, _topic: &str, _tables: &[Table]) -> Result<Box<dyn RealtimeChannel>> {
        self.0.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.0.fail_subscribes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.0.fail_subscribes.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::Channel("subscribe refused".to_string()));
        }

        let (rows_tx, rows_rx) = mpsc::unbounded();
        let (broadcast_tx, broadcast_rx) = mpsc::unbounded();
        let (status_tx, status_rx) = mpsc::unbounded();
        *self.0.senders.lock().unwrap() = Some(ChannelSenders {
            rows: rows_tx,
            broadcasts: broadcast_tx,
            status: status_tx,
        });

        Ok(Box::new(MockChannel {
            streams: Some(ChannelStreams {
                row_changes: vec![rows_rx.boxed()],
                broadcasts: broadcast_rx.boxed(),
                status: status_rx.boxed(),
            }),
            owner: Arc::clone(&self.0),
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Object storage, compat RPC, auth fakes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockStorage {
    pub uploads: Mutex<Vec<(String, String, Vec<u8>, UploadOptions)>>,
    fail: AtomicBool,
}

impl MockStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStorage for MockStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Storage("upload refused".to_string()));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string(), bytes, options));
        Ok(())
    }

    async fn download(&self, _bucket: &str, _key: &str) -> Result<Vec<u8>> {
        Err(Error::Storage("not implemented".to_string()))
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("mock://{}/{}", bucket, key)
    }
}

#[derive(Default)]
pub struct MockCompat {
    pub calls: AtomicUsize,
    response: Mutex<Option<VersionCompatResponse>>,
}

impl MockCompat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_response(&self, response: VersionCompatResponse) {
        *self.response.lock().unwrap() = Some(response);
    }

    pub fn require_update(&self, min_version: &str) {
        self.set_response(VersionCompatResponse {
            compatible: false,
            min_version: Some(min_version.to_string()),
            current_version: None,
            force_update: true,
            migration_required: None,
            message: None,
        });
    }
}

#[async_trait]
impl CompatRpc for MockCompat {
    async fn check_version_compat(
        &self,
        _platform: &str,
        _client_version: &str,
    ) -> Result<VersionCompatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .response
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(VersionCompatResponse {
                compatible: true,
                min_version: None,
                current_version: None,
                force_update: false,
                migration_required: None,
                message: None,
            }))
    }
}

#[derive(Default)]
pub struct StaticAuth {
    user: Mutex<Option<Uuid>>,
}

impl StaticAuth {
    pub fn signed_in(user_id: Uuid) -> Arc<Self> {
        Arc::new(Self {
            user: Mutex::new(Some(user_id)),
        })
    }

    pub fn set_user(&self, user_id: Option<Uuid>) {
        *self.user.lock().unwrap() = user_id;
    }
}

impl AuthSession for StaticAuth {
    fn current_user_id(&self) -> Option<Uuid> {
        *self.user.lock().unwrap()
    }
}

// Re-export for harness construction.
pub use hearth_core::remote::MemorySettings;

// ─────────────────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────────────────

pub struct Harness {
    pub engine: Arc<SyncEngine>,
    pub store: Arc<Store>,
    pub remote: Arc<MockRemote>,
    pub realtime: Arc<MockRealtime>,
    pub storage: Arc<MockStorage>,
    pub compat: Arc<MockCompat>,
    pub settings: Arc<MemorySettings>,
    pub auth: Arc<StaticAuth>,
    pub clock: Arc<ManualClock>,
    pub me: Uuid,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_role(UserRole::Realtor)
    }

    pub fn admin() -> Self {
        Self::with_role(UserRole::Admin)
    }

    fn with_role(role: UserRole) -> Self {
        let me = Uuid::new_v4();
        let store = Arc::new(Store::new());
        let remote = MockRemote::new();
        let realtime = MockRealtime::new();
        let storage = MockStorage::new();
        let compat = MockCompat::new();
        let settings = Arc::new(MemorySettings::new());
        let auth = StaticAuth::signed_in(me);
        let clock = Arc::new(ManualClock::new(base_time()));

        remote.seed(Table::Users, user_value(me, "Me", role, at_offset(-60)));

        let engine = SyncEngine::new(
            EngineConfig {
                platform: "macos".to_string(),
                client_version: "1.0.0".to_string(),
                mode: EngineMode::Test,
            },
            Arc::clone(&store),
            Collaborators {
                remote: Arc::clone(&remote) as Arc<dyn TableApi>,
                storage: Arc::clone(&storage) as Arc<dyn ObjectStorage>,
                realtime: Arc::new(MockRealtimeHandle(Arc::clone(&realtime))) as Arc<dyn RealtimeTransport>,
                compat: Arc::clone(&compat) as Arc<dyn CompatRpc>,
                settings: Arc::clone(&settings) as Arc<dyn SettingsStore>,
                auth: Arc::clone(&auth) as Arc<dyn AuthSession>,
                persistence: Arc::new(NoopPersistence),
                clock: Arc::clone(&clock) as Arc<dyn Clock>,
            },
        );

        Self {
            engine,
            store,
            remote,
            realtime,
            storage,
            compat,
            settings,
            auth,
            clock,
            me,
        }
    }

    pub fn last_sync_time(&self) -> Option<String> {
        self.settings.get("lastSyncTime")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row builders
// ─────────────────────────────────────────────────────────────────────────────

pub fn user_value(id: Uuid, name: &str, role: UserRole, updated_at: DateTime<Utc>) -> Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "email": format!("{}@example.com", name.to_lowercase()),
        "role": role,
        "updated_at": updated_at,
    })
}

pub fn task_value(id: Uuid, title: &str, updated_at: DateTime<Utc>) -> Value {
    serde_json::json!({
        "id": id,
        "title": title,
        "status": "open",
        "updated_at": updated_at,
    })
}

pub fn listing_value(id: Uuid, address: &str, updated_at: DateTime<Utc>) -> Value {
    serde_json::json!({
        "id": id,
        "address": address,
        "status": "active",
        "stage": "active",
        "updated_at": updated_at,
    })
}

pub fn local_task(id: Uuid, title: &str, now: DateTime<Utc>) -> Task {
    Task {
        id,
        title: title.to_string(),
        description: None,
        due_date: None,
        status: WorkStatus::Open,
        completed_at: None,
        deleted_at: None,
        listing_id: None,
        meta: SyncMeta::local(now),
    }
}

pub fn local_listing(id: Uuid, address: &str, now: DateTime<Utc>) -> Listing {
    Listing {
        id,
        address: address.to_string(),
        price: None,
        mls_number: None,
        kind: None,
        status: ListingStatus::Draft,
        stage: ListingStage::Pending,
        activated_at: None,
        pending_at: None,
        closed_at: None,
        due_date: None,
        deleted_at: None,
        owned_by: None,
        property_id: None,
        listing_type_id: None,
        meta: SyncMeta::local(now),
    }
}

pub fn local_note(id: Uuid, parent: NoteParent, content: &str, now: DateTime<Utc>) -> Note {
    Note {
        id,
        content: content.to_string(),
        parent,
        created_by: None,
        edited_at: None,
        edited_by: None,
        deleted_at: None,
        deleted_by: None,
        has_remote_change_while_pending: false,
        meta: SyncMeta::local(now),
    }
}

pub fn local_assignee(
    id: Uuid,
    task_id: Uuid,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> TaskAssignee {
    TaskAssignee {
        id,
        task_id,
        user_id,
        assigned_by: None,
        assigned_at: now,
        meta: SyncMeta::local(now),
    }
}

pub fn local_user(id: Uuid, name: &str, now: DateTime<Utc>) -> User {
    User {
        id,
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        role: UserRole::Realtor,
        avatar: None,
        avatar_hash: None,
        avatar_path: None,
        meta: SyncMeta::local(now),
    }
}
