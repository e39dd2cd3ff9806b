//! Contracts the engine uses to reach the outside world.
//!
//! The HTTP-backed implementations live in `hearth-remote`; the realtime
//! socket and the durable settings/persistence adapters are supplied by the
//! host application (or by test doubles).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

use crate::errors::Result;
use crate::store::Store;
use crate::tables::Table;

// ─────────────────────────────────────────────────────────────────────────────
// Remote table API
// ─────────────────────────────────────────────────────────────────────────────

/// Typed access to the remote tables. Row payloads travel as JSON objects in
/// the table's column schema; the entity handlers own the typed DTOs.
#[async_trait]
pub trait TableApi: Send + Sync {
    /// `SELECT * WHERE updated_at > since ORDER BY updated_at`.
    async fn select_updated_since(&self, table: Table, since: DateTime<Utc>) -> Result<Vec<Value>>;

    /// `SELECT id`.
    async fn select_ids(&self, table: Table) -> Result<Vec<Uuid>>;

    /// `SELECT * WHERE id IN (...)`.
    async fn select_by_ids(&self, table: Table, ids: &[Uuid]) -> Result<Vec<Value>>;

    /// `INSERT` a single row; fails on an existing primary key.
    async fn insert(&self, table: Table, row: Value) -> Result<()>;

    /// `UPSERT ... ON CONFLICT id` for a batch of rows.
    async fn upsert(&self, table: Table, rows: Vec<Value>) -> Result<()>;

    /// `UPDATE ... WHERE id = ?` with a column-restricted patch.
    async fn update_by_id(&self, table: Table, id: Uuid, patch: Value) -> Result<()>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Realtime
// ─────────────────────────────────────────────────────────────────────────────

/// Row-change action on a realtime stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    Insert,
    Update,
    Delete,
}

/// One decoded row-change event. Deletes carry only `old_record` (with at
/// least the `id` column).
#[derive(Debug, Clone)]
pub struct RowChange {
    pub table: Table,
    pub action: ChangeAction,
    pub record: Option<Value>,
    pub old_record: Option<Value>,
}

/// Status transitions of an open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    Subscribed,
    Closed,
    ChannelError(String),
}

/// The streams handed out by a live subscription: one row-change stream per
/// table, the application-level broadcast stream, and the status stream.
pub struct ChannelStreams {
    pub row_changes: Vec<BoxStream<'static, RowChange>>,
    pub broadcasts: BoxStream<'static, Value>,
    pub status: BoxStream<'static, ChannelStatus>,
}

/// An open realtime channel. Streams are taken once; `unsubscribe` tears the
/// socket subscription down.
#[async_trait]
pub trait RealtimeChannel: Send {
    fn take_streams(&mut self) -> Option<ChannelStreams>;
    async fn unsubscribe(&mut self) -> Result<()>;
}

/// Factory for realtime channels.
#[async_trait]
pub trait RealtimeTransport: Send + Sync {
    async fn subscribe(&self, topic: &str, tables: &[Table]) -> Result<Box<dyn RealtimeChannel>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Object storage
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub cache_control_secs: u32,
    pub content_type: String,
    pub upsert: bool,
}

impl UploadOptions {
    /// Options used for avatar uploads.
    pub fn avatar() -> Self {
        Self {
            cache_control_secs: 3600,
            content_type: "image/jpeg".to_string(),
            upsert: true,
        }
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        options: UploadOptions,
    ) -> Result<()>;

    async fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    fn public_url(&self, bucket: &str, key: &str) -> String;
}

// ─────────────────────────────────────────────────────────────────────────────
// Version compatibility RPC
// ─────────────────────────────────────────────────────────────────────────────

/// Wire response of `check_version_compat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionCompatResponse {
    pub compatible: bool,
    #[serde(default)]
    pub min_version: Option<String>,
    #[serde(default)]
    pub current_version: Option<String>,
    #[serde(default)]
    pub force_update: bool,
    #[serde(default)]
    pub migration_required: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
}

#[async_trait]
pub trait CompatRpc: Send + Sync {
    async fn check_version_compat(
        &self,
        platform: &str,
        client_version: &str,
    ) -> Result<VersionCompatResponse>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Host-provided state
// ─────────────────────────────────────────────────────────────────────────────

/// Current authenticated principal.
pub trait AuthSession: Send + Sync {
    fn current_user_id(&self) -> Option<Uuid>;
}

/// Durable key/value settings (watermarks, migration flags).
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// Settings keys owned by the engine.
pub mod settings_keys {
    pub const LAST_SYNC_TIME: &str = "lastSyncTime";
    pub const LAST_SYNC_LISTING_TYPES: &str = "lastSyncListingTypes";
    pub const LAST_SYNC_ACTIVITY_TEMPLATES: &str = "lastSyncActivityTemplates";
    pub const LAST_SYNC_NOTES: &str = "lastSyncNotes";
    pub const LEGACY_USERS_MIGRATED: &str = "legacyUsersMigrated";
}

/// In-memory settings used by preview/test modes and as a write-through base
/// for host adapters.
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}

/// Commit hook for the durable copy of the graph store. Called once per sync
/// run, in live mode only.
pub trait Persistence: Send + Sync {
    fn commit(&self, store: &Store) -> Result<()>;
}

/// No-op persistence for preview/test modes.
#[derive(Debug, Default)]
pub struct NoopPersistence;

impl Persistence for NoopPersistence {
    fn commit(&self, _store: &Store) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_settings_round_trip() {
        let settings = MemorySettings::new();
        assert!(settings.get(settings_keys::LAST_SYNC_TIME).is_none());
        settings.set(settings_keys::LAST_SYNC_TIME, "2026-03-01T10:00:00Z");
        assert_eq!(
            settings.get(settings_keys::LAST_SYNC_TIME).as_deref(),
            Some("2026-03-01T10:00:00Z")
        );
        settings.remove(settings_keys::LAST_SYNC_TIME);
        assert!(settings.get(settings_keys::LAST_SYNC_TIME).is_none());
    }

    #[test]
    fn compat_response_tolerates_missing_optionals() {
        let response: VersionCompatResponse =
            serde_json::from_str(r#"{"compatible": true}"#).expect("decode");
        assert!(response.compatible);
        assert!(!response.force_update);
        assert!(response.min_version.is_none());
    }
}
