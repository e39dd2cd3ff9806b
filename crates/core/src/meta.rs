//! Per-row sync metadata carried by every entity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The local dirty bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Synced,
    Pending,
    Failed,
}

/// Sync bookkeeping attached to every local row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMeta {
    pub state: SyncState,
    pub last_sync_error: Option<String>,
    /// Persisted attempt counter; reset to 0 on success.
    pub retry_count: i32,
    /// When the row was last confirmed synced remotely.
    pub synced_at: Option<DateTime<Utc>>,
    /// Row mutation time. Advances on local edit, mirrored from the remote
    /// row on accept.
    pub updated_at: DateTime<Utc>,
    /// Last time auto-recovery reset the attempt counter.
    pub last_reset_attempt: Option<DateTime<Utc>>,
}

impl SyncMeta {
    /// Metadata for a row created by the local UI.
    pub fn local(now: DateTime<Utc>) -> Self {
        Self {
            state: SyncState::Pending,
            last_sync_error: None,
            retry_count: 0,
            synced_at: None,
            updated_at: now,
            last_reset_attempt: None,
        }
    }

    /// Metadata mirrored from a remote row.
    pub fn remote(updated_at: DateTime<Utc>) -> Self {
        Self {
            state: SyncState::Synced,
            last_sync_error: None,
            retry_count: 0,
            synced_at: None,
            updated_at,
            last_reset_attempt: None,
        }
    }

    /// Row needs a push.
    pub fn is_dirty(&self) -> bool {
        matches!(self.state, SyncState::Pending | SyncState::Failed)
    }

    /// Confirm the row as synced remotely.
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.state = SyncState::Synced;
        self.last_sync_error = None;
        self.retry_count = 0;
        self.synced_at = Some(at);
    }

    /// Record a push failure without touching `updated_at`.
    pub fn mark_failed(&mut self, message: impl Into<String>) {
        self.state = SyncState::Failed;
        self.last_sync_error = Some(message.into());
    }

    /// Record a local edit.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        if self.state == SyncState::Synced {
            self.state = SyncState::Pending;
        }
    }
}

/// Implemented by every entity held in the graph store.
pub trait SyncRecord: Clone + Send + 'static {
    fn id(&self) -> Uuid;
    fn meta(&self) -> &SyncMeta;
    fn meta_mut(&mut self) -> &mut SyncMeta;

    fn sync_state(&self) -> SyncState {
        self.meta().state
    }

    fn updated_at(&self) -> DateTime<Utc> {
        self.meta().updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        "2026-03-01T10:00:00Z".parse().unwrap()
    }

    #[test]
    fn local_rows_start_pending_with_zero_retries() {
        let meta = SyncMeta::local(now());
        assert_eq!(meta.state, SyncState::Pending);
        assert_eq!(meta.retry_count, 0);
        assert!(meta.synced_at.is_none());
        assert!(meta.is_dirty());
    }

    #[test]
    fn mark_synced_resets_retry_state() {
        let mut meta = SyncMeta::local(now());
        meta.retry_count = 3;
        meta.last_sync_error = Some("boom".to_string());
        meta.mark_synced(now());
        assert_eq!(meta.state, SyncState::Synced);
        assert_eq!(meta.retry_count, 0);
        assert!(meta.last_sync_error.is_none());
        assert_eq!(meta.synced_at, Some(now()));
    }

    #[test]
    fn touch_flips_synced_back_to_pending_but_preserves_failed() {
        let mut meta = SyncMeta::remote(now());
        meta.touch(now());
        assert_eq!(meta.state, SyncState::Pending);

        meta.mark_failed("push rejected");
        meta.touch(now());
        assert_eq!(meta.state, SyncState::Failed);
    }
}
