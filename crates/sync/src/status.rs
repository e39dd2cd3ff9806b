//! Engine status surfaced to the host application.

use chrono::{DateTime, Utc};

/// What the sync loop is doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncActivity {
    Idle,
    Syncing,
    Synced { at: DateTime<Utc> },
    Failed { message: String },
    /// Sync refused to run (breaker open, update required).
    Blocked { message: String },
}

/// Health of the realtime subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
    Reconnecting { attempt: u32, max: u32 },
    /// Reconnect attempts exhausted the advertised budget; retries continue
    /// quietly in the background.
    Degraded,
}
