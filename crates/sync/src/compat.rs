//! Pre-sync version compatibility gate.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};
use tokio::sync::Mutex;

use hearth_core::remote::{CompatRpc, VersionCompatResponse};

/// How often the compat RPC is consulted, at most.
const CHECK_INTERVAL_SECS: i64 = 3600;

/// Outcome of a version check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompatStatus {
    Compatible,
    /// A newer client exists but syncing may continue.
    UpdateAvailable(String),
    /// The server refuses this client version; sync is paused.
    UpdateRequired(String),
    /// The check could not complete; fail open.
    Unknown(String),
}

impl CompatStatus {
    pub fn can_proceed(&self) -> bool {
        !matches!(self, CompatStatus::UpdateRequired(_))
    }
}

#[derive(Debug)]
struct GateInner {
    last_check: Option<DateTime<Utc>>,
    last_status: CompatStatus,
}

/// Rate-limited wrapper around the compat RPC.
pub struct AppCompatGate {
    rpc: Arc<dyn CompatRpc>,
    platform: String,
    client_version: String,
    inner: Mutex<GateInner>,
}

impl AppCompatGate {
    pub fn new(rpc: Arc<dyn CompatRpc>, platform: &str, client_version: &str) -> Self {
        Self {
            rpc,
            platform: platform.to_string(),
            client_version: client_version.to_string(),
            inner: Mutex::new(GateInner {
                last_check: None,
                last_status: CompatStatus::Compatible,
            }),
        }
    }

    fn map_response(&self, response: VersionCompatResponse) -> CompatStatus {
        if response.force_update || !response.compatible {
            let version = response
                .min_version
                .or(response.current_version)
                .unwrap_or_default();
            return CompatStatus::UpdateRequired(version);
        }
        match response.current_version {
            Some(version) if version != self.client_version => {
                CompatStatus::UpdateAvailable(version)
            }
            _ => CompatStatus::Compatible,
        }
    }

    /// Current status, re-checked against the server at most once per hour.
    pub async fn status(&self, now: DateTime<Utc>) -> CompatStatus {
        {
            let inner = self.inner.lock().await;
            if let Some(checked_at) = inner.last_check {
                if (now - checked_at).num_seconds() < CHECK_INTERVAL_SECS {
                    return inner.last_status.clone();
                }
            }
        }

        let status = match self
            .rpc
            .check_version_compat(&self.platform, &self.client_version)
            .await
        {
            Ok(response) => {
                let status = self.map_response(response);
                if let CompatStatus::UpdateRequired(version) = &status {
                    warn!(
                        "[Sync] Client {} is below required version {}; sync paused",
                        self.client_version, version
                    );
                } else {
                    info!("[Sync] Version check: {:?}", status);
                }
                status
            }
            // Network failures fail open.
            Err(err) => CompatStatus::Unknown(err.to_string()),
        };

        let mut inner = self.inner.lock().await;
        inner.last_check = Some(now);
        inner.last_status = status.clone();
        status
    }

    pub async fn can_proceed(&self, now: DateTime<Utc>) -> bool {
        self.status(now).await.can_proceed()
    }
}
