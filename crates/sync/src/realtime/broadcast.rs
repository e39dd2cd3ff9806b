//! Application-level broadcast event parsing.

use log::{debug, warn};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use hearth_core::remote::ChangeAction;
use hearth_core::tables::Table;

use crate::handlers::{dispatch, SyncCx};
use crate::resolver::InFlightKind;

/// The only payload version this client fully understands. Newer versions are
/// logged and processed best-effort.
const SUPPORTED_EVENT_VERSION: i64 = 1;

/// Outer message envelope: `{event, type, payload, meta}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BroadcastEnvelope {
    #[serde(default)]
    #[allow(dead_code)]
    event: Option<String>,
    #[serde(rename = "type", default)]
    #[allow(dead_code)]
    kind: Option<String>,
    payload: Value,
    #[serde(default)]
    #[allow(dead_code)]
    meta: Option<Value>,
}

/// Application change payload carried in the envelope.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BroadcastChangePayload {
    table: Table,
    #[serde(rename = "type")]
    change: ChangeAction,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
    #[serde(default = "default_event_version")]
    event_version: i64,
    #[serde(default)]
    origin_user_id: Option<Uuid>,
}

fn default_event_version() -> i64 {
    SUPPORTED_EVENT_VERSION
}

fn tracked_for_broadcast(table: Table) -> Option<InFlightKind> {
    match table {
        Table::Tasks | Table::Activities | Table::Notes => InFlightKind::for_table(table),
        _ => None,
    }
}

/// Decode and apply one broadcast message. Decode failures are logged and
/// dropped; they never bubble out of the ingress.
pub(crate) fn handle_broadcast(cx: &SyncCx, current_user: Option<Uuid>, message: Value) {
    let envelope: BroadcastEnvelope = match serde_json::from_value(message) {
        Ok(envelope) => envelope,
        Err(err) => {
            warn!("[Sync] Dropping undecodable broadcast envelope: {}", err);
            return;
        }
    };
    let payload: BroadcastChangePayload = match serde_json::from_value(envelope.payload) {
        Ok(payload) => payload,
        Err(err) => {
            warn!("[Sync] Dropping undecodable broadcast payload: {}", err);
            return;
        }
    };

    if payload.event_version != SUPPORTED_EVENT_VERSION {
        warn!(
            "[Sync] Broadcast event version {} (expected {}); applying best-effort",
            payload.event_version, SUPPORTED_EVENT_VERSION
        );
    }

    // self-echo: the server publishes our own writes back to us
    if payload.origin_user_id.is_some() && payload.origin_user_id == current_user {
        debug!("[Sync] Dropping self-originated broadcast for {}", payload.table);
        return;
    }

    match payload.change {
        ChangeAction::Delete => {
            let Some(id) = payload.old_record.as_ref().and_then(dispatch::record_id) else {
                warn!("[Sync] Broadcast delete for {} without oldRecord.id", payload.table);
                return;
            };
            dispatch::delete_by_id(cx, payload.table, id);
        }
        ChangeAction::Insert | ChangeAction::Update => {
            let Some(record) = payload.record else {
                warn!("[Sync] Broadcast {:?} for {} without record", payload.change, payload.table);
                return;
            };

            // in-flight suppression for push-tracked kinds
            if let Some(kind) = tracked_for_broadcast(payload.table) {
                if let Some(id) = dispatch::record_id(&record) {
                    if cx.resolver.is_in_flight(kind, id) {
                        debug!(
                            "[Sync] Dropping broadcast for in-flight {} {}",
                            payload.table, id
                        );
                        return;
                    }
                }
            }

            if let Err(err) = dispatch::apply_change(cx, payload.table, record) {
                warn!("[Sync] Broadcast apply for {} failed: {}", payload.table, err);
            }
        }
    }
}
