//! Realtime ingress: row-change and broadcast events feeding the entity
//! handlers without touching watermarks.

pub(crate) mod broadcast;
pub(crate) mod channel;

use log::warn;

use hearth_core::remote::{ChangeAction, RowChange};

use crate::handlers::{dispatch, SyncCx};

/// Apply one row-change event. In-flight and local-authoritative suppression
/// happen inside the shared upsert path; deletes are unconditional.
pub(crate) fn handle_row_change(cx: &SyncCx, change: RowChange) {
    match change.action {
        ChangeAction::Delete => {
            let Some(id) = change.old_record.as_ref().and_then(dispatch::record_id) else {
                warn!(
                    "[Sync] Row-change delete for {} without oldRecord.id",
                    change.table
                );
                return;
            };
            dispatch::delete_by_id(cx, change.table, id);
        }
        ChangeAction::Insert | ChangeAction::Update => {
            let Some(record) = change.record else {
                warn!(
                    "[Sync] Row-change {:?} for {} without record",
                    change.action, change.table
                );
                return;
            };
            if let Err(err) = dispatch::apply_change(cx, change.table, record) {
                warn!("[Sync] Row-change apply for {} failed: {}", change.table, err);
            }
        }
    }
}
