//! Table-keyed routing used by realtime ingress and row-level maintenance.

use log::warn;
use serde_json::Value;
use uuid::Uuid;

use hearth_core::errors::Result;
use hearth_core::meta::{SyncMeta, SyncRecord};
use hearth_core::store::Store;
use hearth_core::tables::Table;

use super::activities::ActivitySync;
use super::assignees::{ActivityAssigneeSync, TaskAssigneeSync};
use super::listings::ListingSync;
use super::notes::NoteSync;
use super::properties::PropertySync;
use super::reference::{ActivityTemplateSync, ListingTypeSync};
use super::tasks::TaskSync;
use super::users::UserSync;
use super::{apply_remote, delete_local, EntitySync, SyncCx};

fn decode_apply<E: EntitySync>(cx: &SyncCx, value: Value) -> Result<bool> {
    let dto: E::Dto = serde_json::from_value(value)?;
    apply_remote::<E>(cx, &dto)
}

/// Decode a raw row payload and upsert it through the table's handler.
pub(crate) fn apply_change(cx: &SyncCx, table: Table, value: Value) -> Result<bool> {
    match table {
        Table::Users => decode_apply::<UserSync>(cx, value),
        Table::Properties => decode_apply::<PropertySync>(cx, value),
        Table::Listings => decode_apply::<ListingSync>(cx, value),
        Table::Tasks => decode_apply::<TaskSync>(cx, value),
        Table::Activities => decode_apply::<ActivitySync>(cx, value),
        Table::TaskAssignees => decode_apply::<TaskAssigneeSync>(cx, value),
        Table::ActivityAssignees => decode_apply::<ActivityAssigneeSync>(cx, value),
        Table::Notes => decode_apply::<NoteSync>(cx, value),
        Table::ListingTypes => decode_apply::<ListingTypeSync>(cx, value),
        Table::ActivityTemplates => decode_apply::<ActivityTemplateSync>(cx, value),
    }
}

/// Remove a row after a remote hard-delete.
pub(crate) fn delete_by_id(cx: &SyncCx, table: Table, id: Uuid) {
    match table {
        Table::Users => delete_local::<UserSync>(cx, id),
        Table::Properties => delete_local::<PropertySync>(cx, id),
        Table::Listings => delete_local::<ListingSync>(cx, id),
        Table::Tasks => delete_local::<TaskSync>(cx, id),
        Table::Activities => delete_local::<ActivitySync>(cx, id),
        Table::TaskAssignees => delete_local::<TaskAssigneeSync>(cx, id),
        Table::ActivityAssignees => delete_local::<ActivityAssigneeSync>(cx, id),
        Table::Notes => delete_local::<NoteSync>(cx, id),
        Table::ListingTypes => delete_local::<ListingTypeSync>(cx, id),
        Table::ActivityTemplates => delete_local::<ActivityTemplateSync>(cx, id),
    }
}

/// Apply a metadata mutation to one row of any table. Returns false when the
/// row does not exist.
pub(crate) fn update_meta(
    store: &Store,
    table: Table,
    id: Uuid,
    f: impl FnOnce(&mut SyncMeta),
) -> bool {
    match table {
        Table::Users => store.users.update(id, |r| f(r.meta_mut())).is_some(),
        Table::Properties => store.properties.update(id, |r| f(r.meta_mut())).is_some(),
        Table::Listings => store.listings.update(id, |r| f(r.meta_mut())).is_some(),
        Table::Tasks => store.tasks.update(id, |r| f(r.meta_mut())).is_some(),
        Table::Activities => store.activities.update(id, |r| f(r.meta_mut())).is_some(),
        Table::TaskAssignees => store
            .task_assignees
            .update(id, |r| f(r.meta_mut()))
            .is_some(),
        Table::ActivityAssignees => store
            .activity_assignees
            .update(id, |r| f(r.meta_mut()))
            .is_some(),
        Table::Notes => store.notes.update(id, |r| f(r.meta_mut())).is_some(),
        Table::ListingTypes => store
            .listing_types
            .update(id, |r| f(r.meta_mut()))
            .is_some(),
        Table::ActivityTemplates => store
            .activity_templates
            .update(id, |r| f(r.meta_mut()))
            .is_some(),
    }
}

/// Snapshot (id, metadata) pairs for one table.
pub(crate) fn all_metas(store: &Store, table: Table) -> Vec<(Uuid, SyncMeta)> {
    fn collect<T: SyncRecord>(rows: Vec<T>) -> Vec<(Uuid, SyncMeta)> {
        rows.into_iter()
            .map(|row| (row.id(), row.meta().clone()))
            .collect()
    }

    match table {
        Table::Users => collect(store.users.all()),
        Table::Properties => collect(store.properties.all()),
        Table::Listings => collect(store.listings.all()),
        Table::Tasks => collect(store.tasks.all()),
        Table::Activities => collect(store.activities.all()),
        Table::TaskAssignees => collect(store.task_assignees.all()),
        Table::ActivityAssignees => collect(store.activity_assignees.all()),
        Table::Notes => collect(store.notes.all()),
        Table::ListingTypes => collect(store.listing_types.all()),
        Table::ActivityTemplates => collect(store.activity_templates.all()),
    }
}

/// Fetch one row's metadata.
pub(crate) fn get_meta(store: &Store, table: Table, id: Uuid) -> Option<SyncMeta> {
    all_metas(store, table)
        .into_iter()
        .find(|(row_id, _)| *row_id == id)
        .map(|(_, meta)| meta)
}

/// Extract the `id` column from a raw row payload.
pub(crate) fn record_id(value: &Value) -> Option<Uuid> {
    let id = value.get("id")?.as_str()?;
    match Uuid::parse_str(id) {
        Ok(id) => Some(id),
        Err(err) => {
            warn!("[Sync] Malformed id in realtime record: {}", err);
            None
        }
    }
}
