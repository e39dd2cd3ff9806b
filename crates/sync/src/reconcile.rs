//! Post-syncDown graph repair: missing-row reconciliation, relationship
//! healing, and the first-sync orphan sweep.

use log::{debug, info, warn};
use uuid::Uuid;

use hearth_core::errors::Result;
use hearth_core::meta::SyncRecord;

use crate::handlers::activities::ActivitySync;
use crate::handlers::assignees::{ActivityAssigneeSync, TaskAssigneeSync};
use crate::handlers::listings::ListingSync;
use crate::handlers::notes::NoteSync;
use crate::handlers::properties::PropertySync;
use crate::handlers::reference::{ActivityTemplateSync, ListingTypeSync};
use crate::handlers::tasks::TaskSync;
use crate::handlers::users::UserSync;
use crate::handlers::{apply_remote, delete_local, EntitySync, SyncCx};

/// Failsafe against watermark drift: pull any remote row the delta reads
/// missed entirely.
pub(crate) async fn reconcile_missing<E: EntitySync>(cx: &SyncCx) -> Result<usize> {
    let remote_ids = cx.remote.select_ids(E::TABLE).await?;
    let local_ids = E::table(&cx.store).ids();
    let missing: Vec<Uuid> = remote_ids
        .into_iter()
        .filter(|id| !local_ids.contains(id))
        .collect();
    if missing.is_empty() {
        return Ok(0);
    }

    info!(
        "[Sync] Reconciling {} missing {} rows",
        missing.len(),
        E::TABLE
    );
    let values = cx.remote.select_by_ids(E::TABLE, &missing).await?;
    let mut applied = 0usize;
    for value in values {
        match serde_json::from_value::<E::Dto>(value) {
            Ok(dto) => {
                if apply_remote::<E>(cx, &dto)? {
                    applied += 1;
                }
            }
            Err(err) => warn!("[Sync] Dropping undecodable {} row: {}", E::TABLE, err),
        }
    }
    Ok(applied)
}

/// Run the missing-row failsafe for the materially important tables.
pub(crate) async fn reconcile_missing_core(cx: &SyncCx) -> Result<usize> {
    let mut applied = 0usize;
    applied += reconcile_missing::<ListingSync>(cx).await?;
    applied += reconcile_missing::<TaskSync>(cx).await?;
    applied += reconcile_missing::<ActivitySync>(cx).await?;
    applied += reconcile_missing::<NoteSync>(cx).await?;
    Ok(applied)
}

/// Heal unresolved listing→owner and listing→property links in a single pass
/// over dictionaries of local users and properties.
pub(crate) fn reconcile_relationships(cx: &SyncCx) {
    let user_ids = cx.store.users.ids();
    let property_ids = cx.store.properties.ids();

    let mut owners_linked = 0usize;
    let mut properties_linked = 0usize;
    for listing in cx.store.listings.all() {
        if listing.deleted_at.is_none() && cx.store.owner_of_listing(listing.id).is_none() {
            if let Some(user_id) = listing.owned_by {
                if user_ids.contains(&user_id) && cx.store.link_listing_owner(listing.id, user_id) {
                    owners_linked += 1;
                }
            }
        }
        if cx.store.property_of_listing(listing.id).is_none() {
            if let Some(property_id) = listing.property_id {
                if property_ids.contains(&property_id)
                    && cx.store.link_listing_property(listing.id, property_id)
                {
                    properties_linked += 1;
                }
            }
        }
    }

    if owners_linked > 0 || properties_linked > 0 {
        debug!(
            "[Sync] Relationship reconciliation linked {} owners, {} properties",
            owners_linked, properties_linked
        );
    }
}

async fn sweep_table<E: EntitySync>(cx: &SyncCx) -> Result<usize> {
    let remote_ids: std::collections::BTreeSet<Uuid> =
        cx.remote.select_ids(E::TABLE).await?.into_iter().collect();
    // Only rows once confirmed synced are candidates: a dirty row is still
    // the local authority, and a synced row without `synced_at` predates sync
    // metadata and has never reached the server.
    let orphans: Vec<Uuid> = E::table(&cx.store)
        .all()
        .into_iter()
        .filter(|row| {
            row.meta().state == hearth_core::meta::SyncState::Synced
                && row.meta().synced_at.is_some()
        })
        .map(|row| row.id())
        .filter(|id| !remote_ids.contains(id))
        .collect();
    for id in &orphans {
        delete_local::<E>(cx, *id);
    }
    if !orphans.is_empty() {
        info!(
            "[Sync] Orphan sweep removed {} stale {} rows",
            orphans.len(),
            E::TABLE
        );
    }
    Ok(orphans.len())
}

/// Delete local rows absent from the remote id set. Only safe on the
/// first-ever sync; the caller enforces the `lastSyncTime = nil` guard.
pub(crate) async fn orphan_sweep(cx: &SyncCx) -> Result<usize> {
    let mut removed = 0usize;
    removed += sweep_table::<ListingTypeSync>(cx).await?;
    removed += sweep_table::<ActivityTemplateSync>(cx).await?;
    removed += sweep_table::<UserSync>(cx).await?;
    removed += sweep_table::<PropertySync>(cx).await?;
    removed += sweep_table::<ListingSync>(cx).await?;
    removed += sweep_table::<TaskSync>(cx).await?;
    removed += sweep_table::<ActivitySync>(cx).await?;
    removed += sweep_table::<TaskAssigneeSync>(cx).await?;
    removed += sweep_table::<ActivityAssigneeSync>(cx).await?;
    removed += sweep_table::<NoteSync>(cx).await?;
    Ok(removed)
}

/// One-time local migration: rows that predate sync metadata report `synced`
/// without ever having been confirmed remotely. Re-queue them so their
/// profiles reach the server.
pub(crate) fn reconcile_legacy_local_users(cx: &SyncCx) -> usize {
    let mut requeued = 0usize;
    for user in cx.store.users.all() {
        if user.meta.state == hearth_core::meta::SyncState::Synced && user.meta.synced_at.is_none()
        {
            cx.store.users.flag_pending(user.id);
            requeued += 1;
        }
    }
    if requeued > 0 {
        info!("[Sync] Re-queued {} legacy local user rows", requeued);
    }
    requeued
}
