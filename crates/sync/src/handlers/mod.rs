//! Per-entity sync handlers.
//!
//! Every entity kind implements the same skeleton over the generic operations
//! in this module: `sync_down` (watermark-bounded remote read applied through
//! the local-authority test), `sync_up` (batch UPSERT with per-row fallback),
//! the shared `apply_remote` upsert driven by both syncDown and realtime, and
//! the realtime `delete_local`. Users and notes carry specialized push paths
//! in their own modules.

pub(crate) mod activities;
pub(crate) mod assignees;
pub(crate) mod dispatch;
pub(crate) mod listings;
pub(crate) mod notes;
pub(crate) mod properties;
pub(crate) mod reference;
pub(crate) mod tasks;
pub(crate) mod users;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

use hearth_core::clock::Clock;
use hearth_core::errors::{user_facing_message, Error, Result, RetryClass};
use hearth_core::meta::SyncRecord;
use hearth_core::remote::TableApi;
use hearth_core::store::{EntityTable, Store};
use hearth_core::tables::Table;

use crate::resolver::{is_local_authoritative, ConflictResolver, InFlightKind};

/// Collaborators threaded through every handler call.
#[derive(Clone)]
pub(crate) struct SyncCx {
    pub store: Arc<Store>,
    pub remote: Arc<dyn TableApi>,
    pub resolver: Arc<ConflictResolver>,
    pub clock: Arc<dyn Clock>,
}

/// Aggregate result of one entity's push pass. Row-level failures are
/// recorded on the rows themselves; a retryable transport error is kept for
/// the circuit breaker.
#[derive(Debug, Default)]
pub(crate) struct PushOutcome {
    pub pushed: usize,
    pub failed: usize,
    pub transport_error: Option<Error>,
}

impl PushOutcome {
    fn note_error(&mut self, err: Error) {
        if err.retry_class() == RetryClass::Retryable && self.transport_error.is_none() {
            self.transport_error = Some(err);
        }
    }
}

/// Static description of one entity kind's sync surface.
pub(crate) trait EntitySync: Send + Sync + 'static {
    type Row: SyncRecord;
    type Dto: Serialize + DeserializeOwned + Clone + Send + Sync;

    const TABLE: Table;
    /// Resolver set for echo suppression; `None` for untracked kinds.
    const IN_FLIGHT: Option<InFlightKind>;

    fn table(store: &Store) -> &EntityTable<Self::Row>;
    fn dto_id(dto: &Self::Dto) -> Uuid;
    fn dto_updated_at(dto: &Self::Dto) -> DateTime<Utc>;
    fn row_from_dto(dto: &Self::Dto) -> Result<Self::Row>;
    fn write_dto(row: &mut Self::Row, dto: &Self::Dto) -> Result<()>;
    fn push_dto(row: &Self::Row) -> Self::Dto;

    /// Maintain relationship links after a row lands locally.
    fn link(_store: &Store, _row: &Self::Row) {}

    /// Tear down derived indexes after a local removal.
    fn unlink(_store: &Store, _row: &Self::Row) {}

    /// A remote change arrived but the local row stayed authoritative.
    fn remote_change_skipped(_store: &Store, _id: Uuid) {}
}

/// Fetch rows changed since the watermark and upsert them locally.
pub(crate) async fn sync_down<E: EntitySync>(cx: &SyncCx, since: DateTime<Utc>) -> Result<usize> {
    let values = cx.remote.select_updated_since(E::TABLE, since).await?;
    let total = values.len();
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
    if total > 0 {
        debug!(
            "[Sync] syncDown {}: {} fetched, {} applied",
            E::TABLE,
            total,
            applied
        );
    }
    Ok(applied)
}

/// Shared upsert used by syncDown and realtime ingress. Returns true when the
/// remote version was written locally.
pub(crate) fn apply_remote<E: EntitySync>(cx: &SyncCx, dto: &E::Dto) -> Result<bool> {
    let id = E::dto_id(dto);
    let table = E::table(&cx.store);
    let now = cx.clock.now();

    let Some(local) = table.get(id) else {
        let mut row = E::row_from_dto(dto)?;
        row.meta_mut().mark_synced(now);
        table.put(row.clone());
        E::link(&cx.store, &row);
        return Ok(true);
    };

    let in_flight = E::IN_FLIGHT
        .map(|kind| cx.resolver.is_in_flight(kind, id))
        .unwrap_or(false);
    let remote_updated_at = E::dto_updated_at(dto);
    if is_local_authoritative(
        local.sync_state(),
        local.updated_at(),
        remote_updated_at,
        in_flight,
    ) {
        debug!(
            "[Sync] Keeping local {} {} (state={:?}, in_flight={})",
            E::TABLE,
            id,
            local.sync_state(),
            in_flight
        );
        E::remote_change_skipped(&cx.store, id);
        return Ok(false);
    }

    let mut row = local;
    E::write_dto(&mut row, dto)?;
    row.meta_mut().mark_synced(now);
    table.put(row.clone());
    E::link(&cx.store, &row);
    Ok(true)
}

/// Remove a row on a realtime hard-delete.
pub(crate) fn delete_local<E: EntitySync>(cx: &SyncCx, id: Uuid) {
    if let Some(row) = E::table(&cx.store).remove(id) {
        E::unlink(&cx.store, &row);
        debug!("[Sync] Deleted {} {} after remote hard-delete", E::TABLE, id);
    }
}

/// Push every dirty row of the entity.
pub(crate) async fn sync_up<E: EntitySync>(cx: &SyncCx) -> PushOutcome {
    let rows = E::table(&cx.store).dirty();
    sync_up_rows::<E>(cx, rows).await
}

/// Push a pre-selected set of dirty rows with in-flight protection.
pub(crate) async fn sync_up_rows<E: EntitySync>(cx: &SyncCx, rows: Vec<E::Row>) -> PushOutcome {
    if rows.is_empty() {
        return PushOutcome::default();
    }

    let ids: Vec<Uuid> = rows.iter().map(SyncRecord::id).collect();
    // mark before any network I/O so echoes arriving mid-push are suppressed
    if let Some(kind) = E::IN_FLIGHT {
        cx.resolver.mark(kind, &ids);
    }
    let outcome = push_rows::<E>(cx, &rows).await;
    if let Some(kind) = E::IN_FLIGHT {
        cx.resolver.clear(kind);
    }
    outcome
}

async fn push_rows<E: EntitySync>(cx: &SyncCx, rows: &[E::Row]) -> PushOutcome {
    let table = E::table(&cx.store);
    let mut outcome = PushOutcome::default();

    let mut payloads = Vec::with_capacity(rows.len());
    for row in rows {
        match serde_json::to_value(E::push_dto(row)) {
            Ok(value) => payloads.push((row.id(), value)),
            Err(err) => {
                table.mark_failed(row.id(), &format!("Sync failed: {}", err));
                outcome.failed += 1;
            }
        }
    }
    if payloads.is_empty() {
        return outcome;
    }

    let batch: Vec<serde_json::Value> = payloads.iter().map(|(_, v)| v.clone()).collect();
    match cx.remote.upsert(E::TABLE, batch).await {
        Ok(()) => {
            let now = cx.clock.now();
            for (id, _) in &payloads {
                table.mark_synced(*id, now);
            }
            outcome.pushed += payloads.len();
            outcome
        }
        Err(batch_err) => {
            warn!(
                "[Sync] Batch push of {} {} rows failed ({}); isolating per-row",
                payloads.len(),
                E::TABLE,
                batch_err
            );
            outcome.note_error(batch_err);
            // sequential on purpose: isolates the poisonous row
            for (id, value) in payloads {
                match cx.remote.upsert(E::TABLE, vec![value]).await {
                    Ok(()) => {
                        table.mark_synced(id, cx.clock.now());
                        outcome.pushed += 1;
                    }
                    Err(err) => {
                        table.mark_failed(id, &user_facing_message(&err, E::TABLE));
                        outcome.note_error(err);
                        outcome.failed += 1;
                    }
                }
            }
            outcome
        }
    }
}
