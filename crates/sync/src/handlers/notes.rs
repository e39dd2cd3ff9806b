//! Note sync handler.
//!
//! Notes push INSERT-first and fall back to a column-restricted UPDATE on a
//! primary-key conflict, respecting the server's column-level grants on
//! existing rows.

use chrono::{DateTime, Utc};
use log::warn;
use uuid::Uuid;

use hearth_core::dto::{NoteDto, NoteUpdateDto};
use hearth_core::errors::{user_facing_message, Result};
use hearth_core::meta::SyncRecord;
use hearth_core::model::Note;
use hearth_core::store::{EntityTable, Store};
use hearth_core::tables::Table;

use super::{EntitySync, PushOutcome, SyncCx};
use crate::resolver::InFlightKind;

pub(crate) struct NoteSync;

impl EntitySync for NoteSync {
    type Row = Note;
    type Dto = NoteDto;

    const TABLE: Table = Table::Notes;
    const IN_FLIGHT: Option<InFlightKind> = Some(InFlightKind::Notes);

    fn table(store: &Store) -> &EntityTable<Note> {
        &store.notes
    }

    fn dto_id(dto: &NoteDto) -> Uuid {
        dto.id
    }

    fn dto_updated_at(dto: &NoteDto) -> DateTime<Utc> {
        dto.updated_at
    }

    fn row_from_dto(dto: &NoteDto) -> Result<Note> {
        dto.clone().into_row()
    }

    fn write_dto(row: &mut Note, dto: &NoteDto) -> Result<()> {
        dto.write_to(row)
    }

    fn push_dto(row: &Note) -> NoteDto {
        NoteDto::from_row(row)
    }

    fn remote_change_skipped(store: &Store, id: Uuid) {
        store.notes.update(id, |note| {
            note.has_remote_change_while_pending = true;
        });
    }
}

/// Push dirty notes: INSERT, then UPDATE-if-conflict.
pub(crate) async fn sync_up_notes(cx: &SyncCx) -> PushOutcome {
    let rows = cx.store.notes.dirty();
    if rows.is_empty() {
        return PushOutcome::default();
    }

    let ids: Vec<Uuid> = rows.iter().map(SyncRecord::id).collect();
    cx.resolver.mark(InFlightKind::Notes, &ids);
    let outcome = push_notes(cx, rows).await;
    cx.resolver.clear(InFlightKind::Notes);
    outcome
}

async fn push_notes(cx: &SyncCx, rows: Vec<Note>) -> PushOutcome {
    let mut outcome = PushOutcome::default();

    for note in rows {
        let id = note.id;
        let insert_payload = match serde_json::to_value(NoteDto::from_row(&note)) {
            Ok(value) => value,
            Err(err) => {
                cx.store
                    .notes
                    .mark_failed(id, &format!("Sync failed: {}", err));
                outcome.failed += 1;
                continue;
            }
        };

        let result = match cx.remote.insert(Table::Notes, insert_payload).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_unique_violation() => {
                let patch = match serde_json::to_value(NoteUpdateDto::from_row(&note)) {
                    Ok(value) => value,
                    Err(err) => {
                        cx.store
                            .notes
                            .mark_failed(id, &format!("Sync failed: {}", err));
                        outcome.failed += 1;
                        continue;
                    }
                };
                cx.remote.update_by_id(Table::Notes, id, patch).await
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(()) => {
                let now = cx.clock.now();
                cx.store.notes.update(id, |row| {
                    row.meta.mark_synced(now);
                    row.has_remote_change_while_pending = false;
                });
                outcome.pushed += 1;
            }
            Err(err) => {
                warn!("[Sync] Note {} push failed: {}", id, err);
                cx.store
                    .notes
                    .mark_failed(id, &user_facing_message(&err, Table::Notes));
                if outcome.transport_error.is_none()
                    && err.retry_class() == hearth_core::errors::RetryClass::Retryable
                {
                    outcome.transport_error = Some(err);
                }
                outcome.failed += 1;
            }
        }
    }

    outcome
}
