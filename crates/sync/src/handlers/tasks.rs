//! Task sync handler.

use chrono::{DateTime, Utc};
use log::warn;
use uuid::Uuid;

use hearth_core::dto::TaskDto;
use hearth_core::errors::Result;
use hearth_core::model::Task;
use hearth_core::store::{EntityTable, LinkOutcome, Store};
use hearth_core::tables::Table;

use super::EntitySync;
use crate::resolver::InFlightKind;

pub(crate) struct TaskSync;

impl EntitySync for TaskSync {
    type Row = Task;
    type Dto = TaskDto;

    const TABLE: Table = Table::Tasks;
    const IN_FLIGHT: Option<InFlightKind> = Some(InFlightKind::Tasks);

    fn table(store: &Store) -> &EntityTable<Task> {
        &store.tasks
    }

    fn dto_id(dto: &TaskDto) -> Uuid {
        dto.id
    }

    fn dto_updated_at(dto: &TaskDto) -> DateTime<Utc> {
        dto.updated_at
    }

    fn row_from_dto(dto: &TaskDto) -> Result<Task> {
        Ok(dto.clone().into_row())
    }

    fn write_dto(row: &mut Task, dto: &TaskDto) -> Result<()> {
        dto.write_to(row);
        Ok(())
    }

    fn push_dto(row: &Task) -> TaskDto {
        TaskDto::from_row(row)
    }

    fn link(store: &Store, row: &Task) {
        if store.link_task_to_listing(row.id, row.listing_id) == LinkOutcome::Deferred {
            warn!(
                "[Sync] Deferred relationship: task {} references missing listing {:?}",
                row.id, row.listing_id
            );
        }
    }

    fn unlink(store: &Store, row: &Task) {
        store.unlink_task(row.id);
    }
}
