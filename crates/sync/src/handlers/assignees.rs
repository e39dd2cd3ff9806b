//! Assignee join-row handlers.
//!
//! Assignee pushes are scoped to parent ids captured before the parent push:
//! task/activity `syncUp` flips parents to `synced`, and the capture keeps
//! the assignee pass from skipping work it was queued for.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use log::warn;
use uuid::Uuid;

use hearth_core::dto::{ActivityAssigneeDto, TaskAssigneeDto};
use hearth_core::errors::Result;
use hearth_core::model::{ActivityAssignee, TaskAssignee};
use hearth_core::store::{EntityTable, LinkOutcome, Store};
use hearth_core::tables::Table;

use super::{sync_up_rows, EntitySync, PushOutcome, SyncCx};
use crate::resolver::InFlightKind;

pub(crate) struct TaskAssigneeSync;

impl EntitySync for TaskAssigneeSync {
    type Row = TaskAssignee;
    type Dto = TaskAssigneeDto;

    const TABLE: Table = Table::TaskAssignees;
    const IN_FLIGHT: Option<InFlightKind> = Some(InFlightKind::TaskAssignees);

    fn table(store: &Store) -> &EntityTable<TaskAssignee> {
        &store.task_assignees
    }

    fn dto_id(dto: &TaskAssigneeDto) -> Uuid {
        dto.id
    }

    fn dto_updated_at(dto: &TaskAssigneeDto) -> DateTime<Utc> {
        dto.updated_at
    }

    fn row_from_dto(dto: &TaskAssigneeDto) -> Result<TaskAssignee> {
        Ok(dto.clone().into_row())
    }

    fn write_dto(row: &mut TaskAssignee, dto: &TaskAssigneeDto) -> Result<()> {
        dto.write_to(row);
        Ok(())
    }

    fn push_dto(row: &TaskAssignee) -> TaskAssigneeDto {
        TaskAssigneeDto::from_row(row)
    }

    fn link(store: &Store, row: &TaskAssignee) {
        if store.index_task_assignee(row.id, row.task_id) == LinkOutcome::Deferred {
            warn!(
                "[Sync] Deferred relationship: assignee {} references missing task {}",
                row.id, row.task_id
            );
        }
    }

    fn unlink(store: &Store, row: &TaskAssignee) {
        store.unlink_task_assignee(row.id, row.task_id);
    }
}

pub(crate) struct ActivityAssigneeSync;

impl EntitySync for ActivityAssigneeSync {
    type Row = ActivityAssignee;
    type Dto = ActivityAssigneeDto;

    const TABLE: Table = Table::ActivityAssignees;
    const IN_FLIGHT: Option<InFlightKind> = Some(InFlightKind::ActivityAssignees);

    fn table(store: &Store) -> &EntityTable<ActivityAssignee> {
        &store.activity_assignees
    }

    fn dto_id(dto: &ActivityAssigneeDto) -> Uuid {
        dto.id
    }

    fn dto_updated_at(dto: &ActivityAssigneeDto) -> DateTime<Utc> {
        dto.updated_at
    }

    fn row_from_dto(dto: &ActivityAssigneeDto) -> Result<ActivityAssignee> {
        Ok(dto.clone().into_row())
    }

    fn write_dto(row: &mut ActivityAssignee, dto: &ActivityAssigneeDto) -> Result<()> {
        dto.write_to(row);
        Ok(())
    }

    fn push_dto(row: &ActivityAssignee) -> ActivityAssigneeDto {
        ActivityAssigneeDto::from_row(row)
    }

    fn link(store: &Store, row: &ActivityAssignee) {
        if store.index_activity_assignee(row.id, row.activity_id) == LinkOutcome::Deferred {
            warn!(
                "[Sync] Deferred relationship: assignee {} references missing activity {}",
                row.id, row.activity_id
            );
        }
    }

    fn unlink(store: &Store, row: &ActivityAssignee) {
        store.unlink_activity_assignee(row.id, row.activity_id);
    }
}

/// Push dirty task assignees whose parent was captured as pending before the
/// task pass ran.
pub(crate) async fn sync_up_task_assignees(
    cx: &SyncCx,
    captured_tasks: &BTreeSet<Uuid>,
) -> PushOutcome {
    let rows: Vec<TaskAssignee> = cx
        .store
        .task_assignees
        .dirty()
        .into_iter()
        .filter(|row| captured_tasks.contains(&row.task_id))
        .collect();
    sync_up_rows::<TaskAssigneeSync>(cx, rows).await
}

/// Push dirty activity assignees for captured parent ids.
pub(crate) async fn sync_up_activity_assignees(
    cx: &SyncCx,
    captured_activities: &BTreeSet<Uuid>,
) -> PushOutcome {
    let rows: Vec<ActivityAssignee> = cx
        .store
        .activity_assignees
        .dirty()
        .into_iter()
        .filter(|row| captured_activities.contains(&row.activity_id))
        .collect();
    sync_up_rows::<ActivityAssigneeSync>(cx, rows).await
}
