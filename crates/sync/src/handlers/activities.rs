//! Activity sync handler.

use chrono::{DateTime, Utc};
use log::warn;
use uuid::Uuid;

use hearth_core::dto::ActivityDto;
use hearth_core::errors::Result;
use hearth_core::model::Activity;
use hearth_core::store::{EntityTable, LinkOutcome, Store};
use hearth_core::tables::Table;

use super::EntitySync;
use crate::resolver::InFlightKind;

pub(crate) struct ActivitySync;

impl EntitySync for ActivitySync {
    type Row = Activity;
    type Dto = ActivityDto;

    const TABLE: Table = Table::Activities;
    const IN_FLIGHT: Option<InFlightKind> = Some(InFlightKind::Activities);

    fn table(store: &Store) -> &EntityTable<Activity> {
        &store.activities
    }

    fn dto_id(dto: &ActivityDto) -> Uuid {
        dto.id
    }

    fn dto_updated_at(dto: &ActivityDto) -> DateTime<Utc> {
        dto.updated_at
    }

    fn row_from_dto(dto: &ActivityDto) -> Result<Activity> {
        Ok(dto.clone().into_row())
    }

    fn write_dto(row: &mut Activity, dto: &ActivityDto) -> Result<()> {
        dto.write_to(row);
        Ok(())
    }

    fn push_dto(row: &Activity) -> ActivityDto {
        ActivityDto::from_row(row)
    }

    fn link(store: &Store, row: &Activity) {
        if store.link_activity_to_listing(row.id, row.listing_id) == LinkOutcome::Deferred {
            warn!(
                "[Sync] Deferred relationship: activity {} references missing listing {:?}",
                row.id, row.listing_id
            );
        }
    }

    fn unlink(store: &Store, row: &Activity) {
        store.unlink_activity(row.id);
    }
}
