//! Property sync handler.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use hearth_core::dto::PropertyDto;
use hearth_core::errors::Result;
use hearth_core::model::Property;
use hearth_core::store::{EntityTable, Store};
use hearth_core::tables::Table;

use super::EntitySync;
use crate::resolver::InFlightKind;

pub(crate) struct PropertySync;

impl EntitySync for PropertySync {
    type Row = Property;
    type Dto = PropertyDto;

    const TABLE: Table = Table::Properties;
    const IN_FLIGHT: Option<InFlightKind> = Some(InFlightKind::Properties);

    fn table(store: &Store) -> &EntityTable<Property> {
        &store.properties
    }

    fn dto_id(dto: &PropertyDto) -> Uuid {
        dto.id
    }

    fn dto_updated_at(dto: &PropertyDto) -> DateTime<Utc> {
        dto.updated_at
    }

    fn row_from_dto(dto: &PropertyDto) -> Result<Property> {
        Ok(dto.clone().into_row())
    }

    fn write_dto(row: &mut Property, dto: &PropertyDto) -> Result<()> {
        dto.write_to(row);
        Ok(())
    }

    fn push_dto(row: &Property) -> PropertyDto {
        PropertyDto::from_row(row)
    }
}
