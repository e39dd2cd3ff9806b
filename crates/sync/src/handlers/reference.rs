//! Reference-data handlers: listing types and activity templates.

use chrono::{DateTime, Utc};
use log::warn;
use uuid::Uuid;

use hearth_core::dto::{ActivityTemplateDto, ListingTypeDto};
use hearth_core::errors::Result;
use hearth_core::model::{ActivityTemplate, ListingTypeDefinition};
use hearth_core::store::{EntityTable, Store};
use hearth_core::tables::Table;

use super::{apply_remote, EntitySync, SyncCx};
use crate::resolver::InFlightKind;

pub(crate) struct ListingTypeSync;

impl EntitySync for ListingTypeSync {
    type Row = ListingTypeDefinition;
    type Dto = ListingTypeDto;

    const TABLE: Table = Table::ListingTypes;
    const IN_FLIGHT: Option<InFlightKind> = None;

    fn table(store: &Store) -> &EntityTable<ListingTypeDefinition> {
        &store.listing_types
    }

    fn dto_id(dto: &ListingTypeDto) -> Uuid {
        dto.id
    }

    fn dto_updated_at(dto: &ListingTypeDto) -> DateTime<Utc> {
        dto.updated_at
    }

    fn row_from_dto(dto: &ListingTypeDto) -> Result<ListingTypeDefinition> {
        Ok(dto.clone().into_row())
    }

    fn write_dto(row: &mut ListingTypeDefinition, dto: &ListingTypeDto) -> Result<()> {
        dto.write_to(row);
        Ok(())
    }

    fn push_dto(row: &ListingTypeDefinition) -> ListingTypeDto {
        ListingTypeDto::from_row(row)
    }
}

pub(crate) struct ActivityTemplateSync;

impl EntitySync for ActivityTemplateSync {
    type Row = ActivityTemplate;
    type Dto = ActivityTemplateDto;

    const TABLE: Table = Table::ActivityTemplates;
    const IN_FLIGHT: Option<InFlightKind> = None;

    fn table(store: &Store) -> &EntityTable<ActivityTemplate> {
        &store.activity_templates
    }

    fn dto_id(dto: &ActivityTemplateDto) -> Uuid {
        dto.id
    }

    fn dto_updated_at(dto: &ActivityTemplateDto) -> DateTime<Utc> {
        dto.updated_at
    }

    fn row_from_dto(dto: &ActivityTemplateDto) -> Result<ActivityTemplate> {
        Ok(dto.clone().into_row())
    }

    fn write_dto(row: &mut ActivityTemplate, dto: &ActivityTemplateDto) -> Result<()> {
        dto.write_to(row);
        Ok(())
    }

    fn push_dto(row: &ActivityTemplate) -> ActivityTemplateDto {
        ActivityTemplateDto::from_row(row)
    }
}

/// Two-pass template syncDown: templates whose listing-type FK resolves are
/// applied first; the rest retry against the reference set as it stands after
/// that pass, and whatever still dangles is kept with a deferred warning.
pub(crate) async fn sync_down_activity_templates(
    cx: &SyncCx,
    since: DateTime<Utc>,
) -> Result<usize> {
    let values = cx
        .remote
        .select_updated_since(Table::ActivityTemplates, since)
        .await?;

    let mut deferred = Vec::new();
    let mut applied = 0usize;
    for value in values {
        let dto: ActivityTemplateDto = match serde_json::from_value(value) {
            Ok(dto) => dto,
            Err(err) => {
                warn!("[Sync] Dropping undecodable activity_templates row: {}", err);
                continue;
            }
        };
        if cx.store.listing_types.contains(dto.listing_type_id) {
            if apply_remote::<ActivityTemplateSync>(cx, &dto)? {
                applied += 1;
            }
        } else {
            deferred.push(dto);
        }
    }

    for dto in deferred {
        if !cx.store.listing_types.contains(dto.listing_type_id) {
            warn!(
                "[Sync] Deferred relationship: template {} references missing listing type {}",
                dto.id, dto.listing_type_id
            );
        }
        if apply_remote::<ActivityTemplateSync>(cx, &dto)? {
            applied += 1;
        }
    }
    Ok(applied)
}
