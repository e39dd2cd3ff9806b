//! Listing sync handler.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use hearth_core::dto::ListingDto;
use hearth_core::errors::Result;
use hearth_core::model::Listing;
use hearth_core::store::{EntityTable, Store};
use hearth_core::tables::Table;

use super::EntitySync;
use crate::resolver::InFlightKind;

pub(crate) struct ListingSync;

impl EntitySync for ListingSync {
    type Row = Listing;
    type Dto = ListingDto;

    const TABLE: Table = Table::Listings;
    const IN_FLIGHT: Option<InFlightKind> = Some(InFlightKind::Listings);

    fn table(store: &Store) -> &EntityTable<Listing> {
        &store.listings
    }

    fn dto_id(dto: &ListingDto) -> Uuid {
        dto.id
    }

    fn dto_updated_at(dto: &ListingDto) -> DateTime<Utc> {
        dto.updated_at
    }

    fn row_from_dto(dto: &ListingDto) -> Result<Listing> {
        Ok(dto.clone().into_row())
    }

    fn write_dto(row: &mut Listing, dto: &ListingDto) -> Result<()> {
        dto.write_to(row);
        Ok(())
    }

    fn push_dto(row: &Listing) -> ListingDto {
        ListingDto::from_row(row)
    }

    // Owner and property links may not resolve yet; the relationship
    // reconciliation pass heals whatever is left after syncDown.
    fn link(store: &Store, row: &Listing) {
        if let Some(user_id) = row.owned_by {
            store.link_listing_owner(row.id, user_id);
        }
        if let Some(property_id) = row.property_id {
            store.link_listing_property(row.id, property_id);
        }
    }

    fn unlink(store: &Store, row: &Listing) {
        store.unlink_listing(row.id);
    }
}
