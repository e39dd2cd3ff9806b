//! Listings: the central object of the CRM graph.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::meta::{SyncMeta, SyncRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Draft,
    Active,
    Pending,
    Closed,
    Deleted,
}

/// Pipeline stage. The server mirrors both `status` and `stage`; the engine
/// preserves whatever combination the server hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ListingStage {
    Prep,
    Active,
    Closed,
    #[default]
    Pending,
}

#[derive(Debug, Clone)]
pub struct Listing {
    pub id: Uuid,
    pub address: String,
    pub price: Option<Decimal>,
    pub mls_number: Option<String>,
    /// Free-form listing type label (distinct from the admin-managed
    /// listing-type definition referenced by `listing_type_id`).
    pub kind: Option<String>,
    pub status: ListingStatus,
    pub stage: ListingStage,
    pub activated_at: Option<DateTime<Utc>>,
    pub pending_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub owned_by: Option<Uuid>,
    pub property_id: Option<Uuid>,
    pub listing_type_id: Option<Uuid>,
    pub meta: SyncMeta,
}

impl SyncRecord for Listing {
    fn id(&self) -> Uuid {
        self.id
    }
    fn meta(&self) -> &SyncMeta {
        &self.meta
    }
    fn meta_mut(&mut self) -> &mut SyncMeta {
        &mut self.meta
    }
}
