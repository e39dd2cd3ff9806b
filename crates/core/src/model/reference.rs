//! Admin-managed reference data: listing types and activity templates.

use uuid::Uuid;

use crate::meta::{SyncMeta, SyncRecord};

#[derive(Debug, Clone)]
pub struct ListingTypeDefinition {
    pub id: Uuid,
    pub name: String,
    pub sort_order: Option<i32>,
    pub meta: SyncMeta,
}

impl SyncRecord for ListingTypeDefinition {
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

/// Template from which activities are stamped out for a listing type.
#[derive(Debug, Clone)]
pub struct ActivityTemplate {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub listing_type_id: Uuid,
    pub default_duration_minutes: Option<i32>,
    pub meta: SyncMeta,
}

impl SyncRecord for ActivityTemplate {
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
