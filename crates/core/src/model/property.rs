//! Physical properties a listing may be attached to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::meta::{SyncMeta, SyncRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Residential,
    Commercial,
    Land,
    Other,
}

#[derive(Debug, Clone)]
pub struct Property {
    pub id: Uuid,
    pub address: String,
    pub unit: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
    pub kind: PropertyKind,
    pub deleted_at: Option<DateTime<Utc>>,
    pub meta: SyncMeta,
}

impl SyncRecord for Property {
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
