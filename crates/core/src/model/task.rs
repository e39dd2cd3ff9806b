//! Tasks: dated work items, optionally attached to a listing.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::meta::{SyncMeta, SyncRecord};
use crate::model::WorkStatus;

#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: WorkStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Back-reference to the owning listing; the listing's task collection
    /// is the derived index in the store.
    pub listing_id: Option<Uuid>,
    pub meta: SyncMeta,
}

impl SyncRecord for Task {
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
