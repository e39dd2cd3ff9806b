//! Activities: scheduled work items with an optional duration.
//!
//! Structurally a task plus `duration_minutes`; kept as a separate entity to
//! preserve the wire-level schema.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::meta::{SyncMeta, SyncRecord};
use crate::model::WorkStatus;

#[derive(Debug, Clone)]
pub struct Activity {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub status: WorkStatus,
    pub duration_minutes: Option<i32>,
    pub completed_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub listing_id: Option<Uuid>,
    pub meta: SyncMeta,
}

impl SyncRecord for Activity {
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
