//! Assignee join rows. Independently sync-tracked so an unsynced assignment
//! survives its parent being rewritten by a remote update.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::meta::{SyncMeta, SyncRecord};

#[derive(Debug, Clone)]
pub struct TaskAssignee {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
    pub meta: SyncMeta,
}

impl SyncRecord for TaskAssignee {
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

#[derive(Debug, Clone)]
pub struct ActivityAssignee {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub user_id: Uuid,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
    pub meta: SyncMeta,
}

impl SyncRecord for ActivityAssignee {
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
