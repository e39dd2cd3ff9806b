//! Free-text notes attached to a task, activity, or listing.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::meta::{SyncMeta, SyncRecord};

/// Polymorphic note parent as a tagged variant rather than a free-floating
/// `(type, id)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NoteParent {
    Task(Uuid),
    Activity(Uuid),
    Listing(Uuid),
}

impl NoteParent {
    /// Wire value of the `parent_type` column.
    pub fn type_str(&self) -> &'static str {
        match self {
            NoteParent::Task(_) => "task",
            NoteParent::Activity(_) => "activity",
            NoteParent::Listing(_) => "listing",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            NoteParent::Task(id) | NoteParent::Activity(id) | NoteParent::Listing(id) => *id,
        }
    }

    /// Rebuild from the wire `(parent_type, parent_id)` pair.
    pub fn from_parts(parent_type: &str, parent_id: Uuid) -> Option<Self> {
        match parent_type {
            "task" => Some(NoteParent::Task(parent_id)),
            "activity" => Some(NoteParent::Activity(parent_id)),
            "listing" => Some(NoteParent::Listing(parent_id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Note {
    pub id: Uuid,
    pub content: String,
    pub parent: NoteParent,
    pub created_by: Option<Uuid>,
    pub edited_at: Option<DateTime<Utc>>,
    pub edited_by: Option<Uuid>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
    /// Set when a remote change arrived while this note was pending; cleared
    /// on the next successful push.
    pub has_remote_change_while_pending: bool,
    pub meta: SyncMeta,
}

impl SyncRecord for Note {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_round_trips_through_wire_parts() {
        let id = Uuid::new_v4();
        for parent in [
            NoteParent::Task(id),
            NoteParent::Activity(id),
            NoteParent::Listing(id),
        ] {
            let rebuilt = NoteParent::from_parts(parent.type_str(), parent.id()).unwrap();
            assert_eq!(rebuilt, parent);
        }
        assert!(NoteParent::from_parts("contact", id).is_none());
    }
}
