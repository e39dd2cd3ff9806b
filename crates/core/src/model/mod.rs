//! Domain entities held in the local graph store.

mod activity;
mod assignee;
mod listing;
mod note;
mod property;
mod reference;
mod task;
mod user;

pub use activity::Activity;
pub use assignee::{ActivityAssignee, TaskAssignee};
pub use listing::{Listing, ListingStage, ListingStatus};
pub use note::{Note, NoteParent};
pub use property::{Property, PropertyKind};
pub use reference::{ActivityTemplate, ListingTypeDefinition};
pub use task::Task;
pub use user::{User, UserRole};

use serde::{Deserialize, Serialize};

/// Work item status shared by tasks and activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Open,
    Completed,
    Deleted,
}
