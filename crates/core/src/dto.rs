//! Wire DTOs for the remote table API and realtime payloads.
//!
//! Column names are the remote `snake_case` schema. Each DTO can be built
//! from a local row for a push, materialized into a fresh local row, or
//! written over an existing row's scalars (mirroring `updated_at`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Error, Result};
use crate::meta::SyncMeta;
use crate::model::{
    Activity, ActivityAssignee, ActivityTemplate, Listing, ListingStage, ListingStatus,
    ListingTypeDefinition, Note, NoteParent, Property, PropertyKind, Task, TaskAssignee, User,
    UserRole, WorkStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(default)]
    pub avatar_path: Option<String>,
    #[serde(default)]
    pub avatar_hash: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserDto {
    pub fn from_row(row: &User) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            email: row.email.clone(),
            role: row.role,
            avatar_path: row.avatar_path.clone(),
            avatar_hash: row.avatar_hash.clone(),
            updated_at: row.meta.updated_at,
        }
    }

    pub fn into_row(self) -> User {
        let meta = SyncMeta::remote(self.updated_at);
        User {
            id: self.id,
            name: self.name,
            email: self.email,
            role: self.role,
            avatar: None,
            avatar_hash: self.avatar_hash,
            avatar_path: self.avatar_path,
            meta,
        }
    }

    pub fn write_to(&self, row: &mut User) {
        row.name = self.name.clone();
        row.email = self.email.clone();
        row.role = self.role;
        row.avatar_hash = self.avatar_hash.clone();
        row.avatar_path = self.avatar_path.clone();
        row.meta.updated_at = self.updated_at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyDto {
    pub id: Uuid,
    pub address: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(rename = "type")]
    pub kind: PropertyKind,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl PropertyDto {
    pub fn from_row(row: &Property) -> Self {
        Self {
            id: row.id,
            address: row.address.clone(),
            unit: row.unit.clone(),
            city: row.city.clone(),
            province: row.province.clone(),
            postal_code: row.postal_code.clone(),
            country: row.country.clone(),
            kind: row.kind,
            deleted_at: row.deleted_at,
            updated_at: row.meta.updated_at,
        }
    }

    pub fn into_row(self) -> Property {
        let meta = SyncMeta::remote(self.updated_at);
        Property {
            id: self.id,
            address: self.address,
            unit: self.unit,
            city: self.city,
            province: self.province,
            postal_code: self.postal_code,
            country: self.country,
            kind: self.kind,
            deleted_at: self.deleted_at,
            meta,
        }
    }

    pub fn write_to(&self, row: &mut Property) {
        row.address = self.address.clone();
        row.unit = self.unit.clone();
        row.city = self.city.clone();
        row.province = self.province.clone();
        row.postal_code = self.postal_code.clone();
        row.country = self.country.clone();
        row.kind = self.kind;
        row.deleted_at = self.deleted_at;
        row.meta.updated_at = self.updated_at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDto {
    pub id: Uuid,
    pub address: String,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub mls_number: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub status: ListingStatus,
    #[serde(default)]
    pub stage: ListingStage,
    #[serde(default)]
    pub activated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pending_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owned_by: Option<Uuid>,
    #[serde(default)]
    pub property_id: Option<Uuid>,
    #[serde(default)]
    pub listing_type_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl ListingDto {
    pub fn from_row(row: &Listing) -> Self {
        Self {
            id: row.id,
            address: row.address.clone(),
            price: row.price,
            mls_number: row.mls_number.clone(),
            kind: row.kind.clone(),
            status: row.status,
            stage: row.stage,
            activated_at: row.activated_at,
            pending_at: row.pending_at,
            closed_at: row.closed_at,
            due_date: row.due_date,
            deleted_at: row.deleted_at,
            owned_by: row.owned_by,
            property_id: row.property_id,
            listing_type_id: row.listing_type_id,
            updated_at: row.meta.updated_at,
        }
    }

    pub fn into_row(self) -> Listing {
        let meta = SyncMeta::remote(self.updated_at);
        Listing {
            id: self.id,
            address: self.address,
            price: self.price,
            mls_number: self.mls_number,
            kind: self.kind,
            status: self.status,
            stage: self.stage,
            activated_at: self.activated_at,
            pending_at: self.pending_at,
            closed_at: self.closed_at,
            due_date: self.due_date,
            deleted_at: self.deleted_at,
            owned_by: self.owned_by,
            property_id: self.property_id,
            listing_type_id: self.listing_type_id,
            meta,
        }
    }

    pub fn write_to(&self, row: &mut Listing) {
        row.address = self.address.clone();
        row.price = self.price;
        row.mls_number = self.mls_number.clone();
        row.kind = self.kind.clone();
        row.status = self.status;
        row.stage = self.stage;
        row.activated_at = self.activated_at;
        row.pending_at = self.pending_at;
        row.closed_at = self.closed_at;
        row.due_date = self.due_date;
        row.deleted_at = self.deleted_at;
        row.owned_by = self.owned_by;
        row.property_id = self.property_id;
        row.listing_type_id = self.listing_type_id;
        row.meta.updated_at = self.updated_at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDto {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    pub status: WorkStatus,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub listing_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl TaskDto {
    pub fn from_row(row: &Task) -> Self {
        Self {
            id: row.id,
            title: row.title.clone(),
            description: row.description.clone(),
            due_date: row.due_date,
            status: row.status,
            completed_at: row.completed_at,
            deleted_at: row.deleted_at,
            listing_id: row.listing_id,
            updated_at: row.meta.updated_at,
        }
    }

    pub fn into_row(self) -> Task {
        let meta = SyncMeta::remote(self.updated_at);
        Task {
            id: self.id,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            status: self.status,
            completed_at: self.completed_at,
            deleted_at: self.deleted_at,
            listing_id: self.listing_id,
            meta,
        }
    }

    pub fn write_to(&self, row: &mut Task) {
        row.title = self.title.clone();
        row.description = self.description.clone();
        row.due_date = self.due_date;
        row.status = self.status;
        row.completed_at = self.completed_at;
        row.deleted_at = self.deleted_at;
        row.listing_id = self.listing_id;
        row.meta.updated_at = self.updated_at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDto {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    pub status: WorkStatus,
    #[serde(default)]
    pub duration_minutes: Option<i32>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub listing_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl ActivityDto {
    pub fn from_row(row: &Activity) -> Self {
        Self {
            id: row.id,
            title: row.title.clone(),
            description: row.description.clone(),
            due_date: row.due_date,
            status: row.status,
            duration_minutes: row.duration_minutes,
            completed_at: row.completed_at,
            deleted_at: row.deleted_at,
            listing_id: row.listing_id,
            updated_at: row.meta.updated_at,
        }
    }

    pub fn into_row(self) -> Activity {
        let meta = SyncMeta::remote(self.updated_at);
        Activity {
            id: self.id,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            status: self.status,
            duration_minutes: self.duration_minutes,
            completed_at: self.completed_at,
            deleted_at: self.deleted_at,
            listing_id: self.listing_id,
            meta,
        }
    }

    pub fn write_to(&self, row: &mut Activity) {
        row.title = self.title.clone();
        row.description = self.description.clone();
        row.due_date = self.due_date;
        row.status = self.status;
        row.duration_minutes = self.duration_minutes;
        row.completed_at = self.completed_at;
        row.deleted_at = self.deleted_at;
        row.listing_id = self.listing_id;
        row.meta.updated_at = self.updated_at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAssigneeDto {
    pub id: Uuid,
    pub task_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskAssigneeDto {
    pub fn from_row(row: &TaskAssignee) -> Self {
        Self {
            id: row.id,
            task_id: row.task_id,
            user_id: row.user_id,
            assigned_by: row.assigned_by,
            assigned_at: row.assigned_at,
            updated_at: row.meta.updated_at,
        }
    }

    pub fn into_row(self) -> TaskAssignee {
        let meta = SyncMeta::remote(self.updated_at);
        TaskAssignee {
            id: self.id,
            task_id: self.task_id,
            user_id: self.user_id,
            assigned_by: self.assigned_by,
            assigned_at: self.assigned_at,
            meta,
        }
    }

    pub fn write_to(&self, row: &mut TaskAssignee) {
        row.task_id = self.task_id;
        row.user_id = self.user_id;
        row.assigned_by = self.assigned_by;
        row.assigned_at = self.assigned_at;
        row.meta.updated_at = self.updated_at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityAssigneeDto {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ActivityAssigneeDto {
    pub fn from_row(row: &ActivityAssignee) -> Self {
        Self {
            id: row.id,
            activity_id: row.activity_id,
            user_id: row.user_id,
            assigned_by: row.assigned_by,
            assigned_at: row.assigned_at,
            updated_at: row.meta.updated_at,
        }
    }

    pub fn into_row(self) -> ActivityAssignee {
        let meta = SyncMeta::remote(self.updated_at);
        ActivityAssignee {
            id: self.id,
            activity_id: self.activity_id,
            user_id: self.user_id,
            assigned_by: self.assigned_by,
            assigned_at: self.assigned_at,
            meta,
        }
    }

    pub fn write_to(&self, row: &mut ActivityAssignee) {
        row.activity_id = self.activity_id;
        row.user_id = self.user_id;
        row.assigned_by = self.assigned_by;
        row.assigned_at = self.assigned_at;
        row.meta.updated_at = self.updated_at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteDto {
    pub id: Uuid,
    pub content: String,
    pub parent_type: String,
    pub parent_id: Uuid,
    #[serde(default)]
    pub created_by: Option<Uuid>,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub edited_by: Option<Uuid>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl NoteDto {
    pub fn from_row(row: &Note) -> Self {
        Self {
            id: row.id,
            content: row.content.clone(),
            parent_type: row.parent.type_str().to_string(),
            parent_id: row.parent.id(),
            created_by: row.created_by,
            edited_at: row.edited_at,
            edited_by: row.edited_by,
            deleted_at: row.deleted_at,
            deleted_by: row.deleted_by,
            updated_at: row.meta.updated_at,
        }
    }

    pub fn parent(&self) -> Result<NoteParent> {
        NoteParent::from_parts(&self.parent_type, self.parent_id).ok_or_else(|| {
            Error::decode(format!("unknown note parent type '{}'", self.parent_type))
        })
    }

    pub fn into_row(self) -> Result<Note> {
        let parent = self.parent()?;
        let meta = SyncMeta::remote(self.updated_at);
        Ok(Note {
            id: self.id,
            content: self.content,
            parent,
            created_by: self.created_by,
            edited_at: self.edited_at,
            edited_by: self.edited_by,
            deleted_at: self.deleted_at,
            deleted_by: self.deleted_by,
            has_remote_change_while_pending: false,
            meta,
        })
    }

    pub fn write_to(&self, row: &mut Note) -> Result<()> {
        row.content = self.content.clone();
        row.parent = self.parent()?;
        row.created_by = self.created_by;
        row.edited_at = self.edited_at;
        row.edited_by = self.edited_by;
        row.deleted_at = self.deleted_at;
        row.deleted_by = self.deleted_by;
        row.meta.updated_at = self.updated_at;
        Ok(())
    }
}

/// Column-restricted note update, limited to what the server grants the
/// client on existing rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteUpdateDto {
    pub content: String,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub edited_by: Option<Uuid>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_by: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl NoteUpdateDto {
    pub fn from_row(row: &Note) -> Self {
        Self {
            content: row.content.clone(),
            edited_at: row.edited_at,
            edited_by: row.edited_by,
            deleted_at: row.deleted_at,
            deleted_by: row.deleted_by,
            updated_at: row.meta.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingTypeDto {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub sort_order: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

impl ListingTypeDto {
    pub fn from_row(row: &ListingTypeDefinition) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            sort_order: row.sort_order,
            updated_at: row.meta.updated_at,
        }
    }

    pub fn into_row(self) -> ListingTypeDefinition {
        let meta = SyncMeta::remote(self.updated_at);
        ListingTypeDefinition {
            id: self.id,
            name: self.name,
            sort_order: self.sort_order,
            meta,
        }
    }

    pub fn write_to(&self, row: &mut ListingTypeDefinition) {
        row.name = self.name.clone();
        row.sort_order = self.sort_order;
        row.meta.updated_at = self.updated_at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityTemplateDto {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub listing_type_id: Uuid,
    #[serde(default)]
    pub default_duration_minutes: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

impl ActivityTemplateDto {
    pub fn from_row(row: &ActivityTemplate) -> Self {
        Self {
            id: row.id,
            name: row.name.clone(),
            description: row.description.clone(),
            listing_type_id: row.listing_type_id,
            default_duration_minutes: row.default_duration_minutes,
            updated_at: row.meta.updated_at,
        }
    }

    pub fn into_row(self) -> ActivityTemplate {
        let meta = SyncMeta::remote(self.updated_at);
        ActivityTemplate {
            id: self.id,
            name: self.name,
            description: self.description,
            listing_type_id: self.listing_type_id,
            default_duration_minutes: self.default_duration_minutes,
            meta,
        }
    }

    pub fn write_to(&self, row: &mut ActivityTemplate) {
        row.name = self.name.clone();
        row.description = self.description.clone();
        row.listing_type_id = self.listing_type_id;
        row.default_duration_minutes = self.default_duration_minutes;
        row.meta.updated_at = self.updated_at;
    }
}
