//! User profiles.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::meta::{SyncMeta, SyncRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Realtor,
    Other,
}

/// A user profile. The avatar bytes are local-only; the remote row carries
/// the object-storage path and the content hash of the last uploaded image.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    /// Normalized avatar JPEG, present only when an image has been picked.
    pub avatar: Option<Vec<u8>>,
    /// Lower-hex SHA-256 of the avatar bytes last confirmed uploaded.
    pub avatar_hash: Option<String>,
    /// Object-storage key of the uploaded avatar.
    pub avatar_path: Option<String>,
    pub meta: SyncMeta,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

impl SyncRecord for User {
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
