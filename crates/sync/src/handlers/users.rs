//! User sync handler.
//!
//! Profile pushes are always per-row because they are entangled with the
//! avatar upload: a changed avatar must land in object storage before the
//! profile row may reference it, and an upload failure leaves the whole row
//! `pending` rather than wiping the server-side image.

use chrono::{DateTime, Utc};
use log::warn;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use hearth_core::dto::UserDto;
use hearth_core::errors::{user_facing_message, Result, RetryClass};
use hearth_core::model::User;
use hearth_core::remote::{ObjectStorage, UploadOptions};
use hearth_core::store::{EntityTable, Store};
use hearth_core::tables::Table;

use super::{EntitySync, PushOutcome, SyncCx};
use crate::resolver::InFlightKind;

/// Bucket holding normalized avatar images.
pub(crate) const AVATAR_BUCKET: &str = "avatars";

pub(crate) struct UserSync;

impl EntitySync for UserSync {
    type Row = User;
    type Dto = UserDto;

    const TABLE: Table = Table::Users;
    const IN_FLIGHT: Option<InFlightKind> = None;

    fn table(store: &Store) -> &EntityTable<User> {
        &store.users
    }

    fn dto_id(dto: &UserDto) -> Uuid {
        dto.id
    }

    fn dto_updated_at(dto: &UserDto) -> DateTime<Utc> {
        dto.updated_at
    }

    fn row_from_dto(dto: &UserDto) -> Result<User> {
        Ok(dto.clone().into_row())
    }

    fn write_dto(row: &mut User, dto: &UserDto) -> Result<()> {
        dto.write_to(row);
        Ok(())
    }

    fn push_dto(row: &User) -> UserDto {
        UserDto::from_row(row)
    }
}

pub(crate) fn avatar_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

pub(crate) fn avatar_key(user_id: Uuid) -> String {
    format!("{}.jpg", user_id)
}

/// Per-row user push with avatar upload.
pub(crate) async fn sync_up_users(cx: &SyncCx, storage: &Arc<dyn ObjectStorage>) -> PushOutcome {
    let mut outcome = PushOutcome::default();

    for mut user in cx.store.users.dirty() {
        let id = user.id;

        if let Some(bytes) = user.avatar.clone() {
            let digest = avatar_digest(&bytes);
            if user.avatar_hash.as_deref() != Some(digest.as_str()) {
                let key = avatar_key(id);
                match storage
                    .upload(AVATAR_BUCKET, &key, bytes, UploadOptions::avatar())
                    .await
                {
                    Ok(()) => {
                        user.avatar_hash = Some(digest.clone());
                        user.avatar_path = Some(key.clone());
                        cx.store.users.update(id, |row| {
                            row.avatar_hash = Some(digest.clone());
                            row.avatar_path = Some(key.clone());
                        });
                    }
                    Err(err) => {
                        // abort the profile push; the row stays pending
                        warn!(
                            "[Sync] Avatar upload for user {} failed; deferring profile push: {}",
                            id, err
                        );
                        if outcome.transport_error.is_none()
                            && err.retry_class() == RetryClass::Retryable
                        {
                            outcome.transport_error = Some(err);
                        }
                        outcome.failed += 1;
                        continue;
                    }
                }
            }
        }

        let payload = match serde_json::to_value(UserDto::from_row(&user)) {
            Ok(value) => value,
            Err(err) => {
                cx.store
                    .users
                    .mark_failed(id, &format!("Sync failed: {}", err));
                outcome.failed += 1;
                continue;
            }
        };
        match cx.remote.upsert(Table::Users, vec![payload]).await {
            Ok(()) => {
                cx.store.users.mark_synced(id, cx.clock.now());
                outcome.pushed += 1;
            }
            Err(err) => {
                cx.store
                    .users
                    .mark_failed(id, &user_facing_message(&err, Table::Users));
                if outcome.transport_error.is_none() && err.retry_class() == RetryClass::Retryable {
                    outcome.transport_error = Some(err);
                }
                outcome.failed += 1;
            }
        }
    }

    outcome
}
