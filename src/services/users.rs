use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{ensure_self, Cascade, CascadeOutcome};
use crate::auth::Identity;
use crate::database::models::{password_reset, user, PasswordReset, User};
use crate::database::{Repository, RowQuery};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::BlobStore;

/// Largest decoded avatar accepted
pub const MAX_AVATAR_BYTES: usize = 2 * 1024 * 1024;

pub const AVATAR_TYPES: &[(&str, &str)] = &[
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUser {
    pub email: Option<String>,
    pub username: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    pub email: Option<String>,
    pub username: Option<String>,
    /// Absent leaves the name alone, `null` clears it.
    #[serde(default, deserialize_with = "present")]
    pub full_name: Option<Option<String>>,
}

/// Marks a field as present even when its value is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUser {
    #[serde(default)]
    pub confirm_delete: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarUpload {
    pub content_type: String,
    /// Base64 payload, optionally as a `data:` URL
    pub data: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityQuery {
    pub email: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_available: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username_available: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DeletedUser {
    pub id: String,
    pub cascade: CascadeOutcome,
}

#[derive(Debug, Serialize)]
pub struct AvatarChange {
    pub user: User,
    pub cascade: CascadeOutcome,
}

#[derive(Serialize)]
struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    full_name: Option<Option<String>>,
    updated_at: chrono::DateTime<Utc>,
}

/// Profiles and avatars.
pub struct UserService {
    users: Repository<User>,
    resets: Repository<PasswordReset>,
    blobs: Arc<dyn BlobStore>,
}

impl UserService {
    pub fn new(state: &AppState) -> Self {
        Self {
            users: Repository::new(user::TABLE, state.rows.clone()),
            resets: Repository::new(password_reset::TABLE, state.rows.clone()),
            blobs: state.blobs.clone(),
        }
    }

    pub async fn create_profile(&self, identity: &Identity, input: CreateUser) -> Result<User, ApiError> {
        if self.users.find_by_id(&identity.subject_id).await?.is_some() {
            return Err(ApiError::conflict("User profile already exists"));
        }

        let email = normalize_email(input.email.as_deref().unwrap_or(&identity.email));
        let username = input.username.trim().to_string();
        self.ensure_email_free(&email).await?;
        self.ensure_username_free(&username).await?;

        let now = Utc::now();
        let record = User {
            id: identity.subject_id.clone(),
            email,
            username,
            full_name: input.full_name,
            avatar_url: None,
            avatar_path: None,
            created_at: now,
            updated_at: now,
        };
        let created = self.users.insert(&record).await?;
        info!("Created profile {} ({})", created.id, created.username);
        Ok(created)
    }

    pub async fn get_user(&self, id: &str) -> Result<Option<User>, ApiError> {
        Ok(self.users.find_by_id(id).await?)
    }

    pub async fn update_user(&self, identity: &Identity, id: &str, input: UpdateUser) -> Result<User, ApiError> {
        ensure_self(identity, id, "modify")?;
        let existing = self.require(id).await?;

        let email = input.email.as_deref().map(normalize_email);
        if let Some(email) = email.as_deref().filter(|e| *e != existing.email) {
            self.ensure_email_free(email).await?;
        }
        let username = input.username.map(|u| u.trim().to_string());
        if let Some(username) = username.as_deref().filter(|u| *u != existing.username) {
            self.ensure_username_free(username).await?;
        }

        let patch = UserPatch {
            email,
            username,
            full_name: input.full_name,
            updated_at: Utc::now(),
        };
        self.users
            .update_by_id(id, &patch)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    /// Removes the profile. Avatar and pending reset cleanup never block it.
    pub async fn delete_user(&self, identity: &Identity, id: &str, input: DeleteUser) -> Result<DeletedUser, ApiError> {
        if !input.confirm_delete {
            return Err(ApiError::bad_request(
                "Account deletion must be confirmed with confirmDelete: true",
            ));
        }
        ensure_self(identity, id, "delete")?;
        let existing = self.require(id).await?;

        let mut cascade = Cascade::new();
        if let Some(path) = &existing.avatar_path {
            cascade.attempt("avatar", self.blobs.delete(path).await);
        }
        cascade.attempt(
            "password_resets",
            self.resets.delete_where(RowQuery::new().eq("user_id", id)).await,
        );

        if !self.users.delete_by_id(id).await? {
            return Err(ApiError::not_found("User not found"));
        }
        info!("Deleted user {}", id);
        Ok(DeletedUser {
            id: id.to_string(),
            cascade: cascade.finish(),
        })
    }

    pub async fn upload_avatar(&self, identity: &Identity, id: &str, input: AvatarUpload) -> Result<AvatarChange, ApiError> {
        ensure_self(identity, id, "modify")?;
        let extension = avatar_extension(&input.content_type).ok_or_else(|| {
            let allowed: Vec<&str> = AVATAR_TYPES.iter().map(|(t, _)| *t).collect();
            ApiError::bad_request(format!("contentType must be one of: {}", allowed.join(", ")))
        })?;
        let bytes = decode_image(&input.data)?;
        if bytes.is_empty() {
            return Err(ApiError::bad_request("Avatar image is empty"));
        }
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(ApiError::bad_request("Avatar must be at most 2 MiB"));
        }
        let existing = self.require(id).await?;

        let key = format!("avatars/{}/{}.{}", id, Uuid::new_v4(), extension);
        self.blobs.put(&key, bytes, &input.content_type).await?;

        let patch = json!({
            "avatar_url": self.blobs.public_url(&key),
            "avatar_path": key,
            "updated_at": Utc::now(),
        });
        let user = self
            .users
            .update_by_id(id, &patch)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        let mut cascade = Cascade::new();
        if let Some(previous) = existing.avatar_path.filter(|p| *p != key) {
            cascade.attempt("previous_avatar", self.blobs.delete(&previous).await);
        }
        Ok(AvatarChange {
            user,
            cascade: cascade.finish(),
        })
    }

    pub async fn remove_avatar(&self, identity: &Identity, id: &str) -> Result<AvatarChange, ApiError> {
        ensure_self(identity, id, "modify")?;
        let existing = self.require(id).await?;
        let path = existing
            .avatar_path
            .ok_or_else(|| ApiError::not_found("Avatar not found"))?;

        let patch = json!({
            "avatar_url": null,
            "avatar_path": null,
            "updated_at": Utc::now(),
        });
        let user = self
            .users
            .update_by_id(id, &patch)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))?;

        let mut cascade = Cascade::new();
        cascade.attempt("avatar", self.blobs.delete(&path).await);
        Ok(AvatarChange {
            user,
            cascade: cascade.finish(),
        })
    }

    pub async fn check_availability(&self, query: AvailabilityQuery) -> Result<Availability, ApiError> {
        let email = query.email.as_deref().map(normalize_email).filter(|e| !e.is_empty());
        let username = query
            .username
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty());
        if email.is_none() && username.is_none() {
            return Err(ApiError::bad_request("email or username is required"));
        }

        let email_available = match email {
            Some(email) => Some(!self.users.exists("email", email).await?),
            None => None,
        };
        let username_available = match username {
            Some(username) => Some(!self.users.exists("username", username).await?),
            None => None,
        };
        Ok(Availability {
            email_available,
            username_available,
        })
    }

    async fn require(&self, id: &str) -> Result<User, ApiError> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApiError::not_found("User not found"))
    }

    async fn ensure_email_free(&self, email: &str) -> Result<(), ApiError> {
        if self.users.exists("email", email).await? {
            return Err(ApiError::conflict("User with this email already exists"));
        }
        Ok(())
    }

    async fn ensure_username_free(&self, username: &str) -> Result<(), ApiError> {
        if self.users.exists("username", username).await? {
            return Err(ApiError::conflict("Username already taken"));
        }
        Ok(())
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn avatar_extension(content_type: &str) -> Option<&'static str> {
    AVATAR_TYPES
        .iter()
        .find(|(t, _)| t.eq_ignore_ascii_case(content_type.trim()))
        .map(|(_, ext)| *ext)
}

fn decode_image(data: &str) -> Result<Vec<u8>, ApiError> {
    let payload = match data.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => data,
    };
    STANDARD
        .decode(payload.trim())
        .map_err(|_| ApiError::bad_request("data must be valid base64"))
}
