use axum::http::Method;
use serde_json::Value;

use crate::error::ApiError;
use crate::handlers::unsupported;
use crate::middleware::{ApiResult, Envelope, RequestContext};
use crate::services::users::{CreateUser, DeleteUser, UpdateUser, UserService};
use crate::state::AppState;
use crate::validation::{is_email, is_username, BodyCheck};

const EMAIL_FORMAT: &str = "email must be a valid email address";
const USERNAME_FORMAT: &str =
    "username must be 3-30 characters of letters, digits, '.', '_' or '-'";

/// Body rules for `POST /users`.
pub fn validate_collection(body: &Value) -> Vec<String> {
    BodyCheck::new(body)
        .required_string("username")
        .string_format("username", is_username, USERNAME_FORMAT)
        .optional_string("email")
        .string_format("email", is_email, EMAIL_FORMAT)
        .optional_string("fullName")
        .max_len("fullName", 120)
        .finish()
}

/// Body rules shared by PATCH, PUT and DELETE on `/users/:id`.
pub fn validate_item(body: &Value) -> Vec<String> {
    BodyCheck::new(body)
        .optional_string("username")
        .string_format("username", is_username, USERNAME_FORMAT)
        .optional_string("email")
        .string_format("email", is_email, EMAIL_FORMAT)
        .optional_string("fullName")
        .max_len("fullName", 120)
        .optional_bool("confirmDelete")
        .finish()
}

/// GET /users - The caller's own profile
/// POST /users - Create the caller's profile
pub async fn collection(state: AppState, ctx: RequestContext) -> ApiResult {
    let identity = ctx.identity()?;
    let service = UserService::new(&state);

    match ctx.method {
        Method::GET => match service.get_user(&identity.subject_id).await? {
            Some(user) => Ok(Envelope::success("User profile retrieved", user)),
            None => Err(ApiError::not_found("User profile not found")),
        },
        Method::POST => {
            let input: CreateUser = ctx.body_as()?;
            let user = service.create_profile(identity, input).await?;
            Ok(Envelope::created("User profile created", user))
        }
        _ => Err(unsupported(&ctx)),
    }
}

/// GET /users/:id - One profile
/// PATCH|PUT /users/:id - Update own profile
/// DELETE /users/:id - Delete own account, requires `{"confirmDelete": true}`
pub async fn item(state: AppState, ctx: RequestContext) -> ApiResult {
    let identity = ctx.identity()?;
    let id = ctx.param("id")?;
    let service = UserService::new(&state);

    match ctx.method {
        Method::GET => match service.get_user(id).await? {
            Some(user) => Ok(Envelope::success("User retrieved", user)),
            None => Err(ApiError::not_found("User not found")),
        },
        Method::PATCH | Method::PUT => {
            let input: UpdateUser = ctx.body_as()?;
            let user = service.update_user(identity, id, input).await?;
            Ok(Envelope::updated("User updated", user))
        }
        Method::DELETE => {
            let input: DeleteUser = ctx.body_as()?;
            let deleted = service.delete_user(identity, id, input).await?;
            Ok(Envelope::deleted("User deleted", deleted))
        }
        _ => Err(unsupported(&ctx)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collection_requires_username() {
        assert_eq!(
            validate_collection(&json!({"email": "bad"})),
            vec!["username is required".to_string(), EMAIL_FORMAT.to_string()]
        );
    }

    #[test]
    fn item_rules_accept_delete_bodies() {
        assert!(validate_item(&json!({"confirmDelete": true})).is_empty());
        assert_eq!(
            validate_item(&json!({"confirmDelete": "yes"})),
            vec!["confirmDelete must be a boolean".to_string()]
        );
    }
}
