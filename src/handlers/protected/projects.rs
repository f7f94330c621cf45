use axum::http::Method;
use serde_json::Value;

use crate::error::ApiError;
use crate::handlers::unsupported;
use crate::middleware::{ApiResult, Envelope, RequestContext};
use crate::services::projects::{CreateProject, ProjectService, UpdateProject, NOT_FOUND};
use crate::state::AppState;
use crate::validation::BodyCheck;

const STATUSES: &[&str] = &["active", "archived"];

pub fn validate_collection(body: &Value) -> Vec<String> {
    BodyCheck::new(body)
        .required_string("name")
        .max_len("name", 100)
        .optional_string("description")
        .max_len("description", 1000)
        .finish()
}

pub fn validate_item(body: &Value) -> Vec<String> {
    BodyCheck::new(body)
        .optional_string("name")
        .max_len("name", 100)
        .optional_string("description")
        .max_len("description", 1000)
        .optional_string("status")
        .one_of("status", STATUSES)
        .finish()
}

/// GET /projects - Caller's projects, newest first
/// POST /projects - Create a project
pub async fn collection(state: AppState, ctx: RequestContext) -> ApiResult {
    let identity = ctx.identity()?;
    let service = ProjectService::new(&state);

    match ctx.method {
        Method::GET => {
            let projects = service.list(&identity.subject_id).await?;
            Ok(Envelope::success("Projects retrieved", projects))
        }
        Method::POST => {
            let input: CreateProject = ctx.body_as()?;
            let project = service.create(&identity.subject_id, input).await?;
            Ok(Envelope::created("Project created", project))
        }
        _ => Err(unsupported(&ctx)),
    }
}

/// GET|PATCH|PUT|DELETE /projects/:id
pub async fn item(state: AppState, ctx: RequestContext) -> ApiResult {
    let owner = ctx.identity()?.subject_id.as_str();
    let id = ctx.param("id")?;
    let service = ProjectService::new(&state);

    match ctx.method {
        Method::GET => match service.get(owner, id).await? {
            Some(project) => Ok(Envelope::success("Project retrieved", project)),
            None => Err(ApiError::not_found(NOT_FOUND)),
        },
        Method::PATCH | Method::PUT => {
            let input: UpdateProject = ctx.body_as()?;
            let project = service.update(owner, id, input).await?;
            Ok(Envelope::updated("Project updated", project))
        }
        Method::DELETE => {
            let project = service.delete(owner, id).await?;
            Ok(Envelope::deleted("Project deleted", project))
        }
        _ => Err(unsupported(&ctx)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_must_be_known() {
        assert_eq!(
            validate_item(&json!({"status": "deleted"})),
            vec!["status must be one of: active, archived".to_string()]
        );
        assert!(validate_item(&json!({"status": "archived"})).is_empty());
    }

    #[test]
    fn name_is_required_on_create() {
        assert_eq!(validate_collection(&json!({})), vec!["name is required".to_string()]);
    }
}
