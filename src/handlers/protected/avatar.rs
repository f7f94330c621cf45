use axum::http::Method;
use serde_json::Value;

use crate::handlers::unsupported;
use crate::middleware::{ApiResult, Envelope, RequestContext};
use crate::services::users::{AvatarUpload, UserService, AVATAR_TYPES};
use crate::state::AppState;
use crate::validation::BodyCheck;

pub fn validate(body: &Value) -> Vec<String> {
    let types: Vec<&str> = AVATAR_TYPES.iter().map(|(t, _)| *t).collect();
    BodyCheck::new(body)
        .optional_string("contentType")
        .one_of("contentType", &types)
        .optional_string("data")
        .finish()
}

/// POST /users/:id/avatar - Upload `{contentType, data}` (base64)
/// DELETE /users/:id/avatar - Remove the current avatar
pub async fn handle(state: AppState, ctx: RequestContext) -> ApiResult {
    let identity = ctx.identity()?;
    let id = ctx.param("id")?;
    let service = UserService::new(&state);

    match ctx.method {
        Method::POST => {
            let input: AvatarUpload = ctx.body_as()?;
            let change = service.upload_avatar(identity, id, input).await?;
            Ok(Envelope::updated("Avatar uploaded", change))
        }
        Method::DELETE => {
            let change = service.remove_avatar(identity, id).await?;
            Ok(Envelope::deleted("Avatar removed", change))
        }
        _ => Err(unsupported(&ctx)),
    }
}
