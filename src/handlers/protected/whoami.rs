use serde_json::json;

use crate::middleware::{ApiResult, Envelope, RequestContext};
use crate::services::UserService;
use crate::state::AppState;

/// GET /auth/whoami - Verified identity plus the caller's profile, if created
pub async fn get(state: AppState, ctx: RequestContext) -> ApiResult {
    let identity = ctx.identity()?;
    let profile = UserService::new(&state).get_user(&identity.subject_id).await?;
    Ok(Envelope::success(
        "Identity verified",
        json!({
            "identity": identity,
            "profile": profile,
        }),
    ))
}
