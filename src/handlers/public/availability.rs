use crate::middleware::{ApiResult, Envelope, RequestContext};
use crate::services::users::{AvailabilityQuery, UserService};
use crate::state::AppState;

/// GET /users/availability?email=&username= - Whether an email or username is free
pub async fn check(state: AppState, ctx: RequestContext) -> ApiResult {
    let query = AvailabilityQuery {
        email: ctx.query_param("email").map(str::to_string),
        username: ctx.query_param("username").map(str::to_string),
    };
    let availability = UserService::new(&state).check_availability(query).await?;
    Ok(Envelope::success("Availability checked", availability))
}
