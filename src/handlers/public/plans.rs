use crate::middleware::{ApiResult, Envelope, RequestContext};
use crate::services::SubscriptionService;
use crate::state::AppState;

/// GET /plans - Active plans, cheapest first
pub async fn list(state: AppState, _ctx: RequestContext) -> ApiResult {
    let plans = SubscriptionService::new(&state).list_plans().await?;
    Ok(Envelope::success("Plans retrieved", plans))
}
