use axum::http::Method;
use serde_json::Value;

use crate::error::ApiError;
use crate::handlers::unsupported;
use crate::middleware::{ApiResult, Envelope, RequestContext};
use crate::services::subscriptions::{CreateSubscription, SubscriptionService, UpdateSubscription};
use crate::state::AppState;
use crate::validation::BodyCheck;

pub fn validate_collection(body: &Value) -> Vec<String> {
    BodyCheck::new(body).required_string("planId").finish()
}

pub fn validate_item(body: &Value) -> Vec<String> {
    BodyCheck::new(body)
        .optional_bool("autoRenew")
        .optional_string("planId")
        .finish()
}

/// GET /subscriptions - Caller's subscriptions
/// POST /subscriptions - Subscribe to a plan
pub async fn collection(state: AppState, ctx: RequestContext) -> ApiResult {
    let user_id = ctx.identity()?.subject_id.as_str();
    let service = SubscriptionService::new(&state);

    match ctx.method {
        Method::GET => {
            let subscriptions = service.list(user_id).await?;
            Ok(Envelope::success("Subscriptions retrieved", subscriptions))
        }
        Method::POST => {
            let input: CreateSubscription = ctx.body_as()?;
            let subscription = service.create(user_id, input).await?;
            Ok(Envelope::created("Subscription created", subscription))
        }
        _ => Err(unsupported(&ctx)),
    }
}

/// GET|PATCH /subscriptions/:id
pub async fn item(state: AppState, ctx: RequestContext) -> ApiResult {
    let user_id = ctx.identity()?.subject_id.as_str();
    let id = ctx.param("id")?;
    let service = SubscriptionService::new(&state);

    match ctx.method {
        Method::GET => match service.get(user_id, id).await? {
            Some(subscription) => Ok(Envelope::success("Subscription retrieved", subscription)),
            None => Err(ApiError::not_found("Subscription not found")),
        },
        Method::PATCH => {
            let input: UpdateSubscription = ctx.body_as()?;
            let subscription = service.update(user_id, id, input).await?;
            Ok(Envelope::updated("Subscription updated", subscription))
        }
        _ => Err(unsupported(&ctx)),
    }
}

/// POST /subscriptions/:id/cancel - Idempotent cancellation
pub async fn cancel(state: AppState, ctx: RequestContext) -> ApiResult {
    let user_id = ctx.identity()?.subject_id.as_str();
    let id = ctx.param("id")?;
    let subscription = SubscriptionService::new(&state).cancel(user_id, id).await?;
    Ok(Envelope::updated("Subscription cancelled", subscription))
}
