// handlers/mod.rs - Endpoint handlers in two tiers
//
// Public (no auth) → Protected (bearer token required)
//
// Every handler has the same shape, `async fn(AppState, RequestContext) -> ApiResult`,
// and is registered once per path through `middleware::wrap`. Multi-method
// paths branch on `ctx.method` inside the handler.

pub mod protected;
pub mod public;

use crate::error::ApiError;
use crate::middleware::RequestContext;

/// Fallback arm for methods the route config let through but the handler
/// does not serve.
pub(crate) fn unsupported(ctx: &RequestContext) -> ApiError {
    ApiError::method_not_allowed(ctx.method.as_str(), Vec::new())
}
