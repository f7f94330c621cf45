use serde_json::json;

use crate::error::ApiError;
use crate::middleware::{ApiResult, Envelope, RequestContext};
use crate::state::AppState;

/// GET / - Service name, version and environment
pub async fn index(state: AppState, _ctx: RequestContext) -> ApiResult {
    Ok(Envelope::success(
        "Studio API",
        json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
            "endpoints": {
                "home": "/, /health (public)",
                "plans": "/plans (public)",
                "password_reset": "/auth/password-reset/{request,verify,confirm} (public)",
                "auth": "/auth/whoami (protected)",
                "users": "/users[/:id[/avatar]], /users/availability (protected, availability public)",
                "projects": "/projects[/:id] (protected)",
                "subscriptions": "/subscriptions[/:id[/cancel]] (protected)",
                "invoices": "/invoices[/:id[/pay]] (protected)",
            }
        }),
    ))
}

/// GET /health - Liveness plus a row-store round trip
pub async fn health(state: AppState, _ctx: RequestContext) -> ApiResult {
    if let Err(e) = state.rows.ping().await {
        tracing::error!("Health check failed: {}", e);
        return Err(ApiError::internal_server_error("Data store unavailable"));
    }
    Ok(Envelope::success(
        "Service healthy",
        json!({"status": "ok", "store": "ok"}),
    ))
}
