use axum::{
    extract::{Request, State},
    http::Method,
    response::Response,
    Router,
};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::handlers::{protected, public};
use crate::middleware::{cors_layer, dispatch, wrap, ApiResult, HandlerConfig, RequestContext};
use crate::state::AppState;

/// Full application router. Every route, including the fallback, runs
/// through the handler pipeline so all responses are envelopes.
pub fn app(state: AppState) -> Router {
    let request_logging = state.config.server.enable_request_logging;
    let cors = cors_layer(&state.config.security);

    let router = Router::new()
        .merge(public_routes())
        .merge(user_routes())
        .merge(project_routes())
        .merge(billing_routes())
        .fallback(fallback)
        // Global middleware
        .layer(cors);

    let router = if request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };
    router.with_state(state)
}

fn public_routes() -> Router<AppState> {
    use public::{password_reset, plans, root};

    Router::new()
        .route("/", wrap(root::index, HandlerConfig::public(&[Method::GET])))
        .route("/health", wrap(root::health, HandlerConfig::public(&[Method::GET])))
        .route("/plans", wrap(plans::list, HandlerConfig::public(&[Method::GET])))
        // Password recovery
        .route(
            "/auth/password-reset/request",
            wrap(
                password_reset::request,
                HandlerConfig::public(&[Method::POST]).with_validator(password_reset::validate_request),
            ),
        )
        .route(
            "/auth/password-reset/verify",
            wrap(
                password_reset::verify,
                HandlerConfig::public(&[Method::POST]).with_validator(password_reset::validate_verify),
            ),
        )
        .route(
            "/auth/password-reset/confirm",
            wrap(
                password_reset::confirm,
                HandlerConfig::public(&[Method::POST]).with_validator(password_reset::validate_confirm),
            ),
        )
}

fn user_routes() -> Router<AppState> {
    use protected::{avatar, users, whoami};

    Router::new()
        .route("/auth/whoami", wrap(whoami::get, HandlerConfig::protected(&[Method::GET])))
        .route(
            "/users",
            wrap(
                users::collection,
                HandlerConfig::protected(&[Method::GET, Method::POST])
                    .with_validator(users::validate_collection),
            ),
        )
        // Static segment wins over `:id`
        .route(
            "/users/availability",
            wrap(public::availability::check, HandlerConfig::public(&[Method::GET])),
        )
        .route(
            "/users/:id",
            wrap(
                users::item,
                HandlerConfig::protected(&[Method::GET, Method::PATCH, Method::PUT, Method::DELETE])
                    .with_validator(users::validate_item),
            ),
        )
        .route(
            "/users/:id/avatar",
            wrap(
                avatar::handle,
                HandlerConfig::protected(&[Method::POST, Method::DELETE]).with_validator(avatar::validate),
            ),
        )
}

fn project_routes() -> Router<AppState> {
    use protected::projects;

    Router::new()
        .route(
            "/projects",
            wrap(
                projects::collection,
                HandlerConfig::protected(&[Method::GET, Method::POST])
                    .with_validator(projects::validate_collection),
            ),
        )
        .route(
            "/projects/:id",
            wrap(
                projects::item,
                HandlerConfig::protected(&[Method::GET, Method::PATCH, Method::PUT, Method::DELETE])
                    .with_validator(projects::validate_item),
            ),
        )
}

fn billing_routes() -> Router<AppState> {
    use protected::{invoices, subscriptions};

    Router::new()
        .route(
            "/subscriptions",
            wrap(
                subscriptions::collection,
                HandlerConfig::protected(&[Method::GET, Method::POST])
                    .with_validator(subscriptions::validate_collection),
            ),
        )
        .route(
            "/subscriptions/:id",
            wrap(
                subscriptions::item,
                HandlerConfig::protected(&[Method::GET, Method::PATCH])
                    .with_validator(subscriptions::validate_item),
            ),
        )
        .route(
            "/subscriptions/:id/cancel",
            wrap(subscriptions::cancel, HandlerConfig::protected(&[Method::POST])),
        )
        .route(
            "/invoices",
            wrap(
                invoices::collection,
                HandlerConfig::protected(&[Method::GET, Method::POST])
                    .with_validator(invoices::validate_collection),
            ),
        )
        .route("/invoices/:id", wrap(invoices::item, HandlerConfig::protected(&[Method::GET])))
        .route("/invoices/:id/pay", wrap(invoices::pay, HandlerConfig::protected(&[Method::POST])))
}

async fn fallback(State(state): State<AppState>, request: Request) -> Response {
    dispatch(unmatched, &HandlerConfig::default(), state, request).await
}

async fn unmatched(_state: AppState, ctx: RequestContext) -> ApiResult {
    Err(ApiError::not_found(format!("Route {} {} not found", ctx.method, ctx.path)))
}
