//! Wraps endpoint handlers in the shared request pipeline:
//! preflight → method check → body validation → auth → handler, with a
//! catch-all boundary turning errors and panics into envelopes. CORS headers
//! are added by the router-wide layer.

use axum::{
    body::to_bytes,
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, MethodRouter},
};
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::context::RequestContext;
use super::response::{ApiResult, Envelope};
use crate::error::{ApiError, ErrorKind};
use crate::state::AppState;

/// Produces the list of problems with a request body; empty means valid.
pub type Validator = fn(&Value) -> Vec<String>;

/// Per-route pipeline settings, fixed at registration time.
#[derive(Debug, Clone, Default)]
pub struct HandlerConfig {
    pub require_auth: bool,
    pub allowed_methods: Vec<Method>,
    pub validator: Option<Validator>,
}

impl HandlerConfig {
    pub fn public(methods: &[Method]) -> Self {
        Self {
            require_auth: false,
            allowed_methods: methods.to_vec(),
            validator: None,
        }
    }

    pub fn protected(methods: &[Method]) -> Self {
        Self {
            require_auth: true,
            ..Self::public(methods)
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    fn allows(&self, method: &Method) -> bool {
        self.allowed_methods.is_empty() || self.allowed_methods.contains(method)
    }
}

/// Turns `handler` into a route accepting any method and running the pipeline.
pub fn wrap<H, Fut>(handler: H, config: HandlerConfig) -> MethodRouter<AppState>
where
    H: Fn(AppState, RequestContext) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ApiResult> + Send + 'static,
{
    let config = Arc::new(config);
    any(move |State(state): State<AppState>, request: Request| {
        let handler = handler.clone();
        let config = Arc::clone(&config);
        async move { dispatch(handler, &config, state, request).await }
    })
}

/// Runs one request through the pipeline. Always yields exactly one response.
pub async fn dispatch<H, Fut>(
    handler: H,
    config: &HandlerConfig,
    state: AppState,
    request: Request,
) -> Response
where
    H: Fn(AppState, RequestContext) -> Fut,
    Fut: Future<Output = ApiResult>,
{
    match AssertUnwindSafe(pipeline(handler, config, state, request))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("Handler panicked: {}", reason);
            Envelope::server_error("Internal server error").send()
        }
    }
}

async fn pipeline<H, Fut>(
    handler: H,
    config: &HandlerConfig,
    state: AppState,
    request: Request,
) -> Response
where
    H: Fn(AppState, RequestContext) -> Fut,
    Fut: Future<Output = ApiResult>,
{
    let method = request.method().clone();

    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    if !config.allows(&method) {
        tracing::debug!("{} {} rejected: method not allowed", method, request.uri().path());
        let allowed = config.allowed_methods.iter().map(|m| m.to_string()).collect();
        return ApiError::method_not_allowed(method.as_str(), allowed).into_response();
    }

    let (mut parts, body) = request.into_parts();

    // Routes without captures have no path params; treat as empty.
    let params = Path::<HashMap<String, String>>::from_request_parts(&mut parts, &state)
        .await
        .map(|Path(params)| params)
        .unwrap_or_default();
    let query = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(query)| query)
        .unwrap_or_default();

    let limit = state.config.server.max_request_size_bytes;
    let bytes = match to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!("Failed to read request body: {}", e);
            return ApiError::validation(
                "Invalid request body",
                vec![format!("Request body could not be read (limit {} bytes)", limit)],
            )
            .into_response();
        }
    };

    let body = if bytes.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                return ApiError::validation(
                    "Invalid JSON body",
                    vec![format!("Request body must be valid JSON: {}", e)],
                )
                .into_response();
            }
        }
    };

    if let (Some(validator), Some(body)) = (config.validator, body.as_ref()) {
        let errors = validator(body);
        if !errors.is_empty() {
            tracing::debug!("{} {} rejected: {} validation error(s)", method, parts.uri.path(), errors.len());
            return ApiError::validation("Validation failed", errors).into_response();
        }
    }

    let identity = if config.require_auth {
        match state.verifier.verify_headers(&parts.headers) {
            Ok(identity) => Some(identity),
            Err(err) => {
                tracing::debug!("{} {} rejected: {}", method, parts.uri.path(), err);
                return err.into_response();
            }
        }
    } else {
        None
    };

    let ctx = RequestContext {
        method,
        path: parts.uri.path().to_string(),
        headers: parts.headers,
        params,
        query,
        body,
        identity,
    };

    match handler(state, ctx).await {
        Ok(envelope) => envelope.send(),
        Err(err) => {
            if err.kind() == ErrorKind::Internal {
                tracing::error!("Request failed: {}", err);
            }
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{MemoryAuthAdmin, TokenIssuer};
    use crate::config::AppConfig;
    use crate::database::MemoryStore;
    use crate::mail::LogMailer;
    use crate::storage::MemoryBlobStore;
    use axum::body::Body;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SECRET: &str = "factory-secret";

    static PREFLIGHT_CALLS: AtomicUsize = AtomicUsize::new(0);
    static UNAUTHENTICATED_CALLS: AtomicUsize = AtomicUsize::new(0);

    fn state() -> AppState {
        AppState::new(
            AppConfig::for_tests(SECRET),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryBlobStore::new("http://blobs")),
            Arc::new(LogMailer::new()),
            Arc::new(MemoryAuthAdmin::new()),
        )
    }

    fn request(method: Method, body: Option<Value>, token: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().method(method).uri("/things");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);
        builder.body(body).unwrap()
    }

    async fn envelope(response: Response) -> Envelope {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn require_name(body: &Value) -> Vec<String> {
        match body.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => vec![],
            _ => vec!["name is required".to_string()],
        }
    }

    async fn ok_handler(_: AppState, _: RequestContext) -> ApiResult {
        Ok(Envelope::success("ok", ()))
    }

    async fn counting_preflight(_: AppState, _: RequestContext) -> ApiResult {
        PREFLIGHT_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(Envelope::success("ok", ()))
    }

    async fn counting_protected(_: AppState, _: RequestContext) -> ApiResult {
        UNAUTHENTICATED_CALLS.fetch_add(1, Ordering::SeqCst);
        Ok(Envelope::success("ok", ()))
    }

    async fn whoami(_: AppState, ctx: RequestContext) -> ApiResult {
        let identity = ctx.identity()?;
        Ok(Envelope::success("ok", json!({"sub": identity.subject_id})))
    }

    async fn conflicting(_: AppState, _: RequestContext) -> ApiResult {
        Err(ApiError::conflict("Already exists"))
    }

    async fn panicking(_: AppState, ctx: RequestContext) -> ApiResult {
        if ctx.body.is_none() {
            panic!("boom");
        }
        Ok(Envelope::success("unreachable", ()))
    }

    #[tokio::test]
    async fn preflight_short_circuits() {
        let config = HandlerConfig::protected(&[Method::GET]);
        let response = dispatch(counting_preflight, &config, state(), request(Method::OPTIONS, None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(PREFLIGHT_CALLS.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn disallowed_method_is_405_with_allow_header() {
        let config = HandlerConfig::public(&[Method::GET, Method::POST]);
        let response = dispatch(ok_handler, &config, state(), request(Method::DELETE, None, None)).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()["allow"], "GET, POST");
        let body = envelope(response).await;
        assert_eq!(body.status_code, 405);
        assert!(!body.success);
    }

    #[tokio::test]
    async fn validator_errors_are_returned_verbatim() {
        let config = HandlerConfig::public(&[Method::POST]).with_validator(require_name);
        let response = dispatch(
            ok_handler,
            &config,
            state(),
            request(Method::POST, Some(json!({"name": ""})), None),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = envelope(response).await;
        assert_eq!(body.error, Some(json!(["name is required"])));
    }

    #[tokio::test]
    async fn validator_skipped_without_body() {
        let config = HandlerConfig::public(&[Method::GET]).with_validator(require_name);
        let response = dispatch(ok_handler, &config, state(), request(Method::GET, None, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let config = HandlerConfig::public(&[Method::POST]);
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .uri("/things")
            .body(Body::from("{not json"))
            .unwrap();
        let response = dispatch(ok_handler, &config, state(), request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(envelope(response).await.message, "Invalid JSON body");
    }

    #[tokio::test]
    async fn auth_failure_never_reaches_handler() {
        let config = HandlerConfig::protected(&[Method::GET]);
        let response = dispatch(counting_protected, &config, state(), request(Method::GET, None, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(UNAUTHENTICATED_CALLS.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn authenticated_request_carries_identity() {
        let token = TokenIssuer::new(SECRET, 1).unwrap().issue("user-7", "u7@example.com").unwrap();
        let config = HandlerConfig::protected(&[Method::GET]);
        let response = dispatch(whoami, &config, state(), request(Method::GET, None, Some(&token))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(envelope(response).await.data, Some(json!({"sub": "user-7"})));
    }

    #[tokio::test]
    async fn handler_errors_and_panics_become_envelopes() {
        let config = HandlerConfig::public(&[]);
        let response = dispatch(conflicting, &config, state(), request(Method::GET, None, None)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = dispatch(panicking, &config, state(), request(Method::GET, None, None)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(envelope(response).await.message, "Internal server error");
    }
}
