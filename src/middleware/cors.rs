use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, ORIGIN},
    HeaderName, HeaderValue, Method,
};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::SecurityConfig;

const ALLOW_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Cross-origin layer for the whole router. `*` in the origin list allows
/// any origin; otherwise only listed origins are echoed back.
pub fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    let origin = if security.cors_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = security
            .cors_origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!("Ignoring invalid CORS origin {:?}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(ALLOW_METHODS.to_vec())
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            ACCEPT,
            ORIGIN,
            HeaderName::from_static("x-requested-with"),
        ])
        .max_age(Duration::from_secs(security.cors_max_age_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{
            header::{
                ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
                ACCESS_CONTROL_REQUEST_METHOD, VARY,
            },
            Request, StatusCode,
        },
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn security(origins: &[&str]) -> SecurityConfig {
        SecurityConfig {
            jwt_secret: "secret".into(),
            jwt_expiry_hours: 1,
            cors_origins: origins.iter().map(|o| o.to_string()).collect(),
            cors_max_age_secs: 60,
        }
    }

    fn router(origins: &[&str]) -> Router {
        Router::new()
            .route("/ping", get(|| async { "pong" }))
            .layer(cors_layer(&security(origins)))
    }

    fn request(method: Method, origin: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method.clone()).uri("/ping");
        if let Some(origin) = origin {
            builder = builder.header(ORIGIN, origin);
        }
        if method == Method::OPTIONS {
            builder = builder.header(ACCESS_CONTROL_REQUEST_METHOD, "POST");
        }
        builder.body(Body::empty()).unwrap()
    }

    fn varies_on_origin(headers: &axum::http::HeaderMap) -> bool {
        headers
            .get_all(VARY)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|v| v.to_ascii_lowercase().contains("origin"))
    }

    #[tokio::test]
    async fn wildcard_allows_any_origin() {
        let response = router(&["*"])
            .oneshot(request(Method::GET, Some("https://anywhere.dev")))
            .await
            .unwrap();
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[tokio::test]
    async fn listed_origin_is_echoed() {
        let response = router(&["https://app.studio.dev"])
            .oneshot(request(Method::GET, Some("https://app.studio.dev")))
            .await
            .unwrap();
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "https://app.studio.dev");
        assert!(varies_on_origin(response.headers()));
    }

    #[tokio::test]
    async fn allow_list_varies_on_origin_without_one() {
        let response = router(&["https://app.studio.dev"])
            .oneshot(request(Method::GET, None))
            .await
            .unwrap();
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(varies_on_origin(response.headers()));
    }

    #[tokio::test]
    async fn unlisted_origin_gets_no_allow_origin() {
        let response = router(&["https://app.studio.dev"])
            .oneshot(request(Method::GET, Some("https://evil.dev")))
            .await
            .unwrap();
        assert!(response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
        assert!(varies_on_origin(response.headers()));
    }

    #[tokio::test]
    async fn preflight_advertises_methods_and_max_age() {
        let response = router(&["https://app.studio.dev"])
            .oneshot(request(Method::OPTIONS, Some("https://app.studio.dev")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let methods = response.headers()[ACCESS_CONTROL_ALLOW_METHODS].to_str().unwrap();
        assert!(methods.contains("PATCH"));
        assert_eq!(response.headers()[ACCESS_CONTROL_MAX_AGE], "60");
    }
}
