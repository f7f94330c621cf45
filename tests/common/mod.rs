#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use studio_api::auth::{MemoryAuthAdmin, TokenIssuer};
use studio_api::database::MemoryStore;
use studio_api::mail::LogMailer;
use studio_api::storage::{BlobStore, MemoryBlobStore};
use studio_api::{app, AppConfig, AppState};

pub const SECRET: &str = "integration-test-secret";

static SERVER: OnceLock<TestServer> = OnceLock::new();

/// The built server binary, running on the memory backend.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_studio-api"));
        cmd.env("PORT", port.to_string())
            .env("STORE_BACKEND", "memory")
            .env("JWT_SECRET", SECRET)
            .env("APP_ENV", "development")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// In-process router over memory backends, driven with `oneshot`.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub mailer: Arc<LogMailer>,
    pub auth_admin: Arc<MemoryAuthAdmin>,
    router: Router,
    issuer: TokenIssuer,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_blobs(Arc::new(MemoryBlobStore::new("http://blobs.test")))
    }

    pub fn with_blobs(blobs: Arc<dyn BlobStore>) -> Self {
        Self::build(blobs, Self::config())
    }

    /// Router restricted to the given cross-origin allow-list.
    pub fn with_cors_origins(origins: &[&str]) -> Self {
        let mut config = Self::config();
        config.security.cors_origins = origins.iter().map(|o| o.to_string()).collect();
        Self::build(Arc::new(MemoryBlobStore::new("http://blobs.test")), config)
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::for_tests(SECRET);
        config.server.enable_request_logging = false;
        config
    }

    fn build(blobs: Arc<dyn BlobStore>, config: AppConfig) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let store = Arc::new(MemoryStore::with_schema());
        let mailer = Arc::new(LogMailer::new());
        let auth_admin = Arc::new(MemoryAuthAdmin::new());

        let state = AppState::new(
            config,
            store.clone(),
            blobs.clone(),
            mailer.clone(),
            auth_admin.clone(),
        );

        Self {
            store,
            blobs,
            mailer,
            auth_admin,
            router: app(state),
            issuer: TokenIssuer::new(SECRET, 1).expect("test secret is valid"),
        }
    }

    pub fn token(&self, sub: &str, email: &str) -> String {
        self.issuer.issue(sub, email).expect("token signs")
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body readable");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("response is JSON")
        };
        TestResponse { status, headers, body }
    }

    pub async fn call(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).expect("valid request")).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.call(Method::GET, path, token, None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.call(Method::POST, path, token, Some(body)).await
    }

    /// Creates a profile for `sub` and returns its bearer token.
    pub async fn signed_up(&self, sub: &str, username: &str) -> String {
        let email = format!("{}@example.com", username);
        let token = self.token(sub, &email);
        let res = self
            .post("/users", Some(&token), serde_json::json!({"username": username}))
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "signup failed: {}", res.body);
        token
    }

    pub async fn seed_plans(&self) {
        self.store
            .seed(
                "plans",
                vec![
                    serde_json::json!({"id": "basic", "name": "Basic", "price_cents": 900, "currency": "usd", "interval": "month", "is_active": true}),
                    serde_json::json!({"id": "pro", "name": "Pro", "price_cents": 2900, "currency": "usd", "interval": "year", "is_active": true}),
                ],
            )
            .await;
    }
}
