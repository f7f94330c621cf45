use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{AuthAdmin, MemoryAuthAdmin, SupabaseAuthAdmin};
use crate::config::{AppConfig, StoreBackend};
use crate::database::{MemoryStore, PostgrestStore, RowStore};
use crate::mail::{HttpMailer, LogMailer, Mailer};
use crate::middleware::TokenVerifier;
use crate::storage::{BlobStore, MemoryBlobStore, SupabaseStorage};

/// Everything a request handler may touch, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub rows: Arc<dyn RowStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub mailer: Arc<dyn Mailer>,
    pub auth_admin: Arc<dyn AuthAdmin>,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        rows: Arc<dyn RowStore>,
        blobs: Arc<dyn BlobStore>,
        mailer: Arc<dyn Mailer>,
        auth_admin: Arc<dyn AuthAdmin>,
    ) -> Self {
        let verifier = Arc::new(TokenVerifier::new(&config.security.jwt_secret));
        Self {
            config: Arc::new(config),
            rows,
            blobs,
            mailer,
            auth_admin,
            verifier,
        }
    }

    /// Wires the configured backends. One HTTP client (and its connection
    /// pool) is shared by every remote collaborator.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        config.validate().context("invalid configuration")?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.store.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        let mailer: Arc<dyn Mailer> = match &config.mail.webhook_url {
            Some(endpoint) => Arc::new(HttpMailer::new(client.clone(), endpoint.clone(), &config.mail)),
            None => {
                tracing::warn!("MAIL_WEBHOOK_URL not set, mail bodies are logged at debug level only");
                Arc::new(LogMailer::new())
            }
        };

        let state = match config.store.backend {
            StoreBackend::Supabase => {
                let rows = PostgrestStore::new(client.clone(), &config.store)?;
                let blobs = SupabaseStorage::new(client.clone(), &config.store)?;
                let auth_admin = SupabaseAuthAdmin::new(client, &config.store)?;
                tracing::info!("Using Supabase backend at {}", config.store.supabase_url);
                Self::new(config, Arc::new(rows), Arc::new(blobs), mailer, Arc::new(auth_admin))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory backend, data is lost on restart");
                let base_url = format!("http://localhost:{}/blobs", config.server.port);
                Self::new(
                    config,
                    Arc::new(MemoryStore::with_schema()),
                    Arc::new(MemoryBlobStore::new(base_url)),
                    mailer,
                    Arc::new(MemoryAuthAdmin::new()),
                )
            }
        };
        Ok(state)
    }
}
