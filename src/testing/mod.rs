use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::auth::{AuthAdmin, Identity, MemoryAuthAdmin};
use crate::config::AppConfig;
use crate::database::MemoryStore;
use crate::mail::{LogMailer, Mailer};
use crate::state::AppState;
use crate::storage::{BlobStore, MemoryBlobStore};

pub const TEST_SECRET: &str = "unit-test-secret";

/// Test fixtures wired around one shared memory store
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub mailer: Arc<dyn Mailer>,
    pub auth_admin: Arc<dyn AuthAdmin>,
}

impl TestContext {
    pub fn new() -> Self {
        Self {
            store: Arc::new(MemoryStore::with_schema()),
            blobs: Arc::new(MemoryBlobStore::new("http://blobs.test")),
            mailer: Arc::new(LogMailer::new()),
            auth_admin: Arc::new(MemoryAuthAdmin::new()),
        }
    }

    pub fn with_blobs(mut self, blobs: impl BlobStore + 'static) -> Self {
        self.blobs = Arc::new(blobs);
        self
    }

    pub fn with_mailer(mut self, mailer: impl Mailer + 'static) -> Self {
        self.mailer = Arc::new(mailer);
        self
    }

    pub fn with_auth_admin(mut self, auth_admin: impl AuthAdmin + 'static) -> Self {
        self.auth_admin = Arc::new(auth_admin);
        self
    }

    pub fn state(&self) -> AppState {
        AppState::new(
            AppConfig::for_tests(TEST_SECRET),
            self.store.clone(),
            self.blobs.clone(),
            self.mailer.clone(),
            self.auth_admin.clone(),
        )
    }
}

pub fn identity(subject_id: &str, email: &str) -> Identity {
    let now = Utc::now();
    Identity {
        subject_id: subject_id.to_string(),
        email: email.to_string(),
        issued_at: now,
        expires_at: now + Duration::hours(1),
    }
}
