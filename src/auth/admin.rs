use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::config::StoreConfig;
use crate::database::StoreError;

/// Administrative access to the identity provider's user accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthAdmin: Send + Sync {
    async fn update_password(&self, user_id: &str, password: &str) -> Result<(), StoreError>;
}

/// Supabase GoTrue admin API.
pub struct SupabaseAuthAdmin {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseAuthAdmin {
    pub fn new(client: Client, config: &StoreConfig) -> Result<Self, StoreError> {
        if config.supabase_url.is_empty() {
            return Err(StoreError::ConfigMissing("SUPABASE_URL"));
        }
        if config.service_key.is_empty() {
            return Err(StoreError::ConfigMissing("SUPABASE_SERVICE_ROLE_KEY"));
        }
        Ok(Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
        })
    }
}

#[async_trait]
impl AuthAdmin for SupabaseAuthAdmin {
    async fn update_password(&self, user_id: &str, password: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .put(format!("{}/auth/v1/admin/users/{}", self.base_url, user_id))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&json!({ "password": password }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(format!("Auth user {} not found", user_id)));
        }
        Err(StoreError::Remote {
            status: status.as_u16(),
            message,
        })
    }
}

/// Remembers the last password set per user.
#[derive(Default)]
pub struct MemoryAuthAdmin {
    passwords: RwLock<HashMap<String, String>>,
}

impl MemoryAuthAdmin {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn password_for(&self, user_id: &str) -> Option<String> {
        self.passwords.read().await.get(user_id).cloned()
    }
}

#[async_trait]
impl AuthAdmin for MemoryAuthAdmin {
    async fn update_password(&self, user_id: &str, password: &str) -> Result<(), StoreError> {
        self.passwords
            .write()
            .await
            .insert(user_id.to_string(), password.to_string());
        Ok(())
    }
}
