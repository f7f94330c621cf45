use async_trait::async_trait;
use reqwest::{header, Client};

use super::BlobStore;
use crate::config::StoreConfig;
use crate::database::StoreError;

/// Supabase Storage bucket client.
#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    bucket: String,
    service_key: String,
}

impl SupabaseStorage {
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
            bucket: config.avatar_bucket.clone(),
            service_key: config.service_key.clone(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key)
    }

    async fn check(response: reqwest::Response) -> Result<(), StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(message));
        }
        Err(StoreError::Remote {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl BlobStore for SupabaseStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .post(self.object_url(key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header(header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await?;
        Self::check(response).await
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, self.bucket, key)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let response = self
            .client
            .delete(self.object_url(key))
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .send()
            .await?;
        Self::check(response).await
    }
}
