//! Blob storage for user uploads.

pub mod memory;
pub mod supabase;

use async_trait::async_trait;

use crate::database::StoreError;

pub use memory::MemoryBlobStore;
pub use supabase::SupabaseStorage;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes (or replaces) the object at `key`.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError>;

    /// Public URL the object is served from.
    fn public_url(&self, key: &str) -> String;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}
