//! Row-store access: the trait every table operation goes through, the
//! Supabase REST and in-memory implementations, and typed repositories.

pub mod memory;
pub mod models;
pub mod postgrest;
pub mod repository;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;
pub use repository::Repository;

/// A single table row as exchanged with the store.
pub type Row = Map<String, Value>;

/// Errors from row and blob stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Remote store error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub descending: bool,
}

/// Equality filters plus optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowQuery {
    pub filters: Vec<(String, Value)>,
    pub order: Option<Order>,
    pub limit: Option<usize>,
}

impl RowQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((column.into(), value.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.order = Some(Order {
            column: column.into(),
            descending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True when every filter matches the row. A missing column matches `null`.
    pub fn matches(&self, row: &Row) -> bool {
        self.filters
            .iter()
            .all(|(column, expected)| row.get(column).unwrap_or(&Value::Null) == expected)
    }
}

/// Relational row store keyed by table name.
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Row>, StoreError>;

    /// Inserts one row and returns it as stored.
    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError>;

    /// Applies `patch` to all matching rows and returns them as stored.
    async fn update(&self, table: &str, query: &RowQuery, patch: Row) -> Result<Vec<Row>, StoreError>;

    /// Removes all matching rows, returning how many were removed.
    async fn delete(&self, table: &str, query: &RowQuery) -> Result<usize, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_matches_on_all_filters() {
        let row = json!({"id": "1", "owner_id": "u1", "status": "active"});
        let row = row.as_object().unwrap();

        assert!(RowQuery::new().eq("owner_id", "u1").matches(row));
        assert!(RowQuery::new().eq("owner_id", "u1").eq("status", "active").matches(row));
        assert!(!RowQuery::new().eq("owner_id", "u1").eq("status", "archived").matches(row));
        assert!(RowQuery::new().eq("deleted_at", Value::Null).matches(row));
    }
}
