use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

use super::{Row, RowQuery, RowStore, StoreError};

/// Process-local row store used for development and tests.
///
/// Rows are unique on `id` within a table; further unique columns can be
/// declared with [`MemoryStore::with_unique`]. Calls are appended to an
/// operation log (`"insert users"`, `"delete projects"`, ...) holding the
/// last [`OPERATION_LOG_LIMIT`] entries.
pub const OPERATION_LOG_LIMIT: usize = 1024;

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    unique: HashMap<String, Vec<String>>,
    log: RwLock<VecDeque<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with the unique constraints the production schema declares.
    pub fn with_schema() -> Self {
        Self::new()
            .with_unique("users", "email")
            .with_unique("users", "username")
    }

    pub fn with_unique(mut self, table: &str, column: &str) -> Self {
        self.unique
            .entry(table.to_string())
            .or_default()
            .push(column.to_string());
        self
    }

    /// Inserts rows directly, bypassing constraints and the operation log.
    pub async fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut tables = self.tables.write().await;
        let entries = tables.entry(table.to_string()).or_default();
        entries.extend(rows.into_iter().filter_map(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        }));
    }

    /// Recorded operations, oldest first.
    pub async fn operations(&self) -> Vec<String> {
        self.log.read().await.iter().cloned().collect()
    }

    pub async fn rows(&self, table: &str) -> Vec<Row> {
        self.tables.read().await.get(table).cloned().unwrap_or_default()
    }

    async fn record(&self, operation: &str, table: &str) {
        let mut log = self.log.write().await;
        if log.len() == OPERATION_LOG_LIMIT {
            log.pop_front();
        }
        log.push_back(format!("{} {}", operation, table));
    }

    fn conflicts(&self, table: &str, existing: &[Row], candidate: &Row, skip: Option<usize>) -> Option<String> {
        let mut columns = vec!["id".to_string()];
        if let Some(extra) = self.unique.get(table) {
            columns.extend(extra.iter().cloned());
        }

        for column in columns {
            let Some(value) = candidate.get(&column).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = existing
                .iter()
                .enumerate()
                .any(|(i, row)| Some(i) != skip && row.get(&column) == Some(value));
            if clash {
                return Some(format!(
                    "duplicate key value violates unique constraint \"{}_{}_key\"",
                    table, column
                ));
            }
        }
        None
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::String(a)), Some(Value::String(b))) => {
            match (DateTime::parse_from_rfc3339(a), DateTime::parse_from_rfc3339(b)) {
                (Ok(a), Ok(b)) => a.cmp(&b),
                _ => a.cmp(b),
            }
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::Bool(a)), Some(Value::Bool(b))) => a.cmp(b),
        (None, Some(_)) | (Some(Value::Null), Some(_)) => Ordering::Less,
        (Some(_), None) | (Some(_), Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl RowStore for MemoryStore {
    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Row>, StoreError> {
        self.record("select", table).await;
        let tables = self.tables.read().await;
        let mut rows: Vec<Row> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();

        if let Some(order) = &query.order {
            rows.sort_by(|a, b| {
                let ordering = compare(a.get(&order.column), b.get(&order.column));
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        self.record("insert", table).await;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if let Some(message) = self.conflicts(table, rows, &row, None) {
            return Err(StoreError::Duplicate(message));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, query: &RowQuery, patch: Row) -> Result<Vec<Row>, StoreError> {
        self.record("update", table).await;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();

        let matching: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| query.matches(r))
            .map(|(i, _)| i)
            .collect();

        for &i in &matching {
            let mut candidate = rows[i].clone();
            candidate.extend(patch.clone());
            if let Some(message) = self.conflicts(table, rows, &candidate, Some(i)) {
                return Err(StoreError::Duplicate(message));
            }
        }

        let mut updated = Vec::with_capacity(matching.len());
        for i in matching {
            rows[i].extend(patch.clone());
            updated.push(rows[i].clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, query: &RowQuery) -> Result<usize, StoreError> {
        self.record("delete", table).await;
        let mut tables = self.tables.write().await;
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !query.matches(r));
        Ok(before - rows.len())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_ids_and_unique_columns() {
        let store = MemoryStore::with_schema();
        store
            .insert("users", row(json!({"id": "1", "email": "a@x.io", "username": "a"})))
            .await
            .unwrap();

        let dup_id = store
            .insert("users", row(json!({"id": "1", "email": "b@x.io", "username": "b"})))
            .await;
        assert!(matches!(dup_id, Err(StoreError::Duplicate(_))));

        let dup_email = store
            .insert("users", row(json!({"id": "2", "email": "a@x.io", "username": "b"})))
            .await;
        assert!(matches!(dup_email, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn operation_log_keeps_latest_entries() {
        let store = MemoryStore::new();
        for _ in 0..OPERATION_LOG_LIMIT {
            store.select("users", &RowQuery::new()).await.unwrap();
        }
        store.delete("projects", &RowQuery::new()).await.unwrap();

        let operations = store.operations().await;
        assert_eq!(operations.len(), OPERATION_LOG_LIMIT);
        assert_eq!(operations.last().map(String::as_str), Some("delete projects"));
    }

    #[tokio::test]
    async fn select_orders_and_limits() {
        let store = MemoryStore::new();
        store
            .seed(
                "projects",
                vec![
                    json!({"id": "a", "created_at": "2024-01-01T00:00:00Z"}),
                    json!({"id": "b", "created_at": "2024-03-01T00:00:00.5Z"}),
                    json!({"id": "c", "created_at": "2024-02-01T00:00:00Z"}),
                ],
            )
            .await;

        let rows = store
            .select("projects", &RowQuery::new().order_by("created_at", true).limit(2))
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn update_and_delete_apply_to_matching_rows() {
        let store = MemoryStore::new();
        store
            .seed("projects", vec![json!({"id": "a", "status": "active"}), json!({"id": "b", "status": "active"})])
            .await;

        let updated = store
            .update("projects", &RowQuery::new().eq("id", "a"), row(json!({"status": "archived"})))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["status"], "archived");

        let removed = store.delete("projects", &RowQuery::new().eq("status", "active")).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(
            store.operations().await,
            vec!["update projects".to_string(), "delete projects".to_string()]
        );
    }
}
