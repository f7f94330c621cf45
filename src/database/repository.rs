use serde::{de::DeserializeOwned, ser::Error as _, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::{Row, RowQuery, RowStore, StoreError};

/// Typed access to one table.
pub struct Repository<T> {
    table_name: &'static str,
    store: Arc<dyn RowStore>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Repository<T>
where
    T: Serialize + DeserializeOwned + Send,
{
    pub fn new(table_name: &'static str, store: Arc<dyn RowStore>) -> Self {
        Self {
            table_name,
            store,
            _phantom: std::marker::PhantomData,
        }
    }

    pub async fn select_any(&self, query: RowQuery) -> Result<Vec<T>, StoreError> {
        self.store
            .select(self.table_name, &query)
            .await?
            .into_iter()
            .map(from_row)
            .collect()
    }

    /// First matching record, `None` when absent.
    pub async fn select_one(&self, query: RowQuery) -> Result<Option<T>, StoreError> {
        let mut rows = self.store.select(self.table_name, &query.limit(1)).await?;
        match rows.pop() {
            Some(row) => Ok(Some(from_row(row)?)),
            None => Ok(None),
        }
    }

    pub async fn find_by(&self, column: &str, value: impl Into<Value>) -> Result<Option<T>, StoreError> {
        self.select_one(RowQuery::new().eq(column, value)).await
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.find_by("id", id).await
    }

    pub async fn exists(&self, column: &str, value: impl Into<Value>) -> Result<bool, StoreError> {
        Ok(self.find_by(column, value).await?.is_some())
    }

    pub async fn insert(&self, record: &T) -> Result<T, StoreError> {
        let row = to_row(record)?;
        from_row(self.store.insert(self.table_name, row).await?)
    }

    /// Applies a partial update; `None` when no row has this id.
    pub async fn update_by_id<P: Serialize>(&self, id: &str, patch: &P) -> Result<Option<T>, StoreError> {
        let query = RowQuery::new().eq("id", id);
        let mut rows = self.store.update(self.table_name, &query, to_row(patch)?).await?;
        match rows.pop() {
            Some(row) => Ok(Some(from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Applies a partial update to every row matching `query`. An empty
    /// result means nothing matched, which callers use as a compare-and-set.
    pub async fn update_where<P: Serialize>(&self, query: RowQuery, patch: &P) -> Result<Vec<T>, StoreError> {
        self.store
            .update(self.table_name, &query, to_row(patch)?)
            .await?
            .into_iter()
            .map(from_row)
            .collect()
    }

    pub async fn delete_by_id(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.delete_where(RowQuery::new().eq("id", id)).await? > 0)
    }

    pub async fn delete_where(&self, query: RowQuery) -> Result<usize, StoreError> {
        self.store.delete(self.table_name, &query).await
    }
}

fn to_row<P: Serialize>(value: &P) -> Result<Row, StoreError> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::Json(serde_json::Error::custom(
            "record must serialize to a JSON object",
        ))),
    }
}

fn from_row<T: DeserializeOwned>(row: Row) -> Result<T, StoreError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        id: String,
        name: String,
        #[serde(default)]
        color: Option<String>,
    }

    #[derive(Serialize)]
    struct WidgetPatch {
        #[serde(skip_serializing_if = "Option::is_none")]
        color: Option<String>,
    }

    fn repo() -> Repository<Widget> {
        Repository::new("widgets", Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn absent_records_are_none() {
        let repo = repo();
        assert_eq!(repo.find_by_id("missing").await.unwrap(), None);
        assert!(!repo.exists("name", "x").await.unwrap());
    }

    #[tokio::test]
    async fn insert_update_delete() {
        let repo = repo();
        let widget = Widget { id: "w1".into(), name: "one".into(), color: None };
        assert_eq!(repo.insert(&widget).await.unwrap(), widget);

        let updated = repo
            .update_by_id("w1", &WidgetPatch { color: Some("red".into()) })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.color.as_deref(), Some("red"));
        assert_eq!(updated.name, "one");

        assert!(repo.update_by_id("nope", &WidgetPatch { color: None }).await.unwrap().is_none());
        assert!(repo.delete_by_id("w1").await.unwrap());
        assert!(!repo.delete_by_id("w1").await.unwrap());
    }
}
