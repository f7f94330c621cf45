use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{Row, RowQuery, RowStore, StoreError};
use crate::config::StoreConfig;

/// Postgres unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Row store backed by the Supabase REST (PostgREST) endpoint.
#[derive(Clone)]
pub struct PostgrestStore {
    client: Client,
    rest_url: Url,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

impl PostgrestStore {
    pub fn new(client: Client, config: &StoreConfig) -> Result<Self, StoreError> {
        if config.supabase_url.is_empty() {
            return Err(StoreError::ConfigMissing("SUPABASE_URL"));
        }
        if config.service_key.is_empty() {
            return Err(StoreError::ConfigMissing("SUPABASE_SERVICE_ROLE_KEY"));
        }

        let base = format!("{}/rest/v1/", config.supabase_url.trim_end_matches('/'));
        let rest_url = Url::parse(&base).map_err(|_| StoreError::ConfigMissing("SUPABASE_URL"))?;

        Ok(Self {
            client,
            rest_url,
            service_key: config.service_key.clone(),
        })
    }

    fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        self.rest_url
            .join(table)
            .map_err(|e| StoreError::Remote {
                status: 0,
                message: format!("invalid table name {}: {}", table, e),
            })
    }

    fn request(&self, method: Method, table: &str, query: &RowQuery) -> Result<RequestBuilder, StoreError> {
        let url = self.table_url(table)?;
        Ok(self
            .client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header(header::ACCEPT, "application/json")
            .query(&query_params(query)))
    }

    async fn read_rows(response: Response) -> Result<Vec<Row>, StoreError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(remote_error(status.as_u16(), &body));
        }
        let rows: Vec<Row> = response.json().await?;
        Ok(rows)
    }
}

/// Renders a filter value as PostgREST operator syntax.
fn filter_value(value: &Value) -> String {
    match value {
        Value::Null => "is.null".to_string(),
        Value::String(s) => format!("eq.{}", s),
        other => format!("eq.{}", other),
    }
}

fn query_params(query: &RowQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    params.extend(
        query
            .filters
            .iter()
            .map(|(column, value)| (column.clone(), filter_value(value))),
    );
    if let Some(order) = &query.order {
        let direction = if order.descending { "desc" } else { "asc" };
        params.push(("order".to_string(), format!("{}.{}", order.column, direction)));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

fn remote_error(status: u16, body: &str) -> StoreError {
    match serde_json::from_str::<PostgrestError>(body) {
        Ok(err) => {
            let message = match (err.message, err.details) {
                (Some(m), Some(d)) if !d.is_empty() => format!("{} ({})", m, d),
                (Some(m), _) => m,
                (None, Some(d)) => d,
                (None, None) => format!("request failed with status {}", status),
            };
            if err.code.as_deref() == Some(UNIQUE_VIOLATION) {
                StoreError::Duplicate(message)
            } else {
                StoreError::Remote { status, message }
            }
        }
        Err(_) => StoreError::Remote {
            status,
            message: if body.is_empty() {
                format!("request failed with status {}", status)
            } else {
                body.to_string()
            },
        },
    }
}

#[async_trait]
impl RowStore for PostgrestStore {
    async fn select(&self, table: &str, query: &RowQuery) -> Result<Vec<Row>, StoreError> {
        let response = self.request(Method::GET, table, query)?.send().await?;
        Self::read_rows(response).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row, StoreError> {
        let response = self
            .request(Method::POST, table, &RowQuery::new())?
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        Self::read_rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Remote {
                status: 200,
                message: format!("insert into {} returned no row", table),
            })
    }

    async fn update(&self, table: &str, query: &RowQuery, patch: Row) -> Result<Vec<Row>, StoreError> {
        let response = self
            .request(Method::PATCH, table, query)?
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await?;
        Self::read_rows(response).await
    }

    async fn delete(&self, table: &str, query: &RowQuery) -> Result<usize, StoreError> {
        let response = self
            .request(Method::DELETE, table, query)?
            .header("Prefer", "return=representation")
            .send()
            .await?;
        Ok(Self::read_rows(response).await?.len())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(self.rest_url.clone())
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoreError::Remote {
                status: response.status().as_u16(),
                message: "health check failed".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreBackend;
    use serde_json::json;

    fn config(url: &str) -> StoreConfig {
        StoreConfig {
            backend: StoreBackend::Supabase,
            supabase_url: url.to_string(),
            service_key: "service".to_string(),
            avatar_bucket: "avatars".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn builds_table_urls_under_rest_v1() {
        let store = PostgrestStore::new(Client::new(), &config("https://abc.supabase.co")).unwrap();
        assert_eq!(
            store.table_url("users").unwrap().as_str(),
            "https://abc.supabase.co/rest/v1/users"
        );
    }

    #[test]
    fn requires_url_and_key() {
        let mut cfg = config("");
        assert!(matches!(
            PostgrestStore::new(Client::new(), &cfg),
            Err(StoreError::ConfigMissing("SUPABASE_URL"))
        ));
        cfg.supabase_url = "https://abc.supabase.co".into();
        cfg.service_key = String::new();
        assert!(matches!(
            PostgrestStore::new(Client::new(), &cfg),
            Err(StoreError::ConfigMissing("SUPABASE_SERVICE_ROLE_KEY"))
        ));
    }

    #[test]
    fn renders_filters_order_and_limit() {
        let query = RowQuery::new()
            .eq("owner_id", "u1")
            .eq("auto_renew", true)
            .eq("cancelled_at", Value::Null)
            .order_by("created_at", true)
            .limit(10);
        let params = query_params(&query);
        assert_eq!(
            params,
            vec![
                ("select".to_string(), "*".to_string()),
                ("owner_id".to_string(), "eq.u1".to_string()),
                ("auto_renew".to_string(), "eq.true".to_string()),
                ("cancelled_at".to_string(), "is.null".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn unique_violations_become_duplicates() {
        let body = json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"users_email_key\"",
            "details": "Key (email)=(a@x.io) already exists."
        })
        .to_string();
        assert!(matches!(remote_error(409, &body), StoreError::Duplicate(_)));

        let body = json!({"code": "42P01", "message": "relation \"nope\" does not exist"}).to_string();
        match remote_error(404, &body) {
            StoreError::Remote { status, message } => {
                assert_eq!(status, 404);
                assert!(message.contains("does not exist"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
