//! PostgREST-backed store.
//!
//! Speaks the PostgREST dialect used by hosted Postgres services: one
//! endpoint per table, filters as query parameters, JSON bodies, `apikey`
//! plus bearer auth on every request.

use super::{
    pg_error_hint, EmailDirectory, ErrorRow, ErrorStore, RowPatch, RowQuery, StoreError,
    USER_PROFILES_TABLE,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote store speaking PostgREST over HTTPS.
pub struct PostgrestStore {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PostgrestStore {
    /// Build a store for the given REST root (e.g.
    /// `https://project.supabase.co/rest/v1`) with the default timeout.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_timeout(base_url, api_key, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let api_key = api_key.into();
        if base_url.is_empty() {
            return Err(StoreError::InvalidConfig("base url is empty".to_string()));
        }
        if api_key.is_empty() {
            return Err(StoreError::InvalidConfig("api key is empty".to_string()));
        }
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::InvalidConfig(format!("building http client: {}", e)))?;
        Ok(Self {
            http_client,
            base_url,
            api_key,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Pass a response through if successful, otherwise turn the PostgREST
    /// error body into a [`StoreError::Api`].
    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(map_api_error(status.as_u16(), &body))
    }
}

/// PostgREST filter parameters for a query. Pure so the request shape can
/// be tested without a server.
fn query_params(query: &RowQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    if !query.severity.is_empty() {
        let joined: Vec<&str> = query.severity.iter().map(|s| s.as_str()).collect();
        params.push(("severity".to_string(), format!("in.({})", joined.join(","))));
    }
    if !query.category.is_empty() {
        let joined: Vec<&str> = query.category.iter().map(|c| c.as_str()).collect();
        params.push(("category".to_string(), format!("in.({})", joined.join(","))));
    }
    if let Some(resolved) = query.resolved {
        params.push(("resolved".to_string(), format!("eq.{}", resolved)));
    }
    if let Some(user_id) = &query.user_id {
        params.push(("user_id".to_string(), format!("eq.{}", user_id)));
    }
    if let Some(from) = query.date_from {
        params.push(("created_at".to_string(), format!("gte.{}", from.to_rfc3339())));
    }
    if let Some(to) = query.date_to {
        params.push(("created_at".to_string(), format!("lte.{}", to.to_rfc3339())));
    }
    params.push(("order".to_string(), "created_at.desc".to_string()));
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    if let Some(offset) = query.offset {
        params.push(("offset".to_string(), offset.to_string()));
    }
    params
}

/// Error body PostgREST sends with non-2xx responses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

fn map_api_error(status: u16, body: &str) -> StoreError {
    let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();
    let message = match parsed {
        Some(parsed) => {
            let friendly = parsed.code.as_deref().and_then(pg_error_hint);
            let detail = parsed
                .message
                .or(parsed.details)
                .or(parsed.hint)
                .unwrap_or_else(|| "no error detail".to_string());
            match (friendly, parsed.code) {
                (Some(friendly), Some(code)) => format!("{} ({}): {}", friendly, code, detail),
                (None, Some(code)) => format!("{}: {}", code, detail),
                _ => detail,
            }
        }
        None if body.is_empty() => "no error detail".to_string(),
        None => body.to_string(),
    };
    StoreError::Api { status, message }
}

#[async_trait]
impl ErrorStore for PostgrestStore {
    async fn insert_rows(&self, table: &str, rows: Vec<ErrorRow>) -> Result<(), StoreError> {
        if rows.is_empty() {
            return Ok(());
        }
        debug!("Inserting {} rows into {}", rows.len(), table);
        let response = self
            .authed(self.http_client.post(self.table_url(table)))
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        self.check(response).await?;
        Ok(())
    }

    async fn query_rows(&self, table: &str, query: RowQuery) -> Result<Vec<ErrorRow>, StoreError> {
        let response = self
            .authed(self.http_client.get(self.table_url(table)))
            .query(&query_params(&query))
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        let response = self.check(response).await?;
        response
            .json::<Vec<ErrorRow>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    async fn update_row(
        &self,
        table: &str,
        id: &str,
        patch: RowPatch,
    ) -> Result<u64, StoreError> {
        let response = self
            .authed(self.http_client.patch(self.table_url(table)))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        let response = self.check(response).await?;
        let updated: Vec<Value> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(updated.len() as u64)
    }
}

#[async_trait]
impl EmailDirectory for PostgrestStore {
    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let response = self
            .authed(self.http_client.get(self.table_url(USER_PROFILES_TABLE)))
            .query(&[
                ("select", "email".to_string()),
                ("email", format!("eq.{}", email)),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        let response = self.check(response).await?;
        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        Ok(!rows.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ErrorCategory, ErrorSeverity};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_new_validates_settings() {
        assert!(PostgrestStore::new("https://db.example.com/rest/v1", "key-1").is_ok());
        assert!(matches!(
            PostgrestStore::new("", "key-1"),
            Err(StoreError::InvalidConfig(_))
        ));
        assert!(matches!(
            PostgrestStore::new("https://db.example.com", ""),
            Err(StoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let store = PostgrestStore::new("https://db.example.com/rest/v1/", "key-1").unwrap();
        assert_eq!(
            store.table_url("error_logs"),
            "https://db.example.com/rest/v1/error_logs"
        );
    }

    #[test]
    fn test_query_params_empty_query() {
        let params = query_params(&RowQuery::default());
        assert_eq!(
            params,
            vec![
                ("select".to_string(), "*".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_params_full_query() {
        let from = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let query = RowQuery {
            severity: vec![ErrorSeverity::High, ErrorSeverity::Critical],
            category: vec![ErrorCategory::NetworkError],
            resolved: Some(false),
            user_id: Some("user-1".to_string()),
            date_from: Some(from),
            date_to: Some(to),
            limit: Some(10),
            offset: Some(20),
        };
        let params = query_params(&query);
        assert!(params.contains(&("severity".to_string(), "in.(high,critical)".to_string())));
        assert!(params.contains(&("category".to_string(), "in.(network_error)".to_string())));
        assert!(params.contains(&("resolved".to_string(), "eq.false".to_string())));
        assert!(params.contains(&("user_id".to_string(), "eq.user-1".to_string())));
        assert!(params.contains(&(
            "created_at".to_string(),
            format!("gte.{}", from.to_rfc3339())
        )));
        assert!(params.contains(&(
            "created_at".to_string(),
            format!("lte.{}", to.to_rfc3339())
        )));
        assert!(params.contains(&("order".to_string(), "created_at.desc".to_string())));
        assert!(params.contains(&("limit".to_string(), "10".to_string())));
        assert!(params.contains(&("offset".to_string(), "20".to_string())));
    }

    #[test]
    fn test_map_api_error_known_code() {
        let body = r#"{"message": "duplicate key value violates unique constraint", "code": "23505"}"#;
        let err = map_api_error(409, body);
        match err {
            StoreError::Api { status, message } => {
                assert_eq!(status, 409);
                assert!(message.starts_with("Duplicate entry (23505):"));
                assert!(message.contains("duplicate key value"));
            }
            other => panic!("expected api error, got {:?}", other),
        }
    }

    #[test]
    fn test_map_api_error_unknown_code_and_plain_body() {
        let err = map_api_error(400, r#"{"message": "syntax error", "code": "22P02"}"#);
        match err {
            StoreError::Api { message, .. } => assert_eq!(message, "22P02: syntax error"),
            other => panic!("expected api error, got {:?}", other),
        }

        let err = map_api_error(502, "upstream unavailable");
        match err {
            StoreError::Api { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream unavailable");
            }
            other => panic!("expected api error, got {:?}", other),
        }

        let err = map_api_error(500, "");
        match err {
            StoreError::Api { message, .. } => assert_eq!(message, "no error detail"),
            other => panic!("expected api error, got {:?}", other),
        }
    }
}
