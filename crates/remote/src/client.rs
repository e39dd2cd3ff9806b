//! REST client for the remote table API.

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use hearth_core::errors::{Error, Result};
use hearth_core::remote::TableApi;
use hearth_core::tables::Table;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Error body shape returned by the table API.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    details: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: Uuid,
}

/// Client for the CRM backend's table, storage, and RPC endpoints.
#[derive(Debug)]
pub struct RestClient {
    pub(crate) client: reqwest::Client,
    pub(crate) base_url: String,
    api_key: String,
    auth_token: RwLock<Option<String>>,
}

impl RestClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The base URL of the backend (e.g. "https://api.hearth.app")
    /// * `api_key` - The anonymous API key sent on every request
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            auth_token: RwLock::new(None),
        })
    }

    /// Install or clear the bearer token of the signed-in principal.
    pub fn set_auth_token(&self, token: Option<String>) {
        *self.auth_token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    pub(crate) fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Headers for an API request.
    pub(crate) fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| Error::internal("Invalid API key format"))?,
        );

        let token = self
            .auth_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| Error::internal("Invalid access token format"))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// Map a transport-level failure onto the engine's error kinds.
    pub(crate) fn map_transport_error(err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout
        } else if err.is_connect() {
            Error::offline(err.to_string())
        } else if err.is_request() || err.is_body() || err.is_decode() {
            Error::ConnectionLost(err.to_string())
        } else {
            Error::internal(err.to_string())
        }
    }

    /// Check the response status; on failure, decode the API error body.
    pub(crate) async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Self::log_response(status, &body);

        if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
            let message = match (error.message, error.details) {
                (Some(message), Some(details)) => format!("{} ({})", message, details),
                (Some(message), None) => message,
                (None, _) => body,
            };
            return Err(Error::api(status.as_u16(), error.code, message));
        }
        Err(Error::api(
            status.as_u16(),
            None,
            format!("Request failed: {}", body),
        ))
    }

    /// Send, check, and decode a JSON response body.
    pub(crate) async fn parse_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let response = Self::check_response(response).await?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(Self::map_transport_error)?;
        Self::log_response(status, &body);

        serde_json::from_str(&body).map_err(|e| {
            log::error!("Failed to deserialize response. Body: {}, Error: {}", body, e);
            Error::decode(format!("Failed to parse response: {}", e))
        })
    }

    fn since_literal(since: DateTime<Utc>) -> String {
        since.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

#[async_trait]
impl TableApi for RestClient {
    async fn select_updated_since(&self, table: Table, since: DateTime<Utc>) -> Result<Vec<Value>> {
        let url = self.table_url(table);
        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .query(&[
                ("select", "*".to_string()),
                ("updated_at", format!("gt.{}", Self::since_literal(since))),
                ("order", "updated_at.asc".to_string()),
            ])
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        Self::parse_json(response).await
    }

    async fn select_ids(&self, table: Table) -> Result<Vec<Uuid>> {
        let url = self.table_url(table);
        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .query(&[("select", "id")])
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        let rows: Vec<IdRow> = Self::parse_json(response).await?;
        Ok(rows.into_iter().map(|row| row.id).collect())
    }

    async fn select_by_ids(&self, table: Table, ids: &[Uuid]) -> Result<Vec<Value>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.table_url(table);
        let id_list = ids
            .iter()
            .map(Uuid::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let response = self
            .client
            .get(&url)
            .headers(self.headers()?)
            .query(&[
                ("select", "*".to_string()),
                ("id", format!("in.({})", id_list)),
            ])
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        Self::parse_json(response).await
    }

    async fn insert(&self, table: Table, row: Value) -> Result<()> {
        let url = self.table_url(table);
        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&vec![row])
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        Self::check_response(response).await?;
        Ok(())
    }

    async fn upsert(&self, table: Table, rows: Vec<Value>) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let url = self.table_url(table);
        let mut headers = self.headers()?;
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates"),
        );
        let response = self
            .client
            .post(&url)
            .headers(headers)
            .query(&[("on_conflict", "id")])
            .json(&rows)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        Self::check_response(response).await?;
        Ok(())
    }

    async fn update_by_id(&self, table: Table, id: Uuid, patch: Value) -> Result<()> {
        let url = self.table_url(table);
        let response = self
            .client
            .patch(&url)
            .headers(self.headers()?)
            .query(&[("id", format!("eq.{}", id))])
            .json(&patch)
            .send()
            .await
            .map_err(Self::map_transport_error)?;

        Self::check_response(response).await?;
        Ok(())
    }
}
