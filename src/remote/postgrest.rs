use anyhow::{anyhow, Context, Result};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

use crate::connectivity::{ConnectivityProbe, ConnectivityState};
use crate::error::RemoteError;
use crate::settings::Settings;

use super::{RemoteStore, Rows};

const REST_PREFIX: &str = "/rest/v1";

/// Blocking client for the hosted database's REST endpoint
pub struct PostgrestStore {
    base_url: String,
    api_key: String,
    client: Client,
    probe_client: Client,
}

impl PostgrestStore {
    pub fn new(
        base_url: &str,
        api_key: &str,
        request_timeout: Duration,
        probe_timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let probe_client = Client::builder()
            .timeout(probe_timeout)
            .connect_timeout(probe_timeout)
            .build()
            .context("Failed to build probe HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
            probe_client,
        })
    }

    /// Build a store from `config.toml` / environment settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let url = settings
            .remote_url
            .as_deref()
            .ok_or_else(|| anyhow!("Remote URL not configured. Run 'pharmacy-sync init' first."))?;
        let key = settings
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow!("API key not configured. Run 'pharmacy-sync init' first."))?;

        Self::new(url, key, settings.request_timeout(), settings.probe_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}{}/{}", self.base_url, REST_PREFIX, table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
    }

    fn send(
        &self,
        method: &str,
        table: &str,
        request: RequestBuilder,
    ) -> Result<Rows, RemoteError> {
        log::debug!("{} {}", method, self.table_url(table));
        let response = self
            .authorized(request)
            .send()
            .map_err(|e| RemoteError::Connection(format!("{method} {table}: {e}")))?;
        read_rows(response)
    }
}

/// PostgREST filter value for `column=eq.<value>`
fn eq_filter(key: &Value) -> String {
    match key {
        Value::String(s) => format!("eq.{s}"),
        other => format!("eq.{other}"),
    }
}

fn read_rows(response: Response) -> Result<Rows, RemoteError> {
    let status = response.status();
    let body = response
        .text()
        .map_err(|e| RemoteError::InvalidResponse(format!("failed to read body: {e}")))?;

    if !status.is_success() {
        return Err(RemoteError::Rejected {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }

    if body.trim().is_empty() {
        return Ok(Vec::new());
    }

    match serde_json::from_str::<Value>(&body) {
        Ok(Value::Array(rows)) => Ok(rows),
        Ok(row @ Value::Object(_)) => Ok(vec![row]),
        Ok(other) => Err(RemoteError::InvalidResponse(format!(
            "expected rows, got {other}"
        ))),
        Err(e) => Err(RemoteError::InvalidResponse(format!("{e}: {body}"))),
    }
}

/// PostgREST errors are `{"message": ..., "details": ..., "code": ...}`
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            if body.is_empty() {
                "no response body".to_string()
            } else {
                body.to_string()
            }
        })
}

impl RemoteStore for PostgrestStore {
    fn insert(&self, table: &str, record: &Value) -> Result<Rows, RemoteError> {
        let request = self.client.post(self.table_url(table)).json(record);
        self.send("POST", table, request)
    }

    fn update(
        &self,
        table: &str,
        patch: &Value,
        key_column: &str,
        key: &Value,
    ) -> Result<Rows, RemoteError> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&[(key_column, eq_filter(key))])
            .json(patch);
        self.send("PATCH", table, request)
    }

    fn delete(&self, table: &str, key_column: &str, key: &Value) -> Result<Rows, RemoteError> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&[(key_column, eq_filter(key))]);
        self.send("DELETE", table, request)
    }
}

impl ConnectivityProbe for PostgrestStore {
    /// Any HTTP answer from the REST root means the network path works
    fn probe(&self) -> ConnectivityState {
        let url = format!("{}{}/", self.base_url, REST_PREFIX);
        match self
            .probe_client
            .get(&url)
            .header("apikey", &self.api_key)
            .send()
        {
            Ok(_) => ConnectivityState::Online,
            Err(e) => {
                log::debug!("Probe of {url} failed: {e}");
                ConnectivityState::Offline
            }
        }
    }
}
