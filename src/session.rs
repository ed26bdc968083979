//! Authenticated access to the store's REST endpoint.
//!
//! `TableStore` is the seam the prober talks to; `Session` implements it over
//! reqwest. Tests substitute in-memory stores.

use crate::errors::{ProbeError, ResultExt};
use crate::models::{Record, TableName};
use crate::postgrest::{classify_failure, parse_content_range_total};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_RANGE};
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Raw rejection returned for an insert probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: u16,
    pub body: String,
}

/// Outcome of an insert probe that reached the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// The expected path: the placeholder was refused.
    Rejected(Rejection),
    /// The placeholder was stored. Rows are whatever the backend echoed back.
    Inserted(Vec<Record>),
}

/// Operations the prober needs from the remote store.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn select_sample(&self, table: &TableName, limit: usize)
        -> Result<Vec<Record>, ProbeError>;

    async fn count(&self, table: &TableName) -> Result<u64, ProbeError>;

    async fn insert_probe(
        &self,
        table: &TableName,
        placeholder: &Record,
    ) -> Result<InsertOutcome, ProbeError>;

    /// Removes rows where `column = value`. Only used to undo an insert probe.
    async fn delete_row(
        &self,
        table: &TableName,
        column: &str,
        value: &Value,
    ) -> Result<(), ProbeError>;
}

/// Authenticated handle to the REST endpoint of the store.
#[derive(Clone)]
pub struct Session {
    client: reqwest::Client,
    rest_url: Url,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("rest_url", &self.rest_url.as_str())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a session for `base_address`, authenticating with `credential`.
    ///
    /// # Arguments
    ///
    /// * `base_address` - Project URL, e.g. `https://abc.supabase.co`. `/rest/v1/` is appended.
    /// * `credential` - API key sent as both `apikey` and bearer token.
    /// * `timeout` - Per-request timeout.
    ///
    /// # Returns
    ///
    /// * `Result<Session, ProbeError>` - `Configuration` when either argument is
    ///   empty or the address is not http(s). No request is made here.
    pub fn connect(
        base_address: &str,
        credential: &str,
        timeout: Duration,
    ) -> Result<Self, ProbeError> {
        if base_address.trim().is_empty() {
            return Err(ProbeError::Configuration(
                "base address cannot be empty".to_string(),
            ));
        }
        if credential.trim().is_empty() {
            return Err(ProbeError::Configuration(
                "credential cannot be empty".to_string(),
            ));
        }

        let base = Url::parse(base_address.trim()).map_err(|e| {
            ProbeError::Configuration(format!("invalid base address {}: {}", base_address, e))
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(ProbeError::Configuration(format!(
                "base address must be http or https, got {}",
                base.scheme()
            )));
        }
        let rest_url = Url::parse(&format!(
            "{}/rest/v1/",
            base.as_str().trim_end_matches('/')
        ))
        .map_err(|e| ProbeError::Configuration(format!("invalid REST address: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", sensitive_header(credential.trim())?);
        headers.insert(
            AUTHORIZATION,
            sensitive_header(&format!("Bearer {}", credential.trim()))?,
        );

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| {
                ProbeError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        tracing::info!("✓ Session ready for {}", rest_url);
        Ok(Self { client, rest_url })
    }

    fn table_url(&self, table: &TableName) -> Result<Url, ProbeError> {
        let mut url = self.rest_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProbeError::Configuration("base address cannot be a base".to_string()))?
            .pop_if_empty()
            .push(table.as_str());
        Ok(url)
    }

    async fn failure(response: reqwest::Response) -> ProbeError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        classify_failure(status, &body)
    }
}

fn sensitive_header(value: &str) -> Result<HeaderValue, ProbeError> {
    let mut header = HeaderValue::from_str(value).map_err(|_| {
        ProbeError::Configuration("credential contains invalid header characters".to_string())
    })?;
    header.set_sensitive(true);
    Ok(header)
}

#[async_trait]
impl TableStore for Session {
    async fn select_sample(
        &self,
        table: &TableName,
        limit: usize,
    ) -> Result<Vec<Record>, ProbeError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("limit", &limit.to_string());
        tracing::debug!("Sampling {} rows from {}", limit, table);

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let body = response.text().await?;
        let rows: Vec<Value> = serde_json::from_str(&body)
            .map_err(ProbeError::from)
            .context(format!("decoding sample of {}", table))?;
        rows.into_iter()
            .map(|row| match row {
                Value::Object(record) => Ok(record),
                other => Err(ProbeError::Malformed(format!(
                    "expected row object, got {}",
                    other
                ))),
            })
            .collect()
    }

    async fn count(&self, table: &TableName) -> Result<u64, ProbeError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("limit", "0");
        tracing::debug!("Counting rows of {}", table);

        let response = self
            .client
            .get(url)
            .header("Prefer", "count=exact")
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let header = response
            .headers()
            .get(CONTENT_RANGE)
            .ok_or_else(|| ProbeError::Malformed("response has no Content-Range".to_string()))?
            .to_str()
            .map_err(|_| ProbeError::Malformed("Content-Range is not ASCII".to_string()))?;
        parse_content_range_total(header).with_context(|| format!("counting rows of {}", table))
    }

    async fn insert_probe(
        &self,
        table: &TableName,
        placeholder: &Record,
    ) -> Result<InsertOutcome, ProbeError> {
        let url = self.table_url(table)?;
        tracing::debug!("Sending insert probe to {}", table);

        let response = self
            .client
            .post(url)
            .header("Prefer", "return=representation")
            .json(placeholder)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Ok(InsertOutcome::Rejected(Rejection {
                status: status.as_u16(),
                body,
            }));
        }

        // An empty body still means a row landed; there is just nothing to read back
        let rows = match serde_json::from_str::<Value>(&body) {
            Ok(Value::Array(rows)) => rows
                .into_iter()
                .filter_map(|row| match row {
                    Value::Object(record) => Some(record),
                    _ => None,
                })
                .collect(),
            Ok(Value::Object(record)) => vec![record],
            _ => Vec::new(),
        };
        Ok(InsertOutcome::Inserted(rows))
    }

    async fn delete_row(
        &self,
        table: &TableName,
        column: &str,
        value: &Value,
    ) -> Result<(), ProbeError> {
        let literal = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            other => {
                return Err(ProbeError::Malformed(format!(
                    "cannot filter on {} value {}",
                    column, other
                )))
            }
        };
        let mut url = self.table_url(table)?;
        url.query_pairs_mut()
            .append_pair(column, &format!("eq.{}", literal));
        tracing::warn!("Deleting probe row {}={} from {}", column, literal, table);

        let response = self.client.delete(url).send().await?;
        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }
        Ok(())
    }
}
