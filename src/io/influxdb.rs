//! InfluxDB 1.x HTTP API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info};

use super::{endpoint, http_error, ClientError, Store, DEFAULT_RETENTION_POLICY};

const QUERY_PATH: &str = "/query";
const WRITE_PATH: &str = "/write";

/// Client for a single InfluxDB instance.
#[derive(Debug, Clone)]
pub struct InfluxDbClient {
    host: String,
    client: Client,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StatementResult {
    #[serde(default)]
    error: Option<String>,
}

impl InfluxDbClient {
    /// Creates a client whose requests time out after `timeout`.
    pub fn new(host: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::ClientBuilder::new().timeout(timeout).build()?;
        Ok(Self::with_client(host, client))
    }

    pub fn with_client(host: &str, client: Client) -> Self {
        Self {
            host: host.to_string(),
            client,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }
}

#[async_trait]
impl Store for InfluxDbClient {
    async fn create_database(&self, name: &str, rp: &str) -> Result<(), ClientError> {
        let rp = if rp.is_empty() {
            DEFAULT_RETENTION_POLICY
        } else {
            rp
        };
        info!(db = name, rp, "InfluxDB creating database");
        let statement = format!(
            "CREATE DATABASE {} WITH DURATION 6h REPLICATION 1 NAME {}",
            quote_ident(name),
            quote_ident(rp)
        );
        self.query(&statement).await
    }

    async fn drop_database(&self, name: &str) -> Result<(), ClientError> {
        info!(db = name, "InfluxDB dropping database");
        self.query(&format!("DROP DATABASE {}", quote_ident(name))).await
    }

    async fn inject_data(
        &self,
        records: &[Vec<u8>],
        db: &str,
        rp: &str,
    ) -> Result<(), ClientError> {
        let url = endpoint(&self.host, WRITE_PATH);
        for record in records {
            let res = self
                .client
                .post(&url)
                .query(&[("db", db), ("rp", rp)])
                .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(record.clone())
                .send()
                .await?;
            if res.status() != StatusCode::NO_CONTENT {
                error!(db, rp, status = res.status().as_u16(), "InfluxDB rejected data point");
                return Err(http_error(res).await);
            }
            debug!(db, rp, data = %String::from_utf8_lossy(record).trim_end(), "InfluxDB added data");
        }
        Ok(())
    }

    async fn query(&self, statement: &str) -> Result<(), ClientError> {
        let url = endpoint(&self.host, QUERY_PATH);
        let res = self
            .client
            .post(&url)
            .form(&[("q", statement)])
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(http_error(res).await);
        }
        let body = res.bytes().await?;
        debug!(statement, response = %String::from_utf8_lossy(&body), "InfluxDB query");
        if body.is_empty() {
            return Ok(());
        }
        let parsed: QueryResponse = serde_json::from_slice(&body)?;
        if let Some(err) = parsed.error {
            return Err(ClientError::Query(err));
        }
        if let Some(err) = parsed.results.into_iter().find_map(|r| r.error) {
            return Err(ClientError::Query(err));
        }
        Ok(())
    }
}

/// Double-quotes an InfluxQL identifier, escaping `\` and `"` inside it.
fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if matches!(c, '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
