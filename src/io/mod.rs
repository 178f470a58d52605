//! Collaborator contracts for the two backing services.
//!
//! The orchestrator only talks to Kapacitor and InfluxDB through the
//! [`ExecutionEngine`] and [`Store`] traits. [`KapacitorClient`] and
//! [`InfluxDbClient`] are the HTTP implementations; tests substitute
//! scripted in-memory versions.

pub mod influxdb;
pub mod kapacitor;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::case::TestKind;

pub use influxdb::InfluxDbClient;
pub use kapacitor::KapacitorClient;

/// Raw per-stat alert counters, summed over every alert node of a task.
pub type AlertStats = BTreeMap<String, i64>;

/// Retention policy used when a test does not name one.
pub const DEFAULT_RETENTION_POLICY: &str = "autogen";

/// Errors returned by collaborator calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The service answered with an unexpected HTTP status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Connection, TLS or timeout failure below HTTP.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The response body was not the JSON we expected.
    #[error("Unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The task's statistics contain no `alert*` node.
    #[error("no alert data found in task statistics")]
    NoAlertData,

    /// An alert-node statistic was not a number.
    #[error("alert statistic '{key}' is not numeric")]
    NonNumericStat { key: String },

    /// InfluxDB accepted the request but reported a statement error.
    #[error("Query failed: {0}")]
    Query(String),

    /// A Kapacitor replay finished in a failed state.
    #[error("Replay '{id}' failed: {message}")]
    Replay { id: String, message: String },
}

/// A `db`/`rp` pair a task reads from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Dbrp {
    pub db: String,
    pub rp: String,
}

/// Task definition as sent to Kapacitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TestKind,
    pub script: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dbrps: Vec<Dbrp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Enabled,
    Disabled,
}

/// The alerting engine under test (Kapacitor).
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Creates or replaces the task with `definition.id`.
    async fn load_task(&self, definition: &TaskDefinition) -> Result<(), ClientError>;

    /// Deletes a task. Deleting a task that does not exist succeeds.
    async fn delete_task(&self, id: &str) -> Result<(), ClientError>;

    /// Writes line-protocol records one at a time, stopping at the first failure.
    async fn inject_data(&self, records: &[Vec<u8>], db: &str, rp: &str)
        -> Result<(), ClientError>;

    /// Sums the counters of every `alert*` node of the task.
    async fn query_alert_stats(&self, id: &str) -> Result<AlertStats, ClientError>;

    /// Replays a stored recording against the task and waits for it to finish.
    async fn replay_recording(&self, task_id: &str, recording_id: &str)
        -> Result<(), ClientError>;
}

/// The time-series store batch tasks query (InfluxDB).
#[async_trait]
pub trait Store: Send + Sync {
    /// Creates `name` with retention policy `rp` (`autogen` when empty).
    async fn create_database(&self, name: &str, rp: &str) -> Result<(), ClientError>;

    async fn drop_database(&self, name: &str) -> Result<(), ClientError>;

    /// Writes line-protocol records one at a time, stopping at the first failure.
    async fn inject_data(&self, records: &[Vec<u8>], db: &str, rp: &str)
        -> Result<(), ClientError>;

    /// Runs an administrative statement.
    async fn query(&self, statement: &str) -> Result<(), ClientError>;
}

/// Reads the body of a non-success response into a [`ClientError::Http`].
pub(crate) async fn http_error(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ClientError::Http { status, body }
}

/// Joins a base URL and a path without doubling the slash.
pub(crate) fn endpoint(host: &str, path: &str) -> String {
    format!("{}{}", host.trim_end_matches('/'), path)
}
