//! Kapacitor HTTP API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{endpoint, http_error, AlertStats, ClientError, ExecutionEngine, TaskDefinition};

const TASKS_PATH: &str = "/kapacitor/v1/tasks";
const WRITE_PATH: &str = "/kapacitor/v1/write";
const REPLAYS_PATH: &str = "/kapacitor/v1/replays";

/// Node-stats entries whose name starts with this prefix are alert nodes.
const ALERT_NODE_PREFIX: &str = "alert";

const REPLAY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Client for a single Kapacitor instance.
#[derive(Debug, Clone)]
pub struct KapacitorClient {
    host: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct TaskInfo {
    #[serde(default)]
    stats: TaskStats,
}

#[derive(Debug, Default, Deserialize)]
struct TaskStats {
    #[serde(rename = "node-stats", default)]
    node_stats: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct Replay {
    id: String,
    status: String,
    #[serde(default)]
    error: String,
}

impl KapacitorClient {
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

    async fn fetch_replay(&self, id: &str) -> Result<Replay, ClientError> {
        let url = endpoint(&self.host, &format!("{REPLAYS_PATH}/{id}"));
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            return Err(http_error(res).await);
        }
        Ok(serde_json::from_slice(&res.bytes().await?)?)
    }
}

#[async_trait]
impl ExecutionEngine for KapacitorClient {
    async fn load_task(&self, definition: &TaskDefinition) -> Result<(), ClientError> {
        info!(task = %definition.id, kind = %definition.kind, "Kapacitor loading task");
        let url = endpoint(&self.host, TASKS_PATH);
        let res = self.client.post(&url).json(definition).send().await?;
        if res.status() != StatusCode::OK {
            return Err(http_error(res).await);
        }
        Ok(())
    }

    async fn delete_task(&self, id: &str) -> Result<(), ClientError> {
        let url = endpoint(&self.host, &format!("{TASKS_PATH}/{id}"));
        let res = self.client.delete(&url).send().await?;
        match res.status() {
            s if s.is_success() => {
                info!(task = id, "Kapacitor deleted task");
                Ok(())
            },
            StatusCode::NOT_FOUND => {
                debug!(task = id, "Kapacitor task already absent");
                Ok(())
            },
            _ => Err(http_error(res).await),
        }
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
                .body(record.clone())
                .send()
                .await?;
            if !res.status().is_success() {
                return Err(http_error(res).await);
            }
            debug!(db, rp, data = %String::from_utf8_lossy(record).trim_end(), "Kapacitor added data");
        }
        Ok(())
    }

    async fn query_alert_stats(&self, id: &str) -> Result<AlertStats, ClientError> {
        info!(task = id, "Kapacitor fetching task status");
        let url = endpoint(&self.host, &format!("{TASKS_PATH}/{id}"));
        let res = self.client.get(&url).send().await?;
        if !res.status().is_success() {
            return Err(http_error(res).await);
        }
        let info: TaskInfo = serde_json::from_slice(&res.bytes().await?)?;
        alert_stats(&info.stats.node_stats)
    }

    async fn replay_recording(&self, task_id: &str, recording_id: &str) -> Result<(), ClientError> {
        info!(task = task_id, recording = recording_id, "Kapacitor replaying recording");
        let url = endpoint(&self.host, REPLAYS_PATH);
        let body = json!({
            "task": task_id,
            "recording": recording_id,
            "clock": "fast",
            "recording-time": false,
        });
        let res = self.client.post(&url).json(&body).send().await?;
        if !res.status().is_success() {
            return Err(http_error(res).await);
        }
        let mut replay: Replay = serde_json::from_slice(&res.bytes().await?)?;
        while replay.status == "running" {
            tokio::time::sleep(REPLAY_POLL_INTERVAL).await;
            replay = self.fetch_replay(&replay.id).await?;
        }
        if replay.status == "failed" {
            return Err(ClientError::Replay {
                id: replay.id,
                message: replay.error,
            });
        }
        debug!(replay = %replay.id, status = %replay.status, "Replay finished");
        Ok(())
    }
}

/// Sums every stat of every `alert*` node.
fn alert_stats(node_stats: &serde_json::Map<String, Value>) -> Result<AlertStats, ClientError> {
    let mut stats = AlertStats::new();
    let mut found = false;
    for (node, values) in node_stats {
        if !node.starts_with(ALERT_NODE_PREFIX) {
            continue;
        }
        found = true;
        let Some(values) = values.as_object() else {
            return Err(ClientError::NonNumericStat { key: node.clone() });
        };
        for (key, value) in values {
            let count = value
                .as_f64()
                .ok_or_else(|| ClientError::NonNumericStat { key: key.clone() })?;
            *stats.entry(key.clone()).or_insert(0) += count as i64;
        }
    }
    if !found {
        return Err(ClientError::NoAlertData);
    }
    Ok(stats)
}
