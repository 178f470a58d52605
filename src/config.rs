//! YAML test-suite configuration and per-run options.
//!
//! # Example YAML
//!
//! ```yaml
//! tests:
//!   - name: "Alert weather:: warning"
//!     task_name: alert_weather.tick
//!     db: weather
//!     rp: default
//!     type: stream
//!     data_period: 1s
//!     data:
//!       - weather,location=us-midwest temperature=75
//!       - weather,location=us-midwest temperature=82
//!     expects:
//!       ok: 0
//!       warn: 1
//!       crit: 0
//! ```
//!
//! A bare list of tests (without the `tests:` key) is accepted too.
//! Service URLs are not part of the file; they come from the command line.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use tokio_util::sync::CancellationToken;

use crate::case::TestKind;
use crate::error::ConfigError;
use crate::result::TestResult;

pub const DEFAULT_KAPACITOR_URL: &str = "http://localhost:9092";
pub const DEFAULT_INFLUXDB_URL: &str = "http://localhost:8086";

/// Time batch tests are given to run their queries before results are read.
pub const BATCH_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Deadline for each individual Kapacitor or InfluxDB call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// One test as written in the suite file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestDefinition {
    pub name: String,
    /// File name of the TICKscript, also used as the Kapacitor task id.
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub db: String,
    #[serde(default)]
    pub rp: String,
    #[serde(rename = "type", default)]
    pub kind: TestKind,
    /// Spacing between generated timestamps, e.g. `1s` or `500ms`.
    #[serde(default, deserialize_with = "duration")]
    pub data_period: Duration,
    #[serde(default, deserialize_with = "duration")]
    pub data_jitter: Duration,
    #[serde(default)]
    pub data: Vec<String>,
    #[serde(default)]
    pub recording_id: Option<String>,
    #[serde(default)]
    pub expects: TestResult,
}

/// All tests from one configuration file, in file order.
#[derive(Debug, Clone, Default)]
pub struct TestSuite {
    pub tests: Vec<TestDefinition>,
}

#[derive(Deserialize)]
struct SuiteFile {
    #[serde(default)]
    tests: Vec<TestDefinition>,
}

impl TestSuite {
    /// Parses a suite from YAML text and checks that every test is named.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let value: serde_yaml::Value = serde_yaml::from_str(content)?;
        let tests = match value {
            serde_yaml::Value::Sequence(_) => serde_yaml::from_value(value)?,
            serde_yaml::Value::Null => Vec::new(),
            other => serde_yaml::from_value::<SuiteFile>(other)?.tests,
        };
        let suite = Self { tests };
        suite.validate()?;
        Ok(suite)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (i, test) in self.tests.iter().enumerate() {
            if test.name.trim().is_empty() {
                return Err(ConfigError::Validation {
                    message: format!("test #{} has no name", i + 1),
                });
            }
            if test.task_name.trim().is_empty() {
                return Err(ConfigError::Validation {
                    message: format!("test '{}' has no task_name", test.name),
                });
            }
        }
        Ok(())
    }
}

/// Knobs shared by every test in a run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Deadline for each collaborator call, including teardown calls.
    pub call_timeout: Duration,
    /// How long batch tests wait between adding data and reading results.
    pub batch_grace: Duration,
    /// Cancels the forward phases of the running test. Teardown still runs.
    pub cancel: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            batch_grace: BATCH_GRACE_PERIOD,
            cancel: CancellationToken::new(),
        }
    }
}

/// Accepts humantime strings (`1s`, `250ms`, `1m 30s`) or integer nanoseconds.
fn duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Nanos(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Nanos(nanos) => Ok(Duration::from_nanos(nanos)),
        Raw::Text(text) => humantime::parse_duration(text.trim())
            .map_err(|e| serde::de::Error::custom(format!("invalid duration '{text}': {e}"))),
    }
}
