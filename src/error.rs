//! Error types for test execution.
//!
//! [`TestError`] is what [`TestCase::run`](crate::case::TestCase::run) surfaces
//! to its caller. Only [`TestError::ResultMismatch`] is a genuine *test failure*;
//! every other variant is a fault in configuration, input data, or one of the
//! backing services.

use std::time::Duration;

use crate::case::Phase;
use crate::io::ClientError;

/// Errors that abort a single test run.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// The test definition is unusable (e.g. both `data` and `recording_id`
    /// are set, or `data_period < data_jitter`).
    #[error("Configuration error in test '{test}': {message}")]
    Configuration { test: String, message: String },

    /// A call into Kapacitor or InfluxDB failed.
    #[error("{phase} failed: {source}")]
    Collaborator {
        phase: Phase,
        #[source]
        source: ClientError,
    },

    /// A raw data line is not valid line protocol.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A metric could not be rendered back to line protocol.
    #[error(transparent)]
    Serialize(#[from] SerializeError),

    /// Observed alert counts differ from the expected ones.
    #[error("Test '{test}' ({task}) failed: {detail}")]
    ResultMismatch {
        test: String,
        task: String,
        detail: String,
    },

    /// A collaborator call or the batch wait exceeded its deadline.
    #[error("{phase} timed out after {after:?}")]
    Timeout { phase: Phase, after: Duration },

    /// The run was cancelled before `phase` completed.
    #[error("{phase} cancelled")]
    Cancelled { phase: Phase },

    /// The OS entropy source could not seed the jitter generator.
    #[error("Cannot seed jitter generator from OS entropy: {0}")]
    Entropy(#[from] rand::rngs::SysError),

    /// The TICKscript for the test could not be read.
    #[error(transparent)]
    TaskLoad(#[from] TaskLoadError),
}

impl TestError {
    /// Returns `true` if this is an alert-count mismatch rather than a fault.
    pub fn is_test_failure(&self) -> bool {
        matches!(self, Self::ResultMismatch { .. })
    }

    /// Returns the lifecycle phase the error originated in, if known.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Collaborator { phase, .. }
            | Self::Timeout { phase, .. }
            | Self::Cancelled { phase } => Some(*phase),
            Self::Parse(_) => Some(Phase::DataParsed),
            Self::Serialize(_) => Some(Phase::DataInjected),
            Self::ResultMismatch { .. } => Some(Phase::ResultsFetched),
            _ => None,
        }
    }
}

/// A malformed line-protocol record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Invalid line protocol at line {line}: {message}")]
pub struct ParseError {
    /// 1-based position of the offending line in the test's `data` list.
    pub line: usize,
    pub message: String,
}

impl ParseError {
    pub(crate) fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// A metric that cannot be expressed as line protocol.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SerializeError {
    #[error("Metric has an empty measurement name")]
    EmptyMeasurement,

    #[error("Metric '{measurement}' has no fields")]
    NoFields { measurement: String },

    #[error("Field '{field}' of '{measurement}' is not a finite number")]
    NonFiniteFloat { measurement: String, field: String },

    #[error("Timestamp of '{measurement}' does not fit in nanoseconds since epoch")]
    TimestampOutOfRange { measurement: String },
}

/// Failure to read a TICKscript from disk.
#[derive(Debug, thiserror::Error)]
#[error("Failed to read TICKscript '{path}': {source}")]
pub struct TaskLoadError {
    pub path: String,
    #[source]
    pub source: std::io::Error,
}

/// Failure to read or parse the test-suite configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read test file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse test file: {source}")]
    Parse {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("Invalid test file: {message}")]
    Validation { message: String },
}
