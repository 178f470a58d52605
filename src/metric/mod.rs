//! Structured measurements and the line-protocol boundary.
//!
//! Raw test data is written in InfluxDB line protocol:
//!
//! ```text
//! measurement[,tag=value...] field=value[,field=value...] [timestamp]
//! ```
//!
//! [`parse_all`] turns the raw lines of a test into [`Metric`]s, stamping each
//! with the next value from a [`Counter`]. [`serialize`] renders a metric back
//! to the bytes that get written to Kapacitor or InfluxDB.

mod parser;
mod serializer;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::counter::Counter;
use crate::error::ParseError;

pub use parser::parse_line;
pub use serializer::serialize;

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Unsigned(u64),
    String(String),
    Boolean(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Float(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}i"),
            Self::Unsigned(v) => write!(f, "{v}u"),
            Self::String(v) => write!(f, "{v:?}"),
            Self::Boolean(v) => write!(f, "{v}"),
        }
    }
}

/// One measurement point.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    pub timestamp: DateTime<Utc>,
}

impl Metric {
    pub fn new(measurement: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

/// Parses every line of a test's data, assigning timestamps from `counter`.
///
/// The counter is advanced exactly once per line, in order, so `metrics[i]`
/// corresponds to counter call `i`. The first malformed line aborts the whole
/// batch and nothing is returned.
pub fn parse_all<S: AsRef<str>>(
    lines: &[S],
    counter: &mut Counter,
) -> Result<Vec<Metric>, ParseError> {
    let mut metrics = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let line_no = i + 1;
        let stamp = counter
            .next()
            .ok_or_else(|| ParseError::new(line_no, "timestamp counter exhausted"))?;
        let metric = parse_line(line.as_ref(), stamp)
            .map_err(|err| ParseError::new(line_no, err.message))?;
        debug!(
            measurement = %metric.measurement,
            timestamp = %metric.timestamp,
            fields = ?metric.fields,
            "Parsed data point"
        );
        metrics.push(metric);
    }
    Ok(metrics)
}
