use std::fmt::Write as _;

use super::{FieldValue, Metric};
use crate::error::SerializeError;

/// Renders a metric as one newline-terminated line-protocol record.
///
/// Tags and fields are emitted in key order. The timestamp is always written,
/// in nanoseconds since the Unix epoch.
pub fn serialize(metric: &Metric) -> Result<Vec<u8>, SerializeError> {
    if metric.measurement.is_empty() {
        return Err(SerializeError::EmptyMeasurement);
    }
    if metric.fields.is_empty() {
        return Err(SerializeError::NoFields {
            measurement: metric.measurement.clone(),
        });
    }
    let nanos =
        metric
            .timestamp
            .timestamp_nanos_opt()
            .ok_or_else(|| SerializeError::TimestampOutOfRange {
                measurement: metric.measurement.clone(),
            })?;

    let mut line = escape(&metric.measurement, &[',', ' ']);
    for (key, value) in &metric.tags {
        line.push(',');
        line.push_str(&escape(key, &[',', '=', ' ']));
        line.push('=');
        line.push_str(&escape(value, &[',', '=', ' ']));
    }

    let mut first = true;
    for (key, value) in &metric.fields {
        line.push(if first { ' ' } else { ',' });
        first = false;
        line.push_str(&escape(key, &[',', '=', ' ']));
        line.push('=');
        match value {
            FieldValue::Float(v) if !v.is_finite() => {
                return Err(SerializeError::NonFiniteFloat {
                    measurement: metric.measurement.clone(),
                    field: key.clone(),
                });
            },
            FieldValue::String(s) => {
                line.push('"');
                line.push_str(&escape(s, &['"']));
                line.push('"');
            },
            other => {
                let _ = write!(line, "{other}");
            },
        }
    }

    let _ = writeln!(line, " {nanos}");
    Ok(line.into_bytes())
}

fn escape(raw: &str, specials: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == '\\' || specials.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
