use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{FieldValue, Metric};
use crate::error::ParseError;

/// Parses a single line-protocol record.
///
/// `default_timestamp` is used when the line carries no timestamp of its own.
/// Errors report `line` 1; [`parse_all`](super::parse_all) rewrites it to the
/// position within the test data.
pub fn parse_line(line: &str, default_timestamp: DateTime<Utc>) -> Result<Metric, ParseError> {
    parse(line.trim(), default_timestamp).map_err(|message| ParseError::new(1, message))
}

fn parse(line: &str, default_timestamp: DateTime<Utc>) -> Result<Metric, String> {
    if line.is_empty() {
        return Err("empty line".to_string());
    }
    if line.starts_with('#') {
        return Err("comment lines carry no data".to_string());
    }

    let (key, rest) = split_once_unescaped(line, ' ', false)
        .ok_or_else(|| "missing fields".to_string())?;
    let rest = rest.trim_start_matches(' ');

    let sections: Vec<&str> = split_unescaped(rest, ' ', true)
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();
    let (fields_section, timestamp) = match sections.as_slice() {
        [fields] => (*fields, default_timestamp),
        [fields, ts] => (*fields, parse_timestamp(ts)?),
        [] => return Err("missing fields".to_string()),
        _ => return Err("unexpected trailing content after timestamp".to_string()),
    };

    let mut key_parts = split_unescaped(key, ',', false).into_iter();
    let measurement = unescape(key_parts.next().unwrap_or_default());
    if measurement.is_empty() {
        return Err("missing measurement".to_string());
    }

    let mut tags = BTreeMap::new();
    for tag in key_parts {
        let (k, v) = split_once_unescaped(tag, '=', false)
            .ok_or_else(|| format!("tag '{tag}' is missing '='"))?;
        if k.is_empty() || v.is_empty() {
            return Err(format!("tag '{tag}' has an empty key or value"));
        }
        tags.insert(unescape(k), unescape(v));
    }

    let mut fields = BTreeMap::new();
    for field in split_unescaped(fields_section, ',', true) {
        let (k, v) = split_once_unescaped(field, '=', false)
            .ok_or_else(|| format!("field '{field}' is missing '='"))?;
        if k.is_empty() {
            return Err(format!("field '{field}' has an empty key"));
        }
        fields.insert(unescape(k), parse_field_value(v)?);
    }

    Ok(Metric {
        measurement,
        tags,
        fields,
        timestamp,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let nanos: i64 = raw
        .parse()
        .map_err(|_| format!("invalid timestamp '{raw}'"))?;
    Ok(DateTime::from_timestamp_nanos(nanos))
}

fn parse_field_value(raw: &str) -> Result<FieldValue, String> {
    if raw.is_empty() {
        return Err("empty field value".to_string());
    }
    if let Some(inner) = raw.strip_prefix('"') {
        let inner = inner
            .strip_suffix('"')
            .ok_or_else(|| format!("unterminated string value {raw}"))?;
        return Ok(FieldValue::String(unescape_string(inner)));
    }
    match raw {
        "t" | "T" | "true" | "True" | "TRUE" => return Ok(FieldValue::Boolean(true)),
        "f" | "F" | "false" | "False" | "FALSE" => return Ok(FieldValue::Boolean(false)),
        _ => {},
    }
    if let Some(int) = raw.strip_suffix('i') {
        return int
            .parse()
            .map(FieldValue::Integer)
            .map_err(|_| format!("invalid integer value '{raw}'"));
    }
    if let Some(uint) = raw.strip_suffix('u') {
        return uint
            .parse()
            .map(FieldValue::Unsigned)
            .map_err(|_| format!("invalid unsigned value '{raw}'"));
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(FieldValue::Float(v)),
        _ => Err(format!("invalid field value '{raw}'")),
    }
}

/// Splits on every `delim` not preceded by a backslash. When `quotes` is set,
/// a `"` directly after an unescaped `=` opens a string value and delimiters
/// inside it are skipped. A `"` anywhere else is an ordinary key character.
fn split_unescaped(input: &str, delim: char, quotes: bool) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut scanner = Scanner::new(quotes);
    for (i, c) in input.char_indices() {
        if scanner.is_delim(c, delim) {
            parts.push(&input[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&input[start..]);
    parts
}

fn split_once_unescaped(input: &str, delim: char, quotes: bool) -> Option<(&str, &str)> {
    let mut scanner = Scanner::new(quotes);
    input
        .char_indices()
        .find(|&(_, c)| scanner.is_delim(c, delim))
        .map(|(i, c)| (&input[..i], &input[i + c.len_utf8()..]))
}

/// Escape and string-value state while walking a line one char at a time.
struct Scanner {
    quotes: bool,
    escaped: bool,
    in_string: bool,
    after_eq: bool,
}

impl Scanner {
    fn new(quotes: bool) -> Self {
        Self {
            quotes,
            escaped: false,
            in_string: false,
            after_eq: false,
        }
    }

    /// Feeds `c` and reports whether it is a live occurrence of `delim`.
    fn is_delim(&mut self, c: char, delim: char) -> bool {
        let after_eq = std::mem::take(&mut self.after_eq);
        if self.escaped {
            self.escaped = false;
            return false;
        }
        match c {
            '\\' => self.escaped = true,
            '"' if self.quotes && self.in_string => self.in_string = false,
            '"' if self.quotes && after_eq => self.in_string = true,
            _ if self.in_string => {},
            c if c == delim => return true,
            '=' => self.after_eq = true,
            _ => {},
        }
        false
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, ',' | ' ' | '=' | '\\' | '"') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn unescape_string(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if matches!(next, '"' | '\\') {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}
