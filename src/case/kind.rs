//! Per-kind behaviour for stream and batch TICKscripts.
//!
//! Everything that differs between the two execution modes lives behind
//! [`KindStrategy`]: how the script is prepared before loading, which store
//! resources must exist first, where data is written, and how long to wait
//! before asking for alert statistics.

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::cleanup::Cleanup;
use crate::config::RunOptions;
use crate::io::{ClientError, ExecutionEngine, Store};

static BATCH_EVERY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"every\((.*?)\)").expect("literal regex is valid"));

/// Execution mode of the TICKscript under test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestKind {
    /// Continuous per-point evaluation; data goes straight to Kapacitor.
    #[default]
    Stream,
    /// Periodic queries against InfluxDB; data goes to the store.
    Batch,
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream => write!(f, "stream"),
            Self::Batch => write!(f, "batch"),
        }
    }
}

impl TestKind {
    pub fn strategy(&self) -> &'static dyn KindStrategy {
        match self {
            Self::Stream => &StreamKind,
            Self::Batch => &BatchKind,
        }
    }
}

/// The operations whose behaviour depends on [`TestKind`].
#[async_trait]
pub trait KindStrategy: Send + Sync {
    /// Rewrites the script before it is loaded into Kapacitor.
    fn prepare_script(&self, script: &str) -> String {
        script.to_string()
    }

    /// Records the store resources this kind owns so teardown removes them
    /// even when setup fails before they are created.
    fn register_resources(&self, _db: &str, _cleanup: &mut Cleanup) {}

    /// Creates any store resources the task needs.
    async fn provision(
        &self,
        _store: &dyn Store,
        _db: &str,
        _rp: &str,
    ) -> Result<(), ClientError> {
        Ok(())
    }

    /// Writes serialized records to the service this kind reads from.
    async fn inject(
        &self,
        engine: &dyn ExecutionEngine,
        store: &dyn Store,
        records: &[Vec<u8>],
        db: &str,
        rp: &str,
    ) -> Result<(), ClientError>;

    /// How long to let the engine process data before querying results.
    fn grace_period(&self, _options: &RunOptions) -> Option<Duration> {
        None
    }
}

/// Stream tasks: data through Kapacitor's write endpoint, no wait.
#[derive(Debug)]
pub struct StreamKind;

#[async_trait]
impl KindStrategy for StreamKind {
    async fn inject(
        &self,
        engine: &dyn ExecutionEngine,
        _store: &dyn Store,
        records: &[Vec<u8>],
        db: &str,
        rp: &str,
    ) -> Result<(), ClientError> {
        engine.inject_data(records, db, rp).await
    }
}

/// Batch tasks: an ephemeral database, data through InfluxDB, and a grace
/// period for the batch query to fire.
#[derive(Debug)]
pub struct BatchKind;

#[async_trait]
impl KindStrategy for BatchKind {
    /// Forces every `.every(..)` to `1s` so the query runs within the grace period.
    fn prepare_script(&self, script: &str) -> String {
        BATCH_EVERY.replace_all(script, "every(1s)").into_owned()
    }

    fn register_resources(&self, db: &str, cleanup: &mut Cleanup) {
        cleanup.register_database(db);
    }

    async fn provision(
        &self,
        store: &dyn Store,
        db: &str,
        rp: &str,
    ) -> Result<(), ClientError> {
        store.create_database(db, rp).await
    }

    async fn inject(
        &self,
        _engine: &dyn ExecutionEngine,
        store: &dyn Store,
        records: &[Vec<u8>],
        db: &str,
        rp: &str,
    ) -> Result<(), ClientError> {
        store.inject_data(records, db, rp).await
    }

    fn grace_period(&self, options: &RunOptions) -> Option<Duration> {
        info!(grace = ?options.batch_grace, "Processing batch script");
        Some(options.batch_grace)
    }
}
