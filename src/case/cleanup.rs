//! Ledger of external resources a test has (or may have) created.
//!
//! Each resource is registered *before* setup starts calling out, so a setup
//! that fails at any step (or times out) still has everything removed. [`Cleanup::release`]
//! is best-effort: every step is attempted, failures are logged and returned
//! for inspection, never propagated.

use std::time::Duration;

use tracing::{error, info};

use crate::io::{ClientError, ExecutionEngine, Store};

/// Resources to remove once a test finishes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Cleanup {
    task: Option<String>,
    database: Option<String>,
}

/// A cleanup step that did not succeed.
#[derive(Debug)]
pub enum CleanupFailure {
    DropDatabase { db: String, error: CleanupError },
    DeleteTask { task: String, error: CleanupError },
}

#[derive(Debug, thiserror::Error)]
pub enum CleanupError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

impl Cleanup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_task(&mut self, id: &str) {
        self.task = Some(id.to_string());
    }

    pub fn register_database(&mut self, db: &str) {
        self.database = Some(db.to_string());
    }

    pub fn task(&self) -> Option<&str> {
        self.task.as_deref()
    }

    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.task.is_none() && self.database.is_none()
    }

    /// Drops the database (if any), then deletes the task (if any).
    ///
    /// Each call is bounded by `timeout` but ignores cancellation.
    pub async fn release(
        self,
        engine: &dyn ExecutionEngine,
        store: &dyn Store,
        timeout: Duration,
    ) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();

        if let Some(db) = self.database {
            match bounded(timeout, store.drop_database(&db)).await {
                Ok(()) => info!(db = %db, "Dropped test database"),
                Err(error) => {
                    error!(db = %db, error = %error, "Error performing teardown in cleanup");
                    failures.push(CleanupFailure::DropDatabase { db, error });
                },
            }
        }

        if let Some(task) = self.task {
            match bounded(timeout, engine.delete_task(&task)).await {
                Ok(()) => info!(task = %task, "Deleted test task"),
                Err(error) => {
                    error!(task = %task, error = %error, "Error performing teardown in delete");
                    failures.push(CleanupFailure::DeleteTask { task, error });
                },
            }
        }

        failures
    }
}

async fn bounded<F>(timeout: Duration, call: F) -> Result<(), CleanupError>
where
    F: std::future::Future<Output = Result<(), ClientError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(CleanupError::Timeout(timeout)),
    }
}
