//! Test orchestration: one TICKscript, one data set, one expected outcome.
//!
//! [`TestCase::run`] drives a test through its [`Phase`]s:
//!
//! 1. **setup**: load the task into Kapacitor (plus an ephemeral database
//!    for batch tests)
//! 2. **parse data**: turn raw lines into timestamped metrics
//! 3. **add data**: write the metrics (or replay a recording)
//! 4. **wait**: give batch queries time to fire
//! 5. **results**: fetch alert statistics and compare with `expects`
//! 6. **teardown**: always runs, whatever happened above
//!
//! The first error from steps 1-5 skips the remaining forward steps and is
//! returned once teardown has finished. Teardown errors are only logged.

mod cleanup;
mod kind;
mod phase;

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::{RunOptions, TestDefinition};
use crate::counter::Counter;
use crate::error::TestError;
use crate::io::{
    ClientError, Dbrp, ExecutionEngine, Store, TaskDefinition, TaskStatus,
    DEFAULT_RETENTION_POLICY,
};
use crate::metric::{self, Metric};
use crate::result::TestResult;
use crate::task::Task;

pub use cleanup::{Cleanup, CleanupError, CleanupFailure};
pub use kind::{BatchKind, KindStrategy, StreamKind, TestKind};
pub use phase::Phase;

/// A script that already names its database/retention policy.
static DBRP_DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^dbrp "\w+"\."\w+"$"#).expect("literal regex is valid"));

/// A single test and everything it accumulates while running.
#[derive(Debug)]
pub struct TestCase {
    pub name: String,
    /// Kapacitor task id; also the script's file name.
    pub task_name: String,
    pub data_period: Duration,
    pub data_jitter: Duration,
    pub data: Vec<String>,
    pub recording_id: Option<String>,
    pub expects: TestResult,
    pub result: TestResult,
    pub db: String,
    pub rp: String,
    pub kind: TestKind,
    task: Option<Task>,
    metrics: Vec<Metric>,
    phase: Phase,
}

impl From<TestDefinition> for TestCase {
    fn from(def: TestDefinition) -> Self {
        Self {
            name: def.name,
            task_name: def.task_name,
            data_period: def.data_period,
            data_jitter: def.data_jitter,
            data: def.data,
            recording_id: def.recording_id.filter(|id| !id.is_empty()),
            expects: def.expects,
            result: TestResult::default(),
            db: def.db,
            rp: def.rp,
            kind: def.kind,
            task: None,
            metrics: Vec::new(),
            phase: Phase::Created,
        }
    }
}

impl fmt::Display for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TEST {} ({}) {}", self.name, self.task_name, self.result)
    }
}

impl TestCase {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn task(&self) -> Option<&Task> {
        self.task.as_ref()
    }

    /// Metrics produced by the parse-data step.
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Attaches the TICKscript this test exercises.
    pub fn attach_task(&mut self, task: Task) {
        self.task = Some(task);
    }

    /// Retention policy used for dbrp bindings and writes.
    pub fn retention_policy(&self) -> &str {
        if self.rp.is_empty() {
            DEFAULT_RETENTION_POLICY
        } else {
            &self.rp
        }
    }

    /// Checks the definition and records any problem in `result.invalid`.
    ///
    /// Returns `true` when the test may be run.
    pub fn validate(&mut self) -> bool {
        debug!(test = %self.name, "Validating test");
        if !self.data.is_empty() && self.recording_id.is_some() {
            self.result = TestResult::invalid(
                "Configuration file cannot define a recording_id and line protocol data input for the same test case",
            );
        }
        if self.phase == Phase::Created {
            self.advance(Phase::Validated);
        }
        !self.result.invalid
    }

    /// Runs the full lifecycle against the given services.
    ///
    /// An invalid test returns [`TestError::Configuration`] without touching
    /// either service. Otherwise teardown runs exactly once, including when a
    /// phase panics, before the first forward-phase error is returned.
    pub async fn run(
        &mut self,
        engine: &dyn ExecutionEngine,
        store: &dyn Store,
        options: &RunOptions,
    ) -> Result<(), TestError> {
        if self.phase == Phase::Created {
            self.validate();
        }
        if self.result.invalid {
            return Err(self.configuration_error(self.result.message.clone()));
        }
        if self.phase != Phase::Validated {
            return Err(self.configuration_error(format!(
                "test cannot run from the '{}' phase",
                self.phase
            )));
        }

        let mut cleanup = Cleanup::new();
        let outcome = AssertUnwindSafe(self.forward(engine, store, options, &mut cleanup))
            .catch_unwind()
            .await;
        self.teardown(engine, store, options, cleanup).await;

        match outcome {
            Ok(Err(err)) if !err.is_test_failure() => {
                self.result.message = err.to_string();
                Err(err)
            },
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn forward(
        &mut self,
        engine: &dyn ExecutionEngine,
        store: &dyn Store,
        options: &RunOptions,
        cleanup: &mut Cleanup,
    ) -> Result<(), TestError> {
        let strategy = self.kind.strategy();
        self.setup(engine, store, strategy, options, cleanup).await?;
        self.parse_data()?;
        self.add_data(engine, store, strategy, options).await?;
        self.wait(strategy, options).await?;
        self.results(engine, options).await
    }

    async fn setup(
        &mut self,
        engine: &dyn ExecutionEngine,
        store: &dyn Store,
        strategy: &dyn KindStrategy,
        options: &RunOptions,
        cleanup: &mut Cleanup,
    ) -> Result<(), TestError> {
        info!(test = %self.name, task = %self.task_name, kind = %self.kind, "Setting up test");
        let script = match &self.task {
            Some(task) => &task.script,
            None => {
                return Err(self.configuration_error("no TICKscript attached to the test"));
            },
        };

        let mut definition = TaskDefinition {
            id: self.task_name.clone(),
            kind: self.kind,
            script: strategy.prepare_script(script),
            status: TaskStatus::Enabled,
            dbrps: Vec::new(),
        };
        if !DBRP_DECLARATION.is_match(script) {
            definition.dbrps.push(Dbrp {
                db: self.db.clone(),
                rp: self.retention_policy().to_string(),
            });
        }

        cleanup.register_task(&self.task_name);
        strategy.register_resources(&self.db, cleanup);
        guarded(Phase::SetupDone, options, engine.load_task(&definition)).await?;

        let rp = self.retention_policy().to_string();
        guarded(
            Phase::SetupDone,
            options,
            strategy.provision(store, &self.db, &rp),
        )
        .await?;

        self.advance(Phase::SetupDone);
        Ok(())
    }

    fn parse_data(&mut self) -> Result<(), TestError> {
        if !self.data.is_empty() {
            if self.data_period < self.data_jitter {
                return Err(self.configuration_error(format!(
                    "data period ({:?}) should be greater than jitter ({:?})",
                    self.data_period, self.data_jitter
                )));
            }
            let mut counter = Counter::new(
                Utc::now(),
                self.data_period,
                self.data_jitter,
                self.data.len(),
            )?;
            self.metrics = metric::parse_all(&self.data, &mut counter)?;
        }
        self.advance(Phase::DataParsed);
        Ok(())
    }

    async fn add_data(
        &mut self,
        engine: &dyn ExecutionEngine,
        store: &dyn Store,
        strategy: &dyn KindStrategy,
        options: &RunOptions,
    ) -> Result<(), TestError> {
        if let Some(recording) = &self.recording_id {
            guarded(
                Phase::DataInjected,
                options,
                engine.replay_recording(&self.task_name, recording),
            )
            .await?;
        } else if !self.metrics.is_empty() {
            let records = self
                .metrics
                .iter()
                .map(metric::serialize)
                .collect::<Result<Vec<_>, _>>()?;
            let rp = self.retention_policy();
            guarded(
                Phase::DataInjected,
                options,
                strategy.inject(engine, store, &records, &self.db, rp),
            )
            .await?;
        }
        self.advance(Phase::DataInjected);
        Ok(())
    }

    async fn wait(
        &mut self,
        strategy: &dyn KindStrategy,
        options: &RunOptions,
    ) -> Result<(), TestError> {
        if let Some(grace) = strategy.grace_period(options) {
            info!(task = %self.task_name, "Waiting for batch queries");
            tokio::select! {
                _ = options.cancel.cancelled() => {
                    return Err(TestError::Cancelled { phase: Phase::Waited });
                }
                _ = tokio::time::sleep(grace) => {}
            }
        }
        self.advance(Phase::Waited);
        Ok(())
    }

    async fn results(
        &mut self,
        engine: &dyn ExecutionEngine,
        options: &RunOptions,
    ) -> Result<(), TestError> {
        let stats = guarded(
            Phase::ResultsFetched,
            options,
            engine.query_alert_stats(&self.task_name),
        )
        .await?;

        let mut observed = TestResult::from_stats(&stats);
        let comparison = observed.compare(&self.expects);
        self.result = observed;
        self.advance(Phase::ResultsFetched);

        if comparison.passed() {
            Ok(())
        } else {
            Err(TestError::ResultMismatch {
                test: self.name.clone(),
                task: self.task_name.clone(),
                detail: comparison.to_string(),
            })
        }
    }

    async fn teardown(
        &mut self,
        engine: &dyn ExecutionEngine,
        store: &dyn Store,
        options: &RunOptions,
        cleanup: Cleanup,
    ) {
        info!(test = %self.name, "Tearing down test");
        let failures = cleanup.release(engine, store, options.call_timeout).await;
        if !failures.is_empty() {
            warn!(
                test = %self.name,
                failures = failures.len(),
                "Teardown left resources behind"
            );
        }
        self.advance(Phase::TornDown);
    }

    fn advance(&mut self, to: Phase) {
        debug_assert!(
            self.phase.can_transition_to(&to),
            "invalid transition {:?} -> {:?}",
            self.phase,
            to
        );
        debug!(test = %self.name, from = ?self.phase, to = ?to, "Phase transition");
        self.phase = to;
    }

    fn configuration_error(&self, message: impl Into<String>) -> TestError {
        TestError::Configuration {
            test: self.name.clone(),
            message: message.into(),
        }
    }
}

/// Runs a collaborator call under the run's cancellation token and deadline.
async fn guarded<T, F>(phase: Phase, options: &RunOptions, call: F) -> Result<T, TestError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    tokio::select! {
        biased;
        _ = options.cancel.cancelled() => Err(TestError::Cancelled { phase }),
        outcome = tokio::time::timeout(options.call_timeout, call) => match outcome {
            Ok(result) => result.map_err(|source| TestError::Collaborator { phase, source }),
            Err(_) => Err(TestError::Timeout {
                phase,
                after: options.call_timeout,
            }),
        },
    }
}
