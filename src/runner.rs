//! Sequential suite execution.

use std::path::Path;

use tracing::{info, warn};

use crate::case::TestCase;
use crate::config::{RunOptions, TestSuite};
use crate::error::TestError;
use crate::io::{ExecutionEngine, Store};
use crate::report::{CaseReport, CaseStatus, SuiteReport};
use crate::task::Task;

/// Runs test suites against one Kapacitor and one InfluxDB.
pub struct Runner<'a> {
    engine: &'a dyn ExecutionEngine,
    store: &'a dyn Store,
    options: RunOptions,
}

impl<'a> Runner<'a> {
    pub fn new(engine: &'a dyn ExecutionEngine, store: &'a dyn Store, options: RunOptions) -> Self {
        Self {
            engine,
            store,
            options,
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Runs every test in file order, loading scripts from `scripts_dir`.
    ///
    /// A failing test never stops the suite. Once the run is cancelled the
    /// remaining tests are reported as errored without being started.
    pub async fn run_suite(&self, suite: &TestSuite, scripts_dir: &Path) -> SuiteReport {
        let mut report = SuiteReport::default();
        for definition in &suite.tests {
            if self.options.cancel.is_cancelled() {
                report.push(CaseReport::errored(
                    &definition.name,
                    &definition.task_name,
                    "run cancelled",
                ));
                continue;
            }

            let mut case = TestCase::from(definition.clone());
            let case_report = self.run_case(&mut case, scripts_dir).await;
            info!(
                test = %case_report.name,
                task = %case_report.task,
                status = ?case_report.status,
                "Test finished"
            );
            report.push(case_report);
        }
        report
    }

    async fn run_case(&self, case: &mut TestCase, scripts_dir: &Path) -> CaseReport {
        if !case.validate() {
            warn!(test = %case.name, reason = %case.result.message, "Skipping invalid test");
            return CaseReport {
                name: case.name.clone(),
                task: case.task_name.clone(),
                status: CaseStatus::Invalid,
                message: case.result.message.clone(),
            };
        }

        match Task::load(&case.task_name, scripts_dir) {
            Ok(task) => case.attach_task(task),
            Err(err) => {
                let err = TestError::from(err);
                return CaseReport::errored(&case.name, &case.task_name, err.to_string());
            },
        }

        let outcome = case.run(self.engine, self.store, &self.options).await;
        CaseReport::from_outcome(case, &outcome)
    }
}
