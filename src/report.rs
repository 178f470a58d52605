//! Per-test and suite reports.
//!
//! [`render_summary`] is a pure function over a [`SuiteReport`]; colouring
//! goes through `colored`, so `colored::control::set_override(false)` turns
//! it off for `--no-color` or piped output.

use colored::Colorize;
use serde::Serialize;

use crate::case::TestCase;
use crate::error::TestError;

/// Final state of one test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseStatus {
    /// Observed alert counts matched `expects`.
    Passed,
    /// Observed alert counts differed from `expects`.
    Failed,
    /// A fault stopped the test before it produced a verdict.
    Errored,
    /// The definition was rejected before anything ran.
    Invalid,
}

impl CaseStatus {
    fn label(&self) -> String {
        match self {
            Self::Passed => "PASSED".green().bold().to_string(),
            Self::Failed => "FAILED".red().bold().to_string(),
            Self::Errored => "ERROR".red().to_string(),
            Self::Invalid => "INVALID".yellow().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseReport {
    pub name: String,
    pub task: String,
    pub status: CaseStatus,
    /// Mismatch detail or fault message; empty on success.
    pub message: String,
}

impl CaseReport {
    /// Builds the report for a test after [`TestCase::run`] returned `outcome`.
    pub fn from_outcome(case: &TestCase, outcome: &Result<(), TestError>) -> Self {
        let (status, message) = match outcome {
            Ok(()) => (CaseStatus::Passed, String::new()),
            Err(err) if err.is_test_failure() => (CaseStatus::Failed, case.result.message.clone()),
            Err(_) if case.result.invalid => (CaseStatus::Invalid, case.result.message.clone()),
            Err(err) => (CaseStatus::Errored, err.to_string()),
        };
        Self {
            name: case.name.clone(),
            task: case.task_name.clone(),
            status,
            message,
        }
    }

    pub fn errored(name: &str, task: &str, message: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            task: task.to_string(),
            status: CaseStatus::Errored,
            message: message.into(),
        }
    }

    pub fn passed(&self) -> bool {
        self.status == CaseStatus::Passed
    }

    /// One line: `TEST <name> (<task>) <STATUS>[: message]`.
    pub fn render(&self) -> String {
        let mut line = format!("TEST {} ({}) {}", self.name, self.task, self.status.label());
        if !self.message.is_empty() {
            line.push_str(": ");
            line.push_str(&self.message);
        }
        line
    }
}

/// Reports for every test in a suite, in run order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SuiteReport {
    pub cases: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn push(&mut self, case: CaseReport) {
        self.cases.push(case);
    }

    pub fn count(&self, status: CaseStatus) -> usize {
        self.cases.iter().filter(|c| c.status == status).count()
    }

    pub fn total(&self) -> usize {
        self.cases.len()
    }

    pub fn all_passed(&self) -> bool {
        self.cases.iter().all(CaseReport::passed)
    }
}

/// Renders one line per test followed by a summary line.
pub fn render_summary(report: &SuiteReport) -> String {
    let mut lines: Vec<String> = report.cases.iter().map(CaseReport::render).collect();

    let passed = report.count(CaseStatus::Passed);
    let summary = format!(
        "{} tests: {} passed, {} failed, {} errored, {} invalid",
        report.total(),
        passed,
        report.count(CaseStatus::Failed),
        report.count(CaseStatus::Errored),
        report.count(CaseStatus::Invalid),
    );
    lines.push(String::new());
    lines.push(if report.all_passed() {
        summary.green().to_string()
    } else {
        summary.red().to_string()
    });
    lines.join("\n")
}
