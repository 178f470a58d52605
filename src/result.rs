//! Observed and expected alert counts.
//!
//! Kapacitor reports alert-node statistics such as `oks_triggered`,
//! `warns_triggered` and `crits_triggered`. [`TestResult::from_stats`] folds
//! those into severity categories (`ok`, `warn`, `crit`, ...) which are what a
//! test's `expects` block names.
//!
//! # Comparison
//!
//! [`TestResult::compare`] checks the union of categories from both sides;
//! a category absent on one side counts as zero. Non-severity statistics
//! (`alerts_triggered`, `errors`, ...) are kept in [`TestResult::stats`] for
//! reporting but never compared.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Suffix Kapacitor uses for per-severity trigger counters.
const TRIGGERED_SUFFIX: &str = "s_triggered";

/// Aggregate counter that is not a severity category.
const ALERTS_TRIGGERED: &str = "alerts_triggered";

/// Alert counts plus status flags for one test.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    /// Count per severity category.
    #[serde(flatten)]
    pub counts: BTreeMap<String, i64>,
    /// Other alert-node statistics reported by Kapacitor.
    #[serde(skip)]
    pub stats: BTreeMap<String, i64>,
    #[serde(skip)]
    pub message: String,
    /// Set when observed counts did not match the expectation.
    #[serde(skip)]
    pub error: bool,
    /// Set when the test definition itself is invalid.
    #[serde(skip)]
    pub invalid: bool,
    /// Set after a successful comparison.
    #[serde(skip)]
    pub passed: bool,
}

/// One category whose counts disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMismatch {
    pub category: String,
    pub expected: i64,
    pub observed: i64,
}

impl fmt::Display for CategoryMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: expected {}, got {}",
            self.category, self.expected, self.observed
        )
    }
}

/// Outcome of [`TestResult::compare`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comparison {
    pub mismatches: Vec<CategoryMismatch>,
}

impl Comparison {
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            return write!(f, "all alert counts match");
        }
        let parts: Vec<String> = self.mismatches.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl TestResult {
    /// Builds an expectation from category counts.
    pub fn expecting<I, K>(counts: I) -> Self
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<String>,
    {
        Self {
            counts: counts.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            ..Self::default()
        }
    }

    /// Builds a result from raw alert-node statistics.
    pub fn from_stats(raw: &BTreeMap<String, i64>) -> Self {
        let mut result = Self::default();
        for (name, &count) in raw {
            match severity_category(name) {
                Some(category) => {
                    *result.counts.entry(category.to_string()).or_insert(0) += count;
                },
                None => {
                    result.stats.insert(name.clone(), count);
                },
            }
        }
        result
    }

    /// A result describing an unusable test definition.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            invalid: true,
            ..Self::default()
        }
    }

    /// Count for `category`, zero if absent.
    pub fn count(&self, category: &str) -> i64 {
        self.counts.get(category).copied().unwrap_or(0)
    }

    /// Compares these (observed) counts against `expected` and records the
    /// outcome in `passed`, `error` and `message`.
    pub fn compare(&mut self, expected: &TestResult) -> Comparison {
        let categories: BTreeSet<&String> =
            self.counts.keys().chain(expected.counts.keys()).collect();
        let mismatches: Vec<CategoryMismatch> = categories
            .into_iter()
            .filter_map(|category| {
                let want = expected.count(category);
                let got = self.count(category);
                (want != got).then(|| CategoryMismatch {
                    category: category.clone(),
                    expected: want,
                    observed: got,
                })
            })
            .collect();
        let comparison = Comparison { mismatches };
        self.passed = comparison.passed();
        self.error = !comparison.passed();
        self.message = comparison.to_string();
        comparison
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.invalid {
            return write!(f, "INVALID: {}", self.message);
        }
        if self.passed {
            return write!(f, "PASSED");
        }
        if self.error {
            return write!(f, "FAILED: {}", self.message);
        }
        if self.message.is_empty() {
            write!(f, "NOT RUN")
        } else {
            write!(f, "ERROR: {}", self.message)
        }
    }
}

/// Maps `warns_triggered` to `warn`, `oks_triggered` to `ok`, and so on.
fn severity_category(stat: &str) -> Option<&str> {
    if stat == ALERTS_TRIGGERED {
        return None;
    }
    stat.strip_suffix(TRIGGERED_SUFFIX)
        .filter(|category| !category.is_empty())
}
