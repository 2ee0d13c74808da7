//! Case outcomes, suite reports and case selection

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::case::TestCase;
use crate::error::{CaseError, ErrorKind};
use crate::metadata::{Level, TestMetadata};

/// How a single case ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed { message: String },
    Skipped { reason: String },
    Errored { kind: ErrorKind, message: String },
}

impl Outcome {
    pub fn from_error(err: &CaseError) -> Self {
        match err.kind() {
            ErrorKind::Assertion => Outcome::Failed {
                message: err.to_string(),
            },
            kind => Outcome::Errored {
                kind,
                message: err.to_string(),
            },
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "passed",
            Outcome::Failed { .. } => "failed",
            Outcome::Skipped { .. } => "skipped",
            Outcome::Errored { .. } => "errored",
        }
    }

    pub fn detail(&self) -> Option<String> {
        match self {
            Outcome::Passed => None,
            Outcome::Failed { message } => Some(message.clone()),
            Outcome::Skipped { reason } => Some(reason.clone()),
            Outcome::Errored { kind, message } => Some(format!("[{}] {}", kind, message)),
        }
    }
}

/// Result of running one case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub name: String,
    pub metadata: TestMetadata,
    #[serde(default)]
    pub tags: Vec<String>,
    pub outcome: Outcome,
    pub duration_ms: u64,
    /// `name:id` of every fixture created for the case
    #[serde(default)]
    pub fixtures: Vec<String>,
    #[serde(default)]
    pub teardown_errors: Vec<String>,
}

/// Result of running a set of cases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errored: usize,
    pub duration_ms: u64,
    pub results: Vec<CaseReport>,
}

impl SuiteReport {
    pub fn new(started_at: DateTime<Utc>, duration_ms: u64, results: Vec<CaseReport>) -> Self {
        let count = |f: fn(&Outcome) -> bool| results.iter().filter(|r| f(&r.outcome)).count();

        Self {
            started_at,
            total: results.len(),
            passed: count(|o| matches!(o, Outcome::Passed)),
            failed: count(|o| matches!(o, Outcome::Failed { .. })),
            skipped: count(|o| matches!(o, Outcome::Skipped { .. })),
            errored: count(|o| matches!(o, Outcome::Errored { .. })),
            duration_ms,
            results,
        }
    }

    /// No case failed or errored
    pub fn success(&self) -> bool {
        self.failed == 0 && self.errored == 0
    }

    pub fn get(&self, name: &str) -> Option<&CaseReport> {
        self.results.iter().find(|r| r.name == name)
    }
}

/// Selects cases by name, tag, level and customer-scenario flag
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub name: Option<String>,
    pub tag: Option<String>,
    pub min_level: Option<Level>,
    pub customer_scenario_only: bool,
}

impl CaseFilter {
    pub fn matches(&self, case: &dyn TestCase) -> bool {
        let meta = case.metadata();

        if let Some(name) = &self.name {
            if case.name() != name && meta.id.as_str() != name {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !case.tags().iter().any(|t| t == tag) {
                return false;
            }
        }
        if let Some(min) = self.min_level {
            if meta.level < min {
                return false;
            }
        }
        if self.customer_scenario_only && !meta.customer_scenario {
            return false;
        }
        true
    }
}
