//! Conditional skipping tied to open defects
//!
//! ```ignore
//! let case = skip_if(bug_is_open("bugzilla", "456789"), LoginCase::new());
//! ```
//!
//! Conditions are evaluated right before the case would run. An open
//! defect skips the case before any fixture is created. A failed lookup is
//! an error, never a silent "closed".

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use crate::case::{CaseContext, TestCase};
use crate::error::CaseResult;
use crate::fixture::FixtureSpec;
use crate::metadata::TestMetadata;
use crate::tracker::TrackerRegistry;

/// Skip while `defect` is open in `tracker`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipCondition {
    pub tracker: String,

    #[serde(deserialize_with = "string_or_int")]
    pub defect: String,

    /// Overrides the default skip reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Defect ids appear as integers or strings in YAML and TOML
#[derive(Deserialize)]
#[serde(untagged)]
enum DefectId {
    Int(u64),
    Str(String),
}

impl From<DefectId> for String {
    fn from(id: DefectId) -> Self {
        match id {
            DefectId::Int(n) => n.to_string(),
            DefectId::Str(s) => s,
        }
    }
}

pub(crate) fn string_or_int<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    DefectId::deserialize(deserializer).map(String::from)
}

pub(crate) fn strings_or_ints<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<String>, D::Error> {
    let ids = Vec::<DefectId>::deserialize(deserializer)?;
    Ok(ids.into_iter().map(String::from).collect())
}

/// Shorthand for a [`SkipCondition`] without a custom reason
pub fn bug_is_open(tracker: impl Into<String>, defect: impl ToString) -> SkipCondition {
    SkipCondition {
        tracker: tracker.into(),
        defect: defect.to_string(),
        reason: None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipDecision {
    Run,
    Skip { reason: String },
}

impl SkipCondition {
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn reason(&self) -> String {
        self.reason
            .clone()
            .unwrap_or_else(|| format!("{} bug {} is open", self.tracker, self.defect))
    }

    /// Query the tracker. Never cached.
    pub async fn evaluate(&self, trackers: &TrackerRegistry) -> CaseResult<SkipDecision> {
        let open = trackers.is_open(&self.tracker, &self.defect).await?;
        debug!(
            "{} bug {} is {}",
            self.tracker,
            self.defect,
            if open { "open" } else { "closed" }
        );

        if open {
            Ok(SkipDecision::Skip {
                reason: self.reason(),
            })
        } else {
            Ok(SkipDecision::Run)
        }
    }
}

/// Evaluate conditions in order. The first open defect decides; the first
/// lookup error aborts evaluation.
pub async fn evaluate_all(
    conditions: &[&SkipCondition],
    trackers: &TrackerRegistry,
) -> CaseResult<SkipDecision> {
    for condition in conditions {
        if let SkipDecision::Skip { reason } = condition.evaluate(trackers).await? {
            return Ok(SkipDecision::Skip { reason });
        }
    }
    Ok(SkipDecision::Run)
}

/// A test case guarded by a skip condition
pub struct Guarded<C> {
    condition: SkipCondition,
    inner: C,
}

/// Wrap `case` so that it is skipped while `condition` holds
pub fn skip_if<C: TestCase>(condition: SkipCondition, case: C) -> Guarded<C> {
    Guarded {
        condition,
        inner: case,
    }
}

impl<C> Guarded<C> {
    pub fn condition(&self) -> &SkipCondition {
        &self.condition
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

#[async_trait::async_trait]
impl<C: TestCase> TestCase for Guarded<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn metadata(&self) -> &TestMetadata {
        self.inner.metadata()
    }

    fn tags(&self) -> &[String] {
        self.inner.tags()
    }

    fn fixtures(&self) -> &[FixtureSpec] {
        self.inner.fixtures()
    }

    fn skip_conditions(&self) -> Vec<&SkipCondition> {
        let mut conditions = vec![&self.condition];
        conditions.extend(self.inner.skip_conditions());
        conditions
    }

    async fn run(&self, ctx: &CaseContext) -> CaseResult<()> {
        self.inner.run(ctx).await
    }
}
