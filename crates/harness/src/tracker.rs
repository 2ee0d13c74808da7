//! Defect tracker lookups used by skip guards
//!
//! Every lookup goes to the tracker; nothing is cached, so a bug that gets
//! closed between two runs un-skips its cases on the next run.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::config::TrackerConfig;
use crate::error::{panic_message, CaseError, CaseResult};

/// Source of truth for whether a defect is still open
#[async_trait]
pub trait DefectTracker: Send + Sync {
    /// Returns `Ok(true)` for an open defect, `Ok(false)` for a closed one.
    /// Unknown defects and unreachable trackers are errors, never `false`.
    async fn is_open(&self, defect: &str) -> CaseResult<bool>;
}

/// Tracker with a fixed set of known defects, for offline runs
#[derive(Debug, Clone, Default)]
pub struct StaticTracker {
    name: String,
    open: HashSet<String>,
    closed: HashSet<String>,
}

impl StaticTracker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_open(mut self, defect: impl Into<String>) -> Self {
        let defect = defect.into();
        self.closed.remove(&defect);
        self.open.insert(defect);
        self
    }

    pub fn with_closed(mut self, defect: impl Into<String>) -> Self {
        let defect = defect.into();
        self.open.remove(&defect);
        self.closed.insert(defect);
        self
    }
}

#[async_trait]
impl DefectTracker for StaticTracker {
    async fn is_open(&self, defect: &str) -> CaseResult<bool> {
        if self.open.contains(defect) {
            Ok(true)
        } else if self.closed.contains(defect) {
            Ok(false)
        } else {
            Err(CaseError::UnknownDefect {
                tracker: self.name.clone(),
                defect: defect.to_string(),
            })
        }
    }
}

/// Bugzilla REST API tracker
pub struct BugzillaTracker {
    name: String,
    base_url: String,
    api_key: Option<String>,
    open_statuses: Vec<String>,
    client: reqwest::Client,
}

/// Statuses Bugzilla ships as "open" in its default workflow
pub const DEFAULT_OPEN_STATUSES: &[&str] = &[
    "UNCONFIRMED",
    "CONFIRMED",
    "NEW",
    "ASSIGNED",
    "IN_PROGRESS",
    "REOPENED",
    "POST",
    "MODIFIED",
    "ON_DEV",
    "ON_QA",
];

#[derive(Debug, Deserialize)]
struct BugzillaResponse {
    #[serde(default)]
    bugs: Vec<BugzillaBug>,
    #[serde(default)]
    error: bool,
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BugzillaBug {
    status: String,
    #[serde(default)]
    is_open: Option<bool>,
}

// Bugzilla error codes for "invalid bug id" and "bug does not exist"
const BUGZILLA_INVALID_BUG: i64 = 100;
const BUGZILLA_NO_SUCH_BUG: i64 = 101;

impl BugzillaTracker {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        open_statuses: Option<Vec<String>>,
        timeout: Duration,
    ) -> CaseResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            open_statuses: open_statuses.unwrap_or_else(|| {
                DEFAULT_OPEN_STATUSES.iter().map(|s| s.to_string()).collect()
            }),
            client,
        })
    }

    fn unknown(&self, defect: &str) -> CaseError {
        CaseError::UnknownDefect {
            tracker: self.name.clone(),
            defect: defect.to_string(),
        }
    }
}

#[async_trait]
impl DefectTracker for BugzillaTracker {
    async fn is_open(&self, defect: &str) -> CaseResult<bool> {
        if defect.is_empty() || !defect.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(self.unknown(defect));
        }

        let url = format!("{}/rest/bug/{}", self.base_url, defect);
        debug!("Querying {} for bug {}", self.name, defect);

        let mut request = self
            .client
            .get(&url)
            .query(&[("include_fields", "id,status,is_open")]);
        if let Some(key) = &self.api_key {
            request = request.header("X-BUGZILLA-API-KEY", key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CaseError::tracker_lookup(&self.name, defect, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(self.unknown(defect));
        }

        let body: BugzillaResponse = response
            .json()
            .await
            .map_err(|e| CaseError::tracker_lookup(&self.name, defect, e))?;

        if body.error {
            return match body.code {
                Some(BUGZILLA_INVALID_BUG) | Some(BUGZILLA_NO_SUCH_BUG) => Err(self.unknown(defect)),
                _ => Err(CaseError::tracker_lookup(
                    &self.name,
                    defect,
                    body.message.unwrap_or_else(|| format!("HTTP {}", status)),
                )),
            };
        }
        if !status.is_success() {
            return Err(CaseError::tracker_lookup(&self.name, defect, format!("HTTP {}", status)));
        }

        let bug = body.bugs.first().ok_or_else(|| self.unknown(defect))?;
        let open = bug
            .is_open
            .unwrap_or_else(|| self.open_statuses.iter().any(|s| s.eq_ignore_ascii_case(&bug.status)));

        debug!("{} bug {} is {} ({})", self.name, defect, if open { "open" } else { "closed" }, bug.status);
        Ok(open)
    }
}

/// Named trackers available to skip guards
#[derive(Clone, Default)]
pub struct TrackerRegistry {
    trackers: HashMap<String, Arc<dyn DefectTracker>>,
}

impl TrackerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, tracker: Arc<dyn DefectTracker>) {
        self.trackers.insert(name.into(), tracker);
    }

    pub fn with(mut self, name: impl Into<String>, tracker: Arc<dyn DefectTracker>) -> Self {
        self.register(name, tracker);
        self
    }

    /// Build trackers from the `[trackers.<name>]` config sections
    pub fn from_config(config: &BTreeMap<String, TrackerConfig>) -> CaseResult<Self> {
        let mut registry = Self::new();

        for (name, tracker) in config {
            let tracker: Arc<dyn DefectTracker> = match tracker {
                TrackerConfig::Bugzilla {
                    url,
                    api_key,
                    open_statuses,
                    timeout_secs,
                } => Arc::new(BugzillaTracker::new(
                    name.clone(),
                    url.clone(),
                    api_key.clone(),
                    open_statuses.clone(),
                    Duration::from_secs(*timeout_secs),
                )?),
                TrackerConfig::Static { open, closed } => {
                    let mut t = StaticTracker::new(name.clone());
                    for d in open {
                        t = t.with_open(d.clone());
                    }
                    for d in closed {
                        t = t.with_closed(d.clone());
                    }
                    Arc::new(t)
                }
            };
            registry.register(name.clone(), tracker);
        }

        Ok(registry)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.trackers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Ask the named tracker whether `defect` is open
    pub async fn is_open(&self, tracker: &str, defect: &str) -> CaseResult<bool> {
        let t = self
            .trackers
            .get(tracker)
            .ok_or_else(|| CaseError::UnknownTracker(tracker.to_string()))?;
        AssertUnwindSafe(t.is_open(defect))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(CaseError::tracker_lookup(
                    tracker,
                    defect,
                    format!("lookup panicked: {}", panic_message(payload)),
                ))
            })
    }
}
