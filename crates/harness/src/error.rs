//! Error types for test case execution

use std::any::Any;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaseError {
    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Fixture error: {0}")]
    Fixture(String),

    #[error("No fixture provider registered for kind '{0}'")]
    UnknownFixtureKind(String),

    #[error("No defect tracker named '{0}'")]
    UnknownTracker(String),

    #[error("Defect {defect} not found in tracker {tracker}")]
    UnknownDefect { tracker: String, defect: String },

    #[error("Tracker lookup failed for {tracker} bug {defect}: {reason}")]
    TrackerLookup {
        tracker: String,
        defect: String,
        reason: String,
    },

    #[error("Duplicate test id '{id}' on cases '{first}' and '{second}'")]
    DuplicateId {
        id: String,
        first: String,
        second: String,
    },

    #[error("Duplicate test case name: {0}")]
    DuplicateName(String),

    #[error("Invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("Test case parse error: {0}")]
    SpecParse(String),

    #[error("Placeholder error: {0}")]
    Placeholder(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Coarse classification used when a case ends in an error outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Assertion,
    Tracker,
    Fixture,
    Driver,
    Setup,
}

impl CaseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaseError::AssertionFailed(_) => ErrorKind::Assertion,
            CaseError::UnknownTracker(_)
            | CaseError::UnknownDefect { .. }
            | CaseError::TrackerLookup { .. } => ErrorKind::Tracker,
            CaseError::Fixture(_) | CaseError::UnknownFixtureKind(_) => ErrorKind::Fixture,
            CaseError::Driver(_) | CaseError::ElementNotFound(_) => ErrorKind::Driver,
            _ => ErrorKind::Setup,
        }
    }

    pub fn tracker_lookup(tracker: &str, defect: &str, reason: impl ToString) -> Self {
        CaseError::TrackerLookup {
            tracker: tracker.to_string(),
            defect: defect.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Text of a caught panic payload
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panicked".to_string()
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Assertion => "assertion",
            ErrorKind::Tracker => "tracker",
            ErrorKind::Fixture => "fixture",
            ErrorKind::Driver => "driver",
            ErrorKind::Setup => "setup",
        };
        f.write_str(s)
    }
}

pub type CaseResult<T> = Result<T, CaseError>;
