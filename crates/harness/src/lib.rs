//! casekit test harness
//!
//! Declarative metadata and conditional execution for end-to-end UI tests:
//! - Attaches typed metadata (id, severity level, customer scenario) to cases
//! - Skips cases while a referenced defect is open in a tracker
//! - Creates fixtures before a case and always deletes them afterwards
//! - Injects the browser session into each case instead of a global driver
//! - Loads cases from declarative YAML files
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         TestRunner                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  run_case(case)                                             │
//! │    ├── evaluate_all(skip_conditions) ── TrackerRegistry     │
//! │    │     └── open defect -> Skipped (no setup, no teardown) │
//! │    ├── FixtureScope::acquire_all ── FixtureProviders        │
//! │    ├── case.run(&CaseContext { driver, fixtures, urls })    │
//! │    ├── FixtureScope::release (always, reverse order)        │
//! │    └── CaseReport { metadata, outcome, teardown_errors }    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CaseSpec (YAML)                                            │
//! │    ├── name, description (:id: / :level: field list)       │
//! │    ├── metadata { id, level, customer_scenario, .. }        │
//! │    ├── skip_if: [{ tracker, defect }]  -> Guarded<..>       │
//! │    ├── fixtures: [{ name, kind, attributes }]               │
//! │    └── steps: navigate | fill | click | assert_contains ..  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod case;
pub mod config;
pub mod driver;
pub mod error;
pub mod fixture;
pub mod metadata;
pub mod report;
pub mod runner;
pub mod skip;
pub mod spec;
pub mod tracker;

pub use case::{assert_contains, CaseContext, TestCase, UrlMap};
pub use config::HarnessConfig;
pub use driver::{ElementHandle, Locator, UiDriver, WebDriver};
pub use error::{CaseError, CaseResult, ErrorKind};
pub use fixture::{Fixture, FixtureProvider, FixtureProviders, FixtureSpec};
pub use metadata::{CaseId, Level, MetadataRegistry, TestMetadata};
pub use report::{CaseFilter, CaseReport, Outcome, SuiteReport};
pub use runner::TestRunner;
pub use skip::{bug_is_open, skip_if, Guarded, SkipCondition, SkipDecision};
pub use spec::{CaseSpec, CaseStep};
pub use tracker::{DefectTracker, TrackerRegistry};
