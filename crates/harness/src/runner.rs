//! Test runner: guards, fixture lifecycle, execution and reporting

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tracing::{debug, error, info, warn};

use crate::case::{CaseContext, TestCase, UrlMap};
use crate::config::HarnessConfig;
use crate::driver::UiDriver;
use crate::error::{panic_message, CaseResult, ErrorKind};
use crate::fixture::{FixtureProviders, FixtureScope};
use crate::metadata::MetadataRegistry;
use crate::report::{CaseFilter, CaseReport, Outcome, SuiteReport};
use crate::skip::{evaluate_all, SkipDecision};
use crate::tracker::TrackerRegistry;

/// Runs test cases against one driver session.
///
/// The session itself is opened and closed by the caller; the runner only
/// borrows it for the duration of each case.
pub struct TestRunner {
    driver: Arc<dyn UiDriver>,
    trackers: TrackerRegistry,
    fixtures: FixtureProviders,
    urls: Arc<UrlMap>,
    output_dir: PathBuf,
}

impl TestRunner {
    pub fn new(driver: Arc<dyn UiDriver>) -> Self {
        Self {
            driver,
            trackers: TrackerRegistry::new(),
            fixtures: FixtureProviders::new(),
            urls: Arc::new(UrlMap::default()),
            output_dir: PathBuf::from("test-results"),
        }
    }

    /// Build trackers, fixture providers and URLs from configuration
    pub fn from_config(config: &HarnessConfig, driver: Arc<dyn UiDriver>) -> CaseResult<Self> {
        Ok(Self::new(driver)
            .with_trackers(TrackerRegistry::from_config(&config.trackers)?)
            .with_fixtures(FixtureProviders::from_config(&config.fixtures)?)
            .with_urls(UrlMap::new(config.base_url.clone()).extend(&config.urls))
            .with_output_dir(config.output_dir.clone()))
    }

    pub fn with_trackers(mut self, trackers: TrackerRegistry) -> Self {
        self.trackers = trackers;
        self
    }

    pub fn with_fixtures(mut self, fixtures: FixtureProviders) -> Self {
        self.fixtures = fixtures;
        self
    }

    pub fn with_urls(mut self, urls: UrlMap) -> Self {
        self.urls = Arc::new(urls);
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn trackers(&self) -> &TrackerRegistry {
        &self.trackers
    }

    /// Run the cases matching `filter`
    pub async fn run_filtered(
        &self,
        cases: &[Arc<dyn TestCase>],
        filter: &CaseFilter,
    ) -> CaseResult<SuiteReport> {
        let selected: Vec<Arc<dyn TestCase>> = cases
            .iter()
            .filter(|c| filter.matches(c.as_ref()))
            .cloned()
            .collect();
        debug!("{} of {} case(s) selected", selected.len(), cases.len());
        self.run_cases(&selected).await
    }

    /// Run a list of cases. One case failing never stops the others; the
    /// only run-level error is conflicting metadata.
    pub async fn run_cases(&self, cases: &[Arc<dyn TestCase>]) -> CaseResult<SuiteReport> {
        let mut registry = MetadataRegistry::new();
        for case in cases {
            registry.register(case.name(), case.metadata().clone())?;
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let mut results = Vec::with_capacity(cases.len());

        info!("Running {} case(s)...", cases.len());

        for case in cases {
            let report = self.run_case(case.as_ref()).await;
            match &report.outcome {
                Outcome::Passed => info!("✓ {} ({} ms)", report.name, report.duration_ms),
                Outcome::Skipped { reason } => info!("- {} skipped: {}", report.name, reason),
                Outcome::Failed { message } => error!("✗ {} - {}", report.name, message),
                Outcome::Errored { kind, message } => {
                    error!("✗ {} - {} error: {}", report.name, kind, message)
                }
            }
            results.push(report);
        }

        let suite = SuiteReport::new(started_at, start.elapsed().as_millis() as u64, results);

        info!(
            "Results: {} passed, {} failed, {} errored, {} skipped ({} ms)",
            suite.passed, suite.failed, suite.errored, suite.skipped, suite.duration_ms
        );
        Ok(suite)
    }

    /// Run a single case: guard, setup, body, teardown
    pub async fn run_case(&self, case: &dyn TestCase) -> CaseReport {
        let start = Instant::now();
        debug!("Running case: {}", case.name());

        let mut report = CaseReport {
            name: case.name().to_string(),
            metadata: case.metadata().clone(),
            tags: case.tags().to_vec(),
            outcome: Outcome::Passed,
            duration_ms: 0,
            fixtures: Vec::new(),
            teardown_errors: Vec::new(),
        };

        report.outcome = match evaluate_all(&case.skip_conditions(), &self.trackers).await {
            Ok(SkipDecision::Skip { reason }) => Outcome::Skipped { reason },
            Ok(SkipDecision::Run) => {
                let (outcome, fixtures, teardown_errors) = self.execute(case).await;
                report.fixtures = fixtures;
                report.teardown_errors = teardown_errors;
                outcome
            }
            Err(e) => {
                warn!("Skip guard of {} could not be evaluated: {}", case.name(), e);
                Outcome::from_error(&e)
            }
        };

        report.duration_ms = start.elapsed().as_millis() as u64;
        report
    }

    /// Setup, body and teardown. Teardown runs on every path that acquired
    /// anything, including a panicking body.
    async fn execute(&self, case: &dyn TestCase) -> (Outcome, Vec<String>, Vec<String>) {
        let mut scope = FixtureScope::new(&self.fixtures);

        let body_outcome = match scope.acquire_all(case.fixtures()).await {
            Err(e) => {
                error!("Setup of {} failed: {}", case.name(), e);
                Outcome::from_error(&e)
            }
            Ok(()) => {
                let ctx = CaseContext::new(self.driver.clone(), scope.fixtures(), self.urls.clone());
                match AssertUnwindSafe(case.run(&ctx)).catch_unwind().await {
                    Ok(Ok(())) => Outcome::Passed,
                    Ok(Err(e)) => Outcome::from_error(&e),
                    Err(payload) => Outcome::Failed {
                        message: panic_message(payload),
                    },
                }
            }
        };

        let fixtures = scope.ids();
        let teardown_errors = scope.release().await;

        let outcome = match body_outcome {
            Outcome::Passed if !teardown_errors.is_empty() => Outcome::Errored {
                kind: ErrorKind::Fixture,
                message: format!("teardown failed: {}", teardown_errors.join("; ")),
            },
            other => other,
        };

        (outcome, fixtures, teardown_errors)
    }

    /// Write results to `<output_dir>/test-results.json`
    pub fn write_results(&self, results: &SuiteReport) -> CaseResult<PathBuf> {
        write_results(&self.output_dir, results)
    }
}

/// Write results as pretty JSON into `dir`
pub fn write_results(dir: &Path, results: &SuiteReport) -> CaseResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join("test-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}
