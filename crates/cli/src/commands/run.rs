//! Run command

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tracing::warn;

use casekit_harness::{
    CaseReport, HarnessConfig, SuiteReport, TestCase, TestRunner, UiDriver, WebDriver,
};

use super::SelectArgs;
use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Application base URL
    #[arg(long, env = "CASEKIT_BASE_URL")]
    pub base_url: Option<String>,

    /// WebDriver endpoint
    #[arg(long, env = "CASEKIT_WEBDRIVER_URL")]
    pub webdriver: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Directory for test-results.json
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl RunArgs {
    fn apply(&self, config: &mut HarnessConfig) {
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(url) = &self.webdriver {
            config.webdriver.url = url.clone();
        }
        if self.headed {
            config.webdriver.headless = false;
        }
        if let Some(dir) = &self.output {
            config.output_dir = dir.clone();
        }
    }
}

#[derive(Serialize)]
struct ResultRow {
    id: String,
    name: String,
    level: String,
    outcome: String,
    detail: String,
    duration_ms: u64,
}

impl From<&CaseReport> for ResultRow {
    fn from(report: &CaseReport) -> Self {
        Self {
            id: report.metadata.id.to_string(),
            name: report.name.clone(),
            level: report.metadata.level.to_string(),
            outcome: report.outcome.label().to_string(),
            detail: report.outcome.detail().unwrap_or_default(),
            duration_ms: report.duration_ms,
        }
    }
}

impl TableDisplay for ResultRow {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Level", "Outcome", "Detail", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.level.clone(),
            self.outcome.clone(),
            output::truncate(&self.detail, 60),
            format!("{} ms", self.duration_ms),
        ]
    }
}

pub async fn execute(
    args: RunArgs,
    mut config: HarnessConfig,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    args.apply(&mut config);
    config.validate()?;

    let cases = super::load_cases(&config, &args.select)?;
    if cases.is_empty() {
        output::print_warning("No cases selected.");
        return Ok(true);
    }

    let driver = WebDriver::connect(&config.webdriver)
        .await
        .with_context(|| format!("failed to connect to WebDriver at {}", config.webdriver.url))?;

    run_session(&config, Arc::new(driver), &cases, format).await
}

/// Run `cases` on an open session and close it afterwards, whatever happened.
/// Returns whether every case passed or was skipped.
async fn run_session(
    config: &HarnessConfig,
    driver: Arc<dyn UiDriver>,
    cases: &[Arc<dyn TestCase>],
    format: OutputFormat,
) -> anyhow::Result<bool> {
    let result = run_suite(config, driver.clone(), cases).await;
    if let Err(e) = driver.close().await {
        warn!("Failed to close browser session: {}", e);
    }
    let (suite, path) = result?;

    let rows: Vec<ResultRow> = suite.results.iter().map(ResultRow::from).collect();
    output::print_list(&rows, format);

    let summary = format!(
        "{} passed, {} failed, {} errored, {} skipped ({} ms)",
        suite.passed, suite.failed, suite.errored, suite.skipped, suite.duration_ms
    );
    if suite.success() {
        output::print_success(&summary);
    } else {
        output::print_error(&summary);
    }
    output::print_info(&format!("Results written to {}", path.display()));

    Ok(suite.success())
}

async fn run_suite(
    config: &HarnessConfig,
    driver: Arc<dyn UiDriver>,
    cases: &[Arc<dyn TestCase>],
) -> anyhow::Result<(SuiteReport, PathBuf)> {
    let runner = TestRunner::from_config(config, driver)?;
    let suite = runner.run_cases(cases).await?;
    let path = runner.write_results(&suite)?;
    Ok((suite, path))
}
