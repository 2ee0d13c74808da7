//! CLI command implementations

pub mod list;
pub mod run;
pub mod skips;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use tracing::debug;

use casekit_harness::{CaseFilter, CaseSpec, HarnessConfig, Level, TestCase};

/// Case selection shared by all commands
#[derive(Args, Debug, Clone, Default)]
pub struct SelectArgs {
    /// Directory of case files (overrides `cases_dir`)
    #[arg(long)]
    pub cases: Option<PathBuf>,

    /// Only cases whose name or id matches exactly
    #[arg(long)]
    pub name: Option<String>,

    /// Only cases carrying this tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Only cases at or above this level (low, medium, high, critical)
    #[arg(long, value_parser = parse_level)]
    pub min_level: Option<Level>,

    /// Only customer scenarios
    #[arg(long)]
    pub customer_scenario: bool,
}

impl SelectArgs {
    fn filter(&self) -> CaseFilter {
        CaseFilter {
            name: self.name.clone(),
            tag: self.tag.clone(),
            min_level: self.min_level,
            customer_scenario_only: self.customer_scenario,
        }
    }
}

fn parse_level(s: &str) -> Result<Level, String> {
    s.parse().map_err(|e: casekit_harness::CaseError| e.to_string())
}

/// Load every case file under the configured directory and keep the ones
/// the selection matches.
pub fn load_cases(
    config: &HarnessConfig,
    select: &SelectArgs,
) -> anyhow::Result<Vec<Arc<dyn TestCase>>> {
    let dir = select.cases.as_ref().unwrap_or(&config.cases_dir);
    let specs = CaseSpec::load_all(dir)
        .with_context(|| format!("failed to load cases from {}", dir.display()))?;

    let mut cases = Vec::with_capacity(specs.len());
    for spec in specs {
        let name = spec.name.clone();
        let case = spec
            .into_case()
            .with_context(|| format!("invalid case '{}'", name))?;
        cases.push(case);
    }

    let filter = select.filter();
    let total = cases.len();
    cases.retain(|c| filter.matches(c.as_ref()));
    debug!("{} of {} case(s) selected from {}", cases.len(), total, dir.display());

    Ok(cases)
}
