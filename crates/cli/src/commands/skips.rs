//! Skips command

use clap::Args;
use serde::Serialize;

use casekit_harness::{HarnessConfig, SkipDecision, TrackerRegistry};

use super::SelectArgs;
use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct SkipsArgs {
    #[command(flatten)]
    pub select: SelectArgs,
}

#[derive(Serialize)]
struct SkipRow {
    case: String,
    tracker: String,
    defect: String,
    status: String,
    detail: String,
}

impl TableDisplay for SkipRow {
    fn headers() -> Vec<&'static str> {
        vec!["Case", "Tracker", "Defect", "Status", "Detail"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.case.clone(),
            self.tracker.clone(),
            self.defect.clone(),
            self.status.clone(),
            output::truncate(&self.detail, 60),
        ]
    }
}

/// Query every skip condition. Returns false when any lookup failed.
pub async fn execute(
    args: SkipsArgs,
    config: &HarnessConfig,
    format: OutputFormat,
) -> anyhow::Result<bool> {
    let trackers = TrackerRegistry::from_config(&config.trackers)?;
    let cases = super::load_cases(config, &args.select)?;

    let mut rows = Vec::new();
    let mut lookup_failed = false;
    for case in &cases {
        for condition in case.skip_conditions() {
            let (status, detail) = match condition.evaluate(&trackers).await {
                Ok(SkipDecision::Skip { reason }) => ("open", reason),
                Ok(SkipDecision::Run) => ("closed", String::new()),
                Err(e) => {
                    lookup_failed = true;
                    ("error", e.to_string())
                }
            };
            rows.push(SkipRow {
                case: case.name().to_string(),
                tracker: condition.tracker.clone(),
                defect: condition.defect.clone(),
                status: status.to_string(),
                detail,
            });
        }
    }

    output::print_list(&rows, format);
    if lookup_failed {
        output::print_error("Some defect lookups failed; affected cases would error.");
    }
    Ok(!lookup_failed)
}
