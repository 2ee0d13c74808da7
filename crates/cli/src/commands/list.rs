//! List command

use clap::Args;
use serde::Serialize;

use casekit_harness::{HarnessConfig, TestCase};

use super::SelectArgs;
use crate::output::{self, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub select: SelectArgs,
}

#[derive(Serialize)]
struct CaseRow {
    id: String,
    name: String,
    level: String,
    customer_scenario: bool,
    tags: Vec<String>,
    skip_if: Vec<String>,
}

impl CaseRow {
    fn new(case: &dyn TestCase) -> Self {
        let meta = case.metadata();
        Self {
            id: meta.id.to_string(),
            name: case.name().to_string(),
            level: meta.level.to_string(),
            customer_scenario: meta.customer_scenario,
            tags: case.tags().to_vec(),
            skip_if: case
                .skip_conditions()
                .iter()
                .map(|c| format!("{}:{}", c.tracker, c.defect))
                .collect(),
        }
    }
}

impl TableDisplay for CaseRow {
    fn headers() -> Vec<&'static str> {
        vec!["ID", "Name", "Level", "Customer", "Tags", "Skip If"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.name.clone(),
            self.level.clone(),
            if self.customer_scenario { "yes" } else { "no" }.to_string(),
            self.tags.join(", "),
            self.skip_if.join(", "),
        ]
    }
}

pub fn execute(args: ListArgs, config: &HarnessConfig, format: OutputFormat) -> anyhow::Result<bool> {
    let cases = super::load_cases(config, &args.select)?;
    let rows: Vec<CaseRow> = cases.iter().map(|c| CaseRow::new(c.as_ref())).collect();
    output::print_list(&rows, format);
    Ok(true)
}
