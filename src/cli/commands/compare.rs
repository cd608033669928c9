//! Cross-run comparison command.

use anyhow::Result;
use clap::Args;
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::services::{ComparisonEngine, ComparisonResult};

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Run IDs to compare (2-4, first is the baseline)
    #[arg(required = true, num_args = 2..=4)]
    pub run_ids: Vec<Uuid>,
}

#[derive(Debug, serde::Serialize)]
pub struct CompareOutput {
    pub baseline: String,
    pub result: ComparisonResult,
    #[serde(skip)]
    rendered: String,
}

impl CommandOutput for CompareOutput {
    fn to_human(&self) -> String {
        self.rendered.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: CompareArgs, json_mode: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    let mut runs = Vec::with_capacity(args.run_ids.len());
    for id in &args.run_ids {
        let run = ctx
            .store
            .get(*id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Run not found: {id}"))?;
        runs.push(run);
    }

    let result = ComparisonEngine::compare(&runs)?;

    let labels: Vec<String> = args.run_ids.iter().map(|id| id.to_string()).collect();
    let rendered = TableFormatter::new().format_comparison(&labels, &result);

    let out = CompareOutput {
        baseline: labels[0].clone(),
        result,
        rendered,
    };
    output(&out, json_mode);
    Ok(())
}
