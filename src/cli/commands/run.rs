//! Run CLI commands.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use crate::cli::context::AppContext;
use crate::cli::output::table::TableFormatter;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Run, RunMetrics, RunStatus};
use crate::domain::ports::RunFilters;
use crate::services::AdvanceOutcome;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(subcommand)]
    pub command: RunCommands,
}

#[derive(Subcommand, Debug)]
pub enum RunCommands {
    /// Register a new evaluation run
    Submit {
        /// Workspace the run belongs to
        #[arg(short, long)]
        workspace: Uuid,
        /// Path to a JSON task definition for the judge
        #[arg(short, long)]
        task_definition: Option<PathBuf>,
        /// Path to an inline JSON payload; skips the log upload leg
        #[arg(short, long)]
        payload: Option<PathBuf>,
    },
    /// Upload an agent log for a pending run
    Upload {
        /// Run ID
        run_id: Uuid,
        /// Path to the log file
        file: PathBuf,
    },
    /// Trigger the ingest-parse stage
    Parse {
        /// Run ID
        run_id: Uuid,
    },
    /// Record the parser's completion signal
    MarkParsed {
        /// Run ID
        run_id: Uuid,
        /// Extracted execution metrics as JSON
        #[arg(short, long)]
        metrics: Option<String>,
    },
    /// Trigger the judge stage and apply the verdict
    Judge {
        /// Run ID
        run_id: Uuid,
    },
    /// Re-attempt judging for every retry-eligible run
    Retry,
    /// Show run details
    Show {
        /// Run ID
        run_id: Uuid,
    },
    /// List runs
    List {
        /// Filter by status
        #[arg(short, long)]
        status: Option<String>,
        /// Filter by workspace
        #[arg(short, long)]
        workspace: Option<Uuid>,
        /// Maximum number of runs to display
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct RunOutput {
    pub id: String,
    pub workspace_id: String,
    pub status: String,
    pub overall_score: Option<f64>,
    pub confidence: Option<f64>,
    pub failure_details: Option<String>,
    pub created_at: String,
}

impl From<&Run> for RunOutput {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id.to_string(),
            workspace_id: run.workspace_id.to_string(),
            status: run.status.as_str().to_string(),
            overall_score: run.scorecard.as_ref().map(|c| c.overall_score),
            confidence: run.scorecard.as_ref().map(|c| c.confidence),
            failure_details: run.failure_details.clone(),
            created_at: run.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RunActionOutput {
    pub success: bool,
    pub message: String,
    pub run: Option<RunOutput>,
}

impl CommandOutput for RunActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RunListOutput {
    pub runs: Vec<RunOutput>,
    pub total: usize,
    #[serde(skip)]
    rendered: String,
}

impl CommandOutput for RunListOutput {
    fn to_human(&self) -> String {
        if self.runs.is_empty() {
            return "No runs found.".to_string();
        }
        self.rendered.clone()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, serde::Serialize)]
pub struct RunDetailOutput {
    pub run: RunOutput,
    pub metrics: Option<RunMetrics>,
    pub dimensions: Vec<(String, f64)>,
}

impl CommandOutput for RunDetailOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Run: {}", self.run.id),
            format!("Workspace: {}", self.run.workspace_id),
            format!("Status: {}", self.run.status),
            format!("Created: {}", self.run.created_at),
        ];

        if let (Some(score), Some(confidence)) = (self.run.overall_score, self.run.confidence) {
            lines.push(format!("Overall score: {score:.1} (confidence {confidence:.2})"));
        }

        if !self.dimensions.is_empty() {
            lines.push("\nDimensions:".to_string());
            for (name, score) in &self.dimensions {
                lines.push(format!("  {name}: {score:.1}"));
            }
        }

        if let Some(metrics) = &self.metrics {
            lines.push("\nMetrics:".to_string());
            for key in RunMetrics::KEYS {
                if let Some(value) = metrics.get(key) {
                    lines.push(format!("  {key}: {value}"));
                }
            }
        }

        if let Some(details) = &self.run.failure_details {
            lines.push(format!("\nFailure: {details}"));
        }

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: RunArgs, json_mode: bool) -> Result<()> {
    let ctx = AppContext::init().await?;

    match args.command {
        RunCommands::Submit {
            workspace,
            task_definition,
            payload,
        } => {
            let mut run = match payload {
                Some(path) => {
                    let payload = read_json(&path)?;
                    Run::new_inline(workspace, payload)
                }
                None => Run::new(workspace),
            };
            if let Some(path) = task_definition {
                run = run.with_task_definition(read_json(&path)?);
            }

            ctx.store.insert(&run).await?;
            let out = RunActionOutput {
                success: true,
                message: format!("Run created: {} ({})", run.id, run.status),
                run: Some(RunOutput::from(&run)),
            };
            output(&out, json_mode);
        }

        RunCommands::Upload { run_id, file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let artifact = ctx.artifacts.attach_log(run_id, &bytes).await?;

            let out = RunActionOutput {
                success: true,
                message: format!(
                    "Log uploaded: {} ({} bytes, sha256 {})",
                    artifact.key, artifact.size_bytes, artifact.checksum
                ),
                run: None,
            };
            output(&out, json_mode);
        }

        RunCommands::Parse { run_id } => {
            ctx.lifecycle.advance_to_parsing(run_id).await?;
            let out = RunActionOutput {
                success: true,
                message: format!("Parse started for run {run_id}"),
                run: None,
            };
            output(&out, json_mode);
        }

        RunCommands::MarkParsed { run_id, metrics } => {
            let metrics = metrics
                .map(|raw| serde_json::from_str::<RunMetrics>(&raw))
                .transpose()
                .context("Invalid metrics JSON")?;
            ctx.lifecycle.mark_parsed(run_id, metrics).await?;

            let out = RunActionOutput {
                success: true,
                message: format!("Run {run_id} is ready for judging"),
                run: None,
            };
            output(&out, json_mode);
        }

        RunCommands::Judge { run_id } => {
            let outcome = ctx.lifecycle.judge(run_id).await?;
            let run = ctx.store.get(run_id).await?;
            let out = RunActionOutput {
                success: true,
                message: judge_message(run_id, &outcome),
                run: run.as_ref().map(RunOutput::from),
            };
            output(&out, json_mode);
        }

        RunCommands::Retry => {
            let started = ctx.lifecycle.retry_sweep().await?;
            let out = RunActionOutput {
                success: true,
                message: format!("Retry sweep started {started} run(s)"),
                run: None,
            };
            output(&out, json_mode);
        }

        RunCommands::Show { run_id } => {
            let run = ctx
                .store
                .get(run_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Run not found: {run_id}"))?;

            let dimensions = run
                .scorecard
                .as_ref()
                .map(|card| {
                    card.dimensions
                        .iter()
                        .map(|(name, dim)| (name.clone(), dim.score))
                        .collect()
                })
                .unwrap_or_default();

            let out = RunDetailOutput {
                run: RunOutput::from(&run),
                metrics: run.metrics,
                dimensions,
            };
            output(&out, json_mode);
        }

        RunCommands::List {
            status,
            workspace,
            limit,
        } => {
            let status = match status {
                Some(raw) => Some(
                    RunStatus::from_str(&raw)
                        .ok_or_else(|| anyhow::anyhow!("Invalid status: {raw}"))?,
                ),
                None => None,
            };

            let runs = ctx
                .store
                .list(RunFilters {
                    status,
                    workspace_id: workspace,
                    limit: Some(limit),
                })
                .await?;

            let rendered = TableFormatter::new().format_runs(&runs);
            let out = RunListOutput {
                total: runs.len(),
                runs: runs.iter().map(RunOutput::from).collect(),
                rendered,
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}

fn judge_message(run_id: Uuid, outcome: &AdvanceOutcome) -> String {
    match outcome {
        AdvanceOutcome::Started { .. } => format!("Run {run_id} judged"),
        AdvanceOutcome::InProgress => format!("Run {run_id} is already being judged"),
        AdvanceOutcome::AlreadyStartedElsewhere => {
            format!("Run {run_id} was picked up by another caller")
        }
        AdvanceOutcome::RetryLater { detail } => {
            format!("Judge deferred for run {run_id}: {detail} (will retry)")
        }
    }
}

fn read_json(path: &PathBuf) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}
