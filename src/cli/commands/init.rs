//! Implementation of the `tribunal init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::database::DatabaseConnection;

const DEFAULT_CONFIG_YAML: &str = r#"# Tribunal configuration
# Every value here can be overridden via TRIBUNAL_* environment variables,
# e.g. TRIBUNAL_BUDGET__MAX_JUDGE_BUDGET_USD=5.0

database:
  url: "sqlite:.tribunal/tribunal.db"
  max_connections: 10

budget:
  max_judge_budget_usd: 2.0
  max_parse_budget_usd: 1.0
  cost_per_million_tokens: 0.10

stage:
  base_url: "http://localhost:8787"
  timeout_secs: 300

blob:
  root: ".tribunal/blobs"

logging:
  level: "info"
  format: "pretty"
"#;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force reinitialization even if already initialized
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub database_initialized: bool,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.database_initialized {
            lines.push("Database initialized at .tribunal/tribunal.db".to_string());
        }
        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let tribunal_dir = target_path.join(".tribunal");

    if tribunal_dir.exists() && !args.force {
        let out = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to reinitialize.".to_string(),
            initialized_path: target_path,
            database_initialized: false,
        };
        output(&out, json_mode);
        return Ok(());
    }

    if args.force && tribunal_dir.exists() {
        fs::remove_dir_all(&tribunal_dir)
            .await
            .context("Failed to remove existing .tribunal directory")?;
    }

    let config = Config::default();
    fs::create_dir_all(&tribunal_dir).await?;
    fs::create_dir_all(target_path.join(&config.blob.root)).await?;
    fs::write(tribunal_dir.join("config.yaml"), DEFAULT_CONFIG_YAML).await?;

    let db = DatabaseConnection::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to create database")?;
    db.migrate().await?;
    db.close().await;

    let out = InitOutput {
        success: true,
        message: format!("Initialized tribunal project at {}", target_path.display()),
        initialized_path: target_path,
        database_initialized: true,
    };
    output(&out, json_mode);
    Ok(())
}
