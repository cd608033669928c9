//! CLI layer: argument parsing, command dispatch, and output formatting.

pub mod commands;
pub mod context;
pub mod output;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tribunal")]
#[command(about = "Tribunal - Agent run evaluation orchestrator", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize tribunal configuration and database
    Init(commands::init::InitArgs),

    /// Run lifecycle commands
    Run(commands::run::RunArgs),

    /// Compare completed runs against a baseline
    Compare(commands::compare::CompareArgs),
}

/// Print a command error and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
