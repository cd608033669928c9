//! Tribunal CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tribunal::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init(args) => tribunal::cli::commands::init::execute(args, cli.json).await,
        Commands::Run(args) => tribunal::cli::commands::run::execute(args, cli.json).await,
        Commands::Compare(args) => tribunal::cli::commands::compare::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        tribunal::cli::handle_error(err, cli.json);
    }
}
