//! Tribunal - Agent Run Evaluation Orchestrator
//!
//! Tribunal drives agent evaluation runs through an ingest -> parse ->
//! judge -> score pipeline, with per-stage budget gates, at-most-once
//! stage invocation under concurrent callers, and cross-run comparison.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Run state machine, scorecards, ports
//! - **Service Layer** (`services`): Lifecycle orchestration, budget gating,
//!   scorecard normalization, comparison
//! - **Infrastructure Layer** (`infrastructure`): SQLite, blob storage, and
//!   remote stage adapters
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use tribunal::services::LifecycleOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // Wire stores and clients, then drive runs through the pipeline
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    ArtifactRef, Config, DatabaseConfig, LoggingConfig, Run, RunMetrics, RunStatus, Scorecard,
};
pub use domain::ports::{BlobStore, RunFilters, RunStore, StageClient, StageKind};
pub use domain::{OrchestratorError, OrchestratorResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AdvanceOutcome, ArtifactService, BudgetGate, ComparisonEngine, LifecycleOrchestrator,
    ScorecardNormalizer,
};
