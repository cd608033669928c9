//! Domain models: pure data types with no I/O.

pub mod config;
pub mod run;
pub mod scorecard;

pub use config::{
    BlobConfig, BudgetConfig, Config, DatabaseConfig, LoggingConfig, StageConfig,
};
pub use run::{ArtifactRef, Run, RunStatus};
pub use scorecard::{
    DimensionBreakdown, DimensionScore, MetricBreakdown, RunMetrics, Scorecard,
    LOW_CONFIDENCE_THRESHOLD,
};
