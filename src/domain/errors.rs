//! Domain errors for the tribunal orchestrator.

use thiserror::Error;
use uuid::Uuid;

use super::models::RunStatus;

/// Errors surfaced by repository/storage ports.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Run not found: {0}")]
    NotFound(Uuid),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Hard errors surfaced by the lifecycle orchestrator and comparison engine.
///
/// Retryable stage failures are not here: those are recovered locally
/// (the run is reverted to a retry-eligible status) and reported through
/// [`crate::services::lifecycle::AdvanceOutcome`] as an advisory.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Precondition violated; caller error, not retryable.
    #[error("Invalid state: run {run_id} is {actual}, expected one of {expected:?}")]
    InvalidState {
        run_id: Uuid,
        actual: RunStatus,
        expected: Vec<RunStatus>,
    },

    /// Budget policy denial. Carries the figures an operator needs to decide
    /// whether to raise the limit or shrink the input.
    #[error(
        "Budget exceeded: estimated ${estimated_cost_usd:.6} ({estimated_tokens} tokens) \
         over limit ${budget_limit_usd:.2}"
    )]
    BudgetExceeded {
        estimated_tokens: u64,
        estimated_cost_usd: f64,
        budget_limit_usd: f64,
    },

    /// Permanent remote failure; the run has been moved to Failed.
    #[error("Fatal stage failure: {0}")]
    FatalStageFailure(String),

    /// Cross-workspace access; never retried, always surfaced.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Malformed caller input (e.g. comparing fewer than two runs).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Run not found: {0}")]
    RunNotFound(Uuid),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Blob store error: {0}")]
    Blob(String),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
