//! Run persistence port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::models::{Run, RunStatus};

/// Filters for querying runs.
#[derive(Default, Debug, Clone)]
pub struct RunFilters {
    pub status: Option<RunStatus>,
    pub workspace_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Repository port for run persistence.
///
/// `compare_and_set_status` is the sole cross-caller serialization point of
/// the whole subsystem and must be atomic at the storage layer (a conditional
/// `UPDATE ... WHERE id = ? AND status = ?` with an affected-row check, or an
/// equivalent atomic document-store operation).
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert a new run
    async fn insert(&self, run: &Run) -> Result<(), StoreError>;

    /// Get a run by ID
    async fn get(&self, id: Uuid) -> Result<Option<Run>, StoreError>;

    /// Unconditionally update a run's non-status fields. Never used to move
    /// the status across the lock edges; racing callers coordinate only
    /// through `compare_and_set_status`.
    async fn update(&self, run: &Run) -> Result<(), StoreError>;

    /// Atomically transition `expected -> next` for the given run.
    /// Returns true iff the run's status matched `expected` and was updated.
    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: RunStatus,
        next: RunStatus,
    ) -> Result<bool, StoreError>;

    /// List runs with optional filters
    async fn list(&self, filters: RunFilters) -> Result<Vec<Run>, StoreError>;

    /// `compare_and_set_status` restricted to edges of the status graph.
    /// The store CAS is the runtime serialization point; the graph check is
    /// a debug assertion catching a miswired edge in a caller.
    async fn transition(
        &self,
        id: Uuid,
        expected: RunStatus,
        next: RunStatus,
    ) -> Result<bool, StoreError> {
        debug_assert!(
            expected.can_transition_to(next),
            "no status edge {expected} -> {next}"
        );
        self.compare_and_set_status(id, expected, next).await
    }
}
