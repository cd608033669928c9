//! SQLite implementation of the RunStore port.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::domain::errors::StoreError;
use crate::domain::models::{ArtifactRef, Run, RunMetrics, RunStatus, Scorecard};
use crate::domain::ports::{RunFilters, RunStore};
use crate::infrastructure::database::utils::parse_datetime;

const RUN_COLUMNS: &str = "id, workspace_id, status, task_definition, input_payload, \
     log_artifact, failure_details, scorecard, metrics, \
     created_at, updated_at, started_at, completed_at";

#[derive(Clone)]
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Raw row shape; converted into the domain model by `TryFrom`.
#[derive(sqlx::FromRow)]
struct RunRow {
    id: String,
    workspace_id: String,
    status: String,
    task_definition: Option<String>,
    input_payload: Option<String>,
    log_artifact: Option<String>,
    failure_details: Option<String>,
    scorecard: Option<String>,
    metrics: Option<String>,
    created_at: String,
    updated_at: String,
    started_at: Option<String>,
    completed_at: Option<String>,
}

impl TryFrom<RunRow> for Run {
    type Error = StoreError;

    fn try_from(row: RunRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| StoreError::Database(format!("bad run id: {e}")))?;
        let workspace_id = Uuid::parse_str(&row.workspace_id)
            .map_err(|e| StoreError::Database(format!("bad workspace id: {e}")))?;
        let status = RunStatus::from_str(&row.status)
            .ok_or_else(|| StoreError::Database(format!("unknown status: {}", row.status)))?;

        let parse_ts = |s: &str| {
            parse_datetime(s).map_err(|e| StoreError::Database(format!("bad timestamp: {e}")))
        };

        Ok(Run {
            id,
            workspace_id,
            status,
            task_definition: row
                .task_definition
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            input_payload: row
                .input_payload
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            log_artifact: row
                .log_artifact
                .as_deref()
                .map(serde_json::from_str::<ArtifactRef>)
                .transpose()?,
            failure_details: row.failure_details,
            scorecard: row
                .scorecard
                .as_deref()
                .map(serde_json::from_str::<Scorecard>)
                .transpose()?,
            metrics: row
                .metrics
                .as_deref()
                .map(serde_json::from_str::<RunMetrics>)
                .transpose()?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
            started_at: row.started_at.as_deref().map(parse_ts).transpose()?,
            completed_at: row.completed_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn insert(&self, run: &Run) -> Result<(), StoreError> {
        let task_definition = run
            .task_definition
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let input_payload = run
            .input_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let log_artifact = run
            .log_artifact
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let scorecard = run
            .scorecard
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let metrics = run.metrics.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            r#"INSERT INTO runs (
                id, workspace_id, status, task_definition, input_payload,
                log_artifact, failure_details, scorecard, metrics,
                created_at, updated_at, started_at, completed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(run.id.to_string())
        .bind(run.workspace_id.to_string())
        .bind(run.status.as_str())
        .bind(task_definition)
        .bind(input_payload)
        .bind(log_artifact)
        .bind(&run.failure_details)
        .bind(scorecard)
        .bind(metrics)
        .bind(run.created_at.to_rfc3339())
        .bind(run.updated_at.to_rfc3339())
        .bind(run.started_at.map(|dt| dt.to_rfc3339()))
        .bind(run.completed_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Run>, StoreError> {
        let row: Option<RunRow> =
            sqlx::query_as(&format!("SELECT {RUN_COLUMNS} FROM runs WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Run::try_from).transpose()
    }

    /// Writes every column except `status`: status moves only through
    /// `compare_and_set_status`, so a racing field update can never clobber
    /// a concurrent transition.
    async fn update(&self, run: &Run) -> Result<(), StoreError> {
        let task_definition = run
            .task_definition
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let input_payload = run
            .input_payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let log_artifact = run
            .log_artifact
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let scorecard = run
            .scorecard
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let metrics = run.metrics.as_ref().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            r#"UPDATE runs SET
                task_definition = ?, input_payload = ?, log_artifact = ?,
                failure_details = ?, scorecard = ?, metrics = ?,
                updated_at = ?, started_at = ?, completed_at = ?
            WHERE id = ?"#,
        )
        .bind(task_definition)
        .bind(input_payload)
        .bind(log_artifact)
        .bind(&run.failure_details)
        .bind(scorecard)
        .bind(metrics)
        .bind(run.updated_at.to_rfc3339())
        .bind(run.started_at.map(|dt| dt.to_rfc3339()))
        .bind(run.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(run.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(run.id));
        }
        Ok(())
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: RunStatus,
        next: RunStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE runs SET status = ?, updated_at = ? WHERE id = ? AND status = ?")
            .bind(next.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;

        let matched = result.rows_affected() == 1;
        debug!(
            run_id = %id,
            expected = %expected,
            next = %next,
            matched,
            "compare-and-set status"
        );
        Ok(matched)
    }

    async fn list(&self, filters: RunFilters) -> Result<Vec<Run>, StoreError> {
        let mut query = format!("SELECT {RUN_COLUMNS} FROM runs WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(status) = &filters.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(workspace_id) = &filters.workspace_id {
            query.push_str(" AND workspace_id = ?");
            bindings.push(workspace_id.to_string());
        }
        query.push_str(" ORDER BY created_at DESC");
        if let Some(limit) = filters.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut q = sqlx::query_as::<_, RunRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Run::try_from).collect()
    }
}
