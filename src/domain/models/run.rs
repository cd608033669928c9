//! Run domain model.
//!
//! A run is one evaluation attempt of an agent log through the pipeline
//! (ingest → parse → judge → score). Runs move through a closed state
//! machine; the only backward edge is the judge retry edge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scorecard::{RunMetrics, Scorecard};

/// Status of a run in the evaluation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Run is created but the log artifact has not been uploaded yet
    Pending,
    /// Log upload is in flight
    Uploading,
    /// Log artifact is stored and checksummed
    Uploaded,
    /// Alternate entry: run was created with its log inline, no upload step
    Created,
    /// Ingest/parse stage has been triggered
    Parsing,
    /// Parsed and eligible for judging
    ReadyForJudging,
    /// Judge stage is in flight (the exclusive lock state)
    Judging,
    /// Judged with confidence at or above the threshold
    Completed,
    /// Judged, but the scorecard confidence fell below the threshold
    CompletedLowConfidence,
    /// Terminally failed
    Failed,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Uploading => "uploading",
            Self::Uploaded => "uploaded",
            Self::Created => "created",
            Self::Parsing => "parsing",
            Self::ReadyForJudging => "ready_for_judging",
            Self::Judging => "judging",
            Self::Completed => "completed",
            Self::CompletedLowConfidence => "completed_low_confidence",
            Self::Failed => "failed",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "uploading" => Some(Self::Uploading),
            "uploaded" => Some(Self::Uploaded),
            "created" => Some(Self::Created),
            "parsing" => Some(Self::Parsing),
            "ready_for_judging" => Some(Self::ReadyForJudging),
            "judging" => Some(Self::Judging),
            "completed" | "complete" => Some(Self::Completed),
            "completed_low_confidence" => Some(Self::CompletedLowConfidence),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Check if this is a terminal state. No edges leave terminal states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::CompletedLowConfidence | Self::Failed
        )
    }

    /// Check if this is an active processing state (sets `started_at`).
    pub fn is_processing(&self) -> bool {
        matches!(self, Self::Uploading | Self::Parsing | Self::Judging)
    }

    /// Valid transitions from this status.
    ///
    /// The graph is monotonic except for the explicit judge retry edge
    /// `Judging -> ReadyForJudging`.
    pub fn valid_transitions(&self) -> Vec<RunStatus> {
        match self {
            Self::Pending => vec![Self::Uploading, Self::Failed],
            Self::Uploading => vec![Self::Uploaded, Self::Failed],
            Self::Uploaded => vec![Self::Parsing, Self::Failed],
            Self::Created => vec![Self::Parsing, Self::Failed],
            Self::Parsing => vec![Self::ReadyForJudging, Self::Failed],
            Self::ReadyForJudging => vec![Self::Judging, Self::Failed],
            Self::Judging => vec![
                Self::Completed,
                Self::CompletedLowConfidence,
                Self::ReadyForJudging, // retry edge
                Self::Failed,
            ],
            Self::Completed | Self::CompletedLowConfidence | Self::Failed => vec![],
        }
    }

    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to an uploaded log artifact in the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    /// Blob store key
    pub key: String,
    /// Size in bytes
    pub size_bytes: u64,
    /// Hex-encoded SHA-256 checksum
    pub checksum: String,
}

/// One evaluation attempt of an agent log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Unique identifier
    pub id: Uuid,
    /// Access-control boundary this run belongs to
    pub workspace_id: Uuid,
    /// Current status
    pub status: RunStatus,
    /// Opaque task definition JSON; used only for cost estimation
    pub task_definition: Option<serde_json::Value>,
    /// Opaque input payload JSON; used only for cost estimation
    pub input_payload: Option<serde_json::Value>,
    /// Uploaded log artifact, set once upload completes
    pub log_artifact: Option<ArtifactRef>,
    /// Human-readable failure detail, set on Failed
    pub failure_details: Option<String>,
    /// Canonical judged scorecard, immutable once written
    pub scorecard: Option<Scorecard>,
    /// Execution metrics extracted by the parse stage
    pub metrics: Option<RunMetrics>,
    /// When created
    pub created_at: DateTime<Utc>,
    /// When last updated
    pub updated_at: DateTime<Utc>,
    /// When the run first entered an active processing state
    pub started_at: Option<DateTime<Utc>>,
    /// When the run reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

impl Run {
    /// Create a new run in the upload entry path.
    pub fn new(workspace_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            status: RunStatus::Pending,
            task_definition: None,
            input_payload: None,
            log_artifact: None,
            failure_details: None,
            scorecard: None,
            metrics: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// Create a run via the alternate entry: the log is carried inline in
    /// the input payload and no upload step runs.
    pub fn new_inline(workspace_id: Uuid, input_payload: serde_json::Value) -> Self {
        let mut run = Self::new(workspace_id);
        run.status = RunStatus::Created;
        run.input_payload = Some(input_payload);
        run
    }

    /// Set the task definition.
    pub fn with_task_definition(mut self, task_definition: serde_json::Value) -> Self {
        self.task_definition = Some(task_definition);
        self
    }

    /// Set the input payload.
    pub fn with_input_payload(mut self, input_payload: serde_json::Value) -> Self {
        self.input_payload = Some(input_payload);
        self
    }
}
