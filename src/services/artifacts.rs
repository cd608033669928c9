//! Log artifact upload handling.
//!
//! Drives the upload leg of the state machine (Pending → Uploading →
//! Uploaded) against the blob store. Kept apart from the lifecycle
//! orchestrator: uploads are cheap and unmetered, so they carry no budget
//! gate and no lock beyond the usual conditional transitions.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::domain::errors::{OrchestratorError, OrchestratorResult};
use crate::domain::models::{ArtifactRef, RunStatus};
use crate::domain::ports::{BlobStore, RunStore};

pub struct ArtifactService {
    store: Arc<dyn RunStore>,
    blobs: Arc<dyn BlobStore>,
}

impl ArtifactService {
    pub fn new(store: Arc<dyn RunStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { store, blobs }
    }

    /// Upload a log for a pending run and record its artifact reference.
    pub async fn attach_log(&self, run_id: Uuid, bytes: &[u8]) -> OrchestratorResult<ArtifactRef> {
        let run = self
            .store
            .get(run_id)
            .await?
            .ok_or(OrchestratorError::RunNotFound(run_id))?;

        if !self
            .store
            .transition(run_id, RunStatus::Pending, RunStatus::Uploading)
            .await?
        {
            return Err(OrchestratorError::InvalidState {
                run_id,
                actual: run.status,
                expected: vec![RunStatus::Pending],
            });
        }

        // The run is now Uploading; stamp started_at before the blob write
        // so a failed upload still records when processing began.
        let mut run = run;
        if run.started_at.is_none() {
            run.started_at = Some(Utc::now());
            run.updated_at = Utc::now();
            self.store.update(&run).await?;
        }

        let key = format!("logs/{run_id}");
        let checksum = match self.blobs.upload(&key, bytes).await {
            Ok(checksum) => checksum,
            Err(err) => {
                // Upload failed: terminal, the caller resubmits a fresh run.
                let mut failed = run.clone();
                failed.failure_details = Some(format!("log upload failed: {err}"));
                failed.completed_at = Some(Utc::now());
                failed.updated_at = Utc::now();
                self.store
                    .transition(run_id, RunStatus::Uploading, RunStatus::Failed)
                    .await?;
                self.store.update(&failed).await?;
                return Err(OrchestratorError::Blob(err.to_string()));
            }
        };

        let artifact = ArtifactRef {
            key,
            size_bytes: bytes.len() as u64,
            checksum,
        };

        let mut updated = run;
        updated.log_artifact = Some(artifact.clone());
        updated.updated_at = Utc::now();
        self.store.update(&updated).await?;
        self.store
            .transition(run_id, RunStatus::Uploading, RunStatus::Uploaded)
            .await?;

        info!(run_id = %run_id, size_bytes = artifact.size_bytes, "log artifact attached");
        Ok(artifact)
    }
}
