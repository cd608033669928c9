//! Remote stage function port.
//!
//! The ingest/parse and judge stages are opaque remote functions reached
//! over HTTP. The port reports failures with enough detail (status code plus
//! full body text) for the invoker's classification policy to act on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::models::Run;

/// Which externally-invoked pipeline step to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Ingest-parse: turn the raw log into structured steps and metrics
    Ingest,
    /// Judge: score the parsed run against its task definition
    Judge,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingest => "ingest",
            Self::Judge => "judge",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed stage call, before classification.
///
/// `status` is None for transport-level failures (connect errors, timeouts)
/// where no HTTP response arrived.
#[derive(Debug, Clone)]
pub struct StageCallError {
    pub status: Option<u16>,
    pub detail: String,
}

impl std::fmt::Display for StageCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(code) => write!(f, "stage returned {code}: {}", self.detail),
            None => write!(f, "stage call failed: {}", self.detail),
        }
    }
}

impl std::error::Error for StageCallError {}

/// Port for the remote judge/parser function.
#[async_trait]
pub trait StageClient: Send + Sync {
    /// Perform one synchronous request/response round-trip for the given
    /// stage. Implementations must read the full response body before
    /// reporting a failure so classification can see it.
    async fn call(&self, kind: StageKind, run: &Run)
        -> Result<serde_json::Value, StageCallError>;
}
