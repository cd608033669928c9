//! Stage invocation and failure classification.
//!
//! Classification is the single most important behavioral contract in the
//! system: it decides whether the orchestrator reverts a run to a
//! retry-eligible status or terminates it permanently. The policy lives in
//! one function so it stays a single editable rule rather than scattered
//! string checks. Ambiguity biases toward retryable: a stuck run can be
//! retried manually, but a wrongly-failed run needs operator surgery.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::models::Run;
use crate::domain::ports::{StageCallError, StageClient, StageKind};

/// Error-text fragments that mark a failure as transient regardless of
/// status code. Matched case-insensitively as substrings.
const RETRYABLE_FRAGMENTS: [&str; 6] = [
    "worker_limit",
    "timeout",
    "rate limit",
    "quota",
    "504",
    "546",
];

/// Classified result of one stage invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// The stage returned a 2xx JSON body
    Success(serde_json::Value),
    /// Transient failure; the run should return to a retry-eligible status
    RetryableFailure(String),
    /// Permanent failure; the run should terminate in Failed
    FatalFailure(String),
}

/// Decide whether a failed stage call is retryable.
///
/// Retryable iff the HTTP status is >= 500, or 429, or the error text
/// contains one of the known transient fragments. Everything else is fatal.
pub fn is_retryable_failure(status: Option<u16>, detail: &str) -> bool {
    if let Some(code) = status {
        if code >= 500 || code == 429 {
            return true;
        }
    }
    let lowered = detail.to_lowercase();
    RETRYABLE_FRAGMENTS.iter().any(|f| lowered.contains(f))
}

/// Performs the remote call for a stage and classifies the outcome.
pub struct StageInvoker {
    client: Arc<dyn StageClient>,
}

impl StageInvoker {
    pub fn new(client: Arc<dyn StageClient>) -> Self {
        Self { client }
    }

    /// One synchronous round-trip to the remote stage function.
    /// Never returns an error: every failure mode is classified.
    pub async fn invoke(&self, kind: StageKind, run: &Run) -> StageOutcome {
        match self.client.call(kind, run).await {
            Ok(payload) => {
                debug!(run_id = %run.id, stage = %kind, "stage call succeeded");
                StageOutcome::Success(payload)
            }
            Err(err) => self.classify(kind, run, &err),
        }
    }

    fn classify(&self, kind: StageKind, run: &Run, err: &StageCallError) -> StageOutcome {
        let detail = err.to_string();
        if is_retryable_failure(err.status, &err.detail) {
            warn!(run_id = %run.id, stage = %kind, %detail, "retryable stage failure");
            StageOutcome::RetryableFailure(detail)
        } else {
            warn!(run_id = %run.id, stage = %kind, %detail, "fatal stage failure");
            StageOutcome::FatalFailure(detail)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_errors_are_retryable() {
        assert!(is_retryable_failure(Some(500), "internal error"));
        assert!(is_retryable_failure(Some(502), ""));
        assert!(is_retryable_failure(Some(503), "unavailable"));
        assert!(is_retryable_failure(Some(529), "overloaded"));
    }

    #[test]
    fn test_rate_limit_status_is_retryable() {
        assert!(is_retryable_failure(Some(429), "slow down"));
    }

    #[test]
    fn test_client_errors_are_fatal() {
        assert!(!is_retryable_failure(Some(400), "bad request"));
        assert!(!is_retryable_failure(Some(403), "forbidden"));
        assert!(!is_retryable_failure(Some(422), "invalid schema"));
    }

    #[test]
    fn test_transient_fragments_override_status() {
        // A 4xx carrying a worker-limit body still reads as transient
        assert!(is_retryable_failure(Some(422), "WORKER_LIMIT exceeded"));
        assert!(is_retryable_failure(Some(400), "Request Timeout upstream"));
        assert!(is_retryable_failure(None, "rate limit hit, retry later"));
        assert!(is_retryable_failure(None, "monthly quota exhausted"));
        assert!(is_retryable_failure(None, "upstream returned 504"));
        assert!(is_retryable_failure(None, "gateway code 546"));
    }

    #[test]
    fn test_fragment_match_is_case_insensitive() {
        assert!(is_retryable_failure(None, "Rate Limit reached"));
        assert!(is_retryable_failure(None, "worker_limit"));
    }

    #[test]
    fn test_transport_error_without_fragment_is_fatal() {
        // No status, no recognized fragment: nothing marks it transient
        assert!(!is_retryable_failure(None, "connection refused"));
    }
}
