//! Lifecycle orchestration tests over in-memory fakes.
//!
//! The store fake keeps the conditional-update atomicity of the real SQLite
//! adapter (one mutex around the check-and-write), so the at-most-once
//! guarantees can be exercised with real task-level concurrency.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use tribunal::domain::models::{BudgetConfig, Run, RunMetrics, RunStatus};
use tribunal::domain::ports::{
    RunFilters, RunStore, StageCallError, StageClient, StageKind,
};
use tribunal::domain::{OrchestratorError, StoreError};
use tribunal::services::{AdvanceOutcome, BudgetGate, LifecycleOrchestrator};

// ========================
// Mock Implementations
// ========================

#[derive(Default)]
struct InMemoryRunStore {
    runs: StdMutex<HashMap<Uuid, Run>>,
}

impl InMemoryRunStore {
    fn with_run(run: Run) -> Arc<Self> {
        let store = Self::default();
        store.runs.lock().unwrap().insert(run.id, run);
        Arc::new(store)
    }

    fn status_of(&self, id: Uuid) -> RunStatus {
        self.runs.lock().unwrap()[&id].status
    }

    fn run(&self, id: Uuid) -> Run {
        self.runs.lock().unwrap()[&id].clone()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn insert(&self, run: &Run) -> Result<(), StoreError> {
        self.runs.lock().unwrap().insert(run.id, run.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Run>, StoreError> {
        Ok(self.runs.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, run: &Run) -> Result<(), StoreError> {
        let mut runs = self.runs.lock().unwrap();
        let existing = runs
            .get_mut(&run.id)
            .ok_or(StoreError::NotFound(run.id))?;
        // Mirror the SQLite adapter: every column but status.
        let status = existing.status;
        *existing = run.clone();
        existing.status = status;
        Ok(())
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        expected: RunStatus,
        next: RunStatus,
    ) -> Result<bool, StoreError> {
        let mut runs = self.runs.lock().unwrap();
        match runs.get_mut(&id) {
            Some(run) if run.status == expected => {
                run.status = next;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list(&self, filters: RunFilters) -> Result<Vec<Run>, StoreError> {
        let runs = self.runs.lock().unwrap();
        let mut matched: Vec<Run> = runs
            .values()
            .filter(|run| filters.status.map_or(true, |s| run.status == s))
            .filter(|run| filters.workspace_id.map_or(true, |w| run.workspace_id == w))
            .cloned()
            .collect();
        if let Some(limit) = filters.limit {
            matched.truncate(limit as usize);
        }
        Ok(matched)
    }
}

struct ScriptedStageClient {
    responses: StdMutex<VecDeque<Result<serde_json::Value, StageCallError>>>,
    calls: AtomicUsize,
}

impl ScriptedStageClient {
    fn new(responses: Vec<Result<serde_json::Value, StageCallError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: StdMutex::new(responses.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn succeeding_with(payload: serde_json::Value) -> Arc<Self> {
        Self::new(vec![Ok(payload)])
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StageClient for ScriptedStageClient {
    async fn call(
        &self,
        _kind: StageKind,
        _run: &Run,
    ) -> Result<serde_json::Value, StageCallError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({})))
    }
}

fn orchestrator(
    store: Arc<InMemoryRunStore>,
    client: Arc<ScriptedStageClient>,
) -> LifecycleOrchestrator {
    LifecycleOrchestrator::new(store, client, BudgetGate::new(BudgetConfig::default()))
}

fn ready_run() -> Run {
    let mut run = Run::new_inline(Uuid::new_v4(), json!({"transcript": "step 1"}));
    run.status = RunStatus::ReadyForJudging;
    run
}

fn judge_payload(confidence: f64) -> serde_json::Value {
    json!({
        "dimensions": {
            "planning": {"score": 80.0, "reasoning": "clear plan"},
            "execution": {"score": 60.0, "reasoning": "two failed tool calls"}
        },
        "confidence": confidence
    })
}

// ========================
// Judge stage
// ========================

#[tokio::test]
async fn test_concurrent_judge_invokes_stage_exactly_once() {
    let run = ready_run();
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let client = ScriptedStageClient::succeeding_with(judge_payload(0.9));
    let orch = Arc::new(orchestrator(store.clone(), client.clone()));

    let mut handles = Vec::new();
    for _ in 0..6 {
        let orch = orch.clone();
        handles.push(tokio::spawn(
            async move { orch.advance_to_judging(run_id).await },
        ));
    }

    let mut started = 0;
    for handle in handles {
        match handle.await.expect("join").expect("no error expected") {
            AdvanceOutcome::Started { judge_output } => {
                assert!(judge_output.is_some());
                started += 1;
            }
            AdvanceOutcome::InProgress | AdvanceOutcome::AlreadyStartedElsewhere => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    assert_eq!(started, 1, "exactly one caller may start the judge");
    assert_eq!(client.call_count(), 1, "the stage must be invoked once");
    assert_eq!(store.status_of(run_id), RunStatus::Judging);
}

#[tokio::test]
async fn test_judging_run_reports_in_progress_without_invoking() {
    let mut run = ready_run();
    run.status = RunStatus::Judging;
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let client = ScriptedStageClient::new(vec![]);
    let orch = orchestrator(store, client.clone());

    let outcome = orch.advance_to_judging(run_id).await.expect("no error");
    assert_eq!(outcome, AdvanceOutcome::InProgress);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_worker_limit_failure_reverts_for_retry() {
    let run = ready_run();
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let client = ScriptedStageClient::new(vec![Err(StageCallError {
        status: Some(503),
        detail: "WORKER_LIMIT exceeded, please retry".to_string(),
    })]);
    let orch = orchestrator(store.clone(), client);

    let outcome = orch.advance_to_judging(run_id).await.expect("retryable");
    assert!(matches!(outcome, AdvanceOutcome::RetryLater { .. }));
    assert_eq!(store.status_of(run_id), RunStatus::ReadyForJudging);
    assert!(store.run(run_id).failure_details.is_none());
}

#[tokio::test]
async fn test_fatal_judge_failure_fails_run() {
    let run = ready_run();
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let client = ScriptedStageClient::new(vec![Err(StageCallError {
        status: Some(422),
        detail: "invalid task definition".to_string(),
    })]);
    let orch = orchestrator(store.clone(), client);

    let err = orch.advance_to_judging(run_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::FatalStageFailure(_)));
    assert_eq!(store.status_of(run_id), RunStatus::Failed);
    assert!(store
        .run(run_id)
        .failure_details
        .expect("details recorded")
        .contains("invalid task definition"));
}

#[tokio::test]
async fn test_judge_budget_denial_leaves_status_untouched() {
    let run = ready_run();
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let client = ScriptedStageClient::new(vec![]);
    let gate = BudgetGate::new(BudgetConfig {
        max_judge_budget_usd: 0.000_000_1,
        ..Default::default()
    });
    let orch = LifecycleOrchestrator::new(store.clone(), client.clone(), gate);

    let err = orch.advance_to_judging(run_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::BudgetExceeded { .. }));
    assert_eq!(store.status_of(run_id), RunStatus::ReadyForJudging);
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_judge_completes_run_with_scorecard() {
    let run = ready_run();
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let client = ScriptedStageClient::succeeding_with(judge_payload(0.9));
    let orch = orchestrator(store.clone(), client);

    let outcome = orch.judge(run_id).await.expect("judge");
    assert!(matches!(outcome, AdvanceOutcome::Started { .. }));

    assert_eq!(store.status_of(run_id), RunStatus::Completed);
    let run = store.run(run_id);
    let card = run.scorecard.expect("scorecard stored");
    assert!((card.overall_score - 70.0).abs() < 1e-9);
    assert!(run.completed_at.is_some());
}

#[tokio::test]
async fn test_low_confidence_verdict_is_flagged() {
    let run = ready_run();
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let client = ScriptedStageClient::succeeding_with(judge_payload(0.4));
    let orch = orchestrator(store.clone(), client);

    orch.judge(run_id).await.expect("judge");
    assert_eq!(store.status_of(run_id), RunStatus::CompletedLowConfidence);
}

#[tokio::test]
async fn test_malformed_judge_output_completes_low_confidence() {
    let run = ready_run();
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let client = ScriptedStageClient::succeeding_with(json!("not a scorecard at all"));
    let orch = orchestrator(store.clone(), client);

    orch.judge(run_id).await.expect("judge never hard-fails on shape");
    assert_eq!(store.status_of(run_id), RunStatus::CompletedLowConfidence);
}

#[tokio::test]
async fn test_judge_from_wrong_state_is_invalid() {
    let mut run = ready_run();
    run.status = RunStatus::Pending;
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let orch = orchestrator(store, ScriptedStageClient::new(vec![]));

    let err = orch.advance_to_judging(run_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidState { .. }));
}

// ========================
// Ingest stage
// ========================

#[tokio::test]
async fn test_parse_budget_denial_fails_run() {
    let mut run = ready_run();
    run.status = RunStatus::Uploaded;
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let client = ScriptedStageClient::new(vec![]);
    let gate = BudgetGate::new(BudgetConfig {
        max_parse_budget_usd: 0.000_000_1,
        ..Default::default()
    });
    let orch = LifecycleOrchestrator::new(store.clone(), client.clone(), gate);

    let err = orch.advance_to_parsing(run_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::BudgetExceeded { .. }));
    assert_eq!(store.status_of(run_id), RunStatus::Failed);
    assert!(store.run(run_id).failure_details.is_some());
    assert_eq!(client.call_count(), 0);
}

#[tokio::test]
async fn test_parse_accepts_inline_entry() {
    let mut run = ready_run();
    run.status = RunStatus::Created;
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let client = ScriptedStageClient::succeeding_with(json!({"accepted": true}));
    let orch = orchestrator(store.clone(), client);

    let outcome = orch.advance_to_parsing(run_id).await.expect("parse");
    assert_eq!(outcome, AdvanceOutcome::Started { judge_output: None });
    assert_eq!(store.status_of(run_id), RunStatus::Parsing);
    assert!(store.run(run_id).started_at.is_some());
}

#[tokio::test]
async fn test_transient_ingest_failure_still_fails_run_with_hint() {
    let mut run = ready_run();
    run.status = RunStatus::Uploaded;
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let client = ScriptedStageClient::new(vec![Err(StageCallError {
        status: Some(504),
        detail: "gateway timeout".to_string(),
    })]);
    let orch = orchestrator(store.clone(), client);

    let err = orch.advance_to_parsing(run_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::FatalStageFailure(_)));
    assert_eq!(store.status_of(run_id), RunStatus::Failed);
    assert!(store
        .run(run_id)
        .failure_details
        .expect("details recorded")
        .contains("transient"));
}

#[tokio::test]
async fn test_started_at_survives_ingest_failure() {
    let mut run = ready_run();
    run.status = RunStatus::Created;
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let client = ScriptedStageClient::new(vec![Err(StageCallError {
        status: Some(422),
        detail: "unreadable log format".to_string(),
    })]);
    let orch = orchestrator(store.clone(), client);

    let err = orch.advance_to_parsing(run_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::FatalStageFailure(_)));

    // The run entered Parsing before the stage call, so the failure write
    // must not erase the started_at stamp.
    let stored = store.run(run_id);
    assert_eq!(stored.status, RunStatus::Failed);
    assert!(stored.started_at.is_some());
    assert!(stored.completed_at.is_some());
}

#[tokio::test]
async fn test_started_at_survives_fatal_judge_failure() {
    let run = ready_run();
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let client = ScriptedStageClient::new(vec![Err(StageCallError {
        status: Some(422),
        detail: "invalid task definition".to_string(),
    })]);
    let orch = orchestrator(store.clone(), client);

    orch.advance_to_judging(run_id).await.unwrap_err();

    let stored = store.run(run_id);
    assert_eq!(stored.status, RunStatus::Failed);
    assert!(stored.started_at.is_some());
}

#[tokio::test]
async fn test_mark_parsed_transitions_and_stores_metrics() {
    let mut run = ready_run();
    run.status = RunStatus::Parsing;
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let orch = orchestrator(store.clone(), ScriptedStageClient::new(vec![]));

    let metrics = RunMetrics {
        total_steps: Some(21),
        total_tool_calls: Some(9),
        ..Default::default()
    };
    orch.mark_parsed(run_id, Some(metrics)).await.expect("mark parsed");

    assert_eq!(store.status_of(run_id), RunStatus::ReadyForJudging);
    assert_eq!(store.run(run_id).metrics, Some(metrics));
}

#[tokio::test]
async fn test_mark_parsed_outside_parsing_is_invalid() {
    let run = ready_run();
    let run_id = run.id;
    let store = InMemoryRunStore::with_run(run);
    let orch = orchestrator(store, ScriptedStageClient::new(vec![]));

    let err = orch.mark_parsed(run_id, None).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidState { .. }));
}

// ========================
// Retry sweep
// ========================

#[tokio::test]
async fn test_retry_sweep_judges_eligible_runs() {
    let first = ready_run();
    let workspace = first.workspace_id;
    let mut second = Run::new_inline(workspace, json!({"transcript": "other"}));
    second.status = RunStatus::ReadyForJudging;
    let mut pending = Run::new(workspace);
    pending.status = RunStatus::Pending;

    let store = InMemoryRunStore::with_run(first);
    store.insert(&second).await.expect("insert");
    store.insert(&pending).await.expect("insert");

    let client = ScriptedStageClient::new(vec![
        Ok(judge_payload(0.9)),
        Ok(judge_payload(0.9)),
    ]);
    let orch = orchestrator(store.clone(), client.clone());

    let started = orch.retry_sweep().await.expect("sweep");
    assert_eq!(started, 2);
    assert_eq!(client.call_count(), 2);
    assert_eq!(store.status_of(pending.id), RunStatus::Pending);
}
