//! Run lifecycle orchestration.
//!
//! The orchestrator is stateless between calls and may be driven by any
//! number of concurrent callers (HTTP handlers, schedulers, retry sweeps).
//! The only cross-caller coordination is the compare-and-swap in the run
//! store; no in-process lock is ever held across a stage round-trip. Budget
//! checks and invocation attempts may run redundantly under races; only the
//! actual expensive call is protected by the CAS lock edge.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::errors::{OrchestratorError, OrchestratorResult};
use crate::domain::models::{
    Run, RunMetrics, RunStatus, LOW_CONFIDENCE_THRESHOLD,
};
use crate::domain::ports::{RunFilters, RunStore, StageClient, StageKind};
use crate::services::budget::{BudgetDecision, BudgetGate};
use crate::services::normalizer::ScorecardNormalizer;
use crate::services::stage_invoker::{is_retryable_failure, StageInvoker, StageOutcome};

/// Result of an advance attempt that did not hard-fail.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    /// The stage was invoked and succeeded. For judge advances this carries
    /// the raw judge output awaiting finalization; ingest advances carry
    /// nothing (the parser confirms completion asynchronously).
    Started { judge_output: Option<serde_json::Value> },
    /// The run is already in Judging; nothing was invoked.
    InProgress,
    /// Another caller won the lock edge; nothing was invoked.
    AlreadyStartedElsewhere,
    /// Transient stage failure; the run was reverted to ReadyForJudging.
    /// Advisory, not an error: retry later.
    RetryLater { detail: String },
}

/// Sequences budget gate → lock acquisition → stage invocation →
/// outcome-driven transition for every run.
pub struct LifecycleOrchestrator {
    store: Arc<dyn RunStore>,
    invoker: StageInvoker,
    gate: BudgetGate,
}

impl LifecycleOrchestrator {
    pub fn new(store: Arc<dyn RunStore>, client: Arc<dyn StageClient>, gate: BudgetGate) -> Self {
        Self {
            store,
            invoker: StageInvoker::new(client),
            gate,
        }
    }

    /// Trigger the ingest-parse stage.
    ///
    /// Precondition: the run is `Uploaded` (or `Created`, the inline entry).
    /// A budget denial is terminal here: the run moves to `Failed` with the
    /// estimate recorded, and is not retried automatically — raising the
    /// budget requires an operator anyway. Any invocation failure also
    /// fails the run; only the judge stage has a retry edge. The failure
    /// detail records the transient/permanent classification so an operator
    /// resurrecting the run knows whether a manual retry is worthwhile.
    pub async fn advance_to_parsing(&self, run_id: Uuid) -> OrchestratorResult<AdvanceOutcome> {
        let run = self.load(run_id).await?;
        let entry_status = match run.status {
            RunStatus::Uploaded | RunStatus::Created => run.status,
            actual => {
                return Err(OrchestratorError::InvalidState {
                    run_id,
                    actual,
                    expected: vec![RunStatus::Uploaded, RunStatus::Created],
                })
            }
        };

        let decision = self.gate.check(StageKind::Ingest, Some(&run));
        if !decision.allowed {
            warn!(run_id = %run_id, "ingest budget denied, failing run");
            self.fail_run(&run, entry_status, denial_detail(&decision))
                .await?;
            return Err(budget_error(&decision));
        }

        if !self
            .store
            .transition(run_id, entry_status, RunStatus::Parsing)
            .await?
        {
            debug!(run_id = %run_id, "lost the parse transition to another caller");
            return Ok(AdvanceOutcome::AlreadyStartedElsewhere);
        }
        let run = self.mark_started(&run, RunStatus::Parsing).await?;

        match self.invoker.invoke(StageKind::Ingest, &run).await {
            StageOutcome::Success(_) => {
                info!(run_id = %run_id, "ingest stage started");
                Ok(AdvanceOutcome::Started { judge_output: None })
            }
            StageOutcome::RetryableFailure(detail) | StageOutcome::FatalFailure(detail) => {
                let hint = if is_retryable_failure(None, &detail) {
                    "transient"
                } else {
                    "permanent"
                };
                let recorded = format!("ingest failed ({hint}): {detail}");
                self.fail_run(&run, RunStatus::Parsing, recorded.clone())
                    .await?;
                Err(OrchestratorError::FatalStageFailure(recorded))
            }
        }
    }

    /// Record the external parser's completion signal, attaching any
    /// metrics it extracted, and make the run eligible for judging.
    pub async fn mark_parsed(
        &self,
        run_id: Uuid,
        metrics: Option<RunMetrics>,
    ) -> OrchestratorResult<()> {
        let mut run = self.load(run_id).await?;
        if !self
            .store
            .transition(run_id, RunStatus::Parsing, RunStatus::ReadyForJudging)
            .await?
        {
            return Err(OrchestratorError::InvalidState {
                run_id,
                actual: run.status,
                expected: vec![RunStatus::Parsing],
            });
        }

        if metrics.is_some() {
            run.metrics = metrics;
            run.updated_at = Utc::now();
            self.store.update(&run).await?;
        }
        info!(run_id = %run_id, "run ready for judging");
        Ok(())
    }

    /// Trigger the judge stage.
    ///
    /// Idempotent: a run already in `Judging` returns
    /// [`AdvanceOutcome::InProgress`] without a second remote call. The
    /// compare-and-swap `ReadyForJudging -> Judging` is the at-most-once
    /// guarantee: of any number of concurrent callers, exactly one invokes
    /// the judge. A budget denial here leaves the status untouched — the
    /// caller may raise the budget and retry.
    pub async fn advance_to_judging(&self, run_id: Uuid) -> OrchestratorResult<AdvanceOutcome> {
        let run = self.load(run_id).await?;

        match run.status {
            RunStatus::Judging => {
                debug!(run_id = %run_id, "judge already in flight");
                return Ok(AdvanceOutcome::InProgress);
            }
            RunStatus::ReadyForJudging => {}
            actual => {
                return Err(OrchestratorError::InvalidState {
                    run_id,
                    actual,
                    expected: vec![RunStatus::ReadyForJudging, RunStatus::Judging],
                })
            }
        }

        let decision = self.gate.check(StageKind::Judge, Some(&run));
        if !decision.allowed {
            return Err(budget_error(&decision));
        }

        if !self
            .store
            .transition(run_id, RunStatus::ReadyForJudging, RunStatus::Judging)
            .await?
        {
            debug!(run_id = %run_id, "judge lock lost to another caller");
            return Ok(AdvanceOutcome::AlreadyStartedElsewhere);
        }
        let run = self.mark_started(&run, RunStatus::Judging).await?;

        match self.invoker.invoke(StageKind::Judge, &run).await {
            StageOutcome::Success(payload) => {
                // Status stays Judging; finalize_judgement applies the
                // scorecard and the terminal transition.
                Ok(AdvanceOutcome::Started {
                    judge_output: Some(payload),
                })
            }
            StageOutcome::RetryableFailure(detail) => {
                // Revert only if still Judging, so a concurrent success is
                // never clobbered.
                let reverted = self
                    .store
                    .transition(run_id, RunStatus::Judging, RunStatus::ReadyForJudging)
                    .await?;
                if reverted {
                    info!(run_id = %run_id, %detail, "judge reverted for retry");
                }
                Ok(AdvanceOutcome::RetryLater { detail })
            }
            StageOutcome::FatalFailure(detail) => {
                self.fail_run(&run, RunStatus::Judging, detail.clone()).await?;
                Err(OrchestratorError::FatalStageFailure(detail))
            }
        }
    }

    /// Normalize the raw judge output into the canonical scorecard and
    /// apply the terminal transition: `Completed` at or above the
    /// confidence threshold, `CompletedLowConfidence` below it. The
    /// threshold is applied exactly once, here.
    pub async fn finalize_judgement(
        &self,
        run_id: Uuid,
        raw_judge_output: &str,
    ) -> OrchestratorResult<RunStatus> {
        let mut run = self.load(run_id).await?;
        let scorecard = ScorecardNormalizer::normalize_scorecard(raw_judge_output);

        let terminal = if scorecard.confidence < LOW_CONFIDENCE_THRESHOLD {
            RunStatus::CompletedLowConfidence
        } else {
            RunStatus::Completed
        };

        if !self
            .store
            .transition(run_id, RunStatus::Judging, terminal)
            .await?
        {
            return Err(OrchestratorError::InvalidState {
                run_id,
                actual: run.status,
                expected: vec![RunStatus::Judging],
            });
        }

        run.scorecard = Some(scorecard);
        run.completed_at = Some(Utc::now());
        run.updated_at = Utc::now();
        self.store.update(&run).await?;

        info!(run_id = %run_id, status = %terminal, "run judged");
        Ok(terminal)
    }

    /// Advance-and-finalize in one call: the normal judge entry point for
    /// the CLI and the retry sweep.
    pub async fn judge(&self, run_id: Uuid) -> OrchestratorResult<AdvanceOutcome> {
        match self.advance_to_judging(run_id).await? {
            AdvanceOutcome::Started {
                judge_output: Some(payload),
            } => {
                let raw = payload.to_string();
                self.finalize_judgement(run_id, &raw).await?;
                Ok(AdvanceOutcome::Started {
                    judge_output: Some(payload),
                })
            }
            other => Ok(other),
        }
    }

    /// Re-attempt judging for every retry-eligible run. Just another
    /// redundant caller under the CAS protocol; races with live traffic
    /// are safe. Returns the number of runs that actually started.
    pub async fn retry_sweep(&self) -> OrchestratorResult<usize> {
        let candidates = self
            .store
            .list(RunFilters {
                status: Some(RunStatus::ReadyForJudging),
                ..Default::default()
            })
            .await?;

        let mut started = 0;
        for run in candidates {
            match self.judge(run.id).await {
                Ok(AdvanceOutcome::Started { .. }) => started += 1,
                Ok(outcome) => {
                    debug!(run_id = %run.id, ?outcome, "sweep skipped run");
                }
                Err(err) => {
                    warn!(run_id = %run.id, %err, "sweep attempt failed");
                }
            }
        }
        Ok(started)
    }

    async fn load(&self, run_id: Uuid) -> OrchestratorResult<Run> {
        self.store
            .get(run_id)
            .await?
            .ok_or(OrchestratorError::RunNotFound(run_id))
    }

    /// Stamp `started_at` on first entry into an active processing state.
    /// Returns the stamped record; later writes (failure details, scorecards)
    /// must build on it or they would erase the stamp.
    async fn mark_started(&self, run: &Run, entered: RunStatus) -> OrchestratorResult<Run> {
        if !entered.is_processing() || run.started_at.is_some() {
            return Ok(run.clone());
        }
        let mut updated = run.clone();
        updated.started_at = Some(Utc::now());
        updated.updated_at = Utc::now();
        self.store.update(&updated).await?;
        Ok(updated)
    }

    /// Terminal failure: conditional transition plus recorded detail.
    async fn fail_run(
        &self,
        run: &Run,
        expected: RunStatus,
        detail: String,
    ) -> OrchestratorResult<()> {
        self.store
            .transition(run.id, expected, RunStatus::Failed)
            .await?;
        let mut updated = run.clone();
        updated.failure_details = Some(detail);
        updated.completed_at = Some(Utc::now());
        updated.updated_at = Utc::now();
        self.store.update(&updated).await?;
        Ok(())
    }
}

fn denial_detail(decision: &BudgetDecision) -> String {
    decision
        .reason
        .clone()
        .unwrap_or_else(|| "budget exceeded".to_string())
}

fn budget_error(decision: &BudgetDecision) -> OrchestratorError {
    OrchestratorError::BudgetExceeded {
        estimated_tokens: decision.estimated_tokens,
        estimated_cost_usd: decision.estimated_cost_usd,
        budget_limit_usd: decision.budget_limit_usd,
    }
}
