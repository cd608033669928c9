//! Budget estimation and gating for paid stage invocations.
//!
//! The estimate is a heuristic (4 bytes per token plus fixed prompt and
//! response allowances), not exact billing. The gate decides allow/deny
//! before any remote call is triggered, and fails closed.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::models::{BudgetConfig, Run};
use crate::domain::ports::StageKind;

/// Fixed prompt allowance for the ingest-parse stage.
const INGEST_BASE_PROMPT_TOKENS: u64 = 1_500;
/// Expected response allowance for the ingest-parse stage.
const INGEST_RESPONSE_TOKENS: u64 = 2_000;
/// The parser only ever reads this many tokens of log content.
const INGEST_CONTENT_TOKEN_CAP: u64 = 10_000;

/// Fixed prompt allowance for the judge stage.
const JUDGE_BASE_PROMPT_TOKENS: u64 = 2_000;
/// Expected response allowance for the judge stage.
const JUDGE_RESPONSE_TOKENS: u64 = 1_500;

/// Heuristic: roughly 4 bytes of payload per token.
const BYTES_PER_TOKEN: u64 = 4;

/// Heuristic cost estimate for one stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub tokens: u64,
    pub cost_usd: f64,
}

/// Outcome of a budget check. Ephemeral: computed per attempt, logged,
/// never persisted as authoritative state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetDecision {
    pub allowed: bool,
    pub estimated_tokens: u64,
    pub estimated_cost_usd: f64,
    pub budget_limit_usd: f64,
    /// Human-readable denial reason; None when allowed
    pub reason: Option<String>,
}

/// Pure cost estimator. Deterministic, no I/O, no side effects.
pub struct BudgetEstimator;

impl BudgetEstimator {
    /// Estimate token count and cost for invoking `kind` on `run`.
    pub fn estimate(kind: StageKind, run: &Run, config: &BudgetConfig) -> CostEstimate {
        let tokens = match kind {
            StageKind::Ingest => {
                let log_bytes = run
                    .log_artifact
                    .as_ref()
                    .map(|a| a.size_bytes)
                    .unwrap_or_else(|| json_byte_len(run.input_payload.as_ref()));
                let content_tokens =
                    ceil_div(log_bytes, BYTES_PER_TOKEN).min(INGEST_CONTENT_TOKEN_CAP);
                INGEST_BASE_PROMPT_TOKENS + content_tokens + INGEST_RESPONSE_TOKENS
            }
            StageKind::Judge => {
                let task_tokens =
                    ceil_div(json_byte_len(run.task_definition.as_ref()), BYTES_PER_TOKEN);
                let payload_tokens =
                    ceil_div(json_byte_len(run.input_payload.as_ref()), BYTES_PER_TOKEN);
                JUDGE_BASE_PROMPT_TOKENS + task_tokens + payload_tokens + JUDGE_RESPONSE_TOKENS
            }
        };

        let cost_usd = round6(tokens as f64 / 1_000_000.0 * config.cost_per_million_tokens);
        CostEstimate { tokens, cost_usd }
    }
}

/// Pre-invocation budget check against the configured ceilings.
#[derive(Debug, Clone)]
pub struct BudgetGate {
    config: BudgetConfig,
}

impl BudgetGate {
    pub fn new(config: BudgetConfig) -> Self {
        Self { config }
    }

    /// The ceiling that applies to a stage kind.
    pub fn limit_usd(&self, kind: StageKind) -> f64 {
        match kind {
            StageKind::Ingest => self.config.max_parse_budget_usd,
            StageKind::Judge => self.config.max_judge_budget_usd,
        }
    }

    /// Decide allow/deny for invoking `kind` on `run`.
    ///
    /// Fails closed: an absent run is denied with "run not found" rather
    /// than silently permitted.
    pub fn check(&self, kind: StageKind, run: Option<&Run>) -> BudgetDecision {
        let limit = self.limit_usd(kind);

        let Some(run) = run else {
            return BudgetDecision {
                allowed: false,
                estimated_tokens: 0,
                estimated_cost_usd: 0.0,
                budget_limit_usd: limit,
                reason: Some("run not found".to_string()),
            };
        };

        let estimate = BudgetEstimator::estimate(kind, run, &self.config);
        debug!(
            run_id = %run.id,
            stage = %kind,
            tokens = estimate.tokens,
            cost_usd = estimate.cost_usd,
            limit_usd = limit,
            "budget check"
        );

        if estimate.cost_usd > limit {
            BudgetDecision {
                allowed: false,
                estimated_tokens: estimate.tokens,
                estimated_cost_usd: estimate.cost_usd,
                budget_limit_usd: limit,
                reason: Some(format!(
                    "estimated {} stage cost ${:.6} exceeds the ${:.2} limit",
                    kind, estimate.cost_usd, limit
                )),
            }
        } else {
            BudgetDecision {
                allowed: true,
                estimated_tokens: estimate.tokens,
                estimated_cost_usd: estimate.cost_usd,
                budget_limit_usd: limit,
                reason: None,
            }
        }
    }
}

fn json_byte_len(value: Option<&serde_json::Value>) -> u64 {
    value
        .and_then(|v| serde_json::to_string(v).ok())
        .map(|s| s.len() as u64)
        .unwrap_or(0)
}

fn ceil_div(numerator: u64, denominator: u64) -> u64 {
    numerator.div_ceil(denominator)
}

fn round6(x: f64) -> f64 {
    (x * 1_000_000.0).round() / 1_000_000.0
}
