//! Cross-run comparison.
//!
//! Read-only and derived: recomputed on every request, never persisted.
//! The first run in the caller's ordering is the baseline.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::errors::{OrchestratorError, OrchestratorResult};
use crate::domain::models::{Run, RunMetrics};

/// One run's score for a dimension, with its delta against the baseline.
/// Delta is None for the baseline itself and whenever either side is null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    pub run_id: Uuid,
    pub score: Option<f64>,
    pub delta: Option<f64>,
}

/// All runs' scores for one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionComparison {
    /// The baseline run's score for this dimension, if it judged it
    pub baseline: Option<f64>,
    pub scores: Vec<ScoreEntry>,
}

/// One run's value for a fixed metric, with its delta against the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEntry {
    pub run_id: Uuid,
    pub value: Option<i64>,
    pub delta: Option<i64>,
}

/// Per-dimension and per-metric diffs of 2–4 runs against a baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub dimension_comparison: BTreeMap<String, DimensionComparison>,
    pub metric_comparison: BTreeMap<String, Vec<MetricEntry>>,
}

/// Builds [`ComparisonResult`]s from completed runs.
pub struct ComparisonEngine;

impl ComparisonEngine {
    /// Compare 2–4 runs against the first one.
    ///
    /// All runs must belong to the same workspace; a violation is a hard
    /// `Forbidden` error, never a silent filter. The dimension set is the
    /// union of every run's judged dimensions; the metric set is fixed and
    /// always reported, null where a run never recorded the metric.
    pub fn compare(runs: &[Run]) -> OrchestratorResult<ComparisonResult> {
        if runs.len() < 2 || runs.len() > 4 {
            return Err(OrchestratorError::InvalidArgument(format!(
                "comparison requires 2 to 4 runs, got {}",
                runs.len()
            )));
        }

        let baseline = &runs[0];
        if let Some(stray) = runs.iter().find(|r| r.workspace_id != baseline.workspace_id) {
            return Err(OrchestratorError::Forbidden(format!(
                "run {} belongs to a different workspace",
                stray.id
            )));
        }

        let dimension_keys: BTreeSet<String> = runs
            .iter()
            .filter_map(|r| r.scorecard.as_ref())
            .flat_map(|card| card.dimensions.keys().cloned())
            .collect();

        let mut dimension_comparison = BTreeMap::new();
        for key in dimension_keys {
            let baseline_score = dimension_score(baseline, &key);
            let scores = runs
                .iter()
                .enumerate()
                .map(|(i, run)| {
                    let score = dimension_score(run, &key);
                    ScoreEntry {
                        run_id: run.id,
                        score,
                        delta: delta_f64(i, score, baseline_score),
                    }
                })
                .collect();
            dimension_comparison.insert(
                key,
                DimensionComparison {
                    baseline: baseline_score,
                    scores,
                },
            );
        }

        let mut metric_comparison = BTreeMap::new();
        for key in RunMetrics::KEYS {
            let baseline_value = metric_value(baseline, key);
            let entries = runs
                .iter()
                .enumerate()
                .map(|(i, run)| {
                    let value = metric_value(run, key);
                    MetricEntry {
                        run_id: run.id,
                        value,
                        delta: delta_i64(i, value, baseline_value),
                    }
                })
                .collect();
            metric_comparison.insert(key.to_string(), entries);
        }

        Ok(ComparisonResult {
            dimension_comparison,
            metric_comparison,
        })
    }
}

fn dimension_score(run: &Run, key: &str) -> Option<f64> {
    run.scorecard
        .as_ref()
        .and_then(|card| card.dimensions.get(key))
        .map(|d| d.score)
}

fn metric_value(run: &Run, key: &str) -> Option<i64> {
    run.metrics.as_ref().and_then(|m| m.get(key))
}

fn delta_f64(index: usize, value: Option<f64>, baseline: Option<f64>) -> Option<f64> {
    if index == 0 {
        return None;
    }
    Some(value? - baseline?)
}

fn delta_i64(index: usize, value: Option<i64>, baseline: Option<i64>) -> Option<i64> {
    if index == 0 {
        return None;
    }
    Some(value? - baseline?)
}
