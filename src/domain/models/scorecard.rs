//! Scorecard and metric models.
//!
//! A [`Scorecard`] is the canonical per-dimension judged output for a run,
//! created once per successful judge invocation and immutable thereafter.
//! A [`MetricBreakdown`] is its read-optimized display projection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Confidence below this threshold routes a run to `CompletedLowConfidence`.
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Judged result for a single evaluation dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    /// Score in 0–100. Boundary values are valid and never clipped.
    pub score: f64,
    /// Judge's reasoning for this dimension
    pub reasoning: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    /// References into the log supporting the score
    #[serde(default)]
    pub evidence_refs: Vec<String>,
}

/// Canonical judged output for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    /// Dimension key → judged result. BTreeMap for stable iteration order.
    pub dimensions: BTreeMap<String, DimensionScore>,
    /// Aggregate score: arithmetic mean of dimension scores, 0 when empty
    pub overall_score: f64,
    /// Judge self-reported confidence in 0..1
    pub confidence: f64,
}

impl Scorecard {
    /// The canonical scoring law: unweighted arithmetic mean of all present
    /// dimension scores; exactly 0 when there are no dimensions.
    pub fn mean_of_dimensions(dimensions: &BTreeMap<String, DimensionScore>) -> f64 {
        if dimensions.is_empty() {
            return 0.0;
        }
        let sum: f64 = dimensions.values().map(|d| d.score).sum();
        sum / dimensions.len() as f64
    }
}

/// Display projection of one dimension.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionBreakdown {
    /// Score, or None when this run never judged the dimension
    pub score: Option<f64>,
    pub summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
}

/// Normalized, display-ready projection of a scorecard. Never authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricBreakdown {
    pub overall_comment: String,
    pub dimensions: BTreeMap<String, DimensionBreakdown>,
}

/// Execution metrics extracted from a parsed agent log.
///
/// The metric set is fixed; comparison always reports every key, null when
/// a run never recorded it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_steps: Option<i64>,
    pub total_tool_calls: Option<i64>,
    pub total_errors: Option<i64>,
    pub total_retries: Option<i64>,
    pub total_duration_ms: Option<i64>,
}

impl RunMetrics {
    /// Fixed metric keys, in comparison output order.
    pub const KEYS: [&'static str; 5] = [
        "totalSteps",
        "totalToolCalls",
        "totalErrors",
        "totalRetries",
        "totalDurationMs",
    ];

    /// Look up a metric value by its fixed key.
    pub fn get(&self, key: &str) -> Option<i64> {
        match key {
            "totalSteps" => self.total_steps,
            "totalToolCalls" => self.total_tool_calls,
            "totalErrors" => self.total_errors,
            "totalRetries" => self.total_retries,
            "totalDurationMs" => self.total_duration_ms,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim(score: f64) -> DimensionScore {
        DimensionScore {
            score,
            ..Default::default()
        }
    }

    #[test]
    fn test_mean_of_dimensions() {
        let mut dims = BTreeMap::new();
        dims.insert("planning".to_string(), dim(80.0));
        dims.insert("execution".to_string(), dim(60.0));
        assert!((Scorecard::mean_of_dimensions(&dims) - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_mean_of_no_dimensions_is_zero() {
        let dims = BTreeMap::new();
        let mean = Scorecard::mean_of_dimensions(&dims);
        assert_eq!(mean, 0.0);
        assert!(!mean.is_nan());
    }

    #[test]
    fn test_boundary_scores_not_clipped() {
        let mut dims = BTreeMap::new();
        dims.insert("a".to_string(), dim(0.0));
        dims.insert("b".to_string(), dim(100.0));
        assert!((Scorecard::mean_of_dimensions(&dims) - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metrics_fixed_key_lookup() {
        let metrics = RunMetrics {
            total_steps: Some(42),
            total_retries: None,
            ..Default::default()
        };
        assert_eq!(metrics.get("totalSteps"), Some(42));
        assert_eq!(metrics.get("totalRetries"), None);
        assert_eq!(metrics.get("nonsense"), None);
    }
}
