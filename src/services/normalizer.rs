//! Scorecard normalization.
//!
//! The remote judge is untrusted: it may wrap its JSON in code fences, use
//! inconsistent key casing, ship `dimensions` as an array or an object, or
//! omit fields entirely. Normalization never fails; unparseable input
//! degrades to an empty breakdown instead of propagating an error.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::domain::models::{
    DimensionBreakdown, DimensionScore, MetricBreakdown, Scorecard,
};

/// Comment used when the judge output cannot be parsed at all.
const MALFORMED_COMMENT: &str = "Malformed evaluation JSON.";

/// Converts raw judge output into canonical, display-ready shapes.
pub struct ScorecardNormalizer;

impl ScorecardNormalizer {
    /// Normalize raw judge output into a [`MetricBreakdown`].
    ///
    /// Total: never errors. Applying it to its own serialized output is a
    /// no-op.
    pub fn normalize(raw: &str) -> MetricBreakdown {
        match parse_lenient(raw) {
            Some(value) => Self::normalize_value(&value),
            None => {
                debug!("judge output did not parse as JSON");
                MetricBreakdown {
                    overall_comment: MALFORMED_COMMENT.to_string(),
                    dimensions: BTreeMap::new(),
                }
            }
        }
    }

    /// Normalize raw judge output into a canonical [`Scorecard`].
    ///
    /// Malformed input yields an empty scorecard with overall score 0 and
    /// confidence 0, which the confidence gate routes to a visibly
    /// low-confidence completion rather than a hard failure.
    pub fn normalize_scorecard(raw: &str) -> Scorecard {
        let Some(value) = parse_lenient(raw) else {
            return Scorecard::default();
        };

        let mut dimensions = BTreeMap::new();
        for (name, entry) in extract_dimensions(&value) {
            // The canonical scorecard only carries dimensions the judge
            // actually scored; score-less entries stay in the breakdown.
            if let Some(score) = entry.score {
                dimensions.insert(
                    name,
                    DimensionScore {
                        score,
                        reasoning: entry.summary,
                        strengths: entry.strengths,
                        weaknesses: entry.weaknesses,
                        evidence_refs: entry.evidence_refs,
                    },
                );
            }
        }

        let overall_score = get_ci(&value, &["overallscore", "overall_score"])
            .and_then(as_number)
            .unwrap_or_else(|| Scorecard::mean_of_dimensions(&dimensions));
        let confidence = get_ci(&value, &["confidence"])
            .and_then(as_number)
            .unwrap_or(1.0);

        Scorecard {
            dimensions,
            overall_score,
            confidence,
        }
    }

    fn normalize_value(value: &Value) -> MetricBreakdown {
        let parsed = extract_dimensions(value);

        let mut dimensions = BTreeMap::new();
        for (name, entry) in parsed {
            dimensions.insert(
                name,
                DimensionBreakdown {
                    score: entry.score,
                    summary: entry.summary,
                    strengths: entry.strengths,
                    weaknesses: entry.weaknesses,
                },
            );
        }

        enrich_from_top_level(value, &mut dimensions);

        let overall_comment = get_ci(value, &["overallcomment", "overall_comment", "comment"])
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        MetricBreakdown {
            overall_comment,
            dimensions,
        }
    }
}

/// Intermediate dimension shape shared by both normalization targets.
struct ParsedDimension {
    score: Option<f64>,
    summary: String,
    strengths: Vec<String>,
    weaknesses: Vec<String>,
    evidence_refs: Vec<String>,
}

/// Strip surrounding Markdown code fences and parse as a JSON object.
/// A payload that parses but is not an object (a bare string or number)
/// carries no evaluation and counts as malformed.
fn parse_lenient(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    let inner = if trimmed.starts_with("```") {
        let without_open = trimmed
            .split_once('\n')
            .map(|(_, rest)| rest)
            .unwrap_or("");
        without_open.trim_end().trim_end_matches("```").trim()
    } else {
        trimmed
    };
    serde_json::from_str::<Value>(inner)
        .ok()
        .filter(Value::is_object)
}

/// Case-insensitive, underscore-insensitive object key lookup.
fn get_ci<'a>(value: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    let obj = value.as_object()?;
    for (key, entry) in obj {
        let folded: String = key
            .chars()
            .filter(|c| *c != '_')
            .collect::<String>()
            .to_lowercase();
        if candidates
            .iter()
            .any(|c| folded == c.replace('_', "").to_lowercase())
        {
            return Some(entry);
        }
    }
    None
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Some(Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

/// Pull the dimension list out of the judge output, accepting both the
/// array-of-`{name, score, ...}` shape and the name-keyed object shape.
fn extract_dimensions(value: &Value) -> Vec<(String, ParsedDimension)> {
    let Some(dims) = get_ci(value, &["dimensions"]) else {
        return Vec::new();
    };

    match dims {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| {
                let name = get_ci(item, &["name", "dimension", "key"])?
                    .as_str()?
                    .to_string();
                Some((name, parse_dimension_entry(item)))
            })
            .collect(),
        Value::Object(map) => map
            .iter()
            .map(|(name, entry)| (name.clone(), parse_dimension_entry(entry)))
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_dimension_entry(entry: &Value) -> ParsedDimension {
    // A bare number is a valid dimension entry: just the score.
    if let Some(score) = as_number(entry) {
        return ParsedDimension {
            score: Some(score),
            summary: String::new(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            evidence_refs: Vec::new(),
        };
    }

    ParsedDimension {
        score: get_ci(entry, &["score"]).and_then(as_number),
        summary: get_ci(entry, &["summary", "reasoning", "comment"])
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        strengths: as_string_list(get_ci(entry, &["strengths"])),
        weaknesses: as_string_list(get_ci(entry, &["weaknesses"])),
        evidence_refs: as_string_list(get_ci(entry, &["evidencerefs", "evidence_refs"])),
    }
}

/// Best-effort enrichment: when a dimension carries no strengths or
/// weaknesses of its own, attribute top-level entries that mention the
/// dimension key or overlap its summary text. Enrichment only; entries
/// never fabricated.
fn enrich_from_top_level(value: &Value, dimensions: &mut BTreeMap<String, DimensionBreakdown>) {
    let top_strengths = as_string_list(get_ci(value, &["strengths"]));
    let top_weaknesses = as_string_list(get_ci(value, &["weaknesses"]));
    if top_strengths.is_empty() && top_weaknesses.is_empty() {
        return;
    }

    for (key, dim) in dimensions.iter_mut() {
        let key_lower = key.to_lowercase();
        let summary_lower = dim.summary.to_lowercase();
        if dim.strengths.is_empty() {
            dim.strengths = matching_entries(&top_strengths, &key_lower, &summary_lower);
        }
        if dim.weaknesses.is_empty() {
            dim.weaknesses = matching_entries(&top_weaknesses, &key_lower, &summary_lower);
        }
    }
}

fn matching_entries(entries: &[String], key_lower: &str, summary_lower: &str) -> Vec<String> {
    entries
        .iter()
        .filter(|entry| {
            let entry_lower = entry.to_lowercase();
            entry_lower.contains(key_lower)
                || (!summary_lower.is_empty() && summary_lower.contains(&entry_lower))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_input_degrades() {
        let breakdown = ScorecardNormalizer::normalize("not json at all {{{");
        assert_eq!(breakdown.overall_comment, MALFORMED_COMMENT);
        assert!(breakdown.dimensions.is_empty());
    }

    #[test]
    fn test_code_fenced_output_parses() {
        let raw = "```json\n{\"dimensions\": {\"planning\": {\"score\": 75}}}\n```";
        let breakdown = ScorecardNormalizer::normalize(raw);
        assert_eq!(breakdown.dimensions["planning"].score, Some(75.0));
    }

    #[test]
    fn test_dimensions_array_shape() {
        let raw = r#"{
            "dimensions": [
                {"name": "planning", "score": 80, "reasoning": "solid plan"},
                {"name": "execution", "score": 60}
            ]
        }"#;
        let breakdown = ScorecardNormalizer::normalize(raw);
        assert_eq!(breakdown.dimensions.len(), 2);
        assert_eq!(breakdown.dimensions["planning"].score, Some(80.0));
        assert_eq!(breakdown.dimensions["planning"].summary, "solid plan");
    }

    #[test]
    fn test_dimensions_object_shape() {
        let raw = r#"{"dimensions": {"planning": {"score": 80}, "execution": 60}}"#;
        let breakdown = ScorecardNormalizer::normalize(raw);
        assert_eq!(breakdown.dimensions["planning"].score, Some(80.0));
        assert_eq!(breakdown.dimensions["execution"].score, Some(60.0));
    }

    #[test]
    fn test_inconsistent_key_casing() {
        let raw = r#"{
            "Dimensions": [{"Name": "safety", "Score": "90", "Summary": "careful"}],
            "OverallComment": "good run"
        }"#;
        let breakdown = ScorecardNormalizer::normalize(raw);
        assert_eq!(breakdown.overall_comment, "good run");
        assert_eq!(breakdown.dimensions["safety"].score, Some(90.0));
    }

    #[test]
    fn test_scorecard_overall_is_mean() {
        let raw = r#"{"dimensions": {"a": {"score": 0}, "b": {"score": 100}}}"#;
        let card = ScorecardNormalizer::normalize_scorecard(raw);
        assert!((card.overall_score - 50.0).abs() < f64::EPSILON);
        // Boundary values survive untouched
        assert!((card.dimensions["a"].score - 0.0).abs() < f64::EPSILON);
        assert!((card.dimensions["b"].score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_explicit_overall_score_wins() {
        let raw = r#"{"dimensions": {"a": {"score": 40}}, "overallScore": 70}"#;
        let card = ScorecardNormalizer::normalize_scorecard(raw);
        assert!((card.overall_score - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_zero_dimensions_overall_is_exactly_zero() {
        let card = ScorecardNormalizer::normalize_scorecard(r#"{"dimensions": {}}"#);
        assert_eq!(card.overall_score, 0.0);
        assert!(!card.overall_score.is_nan());
    }

    #[test]
    fn test_non_object_json_is_malformed() {
        let breakdown = ScorecardNormalizer::normalize("\"just a string\"");
        assert_eq!(breakdown.overall_comment, MALFORMED_COMMENT);

        let card = ScorecardNormalizer::normalize_scorecard("42");
        assert_eq!(card.confidence, 0.0);
    }

    #[test]
    fn test_malformed_scorecard_has_zero_confidence() {
        let card = ScorecardNormalizer::normalize_scorecard("```garbage```");
        assert!(card.dimensions.is_empty());
        assert_eq!(card.confidence, 0.0);
    }

    #[test]
    fn test_confidence_parsed() {
        let raw = r#"{"dimensions": {"a": {"score": 50}}, "confidence": 0.42}"#;
        let card = ScorecardNormalizer::normalize_scorecard(raw);
        assert!((card.confidence - 0.42).abs() < f64::EPSILON);
    }

    #[test]
    fn test_top_level_strength_fallback() {
        let raw = r#"{
            "dimensions": {"planning": {"score": 70, "summary": "thought ahead"}},
            "strengths": ["strong planning discipline", "unrelated remark"],
            "weaknesses": ["planning missed edge cases"]
        }"#;
        let breakdown = ScorecardNormalizer::normalize(raw);
        let dim = &breakdown.dimensions["planning"];
        assert_eq!(dim.strengths, vec!["strong planning discipline"]);
        assert_eq!(dim.weaknesses, vec!["planning missed edge cases"]);
    }

    #[test]
    fn test_fallback_never_overwrites_own_lists() {
        let raw = r#"{
            "dimensions": {"planning": {"score": 70, "strengths": ["own entry"]}},
            "strengths": ["strong planning discipline"]
        }"#;
        let breakdown = ScorecardNormalizer::normalize(raw);
        assert_eq!(breakdown.dimensions["planning"].strengths, vec!["own entry"]);
    }

    #[test]
    fn test_normalize_is_stable_on_own_output() {
        let raw = r#"{
            "dimensions": [
                {"name": "planning", "score": 80, "reasoning": "solid"},
                {"name": "safety", "score": 95, "strengths": ["cautious"]}
            ],
            "overallComment": "decent"
        }"#;
        let first = ScorecardNormalizer::normalize(raw);
        let reserialized = serde_json::to_string(&first).unwrap();
        let second = ScorecardNormalizer::normalize(&reserialized);
        assert_eq!(first, second);
    }
}
