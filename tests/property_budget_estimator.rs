use proptest::prelude::*;
use uuid::Uuid;

use tribunal::domain::models::{ArtifactRef, BudgetConfig, Run};
use tribunal::domain::ports::StageKind;
use tribunal::services::{BudgetEstimator, BudgetGate};

fn run_with_log(size_bytes: u64) -> Run {
    let mut run = Run::new(Uuid::new_v4());
    run.log_artifact = Some(ArtifactRef {
        key: "logs/prop".to_string(),
        size_bytes,
        checksum: String::new(),
    });
    run
}

proptest! {
    /// Property: estimation is pure. The same run and config always
    /// produce the same figures, so gate decisions are reproducible.
    #[test]
    fn prop_estimate_is_deterministic(
        size in 0u64..100_000_000,
        cost_per_million in 0.01f64..10.0
    ) {
        let run = run_with_log(size);
        let config = BudgetConfig {
            cost_per_million_tokens: cost_per_million,
            ..Default::default()
        };

        let a = BudgetEstimator::estimate(StageKind::Ingest, &run, &config);
        let b = BudgetEstimator::estimate(StageKind::Ingest, &run, &config);
        prop_assert_eq!(a, b);
    }

    /// Property: ingest token estimates never decrease as the log grows,
    /// and never exceed the fixed allowances plus the content cap.
    #[test]
    fn prop_ingest_estimate_is_monotone_and_capped(
        smaller in 0u64..50_000_000,
        delta in 0u64..50_000_000
    ) {
        let config = BudgetConfig::default();
        let small = BudgetEstimator::estimate(
            StageKind::Ingest, &run_with_log(smaller), &config);
        let large = BudgetEstimator::estimate(
            StageKind::Ingest, &run_with_log(smaller + delta), &config);

        prop_assert!(large.tokens >= small.tokens);
        // 1500 prompt + 10000 content cap + 2000 response
        prop_assert!(large.tokens <= 13_500);
    }

    /// Property: judge token estimates grow with the payload.
    #[test]
    fn prop_judge_estimate_grows_with_payload(
        shorter in 0usize..5_000,
        delta in 1usize..5_000
    ) {
        let config = BudgetConfig::default();
        let small_run = Run::new_inline(
            Uuid::new_v4(),
            serde_json::Value::String("x".repeat(shorter)),
        );
        let large_run = Run::new_inline(
            Uuid::new_v4(),
            serde_json::Value::String("x".repeat(shorter + delta)),
        );

        let small = BudgetEstimator::estimate(StageKind::Judge, &small_run, &config);
        let large = BudgetEstimator::estimate(StageKind::Judge, &large_run, &config);
        prop_assert!(large.tokens > small.tokens);
    }

    /// Property: costs carry at most six decimal places.
    #[test]
    fn prop_cost_rounds_to_six_decimals(
        size in 0u64..10_000_000,
        cost_per_million in 0.000_001f64..100.0
    ) {
        let run = run_with_log(size);
        let config = BudgetConfig {
            cost_per_million_tokens: cost_per_million,
            ..Default::default()
        };

        let estimate = BudgetEstimator::estimate(StageKind::Ingest, &run, &config);
        let scaled = estimate.cost_usd * 1_000_000.0;
        prop_assert!((scaled - scaled.round()).abs() < 1e-6);
    }

    /// Property: the gate is consistent with the estimator. A run is
    /// denied exactly when its estimated cost exceeds the stage limit.
    #[test]
    fn prop_gate_agrees_with_estimator(
        size in 0u64..100_000_000,
        limit in 0.000_001f64..5.0
    ) {
        let run = run_with_log(size);
        let config = BudgetConfig {
            max_parse_budget_usd: limit,
            ..Default::default()
        };

        let estimate = BudgetEstimator::estimate(StageKind::Ingest, &run, &config);
        let decision = BudgetGate::new(config).check(StageKind::Ingest, Some(&run));

        prop_assert_eq!(decision.allowed, estimate.cost_usd <= limit);
        prop_assert_eq!(decision.estimated_tokens, estimate.tokens);
    }
}
