//! Property tests for result fusion and severity mapping.

use proptest::prelude::*;
use vigil_core::{DetectionMethodResult, FusionStrategy, Severity};
use vigil_orchestrator::ResultFusionEngine;

fn method_result() -> impl Strategy<Value = DetectionMethodResult> {
    (0.0f64..=1.0, any::<bool>(), proptest::option::of(0.0f64..=1.0), 0usize..4).prop_map(
        |(score, is_anomaly, confidence, m)| {
            let names = ["statistical_ensemble", "temporal_pattern", "graph_structural", "multivariate_ensemble"];
            let mut r = DetectionMethodResult::new(names[m], score, is_anomaly);
            r.confidence = confidence;
            r
        },
    )
}

fn strategy() -> impl Strategy<Value = FusionStrategy> {
    prop_oneof![
        Just(FusionStrategy::Voting),
        Just(FusionStrategy::Weighted),
        Just(FusionStrategy::Stacking),
        Just(FusionStrategy::Adaptive),
    ]
}

proptest! {
    #[test]
    fn fusion_is_idempotent(results in prop::collection::vec(method_result(), 0..8), s in strategy()) {
        let engine = ResultFusionEngine::default();
        prop_assert_eq!(engine.fuse(&results, s), engine.fuse(&results, s));
    }

    #[test]
    fn voting_majority_always_flags(n in 1usize..12, extra in 0usize..12, scores in prop::collection::vec(0.0f64..=1.0, 12)) {
        let yes = n / 2 + 1 + extra.min(n - (n / 2 + 1));
        let results: Vec<DetectionMethodResult> = (0..n)
            .map(|i| DetectionMethodResult::new(format!("m{i}"), scores[i], i < yes))
            .collect();
        let fused = ResultFusionEngine::default().fuse(&results, FusionStrategy::Voting);
        prop_assert!(fused.is_anomaly);
    }

    #[test]
    fn severity_is_monotonic(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(Severity::from_score(lo) <= Severity::from_score(hi));
    }

    #[test]
    fn fused_scores_stay_in_unit_interval(results in prop::collection::vec(method_result(), 1..8), s in strategy()) {
        let fused = ResultFusionEngine::default().fuse(&results, s);
        prop_assert!((0.0..=1.0).contains(&fused.final_score));
        prop_assert!((0.0..=1.0).contains(&fused.confidence_score));
        prop_assert!((0.0..=1.0).contains(&fused.consensus_score));
        prop_assert_eq!(Severity::from_score(fused.final_score), fused.severity);
    }
}

#[test]
fn severity_breakpoints() {
    let cases = [
        (0.29, Severity::Low),
        (0.3, Severity::Medium),
        (0.59, Severity::Medium),
        (0.6, Severity::High),
        (0.89, Severity::High),
        (0.9, Severity::Critical),
    ];
    for (score, expected) in cases {
        assert_eq!(Severity::from_score(score), expected, "score {score}");
    }
}
