//! Combines per-method results into one [`FusedAnomalyResult`].
//!
//! Four strategies share the same output shape: severity from the final
//! score, agreement as `1 - std` of the method decisions or scores, and
//! synthesized recommendations.

pub mod history;

use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;
use vigil_core::{clamp_unit, DetectionMethodResult, FusedAnomalyResult, FusionStrategy, Severity};

pub use history::{InMemoryPerformanceHistory, PerformanceHistory};

/// Confidence assumed for methods that report none.
const NEUTRAL_CONFIDENCE: f64 = 0.5;
/// Weight multiplier for ensemble methods in weighted fusion.
const ENSEMBLE_BOOST: f64 = 1.2;
const WEIGHTED_THRESHOLD: f64 = 0.6;
const STACKING_THRESHOLD: f64 = 0.7;
/// Methods above this confidence are trusted by adaptive fusion.
const ADAPTIVE_CONFIDENCE: f64 = 0.8;
const BORDERLINE_LOW: f64 = 0.4;
const BORDERLINE_HIGH: f64 = 0.6;

pub struct ResultFusionEngine {
    history: Arc<dyn PerformanceHistory>,
}

impl Default for ResultFusionEngine {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryPerformanceHistory::default()))
    }
}

/// Raw strategy output before severity and recommendations are attached.
struct Verdict {
    is_anomaly: bool,
    final_score: f64,
    confidence: f64,
    consensus: f64,
    contributing: Vec<String>,
    summary: String,
}

impl ResultFusionEngine {
    pub fn new(history: Arc<dyn PerformanceHistory>) -> Self {
        Self { history }
    }

    pub fn history(&self) -> &Arc<dyn PerformanceHistory> {
        &self.history
    }

    /// Fuse `results` with `strategy`. An empty set yields the neutral
    /// "unable to process" result rather than an error.
    pub fn fuse(&self, results: &[DetectionMethodResult], strategy: FusionStrategy) -> FusedAnomalyResult {
        if results.is_empty() {
            return Self::neutral(strategy);
        }

        let verdict = match strategy {
            FusionStrategy::Voting => voting(results),
            FusionStrategy::Weighted => weighted(results),
            FusionStrategy::Stacking => self.stacking(results),
            FusionStrategy::Adaptive => adaptive(results),
        };

        let final_score = clamp_unit(verdict.final_score);
        let severity = Severity::from_score(final_score);
        let method_scores: IndexMap<String, f64> =
            results.iter().map(|r| (r.method.clone(), r.score)).collect();

        let mut explanations = vec![verdict.summary];
        for r in results.iter().filter(|r| r.is_anomaly) {
            if let Some(first) = r.explanations.first() {
                explanations.push(format!("{}: {first}", r.method));
            }
        }

        debug!(
            strategy = %strategy,
            methods = results.len(),
            final_score,
            is_anomaly = verdict.is_anomaly,
            "fusion finished"
        );

        FusedAnomalyResult {
            is_anomaly: verdict.is_anomaly,
            final_score,
            confidence_score: clamp_unit(verdict.confidence),
            consensus_score: clamp_unit(verdict.consensus),
            severity,
            strategy,
            explanations,
            contributing_methods: verdict.contributing,
            recommended_actions: recommendations(verdict.is_anomaly, severity, results),
            method_scores,
        }
    }

    /// Result returned when no method produced a result.
    pub fn neutral(strategy: FusionStrategy) -> FusedAnomalyResult {
        FusedAnomalyResult {
            is_anomaly: false,
            final_score: 0.0,
            confidence_score: 0.0,
            consensus_score: 0.0,
            severity: Severity::Low,
            strategy,
            explanations: vec!["Unable to process: 0 detection methods available".to_string()],
            contributing_methods: Vec::new(),
            method_scores: IndexMap::new(),
            recommended_actions: vec![
                "Verify the input data and detector configuration, then resubmit".to_string(),
            ],
        }
    }

    fn stacking(&self, results: &[DetectionMethodResult]) -> Verdict {
        let accuracies: Vec<f64> = results
            .iter()
            .map(|r| self.history.accuracy_or_default(&r.method))
            .collect();
        let final_score = weighted_mean(results, &accuracies);
        let scores: Vec<f64> = results.iter().map(|r| r.score).collect();
        Verdict {
            is_anomaly: final_score > STACKING_THRESHOLD,
            final_score,
            confidence: mean(&accuracies),
            consensus: 1.0 - std_dev(&scores),
            contributing: names(results),
            summary: format!(
                "stacking over {} methods weighted by historical accuracy: {final_score:.3}",
                results.len()
            ),
        }
    }
}

fn voting(results: &[DetectionMethodResult]) -> Verdict {
    let votes: Vec<f64> = results
        .iter()
        .map(|r| if r.is_anomaly { 1.0 } else { 0.0 })
        .collect();
    let yes = results.iter().filter(|r| r.is_anomaly).count();
    let scores: Vec<f64> = results.iter().map(|r| r.score).collect();
    let confidences: Vec<f64> = results.iter().map(confidence_of).collect();
    Verdict {
        is_anomaly: yes * 2 > results.len(),
        final_score: mean(&scores),
        confidence: mean(&confidences),
        consensus: 1.0 - std_dev(&votes),
        contributing: names(results),
        summary: format!("{yes} of {} methods flag an anomaly", results.len()),
    }
}

fn weighted(results: &[DetectionMethodResult]) -> Verdict {
    let weights: Vec<f64> = results
        .iter()
        .map(|r| {
            let boost = if r.method.contains("ensemble") { ENSEMBLE_BOOST } else { 1.0 };
            confidence_of(r) * boost
        })
        .collect();
    let final_score = weighted_mean(results, &weights);
    let confidences: Vec<f64> = results.iter().map(confidence_of).collect();
    let total: f64 = weights.iter().sum();
    let confidence = if total > f64::EPSILON {
        confidences.iter().zip(&weights).map(|(c, w)| c * w).sum::<f64>() / total
    } else {
        mean(&confidences)
    };
    let scores: Vec<f64> = results.iter().map(|r| r.score).collect();
    Verdict {
        is_anomaly: final_score > WEIGHTED_THRESHOLD,
        final_score,
        confidence,
        consensus: 1.0 - std_dev(&scores),
        contributing: names(results),
        summary: format!(
            "confidence-weighted score {final_score:.3} over {} methods",
            results.len()
        ),
    }
}

fn adaptive(results: &[DetectionMethodResult]) -> Verdict {
    let trusted: Vec<DetectionMethodResult> = results
        .iter()
        .filter(|r| confidence_of(r) > ADAPTIVE_CONFIDENCE)
        .cloned()
        .collect();
    if trusted.is_empty() {
        let mut v = voting(results);
        v.summary = format!("adaptive: no high-confidence methods, {}", v.summary);
        v
    } else {
        let mut v = weighted(&trusted);
        v.summary = format!(
            "adaptive: {} high-confidence methods, {}",
            trusted.len(),
            v.summary
        );
        v
    }
}

fn recommendations(is_anomaly: bool, severity: Severity, results: &[DetectionMethodResult]) -> Vec<String> {
    let mut out = Vec::new();
    if is_anomaly {
        out.push(format!("Immediate investigation recommended ({severity} severity)"));
        if severity == Severity::Critical {
            out.push("Escalate to the on-call owner of the data source".to_string());
        }
    } else {
        out.push("Continue monitoring".to_string());
    }
    let borderline: Vec<&str> = results
        .iter()
        .filter(|r| (BORDERLINE_LOW..=BORDERLINE_HIGH).contains(&r.score))
        .map(|r| r.method.as_str())
        .collect();
    if !borderline.is_empty() {
        out.push(format!(
            "Borderline scores from {}; review with additional data",
            borderline.join(", ")
        ));
    }
    out
}

fn confidence_of(r: &DetectionMethodResult) -> f64 {
    r.confidence.unwrap_or(NEUTRAL_CONFIDENCE)
}

/// Weighted mean of method scores; equal weights when all weights vanish.
fn weighted_mean(results: &[DetectionMethodResult], weights: &[f64]) -> f64 {
    let total: f64 = weights.iter().sum();
    if total <= f64::EPSILON {
        return mean(&results.iter().map(|r| r.score).collect::<Vec<_>>());
    }
    results
        .iter()
        .zip(weights)
        .map(|(r, w)| r.score * w)
        .sum::<f64>()
        / total
}

fn names(results: &[DetectionMethodResult]) -> Vec<String> {
    results.iter().map(|r| r.method.clone()).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(method: &str, score: f64, is_anomaly: bool, confidence: Option<f64>) -> DetectionMethodResult {
        let mut r = DetectionMethodResult::new(method, score, is_anomaly);
        r.confidence = confidence;
        r
    }

    #[test]
    fn empty_set_is_neutral() {
        let fused = ResultFusionEngine::default().fuse(&[], FusionStrategy::Adaptive);
        assert!(!fused.is_anomaly);
        assert_eq!(fused.severity, Severity::Low);
        assert_eq!(fused.confidence_score, 0.0);
        assert!(fused.explanations[0].contains("0 detection methods"));
    }

    #[test]
    fn voting_majority_and_consensus() {
        let results = vec![
            result("a", 0.9, true, Some(1.0)),
            result("b", 0.9, true, None),
            result("c", 0.3, false, Some(0.6)),
        ];
        let fused = ResultFusionEngine::default().fuse(&results, FusionStrategy::Voting);
        assert!(fused.is_anomaly);
        assert!((fused.final_score - 0.7).abs() < 1e-12);
        assert!((fused.confidence_score - 0.7).abs() < 1e-12);
        // votes [1, 1, 0]: std = sqrt(2)/3
        assert!((fused.consensus_score - (1.0 - 2f64.sqrt() / 3.0)).abs() < 1e-12);
        assert_eq!(fused.severity, Severity::High);
    }

    #[test]
    fn voting_tie_is_not_anomalous() {
        let results = vec![result("a", 0.9, true, None), result("b", 0.1, false, None)];
        let fused = ResultFusionEngine::default().fuse(&results, FusionStrategy::Voting);
        assert!(!fused.is_anomaly);
    }

    #[test]
    fn weighted_boosts_ensemble_methods() {
        let results = vec![
            result("statistical_ensemble", 1.0, true, Some(1.0)),
            result("temporal_pattern", 0.0, false, Some(1.0)),
        ];
        let fused = ResultFusionEngine::default().fuse(&results, FusionStrategy::Weighted);
        // 1.2 / 2.2
        assert!((fused.final_score - 1.2 / 2.2).abs() < 1e-12);
        assert!(!fused.is_anomaly);
        assert_eq!(fused.consensus_score, 0.5);
    }

    #[test]
    fn stacking_uses_history() {
        let history = Arc::new(InMemoryPerformanceHistory::seeded([("good", 0.9), ("bad", 0.1)]));
        let engine = ResultFusionEngine::new(history);
        let results = vec![result("good", 0.8, true, None), result("bad", 0.0, false, None)];
        let fused = engine.fuse(&results, FusionStrategy::Stacking);
        assert!((fused.final_score - 0.72).abs() < 1e-12);
        assert!(fused.is_anomaly);
        assert!((fused.confidence_score - 0.5).abs() < 1e-12);
    }

    #[test]
    fn adaptive_restricts_to_confident_methods() {
        let results = vec![
            result("temporal_pattern", 0.95, true, Some(0.95)),
            result("graph_structural", 0.1, false, Some(0.6)),
        ];
        let fused = ResultFusionEngine::default().fuse(&results, FusionStrategy::Adaptive);
        assert_eq!(fused.contributing_methods, vec!["temporal_pattern"]);
        assert!(fused.is_anomaly);
        assert_eq!(fused.strategy, FusionStrategy::Adaptive);
        assert_eq!(fused.method_scores.len(), 2);

        let low = vec![result("a", 0.9, true, None), result("b", 0.9, true, None)];
        let fused = ResultFusionEngine::default().fuse(&low, FusionStrategy::Adaptive);
        assert!(fused.explanations[0].starts_with("adaptive: no high-confidence"));
        assert!(fused.is_anomaly);
    }

    #[test]
    fn recommendations_note_borderline_methods() {
        let results = vec![result("a", 0.5, false, None), result("b", 0.1, false, None)];
        let fused = ResultFusionEngine::default().fuse(&results, FusionStrategy::Voting);
        assert_eq!(fused.recommended_actions[0], "Continue monitoring");
        assert!(fused.recommended_actions[1].contains("from a;"));
    }

    #[test]
    fn method_scores_keep_insertion_order() {
        let results = vec![result("z", 0.2, false, None), result("a", 0.3, false, None)];
        let fused = ResultFusionEngine::default().fuse(&results, FusionStrategy::Weighted);
        let keys: Vec<_> = fused.method_scores.keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a"]);
    }
}
