//! The closed set of detection methods behind one [`Detector`] trait.

mod multivariate;
mod statistical;
mod structural;
mod temporal;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;
use vigil_compute::{MultivariateDetector, PatternRecognitionEngine};
use vigil_core::{
    clamp_unit, Config, Deadline, DetectionError, DetectionMethodResult, DetectorKind, Payload,
};

pub use multivariate::MultivariateEnsembleDetector;
pub use statistical::StatisticalEnsembleDetector;
pub use structural::GraphStructuralDetector;
pub use temporal::TemporalPatternDetector;

/// Everything a detector sees for one request. Read-only and cheap to clone
/// into a blocking task.
#[derive(Clone)]
pub struct DetectionContext {
    pub payload: Arc<Payload>,
    /// Effective configuration (preset plus per-run overrides).
    pub config: Arc<Config>,
    pub deadline: Deadline,
}

impl DetectionContext {
    pub fn new(payload: Arc<Payload>, config: Arc<Config>, deadline: Deadline) -> Self {
        Self {
            payload,
            config,
            deadline,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.config.preset.score_threshold
    }
}

/// A unit of detection work the orchestrator can run.
///
/// Implementations must not keep references to the results they return.
pub trait Detector: Send + Sync {
    fn kind(&self) -> DetectorKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Fit any internal model on a reference payload. Stateless detectors
    /// accept and ignore it.
    fn train(&self, _payload: &Payload) -> Result<(), DetectionError> {
        Ok(())
    }

    fn detect(&self, ctx: &DetectionContext) -> Result<DetectionMethodResult, DetectionError>;
}

/// Detectors keyed by their kind.
#[derive(Clone, Default)]
pub struct DetectorRegistry {
    detectors: HashMap<DetectorKind, Arc<dyn Detector>>,
}

impl DetectorRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// One detector per kind, sharing the given engines.
    pub fn with_defaults(
        multivariate: Arc<MultivariateDetector>,
        pattern: Arc<PatternRecognitionEngine>,
    ) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(StatisticalEnsembleDetector));
        registry.register(Arc::new(TemporalPatternDetector::new(Arc::clone(&pattern))));
        registry.register(Arc::new(GraphStructuralDetector::new(pattern)));
        registry.register(Arc::new(MultivariateEnsembleDetector::new(multivariate)));
        registry
    }

    /// Register a detector, replacing any previous one of the same kind.
    pub fn register(&mut self, detector: Arc<dyn Detector>) -> Option<Arc<dyn Detector>> {
        info!("Registered detector: {}", detector.name());
        self.detectors.insert(detector.kind(), detector)
    }

    pub fn get(&self, kind: DetectorKind) -> Option<Arc<dyn Detector>> {
        self.detectors.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<DetectorKind> {
        DetectorKind::ALL
            .iter()
            .copied()
            .filter(|k| self.detectors.contains_key(k))
            .collect()
    }
}

/// Score for one entity (index, record or node).
#[derive(Debug, Clone)]
pub(crate) struct EntityScore {
    pub label: String,
    pub score: f64,
    pub flagged: bool,
}

/// Collapse per-entity scores into one payload-level result: the maximum
/// score, flagged when any entity is.
pub(crate) fn summarize(kind: DetectorKind, scores: &[EntityScore]) -> DetectionMethodResult {
    let max = scores.iter().map(|s| s.score).fold(0.0, f64::max);
    let flagged: Vec<String> = scores
        .iter()
        .filter(|s| s.flagged)
        .map(|s| s.label.clone())
        .collect();
    let mean = if scores.is_empty() {
        0.0
    } else {
        scores.iter().map(|s| s.score).sum::<f64>() / scores.len() as f64
    };

    let mut result = DetectionMethodResult::for_kind(kind, max, !flagged.is_empty())
        .with_diagnostic("entities", scores.len() as f64)
        .with_diagnostic("flagged_entities", flagged.len() as f64)
        .with_diagnostic("mean_score", mean);
    result.anomalous_entities = flagged;
    result
}

/// Confidence grows with the distance of the score from the decision
/// threshold: 0.5 on the threshold, 1.0 at least half a unit away.
pub(crate) fn margin_confidence(score: f64, threshold: f64) -> f64 {
    clamp_unit(0.5 + (score - threshold).abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(DetectorKind);

    impl Detector for Fixed {
        fn kind(&self) -> DetectorKind {
            self.0
        }

        fn detect(&self, _ctx: &DetectionContext) -> Result<DetectionMethodResult, DetectionError> {
            Ok(DetectionMethodResult::for_kind(self.0, 0.1, false))
        }
    }

    #[test]
    fn default_registry_covers_every_kind() {
        let registry = DetectorRegistry::with_defaults(
            Arc::new(MultivariateDetector::default()),
            Arc::new(PatternRecognitionEngine::default()),
        );
        assert_eq!(registry.kinds(), DetectorKind::ALL.to_vec());
        for kind in DetectorKind::ALL {
            assert_eq!(registry.get(kind).unwrap().kind(), kind);
        }
    }

    #[test]
    fn register_replaces_same_kind() {
        let mut registry = DetectorRegistry::empty();
        assert!(registry
            .register(Arc::new(Fixed(DetectorKind::TemporalPattern)))
            .is_none());
        assert!(registry
            .register(Arc::new(Fixed(DetectorKind::TemporalPattern)))
            .is_some());
        assert_eq!(registry.kinds(), vec![DetectorKind::TemporalPattern]);
    }

    #[test]
    fn summarize_takes_max_and_flags() {
        let scores = vec![
            EntityScore { label: "a".into(), score: 0.2, flagged: false },
            EntityScore { label: "b".into(), score: 0.9, flagged: true },
        ];
        let r = summarize(DetectorKind::StatisticalEnsemble, &scores);
        assert_eq!(r.method, "statistical_ensemble");
        assert_eq!(r.score, 0.9);
        assert!(r.is_anomaly);
        assert_eq!(r.anomalous_entities, vec!["b"]);
        assert!((r.diagnostics["mean_score"] - 0.55).abs() < 1e-12);
    }

    #[test]
    fn margin_confidence_bounds() {
        assert_eq!(margin_confidence(0.7, 0.7), 0.5);
        assert!((margin_confidence(1.0, 0.7) - 0.8).abs() < 1e-12);
        assert_eq!(margin_confidence(0.0, 0.7), 1.0);
    }
}
