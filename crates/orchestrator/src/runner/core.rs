use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;
use vigil_compute::{MultivariateDetector, PatternRecognitionEngine};
use vigil_core::{Config, DetectionError, DetectionResult, Payload};

use crate::analyzer::DataCharacteristicsAnalyzer;
use crate::detectors::DetectorRegistry;
use crate::fusion::{InMemoryPerformanceHistory, PerformanceHistory, ResultFusionEngine};
use crate::metrics::OrchestratorMetrics;

/// Entry point for detection requests. Cheap to share behind an `Arc`;
/// every method takes `&self`.
pub struct DetectionOrchestrator {
    pub(super) config: Config,
    pub(super) analyzer: DataCharacteristicsAnalyzer,
    pub(super) registry: DetectorRegistry,
    pub(super) fusion: ResultFusionEngine,
    pub(super) history: Arc<dyn PerformanceHistory>,
    pub(super) metrics: Arc<RwLock<OrchestratorMetrics>>,
    multivariate: Arc<MultivariateDetector>,
    pattern: Arc<PatternRecognitionEngine>,
}

impl DetectionOrchestrator {
    /// Orchestrator with the default detector for every kind.
    pub fn new(config: Config) -> Self {
        let multivariate = Arc::new(MultivariateDetector::new(config.multivariate.clone()));
        let pattern = Arc::new(PatternRecognitionEngine::new(config.pattern.clone()));
        let registry = DetectorRegistry::with_defaults(Arc::clone(&multivariate), Arc::clone(&pattern));
        Self::assemble(config, registry, multivariate, pattern)
    }

    /// Orchestrator dispatching to a caller-supplied registry. The engines
    /// behind [`multivariate`](Self::multivariate) and
    /// [`pattern_engine`](Self::pattern_engine) are fresh ones the registry
    /// does not share.
    pub fn with_registry(config: Config, registry: DetectorRegistry) -> Self {
        let multivariate = Arc::new(MultivariateDetector::new(config.multivariate.clone()));
        let pattern = Arc::new(PatternRecognitionEngine::new(config.pattern.clone()));
        Self::assemble(config, registry, multivariate, pattern)
    }

    fn assemble(
        config: Config,
        registry: DetectorRegistry,
        multivariate: Arc<MultivariateDetector>,
        pattern: Arc<PatternRecognitionEngine>,
    ) -> Self {
        let history: Arc<dyn PerformanceHistory> = Arc::new(InMemoryPerformanceHistory::default());
        info!(
            "Detection orchestrator ready: preset {}, {} detectors",
            config.preset.name,
            registry.kinds().len()
        );
        Self {
            config,
            analyzer: DataCharacteristicsAnalyzer::default(),
            registry,
            fusion: ResultFusionEngine::new(Arc::clone(&history)),
            history,
            metrics: Arc::new(RwLock::new(OrchestratorMetrics::default())),
            multivariate,
            pattern,
        }
    }

    /// Replace the performance-history store used by stacking fusion and
    /// feedback.
    pub fn with_history(mut self, history: Arc<dyn PerformanceHistory>) -> Self {
        self.fusion = ResultFusionEngine::new(Arc::clone(&history));
        self.history = history;
        self
    }

    /// Fit every registered detector that keeps a model on a reference
    /// payload. Stops at the first failure; models trained before it keep
    /// their new state.
    pub fn train(&self, payload: &Payload) -> Result<(), DetectionError> {
        for kind in self.registry.kinds() {
            if let Some(detector) = self.registry.get(kind) {
                detector.train(payload)?;
            }
        }
        info!(entities = payload.len(), "detectors trained");
        Ok(())
    }

    /// Feed ground truth for a finished request back into the performance
    /// history: each method is scored on whether it agreed with `actual`.
    pub fn record_feedback(&self, result: &DetectionResult, actual_is_anomaly: bool) {
        for r in &result.per_method_results {
            self.history.record(&r.method, r.is_anomaly == actual_is_anomaly);
        }
        info!(
            request_id = %result.request_id,
            actual_is_anomaly,
            methods = result.per_method_results.len(),
            "feedback recorded"
        );
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    pub fn analyzer(&self) -> &DataCharacteristicsAnalyzer {
        &self.analyzer
    }

    pub fn history(&self) -> &Arc<dyn PerformanceHistory> {
        &self.history
    }

    /// Shared multivariate detector trained by [`train`](Self::train).
    pub fn multivariate(&self) -> &Arc<MultivariateDetector> {
        &self.multivariate
    }

    pub fn pattern_engine(&self) -> &Arc<PatternRecognitionEngine> {
        &self.pattern
    }

    /// Get a snapshot of the current orchestrator metrics.
    pub fn metrics(&self) -> OrchestratorMetrics {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
