//! Request orchestration for the vigil anomaly-detection engine:
//! payload profiling, detector dispatch, result fusion and bookkeeping.

pub mod analyzer;
pub mod detectors;
pub mod fusion;
pub mod metrics;
pub mod runner;

pub use analyzer::{profile_payload, recommend, DataCharacteristicsAnalyzer};
pub use detectors::{
    DetectionContext, Detector, DetectorRegistry, GraphStructuralDetector,
    MultivariateEnsembleDetector, StatisticalEnsembleDetector, TemporalPatternDetector,
};
pub use fusion::{InMemoryPerformanceHistory, PerformanceHistory, ResultFusionEngine};
pub use metrics::OrchestratorMetrics;
pub use runner::{estimate_memory, select_methods, DetectionOrchestrator};
