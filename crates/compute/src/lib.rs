pub mod algorithms;
pub mod multivariate;
pub mod pattern;

pub use algorithms::degree::DegreeInfo;
pub use algorithms::graph_stats::ExtendedGraphStats;
pub use multivariate::{
    CorrelationMatrix, MultivariateAnomalyResult, MultivariateDetector, PcaSummary, TrainedModel,
};
pub use pattern::{
    GraphAnalysis, GraphMetrics, Motif, MotifType, PatternAnomalyResult, PatternRecognitionEngine,
    SequenceAnalysis, WindowAnalysis, WindowClass,
};
