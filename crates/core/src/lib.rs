pub mod config;
pub mod deadline;
pub mod error;
pub mod lifecycle;
pub mod method;
pub mod payload;
pub mod preset;
pub mod profile;
pub mod request;
pub mod result;
pub mod severity;

pub use config::{Config, MultivariateConfig, PatternConfig};
pub use deadline::Deadline;
pub use error::DetectionError;
pub use lifecycle::{Lifecycle, RequestState};
pub use method::{DetectorKind, FusionStrategy};
pub use payload::{
    DataType, GraphEdge, GraphNode, GraphPayload, MultivariateDataPoint, Payload, TimeSeriesPoint,
};
pub use preset::{Preset, PresetTable};
pub use profile::{DataProfile, DataStatistics};
pub use request::{DetectionRequest, Priority, RequestMetadata, RunConfig};
pub use result::{
    clamp_unit, DetectionMethodResult, DetectionResult, FusedAnomalyResult, MethodFailure,
    PerformanceMetrics,
};
pub use severity::Severity;
