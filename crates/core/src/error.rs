use thiserror::Error;

/// Errors surfaced by training and detection.
///
/// Only `NotTrained`, `TrainingFailed`, `FeatureMismatch` and
/// `ResourceLimitExceeded` reach callers of the orchestrator. The remaining
/// variants are produced inside detectors and absorbed by the orchestrator,
/// which records them against the failing method and excludes it from fusion.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("model has not been trained")]
    NotTrained,

    #[error("training failed: {0}")]
    TrainingFailed(String),

    #[error("feature set mismatch: expected {expected:?}, found {found:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),

    #[error("method {method} failed: {reason}")]
    MethodExecution { method: String, reason: String },

    #[error("unsupported payload for {method}: {reason}")]
    UnsupportedPayload { method: String, reason: String },

    #[error("invalid lifecycle transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl DetectionError {
    /// Whether this error is one the orchestrator reports to its caller
    /// instead of absorbing into the fused result.
    pub fn is_caller_visible(&self) -> bool {
        matches!(
            self,
            DetectionError::NotTrained
                | DetectionError::TrainingFailed(_)
                | DetectionError::FeatureMismatch { .. }
                | DetectionError::ResourceLimitExceeded(_)
        )
    }
}
