use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::lifecycle::RequestState;
use crate::method::{DetectorKind, FusionStrategy};
use crate::profile::DataProfile;
use crate::severity::Severity;

/// Output of one detector for one payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionMethodResult {
    pub method: String,
    /// Anomaly score in [0, 1].
    pub score: f64,
    pub is_anomaly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Method-specific numeric diagnostics (reconstruction error, distances,
    /// feature z-scores, graph metrics).
    #[serde(default)]
    pub diagnostics: IndexMap<String, f64>,
    /// Entities (indices, ids, timestamps) flagged by this method.
    #[serde(default)]
    pub anomalous_entities: Vec<String>,
    #[serde(default)]
    pub explanations: Vec<String>,
}

impl DetectionMethodResult {
    pub fn new(method: impl Into<String>, score: f64, is_anomaly: bool) -> Self {
        Self {
            method: method.into(),
            score: clamp_unit(score),
            is_anomaly,
            confidence: None,
            diagnostics: IndexMap::new(),
            anomalous_entities: Vec::new(),
            explanations: Vec::new(),
        }
    }

    pub fn for_kind(kind: DetectorKind, score: f64, is_anomaly: bool) -> Self {
        Self::new(kind.as_str(), score, is_anomaly)
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(clamp_unit(confidence));
        self
    }

    pub fn with_diagnostic(mut self, key: impl Into<String>, value: f64) -> Self {
        self.diagnostics.insert(key.into(), value);
        self
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanations.push(explanation.into());
        self
    }
}

/// The fused verdict across all methods that produced a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedAnomalyResult {
    pub is_anomaly: bool,
    pub final_score: f64,
    pub confidence_score: f64,
    /// Agreement across methods in [0, 1].
    pub consensus_score: f64,
    pub severity: Severity,
    pub strategy: FusionStrategy,
    pub explanations: Vec<String>,
    pub contributing_methods: Vec<String>,
    /// Per-method scores in method-insertion order.
    pub method_scores: IndexMap<String, f64>,
    pub recommended_actions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodFailure {
    pub method: String,
    pub reason: String,
}

/// Observability data attached to every response. Never used for decisions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_time_ms: f64,
    pub method_times_ms: IndexMap<String, f64>,
    pub memory_estimate_bytes: usize,
    pub methods_attempted: usize,
    pub methods_succeeded: usize,
    #[serde(default)]
    pub failed_methods: Vec<MethodFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub request_id: Uuid,
    pub profile: DataProfile,
    pub selected_methods: Vec<DetectorKind>,
    pub per_method_results: Vec<DetectionMethodResult>,
    pub fused_result: FusedAnomalyResult,
    pub performance_metrics: PerformanceMetrics,
    pub lifecycle: Vec<RequestState>,
    pub timestamp: DateTime<Utc>,
    pub total_processing_time_ms: f64,
}

/// Clamp to [0, 1]; NaN becomes 0.
pub fn clamp_unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}
