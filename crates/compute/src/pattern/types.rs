use serde::{Deserialize, Serialize};
use vigil_core::Severity;

use crate::algorithms::graph_stats::ExtendedGraphStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotifType {
    Triangle,
    Star,
    Sequence,
}

/// A recurring structure with its significance against a null model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motif {
    pub motif_type: MotifType,
    /// Symbol string for sequence motifs, centre id for stars, sorted member
    /// ids for triangles.
    pub pattern: String,
    /// Node ids taking part (graph motifs only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
    /// Start offsets (sequence motifs only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub positions: Vec<usize>,
    pub occurrences: usize,
    pub significance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowClass {
    Normal,
    Periodic,
    Anomalous,
}

impl std::fmt::Display for WindowClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowClass::Normal => write!(f, "normal"),
            WindowClass::Periodic => write!(f, "periodic"),
            WindowClass::Anomalous => write!(f, "anomalous"),
        }
    }
}

/// One sliding window over a sequence. `end` is exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowAnalysis {
    pub start: usize,
    pub end: usize,
    pub mean: f64,
    pub variance: f64,
    pub slope: f64,
    pub max_autocorrelation: f64,
    pub score: f64,
    pub class: WindowClass,
}

impl WindowAnalysis {
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphMetrics {
    pub degree: usize,
    pub betweenness: f64,
    pub closeness: f64,
    pub clustering: f64,
    pub pagerank: f64,
}

/// Result for one graph node or one sequence index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternAnomalyResult {
    pub entity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub score: f64,
    pub is_anomaly: bool,
    pub severity: Severity,
    /// Neighbourhood z-score (sequence results only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_metrics: Option<GraphMetrics>,
    #[serde(default)]
    pub motifs: Vec<Motif>,
    #[serde(default)]
    pub explanations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphAnalysis {
    pub results: Vec<PatternAnomalyResult>,
    pub motifs: Vec<Motif>,
    pub stats: ExtendedGraphStats,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SequenceAnalysis {
    pub results: Vec<PatternAnomalyResult>,
    pub windows: Vec<WindowAnalysis>,
    pub motifs: Vec<Motif>,
}
