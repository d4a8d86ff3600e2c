use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::method::DetectorKind;
use crate::payload::DataType;

/// Summary statistics computed while classifying a payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataStatistics {
    pub length: usize,
    pub mean: f64,
    pub variance: f64,
    pub trend_slope: f64,
    pub seasonality_strength: f64,
    pub is_stationary: bool,
    pub has_outliers: bool,
    /// Pearson correlation per feature pair, keyed `"a~b"`.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub feature_correlations: IndexMap<String, f64>,
    pub max_abs_correlation: f64,
    /// Fraction of feature values that are exactly zero.
    pub sparsity: f64,
    pub feature_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_density: Option<f64>,
}

/// Read-only classification of one request's payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataProfile {
    pub data_type: DataType,
    pub statistics: DataStatistics,
    /// Recommended methods, most important first.
    pub recommended_methods: Vec<DetectorKind>,
}

impl DataProfile {
    pub fn empty(data_type: DataType) -> Self {
        Self {
            data_type,
            statistics: DataStatistics {
                is_stationary: true,
                ..DataStatistics::default()
            },
            recommended_methods: vec![DetectorKind::StatisticalEnsemble],
        }
    }
}
