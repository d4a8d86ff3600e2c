//! Payload classification, descriptive statistics and method
//! recommendations.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use indexmap::IndexMap;
use tracing::debug;
use vigil_compute::algorithms::stats;
use vigil_core::{DataProfile, DataStatistics, DetectorKind, MultivariateDataPoint, Payload};

/// Seasonality above this recommends the temporal method.
const SEASONALITY_THRESHOLD: f64 = 0.3;
/// Trend magnitudes below this count as flat.
const TREND_EPSILON: f64 = 1e-9;
const SPARSE_GRAPH_DENSITY: f64 = 0.1;
const DENSE_GRAPH_DENSITY: f64 = 0.8;
/// Payloads longer than this may use heavyweight methods.
const HEAVYWEIGHT_MIN_LEN: usize = 100;
const MAX_SEASONAL_LAG: usize = 50;
const STATIONARITY_WINDOWS: usize = 4;
const STATIONARITY_RATIO: f64 = 0.5;
const DEFAULT_HISTORY: usize = 64;

/// Classifies payloads and keeps a bounded history of recent profiles.
pub struct DataCharacteristicsAnalyzer {
    history: Mutex<VecDeque<DataProfile>>,
    capacity: usize,
}

impl Default for DataCharacteristicsAnalyzer {
    fn default() -> Self {
        Self::with_history(DEFAULT_HISTORY)
    }
}

impl DataCharacteristicsAnalyzer {
    pub fn with_history(capacity: usize) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Profile a payload and remember the profile.
    pub fn classify(&self, payload: &Payload) -> DataProfile {
        let profile = profile_payload(payload);
        debug!(
            data_type = %profile.data_type,
            length = profile.statistics.length,
            recommended = ?profile.recommended_methods,
            "payload classified"
        );
        if self.capacity > 0 {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == self.capacity {
                history.pop_front();
            }
            history.push_back(profile.clone());
        }
        profile
    }

    /// Recent profiles, oldest first.
    pub fn recent_profiles(&self) -> Vec<DataProfile> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// Side-effect-free profile of a payload.
pub fn profile_payload(payload: &Payload) -> DataProfile {
    let data_type = payload.data_type();
    if payload.is_empty() {
        let mut profile = DataProfile::empty(data_type);
        profile.recommended_methods = vec![DetectorKind::StatisticalEnsemble];
        return profile;
    }

    let mut statistics = series_statistics(&payload.numeric_series());
    statistics.length = payload.len();

    match payload {
        Payload::Multivariate(points) => add_multivariate_statistics(&mut statistics, points),
        Payload::Graph(graph) => statistics.graph_density = Some(graph.density()),
        _ => {}
    }

    let recommended_methods = recommend(&statistics);
    DataProfile {
        data_type,
        statistics,
        recommended_methods,
    }
}

fn series_statistics(values: &[f64]) -> DataStatistics {
    let n = values.len();
    let max_lag = (n / 3).min(MAX_SEASONAL_LAG);
    DataStatistics {
        length: n,
        mean: stats::mean(values),
        variance: stats::variance(values),
        trend_slope: stats::linear_trend(values),
        seasonality_strength: stats::max_abs_autocorrelation(values, max_lag),
        is_stationary: is_stationary(values),
        has_outliers: stats::has_iqr_outliers(values),
        ..DataStatistics::default()
    }
}

/// Variance of the variances of four equal windows, relative to their
/// squared mean. Short series count as stationary.
fn is_stationary(values: &[f64]) -> bool {
    let width = values.len() / STATIONARITY_WINDOWS;
    if width < 2 {
        return true;
    }
    let variances: Vec<f64> = values
        .chunks(width)
        .take(STATIONARITY_WINDOWS)
        .map(stats::variance)
        .collect();
    let mean_var = stats::mean(&variances);
    if mean_var <= f64::EPSILON {
        return true;
    }
    stats::variance(&variances) / (mean_var * mean_var) < STATIONARITY_RATIO
}

fn add_multivariate_statistics(statistics: &mut DataStatistics, points: &[MultivariateDataPoint]) {
    let mut names: Vec<&String> = points.iter().flat_map(|p| p.features.keys()).collect();
    names.sort();
    names.dedup();

    let columns: Vec<Vec<f64>> = names
        .iter()
        .map(|name| {
            points
                .iter()
                .map(|p| p.features.get(*name).copied().unwrap_or(0.0))
                .collect()
        })
        .collect();

    let mut correlations = IndexMap::new();
    let mut max_abs: f64 = 0.0;
    for i in 0..names.len() {
        for j in (i + 1)..names.len() {
            let r = stats::correlation(&columns[i], &columns[j]);
            max_abs = max_abs.max(r.abs());
            correlations.insert(format!("{}~{}", names[i], names[j]), r);
        }
    }

    let cells = columns.iter().map(Vec::len).sum::<usize>();
    let zeros = columns.iter().flatten().filter(|v| **v == 0.0).count();

    statistics.feature_count = names.len();
    statistics.feature_correlations = correlations;
    statistics.max_abs_correlation = max_abs;
    statistics.sparsity = if cells > 0 { zeros as f64 / cells as f64 } else { 0.0 };
}

/// Baseline always; temporal on trend or seasonality; structural on
/// outliers or extreme density; heavyweight only for long payloads.
pub fn recommend(statistics: &DataStatistics) -> Vec<DetectorKind> {
    let mut methods = vec![DetectorKind::StatisticalEnsemble];
    if statistics.trend_slope.abs() > TREND_EPSILON
        || statistics.seasonality_strength > SEASONALITY_THRESHOLD
    {
        methods.push(DetectorKind::TemporalPattern);
    }
    let extreme_density = statistics
        .graph_density
        .is_some_and(|d| d < SPARSE_GRAPH_DENSITY || d > DENSE_GRAPH_DENSITY);
    if statistics.has_outliers || extreme_density {
        methods.push(DetectorKind::GraphStructural);
    }
    if statistics.length > HEAVYWEIGHT_MIN_LEN {
        methods.push(DetectorKind::MultivariateEnsemble);
    }
    methods
}
