//! Immutable trained state shared by concurrent detect calls.

use indexmap::IndexMap;
use serde::Serialize;
use vigil_core::{clamp_unit, Deadline, DetectionError, MultivariateConfig, MultivariateDataPoint, Severity};

use super::ica::Ica;
use super::mahalanobis::Mahalanobis;
use super::pca::Pca;
use super::MultivariateAnomalyResult;
use crate::algorithms::stats;

/// Sub-scores above this are called out in explanations.
const EXPLAIN_SCORE: f64 = 0.5;

/// Z-score recorded for a feature that was constant in training and now
/// differs. Any finite deviation on such a feature is unbounded in z terms.
pub const CONSTANT_FEATURE_Z: f64 = 1e6;

#[derive(Debug, Clone, Serialize)]
pub struct TrainedModel {
    /// Vectorization order shared by train and detect.
    pub feature_names: Vec<String>,
    pub pca: Pca,
    pub ica: Ica,
    pub mahalanobis: Mahalanobis,
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
    pub training_size: usize,
}

impl TrainedModel {
    pub fn fit(
        feature_names: Vec<String>,
        data: &[Vec<f64>],
        config: &MultivariateConfig,
        deadline: &Deadline,
    ) -> Result<Self, DetectionError> {
        let d = feature_names.len();
        // Keep one direction out so reconstruction error carries signal.
        let pca_components = config.max_components.min(d.saturating_sub(1)).max(1);

        let pca = Pca::fit(data, pca_components, config.power_iterations, config.tolerance, deadline)?;
        let ica = Ica::fit(
            data,
            config.max_components,
            config.power_iterations,
            config.ica_iterations,
            config.tolerance,
            deadline,
        )?;
        let mahalanobis = Mahalanobis::fit(data)?;
        let (feature_means, feature_stds) = stats::column_stats(data);

        Ok(Self {
            feature_names,
            pca,
            ica,
            mahalanobis,
            feature_means,
            feature_stds,
            training_size: data.len(),
        })
    }

    pub fn dimensions(&self) -> usize {
        self.feature_names.len()
    }

    /// Feature vector in training order. Callers check the feature set first.
    pub fn vectorize(&self, point: &MultivariateDataPoint) -> Vec<f64> {
        self.feature_names
            .iter()
            .map(|name| point.features.get(name).copied().unwrap_or(0.0))
            .collect()
    }

    pub fn matches(&self, point: &MultivariateDataPoint) -> bool {
        point.features.len() == self.feature_names.len()
            && self
                .feature_names
                .iter()
                .all(|name| point.features.contains_key(name))
    }

    pub fn score(&self, point: &MultivariateDataPoint, threshold: f64) -> MultivariateAnomalyResult {
        let x = self.vectorize(point);
        let d = self.dimensions().max(1) as f64;

        let reconstruction_error = self.pca.reconstruction_error(&x);
        let retained = self.pca.retained_variance();
        let pca_score = if retained > f64::EPSILON {
            clamp_unit(reconstruction_error / retained.sqrt())
        } else if reconstruction_error > f64::EPSILON {
            1.0
        } else {
            0.0
        };

        let mut feature_contributions = IndexMap::with_capacity(x.len());
        let mut broken_constants = Vec::new();
        let mut max_z: f64 = 0.0;
        for (i, name) in self.feature_names.iter().enumerate() {
            let std = self.feature_stds[i];
            let z = if std > f64::EPSILON {
                stats::z_score(x[i], self.feature_means[i], std).abs()
            } else if (x[i] - self.feature_means[i]).abs() > f64::EPSILON {
                broken_constants.push(name.as_str());
                CONSTANT_FEATURE_Z
            } else {
                0.0
            };
            max_z = max_z.max(z);
            feature_contributions.insert(name.clone(), z);
        }
        let correlation_score = clamp_unit(max_z / 3.0);

        // The pseudo-inverse gives zero-variance directions no weight, but the
        // distance along them is unbounded.
        let mahalanobis_distance = self.mahalanobis.distance(&x);
        let mahalanobis_score = if broken_constants.is_empty() {
            clamp_unit(mahalanobis_distance / (2.0 * d).sqrt())
        } else {
            1.0
        };

        let ica_score = clamp_unit(self.ica.activation(&x));

        // A single feature is reconstructed exactly, so PCA has nothing to say.
        let ensemble_score = if self.dimensions() > 1 {
            clamp_unit((pca_score + mahalanobis_score + ica_score + correlation_score) / 4.0)
        } else {
            clamp_unit((mahalanobis_score + ica_score + correlation_score) / 3.0)
        };
        let is_anomaly = ensemble_score > threshold;

        let mut explanations = Vec::new();
        if pca_score > EXPLAIN_SCORE {
            explanations.push(format!(
                "PCA reconstruction error {reconstruction_error:.3} is off the principal subspace"
            ));
        }
        if mahalanobis_score > EXPLAIN_SCORE {
            explanations.push(format!(
                "Mahalanobis distance {mahalanobis_distance:.3} from the training mean"
            ));
        }
        if ica_score > EXPLAIN_SCORE {
            explanations.push(format!("independent components strongly activated ({ica_score:.2})"));
        }
        if !broken_constants.is_empty() {
            explanations.push(format!(
                "feature(s) {} were constant in training and now differ",
                broken_constants.join(", ")
            ));
        } else if let Some((name, z)) = feature_contributions
            .iter()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .filter(|(_, z)| **z > 3.0)
        {
            explanations.push(format!("feature '{name}' deviates {z:.1} standard deviations"));
        }

        MultivariateAnomalyResult {
            id: point.id.clone(),
            ensemble_score,
            is_anomaly,
            severity: Severity::from_score(ensemble_score),
            pca_score,
            mahalanobis_score,
            ica_score,
            correlation_score,
            reconstruction_error,
            mahalanobis_distance,
            feature_contributions,
            explanations,
        }
    }
}
