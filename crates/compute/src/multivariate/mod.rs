//! Multivariate anomaly detection: PCA reconstruction, FastICA activation,
//! Mahalanobis distance and per-feature z-scores averaged into one
//! ensemble score.

pub mod ica;
pub mod mahalanobis;
pub mod model;
pub mod pca;

use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};
use vigil_core::{Deadline, DetectionError, MultivariateConfig, MultivariateDataPoint, Severity};

use crate::algorithms::{linalg::Matrix, stats};
pub use model::TrainedModel;
pub use pca::Pca;

/// Scoring outcome for one point.
#[derive(Debug, Clone, Serialize)]
pub struct MultivariateAnomalyResult {
    pub id: Option<String>,
    pub ensemble_score: f64,
    pub is_anomaly: bool,
    pub severity: Severity,
    pub pca_score: f64,
    pub mahalanobis_score: f64,
    pub ica_score: f64,
    pub correlation_score: f64,
    pub reconstruction_error: f64,
    pub mahalanobis_distance: f64,
    /// |z| per feature against the training distribution.
    pub feature_contributions: IndexMap<String, f64>,
    pub explanations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CorrelationMatrix {
    pub features: Vec<String>,
    pub values: Matrix,
}

#[derive(Debug, Clone, Serialize)]
pub struct PcaSummary {
    pub features: Vec<String>,
    pub mean: Vec<f64>,
    pub components: Vec<Vec<f64>>,
    pub explained_variance: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
    /// Each input point in component coordinates.
    pub projections: Vec<Vec<f64>>,
}

/// Ensemble detector over feature-map records.
///
/// The trained model is an immutable snapshot swapped in whole by `train`,
/// so `detect` always scores against one consistent model.
pub struct MultivariateDetector {
    config: MultivariateConfig,
    model: RwLock<Option<Arc<TrainedModel>>>,
}

impl Default for MultivariateDetector {
    fn default() -> Self {
        Self::new(MultivariateConfig::default())
    }
}

impl MultivariateDetector {
    pub fn new(config: MultivariateConfig) -> Self {
        Self {
            config,
            model: RwLock::new(None),
        }
    }

    pub fn config(&self) -> &MultivariateConfig {
        &self.config
    }

    /// Current model snapshot, if trained.
    pub fn model(&self) -> Option<Arc<TrainedModel>> {
        self.model
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_trained(&self) -> bool {
        self.model().is_some()
    }

    pub fn train(&self, points: &[MultivariateDataPoint]) -> Result<(), DetectionError> {
        self.train_with_deadline(points, &Deadline::none())
    }

    /// Fit a new model and swap it in. On failure the previous model stays.
    pub fn train_with_deadline(
        &self,
        points: &[MultivariateDataPoint],
        deadline: &Deadline,
    ) -> Result<(), DetectionError> {
        let feature_names = consistent_feature_names(points)?;
        let data: Vec<Vec<f64>> = points
            .iter()
            .map(|p| p.features.values().copied().collect())
            .collect();

        let model = TrainedModel::fit(feature_names, &data, &self.config, deadline).map_err(
            |e| match e {
                DetectionError::ResourceLimitExceeded(_) | DetectionError::TrainingFailed(_) => e,
                other => DetectionError::TrainingFailed(other.to_string()),
            },
        )?;

        info!(
            points = model.training_size,
            features = model.dimensions(),
            pca_components = model.pca.component_count(),
            ica_components = model.ica.component_count(),
            regularized = model.mahalanobis.regularized,
            "multivariate model trained"
        );

        *self.model.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(model));
        Ok(())
    }

    pub fn detect(
        &self,
        points: &[MultivariateDataPoint],
    ) -> Result<Vec<MultivariateAnomalyResult>, DetectionError> {
        self.detect_with(points, self.config.threshold, &Deadline::none())
    }

    /// Score each point against the current snapshot with an explicit
    /// anomaly threshold.
    pub fn detect_with(
        &self,
        points: &[MultivariateDataPoint],
        threshold: f64,
        deadline: &Deadline,
    ) -> Result<Vec<MultivariateAnomalyResult>, DetectionError> {
        let model = self.model().ok_or(DetectionError::NotTrained)?;

        if let Some(bad) = points.iter().find(|p| !model.matches(p)) {
            return Err(DetectionError::FeatureMismatch {
                expected: model.feature_names.clone(),
                found: bad.feature_names(),
            });
        }

        let results = points
            .par_iter()
            .enumerate()
            .map(|(i, point)| -> Result<MultivariateAnomalyResult, DetectionError> {
                deadline.check_every(i)?;
                Ok(model.score(point, threshold))
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            points = results.len(),
            anomalies = results.iter().filter(|r| r.is_anomaly).count(),
            "multivariate detection finished"
        );
        Ok(results)
    }

    /// Pearson correlation between every pair of features. Features absent
    /// from a record count as 0.
    pub fn correlation_matrix(points: &[MultivariateDataPoint]) -> CorrelationMatrix {
        let features = union_feature_names(points);
        let rows = vectorize_all(points, &features);
        CorrelationMatrix {
            values: stats::correlation_matrix(&rows),
            features,
        }
    }

    /// Fit a stand-alone PCA for diagnostics. `components` defaults to every
    /// feature. Independent of the trained model.
    pub fn perform_pca(
        &self,
        points: &[MultivariateDataPoint],
        components: Option<usize>,
    ) -> Result<PcaSummary, DetectionError> {
        let features = union_feature_names(points);
        if points.is_empty() || features.is_empty() {
            return Err(DetectionError::TrainingFailed(
                "PCA needs at least one point with features".to_string(),
            ));
        }
        let rows = vectorize_all(points, &features);
        let k = components.unwrap_or(features.len()).min(features.len());
        let pca = Pca::fit(
            &rows,
            k,
            self.config.power_iterations,
            self.config.tolerance,
            &Deadline::none(),
        )?;

        Ok(PcaSummary {
            projections: rows.iter().map(|r| pca.transform(r)).collect(),
            explained_variance_ratio: pca.explained_variance_ratio(),
            features,
            mean: pca.mean,
            components: pca.components,
            explained_variance: pca.explained_variance,
        })
    }
}

fn consistent_feature_names(points: &[MultivariateDataPoint]) -> Result<Vec<String>, DetectionError> {
    let first = points.first().ok_or_else(|| {
        DetectionError::TrainingFailed("training set is empty".to_string())
    })?;
    let names = first.feature_names();
    if names.is_empty() {
        return Err(DetectionError::TrainingFailed(
            "training points have no features".to_string(),
        ));
    }
    if let Some((i, _)) = points
        .iter()
        .enumerate()
        .find(|(_, p)| !p.features.keys().eq(names.iter()))
    {
        return Err(DetectionError::TrainingFailed(format!(
            "point {i} has a different feature set than point 0"
        )));
    }
    Ok(names)
}

fn union_feature_names(points: &[MultivariateDataPoint]) -> Vec<String> {
    points
        .iter()
        .flat_map(|p| p.features.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn vectorize_all(points: &[MultivariateDataPoint], features: &[String]) -> Vec<Vec<f64>> {
    points
        .iter()
        .map(|p| {
            features
                .iter()
                .map(|f| p.features.get(f).copied().unwrap_or(0.0))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn gaussian(rng: &mut StdRng) -> f64 {
        let u1: f64 = rng.gen_range(1e-12..1.0);
        let u2: f64 = rng.gen();
        (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
    }

    fn point(x: f64, y: f64, z: f64) -> MultivariateDataPoint {
        MultivariateDataPoint::new([("x", x), ("y", y), ("z", z)])
    }

    /// 100 points around the origin: unit spread inside the plane
    /// orthogonal to (1,1,1), almost none along it.
    fn training_cloud() -> Vec<MultivariateDataPoint> {
        let mut rng = StdRng::seed_from_u64(42);
        let u1 = [1.0 / 2f64.sqrt(), -1.0 / 2f64.sqrt(), 0.0];
        let u2 = [1.0 / 6f64.sqrt(), 1.0 / 6f64.sqrt(), -2.0 / 6f64.sqrt()];
        let n = [1.0 / 3f64.sqrt(); 3];
        (0..100)
            .map(|_| {
                let a = gaussian(&mut rng);
                let b = gaussian(&mut rng);
                let c = 0.01 * gaussian(&mut rng);
                let v: Vec<f64> = (0..3).map(|i| a * u1[i] + b * u2[i] + c * n[i]).collect();
                point(v[0], v[1], v[2])
            })
            .collect()
    }

    fn trained() -> MultivariateDetector {
        let detector = MultivariateDetector::default();
        detector.train(&training_cloud()).unwrap();
        detector
    }

    #[test]
    fn origin_is_normal_and_far_point_is_critical() {
        let detector = trained();
        let results = detector
            .detect(&[point(0.0, 0.0, 0.0), point(50.0, 50.0, 50.0)])
            .unwrap();

        assert!(!results[0].is_anomaly, "origin scored {}", results[0].ensemble_score);
        assert_eq!(results[0].severity, Severity::Low);

        assert!(results[1].is_anomaly);
        assert_eq!(results[1].severity, Severity::Critical);
        assert!(results[1].pca_score > 0.99);
        assert!(results[1].mahalanobis_score > 0.99);
        assert!(!results[1].explanations.is_empty());
    }

    #[test]
    fn training_mean_scores_below_threshold() {
        let detector = trained();
        let model = detector.model().unwrap();
        let mean = &model.feature_means;
        let results = detector.detect(&[point(mean[0], mean[1], mean[2])]).unwrap();
        assert!(results[0].ensemble_score < detector.config().threshold);
        assert!(results[0].ensemble_score < 0.05);
    }

    #[test]
    fn deviation_on_feature_constant_in_training_is_flagged() {
        let mut rng = StdRng::seed_from_u64(7);
        let flat: Vec<_> = (0..100)
            .map(|_| point(gaussian(&mut rng), gaussian(&mut rng), 0.0))
            .collect();
        let detector = MultivariateDetector::default();
        detector.train(&flat).unwrap();
        let snapshot = detector.model().unwrap();
        let mean = &snapshot.feature_means;

        let results = detector
            .detect(&[point(mean[0], mean[1], 0.0), point(0.0, 0.0, 1000.0)])
            .unwrap();

        assert!(!results[0].is_anomaly, "mean scored {}", results[0].ensemble_score);
        assert_eq!(results[0].feature_contributions["z"], 0.0);

        let broken = &results[1];
        assert!(broken.is_anomaly, "scored {}", broken.ensemble_score);
        assert_eq!(broken.correlation_score, 1.0);
        assert_eq!(broken.mahalanobis_score, 1.0);
        assert_eq!(broken.feature_contributions["z"], model::CONSTANT_FEATURE_Z);
        assert!(broken
            .explanations
            .iter()
            .any(|e| e.contains("z were constant in training")));
    }

    #[test]
    fn single_feature_scores_without_pca() {
        let mut rng = StdRng::seed_from_u64(11);
        let series: Vec<_> = (0..60)
            .map(|_| MultivariateDataPoint::new([("latency", gaussian(&mut rng))]))
            .collect();
        let detector = MultivariateDetector::default();
        detector.train(&series).unwrap();

        let far = MultivariateDataPoint::new([("latency", 100.0)]);
        let results = detector.detect(&[far]).unwrap();
        assert!(results[0].pca_score < 1e-9);
        assert!(results[0].ensemble_score > 0.99, "scored {}", results[0].ensemble_score);
        assert_eq!(results[0].severity, Severity::Critical);
    }

    #[test]
    fn detect_before_train_fails() {
        let detector = MultivariateDetector::default();
        assert_eq!(
            detector.detect(&[point(1.0, 2.0, 3.0)]).unwrap_err(),
            DetectionError::NotTrained
        );
    }

    #[test]
    fn detect_rejects_different_feature_set() {
        let detector = trained();
        let other = MultivariateDataPoint::new([("x", 1.0), ("y", 2.0), ("w", 3.0)]);
        match detector.detect(&[other]) {
            Err(DetectionError::FeatureMismatch { expected, found }) => {
                assert_eq!(expected, vec!["x", "y", "z"]);
                assert_eq!(found, vec!["w", "x", "y"]);
            }
            other => panic!("expected FeatureMismatch, got {other:?}"),
        }
    }

    #[test]
    fn failed_training_keeps_previous_model() {
        let detector = trained();
        let before = detector.model().unwrap();

        assert!(matches!(detector.train(&[]), Err(DetectionError::TrainingFailed(_))));
        let inconsistent = vec![point(1.0, 2.0, 3.0), MultivariateDataPoint::new([("x", 1.0)])];
        assert!(matches!(
            detector.train(&inconsistent),
            Err(DetectionError::TrainingFailed(_))
        ));

        assert!(Arc::ptr_eq(&before, &detector.model().unwrap()));
    }

    #[test]
    fn retraining_swaps_snapshot() {
        let detector = trained();
        let first = detector.model().unwrap();
        detector.train(&training_cloud()).unwrap();
        assert!(!Arc::ptr_eq(&first, &detector.model().unwrap()));
        // Old snapshot stays usable by whoever still holds it.
        assert_eq!(first.feature_names.len(), 3);
    }

    #[test]
    fn correlation_matrix_reports_linear_relation() {
        let points: Vec<_> = (0..10)
            .map(|i| MultivariateDataPoint::new([("a", i as f64), ("b", 2.0 * i as f64 + 1.0)]))
            .collect();
        let m = MultivariateDetector::correlation_matrix(&points);
        assert_eq!(m.features, vec!["a", "b"]);
        assert!((m.values[0][1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn perform_pca_projects_every_point() {
        let detector = MultivariateDetector::default();
        let summary = detector.perform_pca(&training_cloud(), Some(2)).unwrap();
        assert_eq!(summary.components.len(), 2);
        assert_eq!(summary.projections.len(), 100);
        assert!(summary.explained_variance_ratio.iter().sum::<f64>() > 0.99);
        assert!(!detector.is_trained());
    }

    #[test]
    fn cancelled_deadline_aborts_detection() {
        let detector = trained();
        let deadline = Deadline::none();
        deadline.cancel();
        let err = detector
            .detect_with(&[point(0.0, 0.0, 0.0)], 0.7, &deadline)
            .unwrap_err();
        assert!(matches!(err, DetectionError::ResourceLimitExceeded(_)));
    }
}
