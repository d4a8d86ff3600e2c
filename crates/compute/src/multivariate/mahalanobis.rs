use serde::Serialize;
use tracing::debug;
use vigil_core::DetectionError;

use crate::algorithms::linalg::{self, Matrix};
use crate::algorithms::stats;

#[derive(Debug, Clone, Serialize)]
pub struct Mahalanobis {
    pub mean: Vec<f64>,
    pub inverse_covariance: Matrix,
    /// Whether the covariance was singular and the regularized
    /// pseudo-inverse was used instead.
    pub regularized: bool,
}

impl Mahalanobis {
    pub fn fit(data: &[Vec<f64>]) -> Result<Self, DetectionError> {
        if data.is_empty() {
            return Err(DetectionError::TrainingFailed(
                "Mahalanobis model needs at least one point".to_string(),
            ));
        }
        let (mean, _) = stats::column_stats(data);
        let cov = stats::covariance_matrix(data, &mean);

        let (inverse_covariance, regularized) = match linalg::inverse(&cov) {
            Some(inv) => (inv, false),
            None => {
                debug!(dims = cov.len(), "covariance is singular, using pseudo-inverse");
                let pinv = linalg::pseudo_inverse(&cov).ok_or_else(|| {
                    DetectionError::TrainingFailed(
                        "covariance could not be inverted even with regularization".to_string(),
                    )
                })?;
                (pinv, true)
            }
        };

        Ok(Self {
            mean,
            inverse_covariance,
            regularized,
        })
    }

    /// `sqrt((x-μ)ᵀ Σ⁻¹ (x-μ))`.
    pub fn distance(&self, x: &[f64]) -> f64 {
        let diff: Vec<f64> = x.iter().zip(&self.mean).map(|(v, m)| v - m).collect();
        let projected = linalg::mat_vec(&self.inverse_covariance, &diff);
        linalg::dot(&diff, &projected).max(0.0).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_matches_standardized_euclidean_for_independent_features() {
        let data = vec![
            vec![-1.0, -2.0],
            vec![1.0, -2.0],
            vec![-1.0, 2.0],
            vec![1.0, 2.0],
        ];
        let m = Mahalanobis::fit(&data).unwrap();
        assert!(!m.regularized);
        // sample variances: 4/3 and 16/3, covariance 0
        let d = m.distance(&[2.0, 0.0]);
        assert!((d - (4.0_f64 / (4.0 / 3.0)).sqrt()).abs() < 1e-9);
        assert_eq!(m.distance(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn singular_covariance_falls_back_to_pseudo_inverse() {
        // Second feature is an exact copy of the first.
        let data: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64, i as f64]).collect();
        let m = Mahalanobis::fit(&data).unwrap();
        assert!(m.regularized);
        assert!(m.distance(&[4.5, 4.5]) < 1e-6);
        assert!(m.distance(&[100.0, 100.0]).is_finite());
    }
}
