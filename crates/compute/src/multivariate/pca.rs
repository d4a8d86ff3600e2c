use serde::Serialize;
use vigil_core::{Deadline, DetectionError};

use crate::algorithms::linalg::{self, dot};
use crate::algorithms::stats;

/// Principal components fitted by power iteration with deflation.
#[derive(Debug, Clone, Serialize)]
pub struct Pca {
    pub mean: Vec<f64>,
    /// One unit-length row per retained component, strongest first.
    pub components: Vec<Vec<f64>>,
    pub explained_variance: Vec<f64>,
    /// Trace of the covariance matrix.
    pub total_variance: f64,
}

impl Pca {
    /// Fit up to `k` components. Fewer come back when the remaining
    /// spectrum is numerically zero.
    pub fn fit(
        data: &[Vec<f64>],
        k: usize,
        max_iterations: usize,
        tolerance: f64,
        deadline: &Deadline,
    ) -> Result<Self, DetectionError> {
        if data.is_empty() {
            return Err(DetectionError::TrainingFailed(
                "PCA needs at least one point".to_string(),
            ));
        }
        let (mean, _) = stats::column_stats(data);
        let cov = stats::covariance_matrix(data, &mean);
        let total_variance = (0..cov.len()).map(|i| cov[i][i]).sum();
        let pairs = linalg::symmetric_eigen(&cov, k, max_iterations, tolerance, deadline)?;

        let (components, explained_variance): (Vec<Vec<f64>>, Vec<f64>) = pairs
            .into_iter()
            .map(|p| (p.vector, p.value.max(0.0)))
            .unzip();

        Ok(Self {
            mean,
            components,
            explained_variance,
            total_variance,
        })
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Project a point onto the retained components.
    pub fn transform(&self, x: &[f64]) -> Vec<f64> {
        let centered: Vec<f64> = x.iter().zip(&self.mean).map(|(v, m)| v - m).collect();
        self.components.iter().map(|c| dot(c, &centered)).collect()
    }

    /// Map component coordinates back into feature space.
    pub fn inverse_transform(&self, z: &[f64]) -> Vec<f64> {
        let mut out = self.mean.clone();
        for (coord, component) in z.iter().zip(&self.components) {
            for (o, c) in out.iter_mut().zip(component) {
                *o += coord * c;
            }
        }
        out
    }

    /// Euclidean distance between `x` and its reconstruction.
    pub fn reconstruction_error(&self, x: &[f64]) -> f64 {
        let back = self.inverse_transform(&self.transform(x));
        x.iter()
            .zip(&back)
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    pub fn retained_variance(&self) -> f64 {
        self.explained_variance.iter().sum()
    }

    /// Share of total variance carried by each retained component.
    pub fn explained_variance_ratio(&self) -> Vec<f64> {
        if self.total_variance <= f64::EPSILON {
            return vec![0.0; self.explained_variance.len()];
        }
        self.explained_variance
            .iter()
            .map(|v| v / self.total_variance)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn scaled_gaussian_rows(n: usize, scales: &[f64], seed: u64) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|_| {
                scales
                    .iter()
                    .map(|s| {
                        // Box-Muller
                        let u1: f64 = rng.gen_range(1e-12..1.0);
                        let u2: f64 = rng.gen();
                        s * (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn reconstruction_error_shrinks_as_components_grow() {
        let data = scaled_gaussian_rows(200, &[5.0, 3.0, 2.0, 1.0], 7);
        let probe = vec![4.0, -3.0, 2.5, 1.5];

        let errors: Vec<f64> = (1..=4)
            .map(|k| {
                Pca::fit(&data, k, 2000, 1e-10, &Deadline::none())
                    .unwrap()
                    .reconstruction_error(&probe)
            })
            .collect();

        for pair in errors.windows(2) {
            assert!(pair[1] <= pair[0] + 1e-6, "errors not monotone: {errors:?}");
        }
        assert!(errors[3] < 1e-4, "full-rank PCA should reconstruct, got {}", errors[3]);
        assert!(errors[0] > errors[3]);
    }

    #[test]
    fn components_are_sorted_and_ratios_sum_below_one() {
        let data = scaled_gaussian_rows(300, &[4.0, 1.0, 0.5], 11);
        let pca = Pca::fit(&data, 3, 2000, 1e-10, &Deadline::none()).unwrap();
        assert_eq!(pca.component_count(), 3);
        assert!(pca.explained_variance[0] >= pca.explained_variance[1]);
        assert!(pca.explained_variance[1] >= pca.explained_variance[2]);
        let ratio_sum: f64 = pca.explained_variance_ratio().iter().sum();
        assert!((ratio_sum - 1.0).abs() < 1e-3);
    }

    #[test]
    fn constant_data_has_no_components() {
        let data = vec![vec![1.0, 2.0]; 10];
        let pca = Pca::fit(&data, 2, 100, 1e-8, &Deadline::none()).unwrap();
        assert_eq!(pca.component_count(), 0);
        assert_eq!(pca.reconstruction_error(&[1.0, 2.0]), 0.0);
    }

    #[test]
    fn empty_data_fails() {
        assert!(matches!(
            Pca::fit(&[], 2, 100, 1e-8, &Deadline::none()),
            Err(DetectionError::TrainingFailed(_))
        ));
    }
}
