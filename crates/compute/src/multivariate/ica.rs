use serde::Serialize;
use tracing::trace;
use vigil_core::{Deadline, DetectionError};

use crate::algorithms::linalg::{self, dot, norm, Matrix};
use crate::algorithms::stats;

/// Eigenvalues at or below this are dropped from the whitening transform.
const MIN_WHITENING_EIGENVALUE: f64 = 1e-10;

/// Deflationary FastICA over whitened data.
#[derive(Debug, Clone, Serialize)]
pub struct Ica {
    pub mean: Vec<f64>,
    /// `Λ^{-1/2} Eᵀ`, one row per whitened dimension.
    pub whitening: Matrix,
    /// Unit unmixing vectors in whitened space.
    pub unmixing: Matrix,
}

/// Gaussian contrast `g(u) = u·e^{-u²/2}` and its derivative.
fn contrast(u: f64) -> (f64, f64) {
    let e = (-u * u / 2.0).exp();
    (u * e, (1.0 - u * u) * e)
}

impl Ica {
    pub fn fit(
        data: &[Vec<f64>],
        max_components: usize,
        power_iterations: usize,
        max_iterations: usize,
        tolerance: f64,
        deadline: &Deadline,
    ) -> Result<Self, DetectionError> {
        if data.is_empty() {
            return Err(DetectionError::TrainingFailed(
                "ICA needs at least one point".to_string(),
            ));
        }
        let (mean, _) = stats::column_stats(data);
        let cov = stats::covariance_matrix(data, &mean);
        let pairs = linalg::symmetric_eigen(&cov, max_components, power_iterations, tolerance, deadline)?;

        let whitening: Matrix = pairs
            .iter()
            .filter(|p| p.value > MIN_WHITENING_EIGENVALUE)
            .map(|p| {
                let scale = 1.0 / p.value.sqrt();
                p.vector.iter().map(|v| v * scale).collect()
            })
            .collect();

        let mut ica = Self {
            mean,
            whitening,
            unmixing: Vec::new(),
        };
        let whitened: Vec<Vec<f64>> = data.iter().map(|x| ica.whiten(x)).collect();
        ica.unmixing = fast_ica(&whitened, ica.whitening.len(), max_iterations, tolerance, deadline)?;
        Ok(ica)
    }

    pub fn component_count(&self) -> usize {
        self.unmixing.len()
    }

    pub fn whiten(&self, x: &[f64]) -> Vec<f64> {
        let centered: Vec<f64> = x.iter().zip(&self.mean).map(|(v, m)| v - m).collect();
        linalg::mat_vec(&self.whitening, &centered)
    }

    /// Independent-component projections `W · whiten(x)`.
    pub fn sources(&self, x: &[f64]) -> Vec<f64> {
        linalg::mat_vec(&self.unmixing, &self.whiten(x))
    }

    /// Mean absolute source activation, zero when nothing was fitted.
    pub fn activation(&self, x: &[f64]) -> f64 {
        let s = self.sources(x);
        if s.is_empty() {
            return 0.0;
        }
        s.iter().map(|v| v.abs()).sum::<f64>() / s.len() as f64
    }
}

fn fast_ica(
    z: &[Vec<f64>],
    dims: usize,
    max_iterations: usize,
    tolerance: f64,
    deadline: &Deadline,
) -> Result<Matrix, DetectionError> {
    let n = z.len() as f64;
    let mut found: Matrix = Vec::with_capacity(dims);

    for p in 0..dims {
        let mut w = vec![0.0; dims];
        w[p] = 1.0;

        let mut iterations = 0;
        for iteration in 0..max_iterations {
            deadline.check_every(iteration)?;
            iterations = iteration + 1;

            let mut next = vec![0.0; dims];
            let mut mean_derivative = 0.0;
            for row in z {
                let (g, g_prime) = contrast(dot(&w, row));
                for (acc, v) in next.iter_mut().zip(row) {
                    *acc += v * g;
                }
                mean_derivative += g_prime;
            }
            for (acc, wi) in next.iter_mut().zip(&w) {
                *acc = *acc / n - (mean_derivative / n) * wi;
            }

            // Gram-Schmidt against components already extracted
            for prev in &found {
                let proj = dot(&next, prev);
                for (acc, pv) in next.iter_mut().zip(prev) {
                    *acc -= proj * pv;
                }
            }

            let len = norm(&next);
            if len < 1e-12 {
                break;
            }
            next.iter_mut().for_each(|v| *v /= len);

            let converged = (dot(&next, &w).abs() - 1.0).abs() < tolerance;
            w = next;
            if converged {
                break;
            }
        }
        trace!(component = p, iterations, "FastICA component extracted");
        found.push(w);
    }
    Ok(found)
}
