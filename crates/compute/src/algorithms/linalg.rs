//! Small dense linear algebra for the multivariate detectors.
//!
//! Matrices are `Vec<Vec<f64>>` in row-major order. Feature counts are in
//! the tens, so plain loops are fine here.

use tracing::trace;
use vigil_core::{Deadline, DetectionError};

pub type Matrix = Vec<Vec<f64>>;

/// Pivots below this magnitude mean the matrix is treated as singular.
pub const SINGULAR_PIVOT: f64 = 1e-10;

pub fn identity(n: usize) -> Matrix {
    let mut m = vec![vec![0.0; n]; n];
    for (i, row) in m.iter_mut().enumerate() {
        row[i] = 1.0;
    }
    m
}

pub fn transpose(a: &Matrix) -> Matrix {
    let rows = a.len();
    let cols = a.first().map_or(0, Vec::len);
    let mut t = vec![vec![0.0; rows]; cols];
    for i in 0..rows {
        for j in 0..cols {
            t[j][i] = a[i][j];
        }
    }
    t
}

pub fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    let n = a.len();
    let inner = b.len();
    let m = b.first().map_or(0, Vec::len);
    let mut out = vec![vec![0.0; m]; n];
    for i in 0..n {
        for k in 0..inner {
            let aik = a[i][k];
            if aik == 0.0 {
                continue;
            }
            for j in 0..m {
                out[i][j] += aik * b[k][j];
            }
        }
    }
    out
}

pub fn mat_vec(a: &Matrix, v: &[f64]) -> Vec<f64> {
    a.iter().map(|row| dot(row, v)).collect()
}

pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

/// Gauss-Jordan inverse with partial pivoting. `None` when singular.
pub fn inverse(a: &Matrix) -> Option<Matrix> {
    let n = a.len();
    let mut work: Matrix = a.clone();
    let mut inv = identity(n);

    for col in 0..n {
        let pivot_row = (col..n).max_by(|&x, &y| work[x][col].abs().total_cmp(&work[y][col].abs()))?;
        if work[pivot_row][col].abs() < SINGULAR_PIVOT {
            return None;
        }
        work.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = work[col][col];
        for j in 0..n {
            work[col][j] /= pivot;
            inv[col][j] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = work[row][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..n {
                work[row][j] -= factor * work[col][j];
                inv[row][j] -= factor * inv[col][j];
            }
        }
    }
    Some(inv)
}

/// Regularized pseudo-inverse `(AᵀA + εI)⁻¹Aᵀ`.
///
/// ε starts at 1e-6 and grows tenfold until the regularized system inverts.
pub fn pseudo_inverse(a: &Matrix) -> Option<Matrix> {
    let at = transpose(a);
    let ata = multiply(&at, a);
    let n = ata.len();
    let mut eps = 1e-6;
    for _ in 0..12 {
        let mut reg = ata.clone();
        for (i, row) in reg.iter_mut().enumerate().take(n) {
            row[i] += eps;
        }
        if let Some(inv) = inverse(&reg) {
            return Some(multiply(&inv, &at));
        }
        eps *= 10.0;
    }
    None
}

/// An eigenvalue with its unit eigenvector.
#[derive(Debug, Clone)]
pub struct EigenPair {
    pub value: f64,
    pub vector: Vec<f64>,
}

/// Leading `k` eigenpairs of a symmetric matrix by power iteration with
/// deflation, in descending eigenvalue order.
///
/// Stops early once the remaining spectrum is numerically zero, so fewer
/// than `k` pairs may come back.
pub fn symmetric_eigen(
    a: &Matrix,
    k: usize,
    max_iterations: usize,
    tolerance: f64,
    deadline: &Deadline,
) -> Result<Vec<EigenPair>, DetectionError> {
    let n = a.len();
    let mut work = a.clone();
    let mut pairs = Vec::with_capacity(k.min(n));

    for component in 0..k.min(n) {
        // Deterministic start vector, tilted so it is not orthogonal to the
        // leading eigenvector of common structured inputs.
        let mut v: Vec<f64> = (0..n).map(|i| 1.0 + 0.1 * ((i + component) % n) as f64).collect();
        let start_norm = norm(&v);
        v.iter_mut().for_each(|x| *x /= start_norm);

        let mut eigenvalue = 0.0;
        let mut degenerate = false;
        let mut iterations = 0;
        for iteration in 0..max_iterations {
            iterations = iteration + 1;
            deadline.check_every(iteration)?;
            let next = mat_vec(&work, &v);
            let next_norm = norm(&next);
            if next_norm < 1e-12 {
                degenerate = true;
                break;
            }
            let next: Vec<f64> = next.into_iter().map(|x| x / next_norm).collect();
            let lambda = dot(&next, &mat_vec(&work, &next));
            let delta: f64 = next.iter().zip(&v).map(|(a, b)| (a - b).abs()).sum();
            v = next;
            let converged = (lambda - eigenvalue).abs() < tolerance && delta < tolerance;
            eigenvalue = lambda;
            if converged {
                break;
            }
        }

        if degenerate || eigenvalue.abs() < 1e-12 {
            break;
        }
        trace!(component, iterations, eigenvalue, "power iteration finished");

        for i in 0..n {
            for j in 0..n {
                work[i][j] -= eigenvalue * v[i] * v[j];
            }
        }
        pairs.push(EigenPair {
            value: eigenvalue,
            vector: v,
        });
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn inverse_of_known_matrix() {
        let a = vec![vec![4.0, 7.0], vec![2.0, 6.0]];
        let inv = inverse(&a).expect("invertible");
        let prod = multiply(&a, &inv);
        assert!(approx(prod[0][0], 1.0) && approx(prod[1][1], 1.0));
        assert!(approx(prod[0][1], 0.0) && approx(prod[1][0], 0.0));
    }

    #[test]
    fn singular_matrix_has_no_inverse_but_has_pseudo_inverse() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(inverse(&a).is_none());
        let pinv = pseudo_inverse(&a).expect("regularized inverse");
        // A·A⁺·A ≈ A
        let back = multiply(&multiply(&a, &pinv), &a);
        for i in 0..2 {
            for j in 0..2 {
                assert!((back[i][j] - a[i][j]).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn eigen_of_diagonal_matrix() {
        let a = vec![
            vec![5.0, 0.0, 0.0],
            vec![0.0, 2.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ];
        let pairs = symmetric_eigen(&a, 3, 1000, 1e-10, &Deadline::none()).unwrap();
        assert_eq!(pairs.len(), 3);
        assert!((pairs[0].value - 5.0).abs() < 1e-4);
        assert!((pairs[1].value - 2.0).abs() < 1e-4);
        assert!((pairs[2].value - 1.0).abs() < 1e-4);
        assert!(pairs[0].vector[0].abs() > 0.999);
    }

    #[test]
    fn eigen_stops_on_zero_spectrum() {
        let a = vec![vec![1.0, 1.0], vec![1.0, 1.0]];
        let pairs = symmetric_eigen(&a, 2, 1000, 1e-10, &Deadline::none()).unwrap();
        assert_eq!(pairs.len(), 1);
        assert!((pairs[0].value - 2.0).abs() < 1e-6);
    }

    #[test]
    fn eigen_respects_cancelled_deadline() {
        let deadline = Deadline::none();
        deadline.cancel();
        let a = identity(3);
        let err = symmetric_eigen(&a, 3, 100, 1e-10, &deadline).unwrap_err();
        assert!(matches!(err, DetectionError::ResourceLimitExceeded(_)));
    }
}
