//! Descriptive statistics over slices and feature matrices.
//!
//! Variance and standard deviation are population statistics (divide by n)
//! unless the name says otherwise; covariance matrices use the sample
//! estimator (n − 1, floored at 1).

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Pearson correlation. Zero when either side has no variance.
pub fn correlation(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean(a), mean(b));
    let mut cov = 0.0;
    let mut va = 0.0;
    let mut vb = 0.0;
    for i in 0..n {
        let da = a[i] - ma;
        let db = b[i] - mb;
        cov += da * db;
        va += da * da;
        vb += db * db;
    }
    let denom = (va * vb).sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    (cov / denom).clamp(-1.0, 1.0)
}

/// Least-squares slope of `values` against their index.
pub fn linear_trend(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    if den <= f64::EPSILON {
        0.0
    } else {
        num / den
    }
}

/// Sample autocorrelation at `lag`. Zero for constant series or lags
/// beyond the series length.
pub fn autocorrelation(values: &[f64], lag: usize) -> f64 {
    let n = values.len();
    if lag == 0 {
        return if n > 1 && variance(values) > f64::EPSILON { 1.0 } else { 0.0 };
    }
    if lag >= n {
        return 0.0;
    }
    let m = mean(values);
    let denom: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    let num: f64 = (0..n - lag)
        .map(|i| (values[i] - m) * (values[i + lag] - m))
        .sum();
    num / denom
}

/// Maximum |autocorrelation| over lags `1..=max_lag`.
pub fn max_abs_autocorrelation(values: &[f64], max_lag: usize) -> f64 {
    (1..=max_lag)
        .map(|lag| autocorrelation(values, lag).abs())
        .fold(0.0, f64::max)
}

/// Quantile with linear interpolation between order statistics.
pub fn quantile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, q)
}

pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

pub fn median(values: &[f64]) -> f64 {
    quantile(values, 0.5)
}

/// Tukey fences `(q1 - k·IQR, q3 + k·IQR)`.
pub fn iqr_fences(values: &[f64], k: f64) -> (f64, f64) {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let q1 = quantile_sorted(&sorted, 0.25);
    let q3 = quantile_sorted(&sorted, 0.75);
    let iqr = q3 - q1;
    (q1 - k * iqr, q3 + k * iqr)
}

/// Whether any value lies outside the 1.5×IQR fences.
pub fn has_iqr_outliers(values: &[f64]) -> bool {
    if values.len() < 4 {
        return false;
    }
    let (lo, hi) = iqr_fences(values, 1.5);
    values.iter().any(|&v| v < lo || v > hi)
}

/// Median absolute deviation from the median.
pub fn mad(values: &[f64]) -> f64 {
    let med = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
    median(&deviations)
}

/// Compute population-level mean and stddev per feature dimension.
///
/// Returns (means, stddevs). Zero-variance dimensions report a stddev of 0.
pub fn column_stats(rows: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    if rows.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let dim = rows[0].len();
    let n = rows.len() as f64;

    let mut means = vec![0.0; dim];
    for row in rows {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in &mut means {
        *m /= n;
    }

    let mut var = vec![0.0; dim];
    for row in rows {
        for i in 0..dim.min(row.len()) {
            var[i] += (row[i] - means[i]).powi(2);
        }
    }
    let stds = var.iter().map(|v| (v / n).sqrt()).collect();
    (means, stds)
}

/// Sample covariance matrix of `rows` around `means`.
pub fn covariance_matrix(rows: &[Vec<f64>], means: &[f64]) -> Vec<Vec<f64>> {
    let d = means.len();
    let mut cov = vec![vec![0.0; d]; d];
    for row in rows {
        for i in 0..d {
            let di = row[i] - means[i];
            for j in i..d {
                cov[i][j] += di * (row[j] - means[j]);
            }
        }
    }
    let norm = (rows.len() as f64 - 1.0).max(1.0);
    for i in 0..d {
        for j in i..d {
            cov[i][j] /= norm;
            cov[j][i] = cov[i][j];
        }
    }
    cov
}

/// Pearson correlation matrix of the columns of `rows`.
pub fn correlation_matrix(rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let d = rows.first().map_or(0, Vec::len);
    let columns: Vec<Vec<f64>> = (0..d)
        .map(|j| rows.iter().map(|r| r[j]).collect())
        .collect();
    let mut out = vec![vec![0.0; d]; d];
    for i in 0..d {
        out[i][i] = if variance(&columns[i]) > f64::EPSILON { 1.0 } else { 0.0 };
        for j in (i + 1)..d {
            let c = correlation(&columns[i], &columns[j]);
            out[i][j] = c;
            out[j][i] = c;
        }
    }
    out
}

/// z-score of `value`, zero when `std` is degenerate.
pub fn z_score(value: f64, mean: f64, std: f64) -> f64 {
    if std <= f64::EPSILON {
        0.0
    } else {
        (value - mean) / std
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_and_variance() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&v) - 5.0).abs() < 1e-12);
        assert!((variance(&v) - 4.0).abs() < 1e-12);
        assert!((std_dev(&v) - 2.0).abs() < 1e-12);
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(variance(&[3.0]), 0.0);
    }

    #[test]
    fn correlation_sign_and_degenerate() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        let c = [4.0, 3.0, 2.0, 1.0];
        assert!((correlation(&a, &b) - 1.0).abs() < 1e-12);
        assert!((correlation(&a, &c) + 1.0).abs() < 1e-12);
        assert_eq!(correlation(&a, &[1.0, 1.0, 1.0, 1.0]), 0.0);
    }

    #[test]
    fn trend_of_line_is_its_slope() {
        let v: Vec<f64> = (0..10).map(|i| 3.0 + 0.5 * i as f64).collect();
        assert!((linear_trend(&v) - 0.5).abs() < 1e-12);
        assert_eq!(linear_trend(&[1.0; 5]), 0.0);
    }

    #[test]
    fn autocorrelation_detects_period() {
        let v: Vec<f64> = (0..40).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert!(autocorrelation(&v, 2) > 0.9);
        assert!(autocorrelation(&v, 1) < -0.9);
        assert_eq!(autocorrelation(&[5.0; 10], 1), 0.0);
        assert!(max_abs_autocorrelation(&v, 3) > 0.9);
    }

    #[test]
    fn quantiles_interpolate() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&v, 0.5) - 2.5).abs() < 1e-12);
        assert_eq!(quantile(&v, 0.0), 1.0);
        assert_eq!(quantile(&v, 1.0), 4.0);
    }

    #[test]
    fn iqr_outlier_detection() {
        let mut v: Vec<f64> = (0..20).map(|i| (i % 5) as f64).collect();
        assert!(!has_iqr_outliers(&v));
        v.push(100.0);
        assert!(has_iqr_outliers(&v));
    }

    #[test]
    fn column_stats_and_covariance() {
        let rows = vec![vec![1.0, 2.0], vec![3.0, 6.0]];
        let (means, stds) = column_stats(&rows);
        assert_eq!(means, vec![2.0, 4.0]);
        assert!((stds[0] - 1.0).abs() < 1e-12);
        assert!((stds[1] - 2.0).abs() < 1e-12);

        let cov = covariance_matrix(&rows, &means);
        assert!((cov[0][0] - 2.0).abs() < 1e-12);
        assert!((cov[0][1] - 4.0).abs() < 1e-12);
        assert_eq!(cov[0][1], cov[1][0]);
    }

    #[test]
    fn correlation_matrix_diagonal() {
        let rows = vec![vec![1.0, 5.0, 2.0], vec![2.0, 5.0, 4.0], vec![3.0, 5.0, 6.5]];
        let m = correlation_matrix(&rows);
        assert_eq!(m[0][0], 1.0);
        assert_eq!(m[1][1], 0.0, "constant column has no self-correlation");
        assert!(m[0][2] > 0.99);
        assert_eq!(m[0][1], 0.0);
    }

    #[test]
    fn mad_of_symmetric_data() {
        assert!((mad(&[1.0, 2.0, 3.0, 4.0, 5.0]) - 1.0).abs() < 1e-12);
    }
}
