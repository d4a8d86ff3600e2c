//! Sequence analysis: symbolic motifs, sliding-window subsequence scoring
//! and neighbourhood z-scores.

use std::collections::HashMap;

use tracing::debug;
use vigil_core::{clamp_unit, Deadline, DetectionError, PatternConfig, Severity};

use super::types::{Motif, MotifType, PatternAnomalyResult, SequenceAnalysis, WindowAnalysis, WindowClass};
use crate::algorithms::stats;

/// Autocorrelation above this marks a window as periodic.
const PERIODIC_ACF: f64 = 0.8;
/// Lags 1..=9 are inspected for periodicity.
const MAX_PERIOD_LAG: usize = 9;
const MAX_LOCAL_RADIUS: usize = 10;

pub fn analyze(
    values: &[f64],
    config: &PatternConfig,
    threshold: f64,
    deadline: &Deadline,
) -> Result<SequenceAnalysis, DetectionError> {
    if values.len() < 2 {
        return Ok(SequenceAnalysis::default());
    }

    let motifs = discover_motifs(values, config);
    let windows = sliding_windows(values, config.window_size, threshold, deadline)?;
    let local = local_scores(values);

    let results = (0..values.len())
        .map(|i| {
            let score = windows
                .iter()
                .filter(|w| w.class == WindowClass::Anomalous && w.contains(i))
                .map(|w| w.score)
                .fold(0.0, f64::max);
            let is_anomaly = score > threshold;
            let mut explanations = Vec::new();
            if is_anomaly {
                explanations.push(format!(
                    "index {i} lies in an anomalous window (score {score:.2})"
                ));
            }
            if local[i] >= 1.0 {
                explanations.push(format!(
                    "value {:.3} departs sharply from its neighbourhood",
                    values[i]
                ));
            }
            PatternAnomalyResult {
                entity: i.to_string(),
                index: Some(i),
                score,
                is_anomaly,
                severity: Severity::from_score(score),
                local_score: Some(local[i]),
                graph_metrics: None,
                motifs: Vec::new(),
                explanations,
            }
        })
        .collect();

    debug!(
        points = values.len(),
        windows = windows.len(),
        motifs = motifs.len(),
        "sequence analysis finished"
    );

    Ok(SequenceAnalysis {
        results,
        windows,
        motifs,
    })
}

/// Equal-width binning over `[min, max]`. A constant series maps to 0.
pub fn symbolize(values: &[f64], bins: usize) -> Vec<u8> {
    let bins = bins.clamp(1, u8::MAX as usize);
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    if !range.is_finite() || range <= f64::EPSILON {
        return vec![0; values.len()];
    }
    values
        .iter()
        .map(|v| {
            let bin = ((v - min) / range * bins as f64).floor() as usize;
            bin.min(bins - 1) as u8
        })
        .collect()
}

/// Symbol substrings seen at least twice, ranked by z-score against a
/// uniform random-symbol null model.
pub fn discover_motifs(values: &[f64], config: &PatternConfig) -> Vec<Motif> {
    let symbols = symbolize(values, config.symbol_bins);
    let n = symbols.len();
    let alphabet = config.symbol_bins.max(1) as f64;
    let mut motifs = Vec::new();

    for len in config.min_motif_len.max(1)..=config.max_motif_len.min(n) {
        let mut seen: HashMap<&[u8], Vec<usize>> = HashMap::new();
        for start in 0..=(n - len) {
            seen.entry(&symbols[start..start + len]).or_default().push(start);
        }
        let expected = (n - len + 1) as f64 / alphabet.powi(len as i32);
        for (pattern, positions) in seen {
            if positions.len() < 2 {
                continue;
            }
            let observed = positions.len() as f64;
            let significance = if expected > 0.0 {
                (observed - expected) / expected.sqrt()
            } else {
                0.0
            };
            motifs.push(Motif {
                motif_type: MotifType::Sequence,
                pattern: pattern.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(","),
                members: Vec::new(),
                occurrences: positions.len(),
                positions,
                significance,
            });
        }
    }

    motifs.sort_by(|a, b| {
        b.significance
            .total_cmp(&a.significance)
            .then_with(|| a.pattern.cmp(&b.pattern))
    });
    motifs.truncate(config.max_motifs);
    motifs
}

/// Width-`window` windows stepping by one. A series shorter than the window
/// is a single window.
pub fn sliding_windows(
    values: &[f64],
    window: usize,
    threshold: f64,
    deadline: &Deadline,
) -> Result<Vec<WindowAnalysis>, DetectionError> {
    let n = values.len();
    if n == 0 {
        return Ok(Vec::new());
    }
    let width = window.clamp(1, n);

    let global_mean = stats::mean(values);
    let global_var = stats::variance(values);
    let global_std = global_var.sqrt();
    let global_slope = stats::linear_trend(values);

    let mut out = Vec::with_capacity(n - width + 1);
    for start in 0..=(n - width) {
        deadline.check_every(start)?;
        let slice = &values[start..start + width];
        let mean = stats::mean(slice);
        let variance = stats::variance(slice);
        let slope = stats::linear_trend(slice);

        let mean_shift = if global_std > f64::EPSILON {
            (mean - global_mean).abs() / global_std
        } else {
            0.0
        };
        // Only variance bursts count; calmer windows are not penalized.
        let variance_term = if variance > f64::EPSILON && global_var > f64::EPSILON {
            (variance / global_var).ln().max(0.0)
        } else {
            0.0
        };
        // Slope difference accumulated over the window, in global std units.
        let trend_term = if global_std > f64::EPSILON {
            (slope - global_slope).abs() * width as f64 / global_std
        } else {
            0.0
        };
        let score = ((mean_shift + variance_term + trend_term) / 3.0).min(1.0);

        let max_lag = MAX_PERIOD_LAG.min(width.saturating_sub(1));
        let max_autocorrelation = stats::max_abs_autocorrelation(slice, max_lag);
        let class = if score > threshold {
            WindowClass::Anomalous
        } else if max_autocorrelation > PERIODIC_ACF {
            WindowClass::Periodic
        } else {
            WindowClass::Normal
        };

        out.push(WindowAnalysis {
            start,
            end: start + width,
            mean,
            variance,
            slope,
            max_autocorrelation,
            score,
            class,
        });
    }
    Ok(out)
}

/// Per-index |z| against the surrounding `±r` values (centre excluded),
/// divided by 3 and clipped. `r = max(1, min(10, n/10))`.
pub fn local_scores(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let radius = (n / 10).clamp(1, MAX_LOCAL_RADIUS);
    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius + 1).min(n);
            let neighbours: Vec<f64> = (lo..hi).filter(|&j| j != i).map(|j| values[j]).collect();
            if neighbours.is_empty() {
                return 0.0;
            }
            let mean = stats::mean(&neighbours);
            let std = stats::std_dev(&neighbours);
            if std <= f64::EPSILON {
                return if (values[i] - mean).abs() > f64::EPSILON { 1.0 } else { 0.0 };
            }
            clamp_unit((values[i] - mean).abs() / std / 3.0)
        })
        .collect()
}
