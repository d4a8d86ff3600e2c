use vigil_compute::algorithms::stats;
use vigil_core::{clamp_unit, DetectionError, DetectionMethodResult, DetectorKind};

use super::{summarize, DetectionContext, Detector, EntityScore};

const Z_LIMIT: f64 = 3.0;
const MODIFIED_Z_LIMIT: f64 = 3.5;
/// Scales MAD to the standard deviation of a normal distribution.
const MAD_SCALE: f64 = 0.6745;
const IQR_FENCE: f64 = 1.5;

/// Lightweight baseline: z-score, IQR fence and MAD modified z-score
/// averaged per value.
pub struct StatisticalEnsembleDetector;

/// Sub-test scores for one value, each in [0, 1].
#[derive(Debug, Clone, Copy)]
struct SubScores {
    z: f64,
    iqr: f64,
    mad: f64,
}

impl SubScores {
    fn mean(&self) -> f64 {
        (self.z + self.iqr + self.mad) / 3.0
    }

    fn fired(&self) -> usize {
        [self.z >= 1.0, self.iqr > 0.0, self.mad >= 1.0]
            .into_iter()
            .filter(|f| *f)
            .count()
    }
}

struct Baseline {
    mean: f64,
    std: f64,
    fences: (f64, f64),
    iqr: f64,
    median: f64,
    mad: f64,
}

impl Baseline {
    fn of(values: &[f64]) -> Self {
        let fences = stats::iqr_fences(values, IQR_FENCE);
        Self {
            mean: stats::mean(values),
            std: stats::std_dev(values),
            iqr: (fences.1 - fences.0) / (1.0 + 2.0 * IQR_FENCE),
            fences,
            median: stats::median(values),
            mad: stats::mad(values),
        }
    }

    fn score(&self, x: f64) -> SubScores {
        let z = clamp_unit(stats::z_score(x, self.mean, self.std).abs() / Z_LIMIT);

        let outside = (self.fences.0 - x).max(x - self.fences.1).max(0.0);
        let iqr = if outside <= 0.0 {
            0.0
        } else if self.iqr > f64::EPSILON {
            clamp_unit(0.5 + outside / self.iqr)
        } else {
            1.0
        };

        let deviation = (x - self.median).abs();
        let mad = if self.mad > f64::EPSILON {
            clamp_unit(MAD_SCALE * deviation / self.mad / MODIFIED_Z_LIMIT)
        } else if deviation > f64::EPSILON {
            1.0
        } else {
            0.0
        };

        SubScores { z, iqr, mad }
    }
}

impl Detector for StatisticalEnsembleDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::StatisticalEnsemble
    }

    fn detect(&self, ctx: &DetectionContext) -> Result<DetectionMethodResult, DetectionError> {
        let values = ctx.payload.numeric_series();
        let threshold = ctx.threshold();
        if values.is_empty() {
            return Ok(DetectionMethodResult::for_kind(self.kind(), 0.0, false)
                .with_confidence(0.5)
                .with_explanation("no numeric values to test"));
        }

        let baseline = Baseline::of(&values);
        let mut subs = Vec::with_capacity(values.len());
        let mut scores = Vec::with_capacity(values.len());
        for (i, &x) in values.iter().enumerate() {
            ctx.deadline.check_every(i)?;
            let sub = baseline.score(x);
            let score = sub.mean();
            scores.push(EntityScore {
                label: ctx.payload.entity_label(i),
                score,
                flagged: score > threshold,
            });
            subs.push(sub);
        }

        let top = scores
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.score.total_cmp(&b.1.score))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let fired = subs[top].fired();
        // Fraction of sub-tests that agree with the majority on the top value.
        let agreement = fired.max(3 - fired) as f64 / 3.0;

        let mut result = summarize(self.kind(), &scores)
            .with_confidence(agreement)
            .with_diagnostic("mean", baseline.mean)
            .with_diagnostic("std", baseline.std)
            .with_diagnostic("median", baseline.median)
            .with_diagnostic("mad", baseline.mad)
            .with_diagnostic("top_z_score", subs[top].z * Z_LIMIT);

        if result.is_anomaly {
            let n_anomalous = result.anomalous_entities.len();
            result = result.with_explanation(format!(
                "{} of {} values exceed the baseline threshold; most extreme is {} ({:.3}, {} of 3 tests fired)",
                n_anomalous,
                values.len(),
                scores[top].label,
                values[top],
                fired
            ));
        }
        Ok(result)
    }
}
