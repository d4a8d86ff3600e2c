use std::sync::Arc;

use vigil_compute::{MultivariateAnomalyResult, MultivariateDetector};
use vigil_core::{
    DetectionError, DetectionMethodResult, DetectorKind, MultivariateDataPoint, Payload,
};

use super::{margin_confidence, summarize, DetectionContext, Detector, EntityScore};

/// Delay-embedding depth for non-record payloads.
const EMBEDDING_LAGS: usize = 3;
/// Fewest points a model is fitted on.
const MIN_SELF_FIT_POINTS: usize = 3;

/// Heavyweight PCA / ICA / Mahalanobis ensemble.
///
/// Scores against the shared, orchestrator-trained model when the payload's
/// feature set matches it, and fits a throwaway model on the payload itself
/// otherwise.
pub struct MultivariateEnsembleDetector {
    shared: Arc<MultivariateDetector>,
}

impl MultivariateEnsembleDetector {
    pub fn new(shared: Arc<MultivariateDetector>) -> Self {
        Self { shared }
    }
}

/// Records to score plus the payload index each one reports under.
struct Embedded {
    points: Vec<MultivariateDataPoint>,
    offset: usize,
}

fn embed(payload: &Payload) -> Embedded {
    if let Payload::Multivariate(points) = payload {
        return Embedded {
            points: points.clone(),
            offset: 0,
        };
    }
    let values = payload.numeric_series();
    let points = values
        .windows(EMBEDDING_LAGS)
        .map(|w| {
            MultivariateDataPoint::new(
                (0..EMBEDDING_LAGS).map(|lag| (format!("lag{lag}"), w[EMBEDDING_LAGS - 1 - lag])),
            )
        })
        .collect();
    Embedded {
        points,
        offset: EMBEDDING_LAGS - 1,
    }
}

impl Detector for MultivariateEnsembleDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::MultivariateEnsemble
    }

    fn train(&self, payload: &Payload) -> Result<(), DetectionError> {
        let embedded = embed(payload);
        self.shared.train(&embedded.points)
    }

    fn detect(&self, ctx: &DetectionContext) -> Result<DetectionMethodResult, DetectionError> {
        let threshold = ctx.threshold();
        let Embedded { points, offset } = embed(&ctx.payload);

        let use_shared = self
            .shared
            .model()
            .is_some_and(|m| !points.is_empty() && points.iter().all(|p| m.matches(p)));

        let results: Vec<MultivariateAnomalyResult> = if use_shared {
            self.shared.detect_with(&points, threshold, &ctx.deadline)?
        } else {
            if points.len() < MIN_SELF_FIT_POINTS {
                return Ok(DetectionMethodResult::for_kind(self.kind(), 0.0, false)
                    .with_confidence(0.5)
                    .with_explanation("too few records to fit a multivariate model"));
            }
            let local = MultivariateDetector::new(ctx.config.multivariate.clone());
            local.train_with_deadline(&points, &ctx.deadline)?;
            local.detect_with(&points, threshold, &ctx.deadline)?
        };

        let scores: Vec<EntityScore> = results
            .iter()
            .enumerate()
            .map(|(i, r)| EntityScore {
                label: r
                    .id
                    .clone()
                    .unwrap_or_else(|| ctx.payload.entity_label(i + offset)),
                score: r.ensemble_score,
                flagged: r.is_anomaly,
            })
            .collect();

        let mut result = summarize(self.kind(), &scores)
            .with_diagnostic("self_fitted", if use_shared { 0.0 } else { 1.0 });
        result.confidence = Some(margin_confidence(result.score, threshold));

        if let Some((i, top)) = results
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.ensemble_score.total_cmp(&b.1.ensemble_score))
        {
            result = result
                .with_diagnostic("pca_score", top.pca_score)
                .with_diagnostic("mahalanobis_score", top.mahalanobis_score)
                .with_diagnostic("ica_score", top.ica_score)
                .with_diagnostic("correlation_score", top.correlation_score);
            for (feature, z) in &top.feature_contributions {
                result = result.with_diagnostic(format!("z.{feature}"), *z);
            }
            if top.is_anomaly {
                let label = &scores[i].label;
                for e in &top.explanations {
                    result = result.with_explanation(format!("{label}: {e}"));
                }
            }
        }
        Ok(result)
    }
}
