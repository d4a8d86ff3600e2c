use std::sync::Arc;

use vigil_compute::{PatternRecognitionEngine, WindowClass};
use vigil_core::{clamp_unit, DetectionError, DetectionMethodResult, DetectorKind};

use super::{margin_confidence, summarize, DetectionContext, Detector, EntityScore};

/// Sequence analysis over the payload's numeric view: sliding-window
/// subsequence scores blended with neighbourhood z-scores.
pub struct TemporalPatternDetector {
    engine: Arc<PatternRecognitionEngine>,
}

impl TemporalPatternDetector {
    pub fn new(engine: Arc<PatternRecognitionEngine>) -> Self {
        Self { engine }
    }
}

impl Detector for TemporalPatternDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::TemporalPattern
    }

    fn detect(&self, ctx: &DetectionContext) -> Result<DetectionMethodResult, DetectionError> {
        let values = ctx.payload.numeric_series();
        let threshold = ctx.threshold();
        if values.len() < 2 {
            return Ok(DetectionMethodResult::for_kind(self.kind(), 0.0, false)
                .with_confidence(0.5)
                .with_explanation("sequence too short for temporal analysis"));
        }

        let analysis = self.engine.analyze_sequence_with(
            &values,
            ctx.config.pattern.window_size,
            threshold,
            &ctx.deadline,
        )?;

        let scores: Vec<EntityScore> = analysis
            .results
            .iter()
            .enumerate()
            .map(|(i, r)| {
                let score = clamp_unit((r.score + r.local_score.unwrap_or(0.0)) / 2.0);
                EntityScore {
                    label: ctx.payload.entity_label(i),
                    score,
                    flagged: score > threshold,
                }
            })
            .collect();

        let count = |class: WindowClass| {
            analysis.windows.iter().filter(|w| w.class == class).count() as f64
        };
        let anomalous_windows = count(WindowClass::Anomalous);

        let mut result = summarize(self.kind(), &scores)
            .with_diagnostic("windows", analysis.windows.len() as f64)
            .with_diagnostic("anomalous_windows", anomalous_windows)
            .with_diagnostic("periodic_windows", count(WindowClass::Periodic))
            .with_diagnostic("motifs", analysis.motifs.len() as f64);
        result.confidence = Some(margin_confidence(result.score, threshold));

        if let Some(w) = analysis
            .windows
            .iter()
            .filter(|w| w.class == WindowClass::Anomalous)
            .max_by(|a, b| a.score.total_cmp(&b.score))
        {
            result = result.with_explanation(format!(
                "{} anomalous windows; strongest spans [{}, {}) with score {:.2}",
                anomalous_windows, w.start, w.end, w.score
            ));
        }
        if let Some(top) = analysis.motifs.first() {
            result = result.with_explanation(format!(
                "recurring motif {} seen {} times",
                top.pattern, top.occurrences
            ));
        }
        for r in analysis.results.iter().filter(|r| r.is_anomaly).take(3) {
            result.explanations.extend(r.explanations.iter().cloned());
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{Config, Deadline, Payload};

    fn ctx(values: Vec<f64>, window: usize) -> DetectionContext {
        let mut config = Config::default();
        config.pattern.window_size = window;
        DetectionContext::new(Arc::new(Payload::Numeric(values)), Arc::new(config), Deadline::none())
    }

    fn detector() -> TemporalPatternDetector {
        TemporalPatternDetector::new(Arc::new(PatternRecognitionEngine::default()))
    }

    #[test]
    fn trailing_spike_is_flagged() {
        let mut values = vec![1.0; 19];
        values.push(100.0);
        let r = detector().detect(&ctx(values, 10)).unwrap();
        assert!(r.is_anomaly);
        assert_eq!(r.anomalous_entities.last().map(String::as_str), Some("#19"));
        assert!(r.diagnostics["anomalous_windows"] >= 1.0);
        // Spike window scores ~0.905 and the spike's local score is 1.
        assert!((r.score - 0.9526).abs() < 1e-3, "score {}", r.score);
        assert!((r.confidence.unwrap() - 0.7526).abs() < 1e-3);
    }

    #[test]
    fn single_value_is_neutral() {
        let r = detector().detect(&ctx(vec![3.0], 10)).unwrap();
        assert!(!r.is_anomaly);
        assert_eq!(r.score, 0.0);
        assert_eq!(r.explanations.len(), 1);
    }

    #[test]
    fn cancelled_deadline_aborts() {
        let c = ctx((0..200).map(|i| (i % 7) as f64).collect(), 10);
        c.deadline.cancel();
        assert!(matches!(
            detector().detect(&c),
            Err(DetectionError::ResourceLimitExceeded(_))
        ));
    }
}
