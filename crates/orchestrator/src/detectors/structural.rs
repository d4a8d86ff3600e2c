use std::sync::Arc;

use vigil_compute::algorithms::degree::degree_centrality;
use vigil_compute::{MotifType, PatternRecognitionEngine};
use vigil_core::{DetectionError, DetectionMethodResult, DetectorKind, Payload};
use vigil_graph::Graph;

use super::{margin_confidence, summarize, DetectionContext, Detector, EntityScore};

/// Node-level structural scoring. Graph payloads are analyzed as given;
/// anything else goes through the horizontal visibility graph of its
/// numeric view.
pub struct GraphStructuralDetector {
    engine: Arc<PatternRecognitionEngine>,
}

impl GraphStructuralDetector {
    pub fn new(engine: Arc<PatternRecognitionEngine>) -> Self {
        Self { engine }
    }
}

impl Detector for GraphStructuralDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::GraphStructural
    }

    fn detect(&self, ctx: &DetectionContext) -> Result<DetectionMethodResult, DetectionError> {
        let threshold = ctx.threshold();
        let (graph, native) = match ctx.payload.as_ref() {
            Payload::Graph(g) => (Graph::from_payload(g), true),
            other => (Graph::horizontal_visibility(&other.numeric_series()), false),
        };
        if graph.node_count() < 2 {
            return Ok(DetectionMethodResult::for_kind(self.kind(), 0.0, false)
                .with_confidence(0.5)
                .with_explanation("graph has fewer than two nodes"));
        }

        let analysis = self
            .engine
            .analyze_graph_with(&graph, threshold, &ctx.deadline)?;

        let scores: Vec<EntityScore> = analysis
            .results
            .iter()
            .map(|r| EntityScore {
                label: match (native, r.index) {
                    (false, Some(i)) => ctx.payload.entity_label(i),
                    _ => r.entity.clone(),
                },
                score: r.score,
                flagged: r.is_anomaly,
            })
            .collect();

        let motif_count = |t: MotifType| {
            analysis.motifs.iter().filter(|m| m.motif_type == t).count() as f64
        };
        let max_centrality = degree_centrality(&graph)
            .iter()
            .map(|d| d.centrality)
            .fold(0.0, f64::max);
        let stats = &analysis.stats;

        let mut result = summarize(self.kind(), &scores)
            .with_diagnostic("density", stats.density)
            .with_diagnostic("connected_components", stats.connected_components as f64)
            .with_diagnostic("avg_degree", stats.avg_degree)
            .with_diagnostic("avg_clustering", stats.avg_clustering)
            .with_diagnostic("max_degree_centrality", max_centrality)
            .with_diagnostic("triangles", motif_count(MotifType::Triangle))
            .with_diagnostic("stars", motif_count(MotifType::Star));
        result.confidence = Some(margin_confidence(result.score, threshold));

        if !native {
            result = result.with_explanation("scored on the visibility graph of the numeric series");
        }
        for r in analysis.results.iter().filter(|r| r.is_anomaly) {
            for e in &r.explanations {
                result = result.with_explanation(format!("node {}: {e}", r.entity));
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{Config, Deadline, GraphEdge, GraphPayload};

    fn detector() -> GraphStructuralDetector {
        GraphStructuralDetector::new(Arc::new(PatternRecognitionEngine::default()))
    }

    fn ctx(payload: Payload) -> DetectionContext {
        DetectionContext::new(Arc::new(payload), Arc::new(Config::default()), Deadline::none())
    }

    #[test]
    fn star_centre_is_the_anomaly() {
        let edges = (0..10)
            .map(|i| GraphEdge::new("hub", format!("leaf{i}")))
            .collect();
        let payload = Payload::Graph(GraphPayload::new(Vec::new(), edges));
        let r = detector().detect(&ctx(payload)).unwrap();
        assert!(r.is_anomaly);
        assert_eq!(r.score, 1.0);
        assert_eq!(r.anomalous_entities, vec!["hub"]);
        assert_eq!(r.diagnostics["stars"], 1.0);
        assert_eq!(r.diagnostics["max_degree_centrality"], 1.0);
        assert!(r.explanations.iter().any(|e| e.starts_with("node hub")));
    }

    #[test]
    fn numeric_series_uses_visibility_graph() {
        let r = detector()
            .detect(&ctx(Payload::Numeric(vec![1.0, 2.0, 1.0, 2.0, 1.0, 2.0])))
            .unwrap();
        assert_eq!(r.diagnostics["entities"], 6.0);
        assert_eq!(r.diagnostics["connected_components"], 1.0);
        assert!(r.explanations[0].contains("visibility graph"));
    }

    #[test]
    fn tiny_graph_is_neutral() {
        let r = detector().detect(&ctx(Payload::Numeric(vec![5.0]))).unwrap();
        assert!(!r.is_anomaly);
        assert_eq!(r.score, 0.0);
    }
}
