//! Graph-centrality and sequence pattern analysis.

pub mod graph;
pub mod sequence;
pub mod types;

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use vigil_core::{Deadline, DetectionError, GraphEdge, GraphNode, PatternConfig};
use vigil_graph::Graph;

use crate::algorithms::graph_stats::ExtendedGraphStats;
pub use types::{
    GraphAnalysis, GraphMetrics, Motif, MotifType, PatternAnomalyResult, SequenceAnalysis,
    WindowAnalysis, WindowClass,
};

/// How many recent graph summaries are kept.
const RECENT_GRAPHS: usize = 32;

/// Stateless per call apart from a bounded log of recently analyzed graphs.
pub struct PatternRecognitionEngine {
    config: PatternConfig,
    recent_graphs: Mutex<VecDeque<ExtendedGraphStats>>,
}

impl Default for PatternRecognitionEngine {
    fn default() -> Self {
        Self::new(PatternConfig::default())
    }
}

impl PatternRecognitionEngine {
    pub fn new(config: PatternConfig) -> Self {
        Self {
            config,
            recent_graphs: Mutex::new(VecDeque::with_capacity(RECENT_GRAPHS)),
        }
    }

    pub fn config(&self) -> &PatternConfig {
        &self.config
    }

    /// One result per node.
    pub fn analyze_graph(
        &self,
        nodes: &[GraphNode],
        edges: &[GraphEdge],
    ) -> Result<Vec<PatternAnomalyResult>, DetectionError> {
        let graph = Graph::from_parts(nodes, edges);
        Ok(self
            .analyze_graph_with(&graph, self.config.graph_threshold, &Deadline::none())?
            .results)
    }

    pub fn analyze_graph_with(
        &self,
        graph: &Graph,
        threshold: f64,
        deadline: &Deadline,
    ) -> Result<GraphAnalysis, DetectionError> {
        let analysis = graph::analyze(graph, &self.config, threshold, deadline)?;
        let mut recent = self
            .recent_graphs
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if recent.len() == RECENT_GRAPHS {
            recent.pop_front();
        }
        recent.push_back(analysis.stats.clone());
        Ok(analysis)
    }

    /// One result per index.
    pub fn analyze_sequence(&self, values: &[f64]) -> Result<Vec<PatternAnomalyResult>, DetectionError> {
        Ok(self
            .analyze_sequence_with(values, self.config.window_size, self.config.sequence_threshold, &Deadline::none())?
            .results)
    }

    pub fn analyze_sequence_with(
        &self,
        values: &[f64],
        window_size: usize,
        threshold: f64,
        deadline: &Deadline,
    ) -> Result<SequenceAnalysis, DetectionError> {
        let config = PatternConfig {
            window_size,
            ..self.config.clone()
        };
        sequence::analyze(values, &config, threshold, deadline)
    }

    /// Summaries of the most recently analyzed graphs, oldest first.
    pub fn recent_graphs(&self) -> Vec<ExtendedGraphStats> {
        self.recent_graphs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_star_graph() {
        let engine = PatternRecognitionEngine::default();
        let edges: Vec<GraphEdge> = (0..10)
            .map(|i| GraphEdge::new("hub", format!("leaf{i}")))
            .collect();
        let results = engine.analyze_graph(&[], &edges).unwrap();
        let best = results
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .unwrap();
        assert_eq!(best.entity, "hub");
        assert_eq!(engine.recent_graphs().len(), 1);
        assert_eq!(engine.recent_graphs()[0].max_degree, ("hub".to_string(), 10));
    }

    #[test]
    fn scenario_spike_sequence() {
        let engine = PatternRecognitionEngine::default();
        let mut values = vec![1.0; 19];
        values.push(100.0);
        let analysis = engine
            .analyze_sequence_with(&values, 10, 0.7, &Deadline::none())
            .unwrap();
        let spike_window = analysis.windows.iter().find(|w| w.contains(19)).unwrap();
        assert_eq!(spike_window.class, WindowClass::Anomalous);
        assert!(analysis
            .windows
            .iter()
            .filter(|w| w.end <= 19)
            .all(|w| w.class == WindowClass::Normal));
    }

    #[test]
    fn recent_graph_log_is_bounded() {
        let engine = PatternRecognitionEngine::default();
        let edges = vec![GraphEdge::new("a", "b")];
        for _ in 0..(RECENT_GRAPHS + 5) {
            engine.analyze_graph(&[], &edges).unwrap();
        }
        assert_eq!(engine.recent_graphs().len(), RECENT_GRAPHS);
    }

    #[test]
    fn degenerate_sequence_degrades_gracefully() {
        let engine = PatternRecognitionEngine::default();
        assert!(engine.analyze_sequence(&[]).unwrap().is_empty());
        assert!(engine.analyze_sequence(&[3.0]).unwrap().is_empty());
    }
}
