use serde::Serialize;
use vigil_graph::{Graph, NodeIndex};

/// Degree of a single node in the undirected view.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DegreeInfo {
    pub degree: usize,
    /// Sum of incident edge weights.
    pub strength: f64,
    /// Degree divided by `n - 1`.
    pub centrality: f64,
}

/// Degree, weighted strength and normalized degree centrality per node,
/// indexed by [`NodeIndex`].
pub fn degree_centrality(graph: &Graph) -> Vec<DegreeInfo> {
    let n = graph.node_count();
    let mut strength = vec![0.0; n];
    for edge in &graph.edges {
        strength[edge.source] += edge.weight;
        strength[edge.target] += edge.weight;
    }
    let norm = if n > 1 { (n - 1) as f64 } else { 1.0 };

    (0..n)
        .map(|idx: NodeIndex| {
            let degree = graph.degree(idx);
            DegreeInfo {
                degree,
                strength: strength[idx],
                centrality: degree as f64 / norm,
            }
        })
        .collect()
}
