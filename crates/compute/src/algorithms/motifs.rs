//! Small structural motifs: triangles and stars.

use vigil_graph::{Graph, NodeIndex};

/// All triangles as sorted node triples.
pub fn triangles(graph: &Graph) -> Vec<[NodeIndex; 3]> {
    let mut out = Vec::new();
    for a in 0..graph.node_count() {
        let na = graph.neighbors(a);
        for &b in na.iter().filter(|&&b| b > a) {
            for &c in graph.neighbors(b).iter().filter(|&&c| c > b) {
                if graph.has_edge(a, c) {
                    out.push([a, b, c]);
                }
            }
        }
    }
    out
}

/// Star centred on each node with at least `min_degree` neighbours:
/// `(centre, leaves)`.
pub fn stars(graph: &Graph, min_degree: usize) -> Vec<(NodeIndex, Vec<NodeIndex>)> {
    (0..graph.node_count())
        .filter(|&idx| graph.degree(idx) >= min_degree)
        .map(|idx| (idx, graph.neighbors(idx).to_vec()))
        .collect()
}

/// `n choose 3` as a float.
pub fn triple_count(n: usize) -> f64 {
    if n < 3 {
        return 0.0;
    }
    let n = n as f64;
    n * (n - 1.0) * (n - 2.0) / 6.0
}
