use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use vigil_graph::Graph;

/// Structural summary of a graph.
///
/// Includes average degree, density and connected component count using
/// union-find.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedGraphStats {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub edges_by_type: BTreeMap<String, usize>,
    pub avg_degree: f64,
    /// Node id and degree of the best-connected node.
    pub max_degree: (String, usize),
    pub connected_components: usize,
    pub density: f64,
    pub avg_clustering: f64,
}

pub fn extended_graph_stats(graph: &Graph) -> ExtendedGraphStats {
    let base = graph.stats();
    let total_nodes = base.node_count;
    let total_edges = base.edge_count;

    let mut max_degree = (String::new(), 0usize);
    let mut total_degree = 0usize;
    for idx in 0..total_nodes {
        let deg = graph.degree(idx);
        total_degree += deg;
        if deg > max_degree.1 {
            max_degree = (graph.node_id(idx).to_string(), deg);
        }
    }

    let avg_degree = if total_nodes > 0 {
        total_degree as f64 / total_nodes as f64
    } else {
        0.0
    };

    let clustering = clustering_coefficients(graph);
    let avg_clustering = if clustering.is_empty() {
        0.0
    } else {
        clustering.iter().sum::<f64>() / clustering.len() as f64
    };

    ExtendedGraphStats {
        total_nodes,
        total_edges,
        edges_by_type: base.edges_by_type,
        avg_degree,
        max_degree,
        connected_components: count_connected_components(graph),
        density: density(graph),
        avg_clustering,
    }
}

/// `2E / (N(N-1))`, zero below two nodes.
pub fn density(graph: &Graph) -> f64 {
    let n = graph.node_count() as f64;
    if n < 2.0 {
        return 0.0;
    }
    (2.0 * graph.edge_count() as f64) / (n * (n - 1.0))
}

/// Local clustering coefficient per node: closed neighbour pairs over all
/// neighbour pairs. Nodes with fewer than two neighbours score 0.
pub fn clustering_coefficients(graph: &Graph) -> Vec<f64> {
    (0..graph.node_count())
        .map(|idx| {
            let neighbors = graph.neighbors(idx);
            let k = neighbors.len();
            if k < 2 {
                return 0.0;
            }
            let mut links = 0usize;
            for (i, &a) in neighbors.iter().enumerate() {
                for &b in &neighbors[i + 1..] {
                    if graph.has_edge(a, b) {
                        links += 1;
                    }
                }
            }
            2.0 * links as f64 / (k * (k - 1)) as f64
        })
        .collect()
}

/// Union-Find (disjoint set) with path compression and union by rank.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = x;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

pub fn count_connected_components(graph: &Graph) -> usize {
    let n = graph.node_count();
    if n == 0 {
        return 0;
    }
    let mut uf = UnionFind::new(n);
    for edge in &graph.edges {
        uf.union(edge.source, edge.target);
    }
    (0..n).map(|i| uf.find(i)).collect::<HashSet<_>>().len()
}
