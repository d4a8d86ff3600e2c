//! Per-call graph built from node and edge lists.
//!
//! Nodes get dense indices in first-seen order. Edges are undirected for
//! connectivity: `a → b` and `b → a` collapse into one edge whose weight
//! accumulates, and self-loops are dropped. Adjacency is derived from the
//! edge list and never mutated independently.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::debug;
use vigil_core::{GraphEdge, GraphNode, GraphPayload};

pub type NodeIndex = usize;

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: String,
    pub features: BTreeMap<String, f64>,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub weight: f64,
    pub edge_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub edges_by_type: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    key_index: HashMap<String, NodeIndex>,
    edge_dedup: HashMap<(NodeIndex, NodeIndex), usize>,
    /// Sorted neighbour indices per node.
    adjacency: Vec<Vec<NodeIndex>>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_payload(payload: &GraphPayload) -> Self {
        Self::from_parts(&payload.nodes, &payload.edges)
    }

    /// Build from node records and an edge list. Node neighbour lists are
    /// treated as additional unit-weight edges.
    pub fn from_parts(nodes: &[GraphNode], edges: &[GraphEdge]) -> Self {
        let mut g = Self::new();
        for n in nodes {
            let idx = g.upsert_node(&n.id);
            g.nodes[idx].features = n.features.clone();
            g.nodes[idx].weight = n.weight;
        }
        for e in edges {
            let a = g.upsert_node(&e.source);
            let b = g.upsert_node(&e.target);
            g.add_edge(a, b, e.weight, &e.edge_type);
        }
        for n in nodes {
            let a = g.upsert_node(&n.id);
            for neighbor in &n.neighbors {
                let b = g.upsert_node(neighbor);
                if !g.has_edge(a, b) {
                    g.add_edge(a, b, 1.0, "neighbor");
                }
            }
        }
        debug!(
            nodes = g.node_count(),
            edges = g.edge_count(),
            "graph built from node/edge lists"
        );
        g
    }

    /// Horizontal visibility graph of a numeric series: indices `i < j` are
    /// linked when every value strictly between them is lower than
    /// `min(values[i], values[j])`. Spikes become hubs.
    pub fn horizontal_visibility(values: &[f64]) -> Self {
        let mut g = Self::new();
        for i in 0..values.len() {
            g.upsert_node(&i.to_string());
        }
        for i in 0..values.len() {
            let mut max_between = f64::NEG_INFINITY;
            for j in (i + 1)..values.len() {
                if max_between < values[i].min(values[j]) {
                    g.add_edge(i, j, 1.0, "visibility");
                }
                max_between = max_between.max(values[j]);
                if values[j] >= values[i] {
                    break;
                }
            }
        }
        g
    }

    pub fn upsert_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&existing) = self.key_index.get(id) {
            return existing;
        }
        let idx = self.nodes.len();
        self.nodes.push(Node {
            id: id.to_string(),
            features: BTreeMap::new(),
            weight: 1.0,
        });
        self.adjacency.push(Vec::new());
        self.key_index.insert(id.to_string(), idx);
        idx
    }

    /// Add an undirected edge, returning its index. Repeated edges between
    /// the same pair accumulate weight; self-loops are ignored.
    pub fn add_edge(
        &mut self,
        source: NodeIndex,
        target: NodeIndex,
        weight: f64,
        edge_type: &str,
    ) -> Option<usize> {
        if source == target || source >= self.nodes.len() || target >= self.nodes.len() {
            return None;
        }
        let key = (source.min(target), source.max(target));
        if let Some(&existing) = self.edge_dedup.get(&key) {
            self.edges[existing].weight += weight;
            return Some(existing);
        }

        let idx = self.edges.len();
        self.edges.push(Edge {
            source,
            target,
            weight,
            edge_type: edge_type.to_string(),
        });
        self.edge_dedup.insert(key, idx);
        insert_sorted(&mut self.adjacency[source], target);
        insert_sorted(&mut self.adjacency[target], source);
        Some(idx)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.key_index.get(id).copied()
    }

    pub fn node_id(&self, idx: NodeIndex) -> &str {
        &self.nodes[idx].id
    }

    pub fn neighbors(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.adjacency[idx]
    }

    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.adjacency[idx].len()
    }

    pub fn has_edge(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.adjacency
            .get(a)
            .is_some_and(|n| n.binary_search(&b).is_ok())
    }

    pub fn stats(&self) -> GraphStats {
        let mut edges_by_type = BTreeMap::new();
        for edge in &self.edges {
            *edges_by_type.entry(edge.edge_type.clone()).or_default() += 1;
        }
        GraphStats {
            node_count: self.node_count(),
            edge_count: self.edge_count(),
            edges_by_type,
        }
    }
}

fn insert_sorted(list: &mut Vec<NodeIndex>, value: NodeIndex) {
    if let Err(pos) = list.binary_search(&value) {
        list.insert(pos, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(edges: &[(&str, &str)]) -> GraphPayload {
        GraphPayload::new(
            Vec::new(),
            edges.iter().map(|(a, b)| GraphEdge::new(*a, *b)).collect(),
        )
    }

    #[test]
    fn edges_are_undirected_and_deduplicated() {
        let g = Graph::from_payload(&payload(&[("a", "b"), ("b", "a"), ("b", "c"), ("c", "c")]));
        assert_eq!(g.node_count(), 3);
        assert_eq!(g.edge_count(), 2);
        let a = g.index_of("a").unwrap();
        let b = g.index_of("b").unwrap();
        assert_eq!(g.edges[0].weight, 2.0);
        assert!(g.has_edge(b, a));
        assert_eq!(g.degree(b), 2);
    }

    #[test]
    fn degree_sum_is_twice_edge_count() {
        let g = Graph::from_payload(&payload(&[
            ("a", "b"),
            ("a", "c"),
            ("a", "d"),
            ("c", "d"),
            ("d", "e"),
            ("e", "a"),
        ]));
        let total: usize = (0..g.node_count()).map(|i| g.degree(i)).sum();
        assert_eq!(total, 2 * g.edge_count());
    }

    #[test]
    fn node_neighbor_lists_become_edges() {
        let mut hub = GraphNode::new("hub");
        hub.neighbors = vec!["x".into(), "y".into()];
        let g = Graph::from_parts(&[hub], &[GraphEdge::new("x", "hub")]);
        assert_eq!(g.edge_count(), 2);
        assert_eq!(g.degree(g.index_of("hub").unwrap()), 2);
        assert_eq!(g.stats().edges_by_type["neighbor"], 1);
    }

    #[test]
    fn visibility_graph_sees_across_valleys() {
        let g = Graph::horizontal_visibility(&[2.0, 1.0, 1.0, 1.0, 3.0]);
        assert!(g.has_edge(0, 4), "peaks see each other over the valley");
        assert!(!g.has_edge(1, 3), "equal heights block the view");
        let total: usize = (0..g.node_count()).map(|i| g.degree(i)).sum();
        assert_eq!(total, 2 * g.edge_count());
    }

    #[test]
    fn visibility_graph_of_monotone_series_is_a_path() {
        let g = Graph::horizontal_visibility(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(g.edge_count(), 3);
    }
}
