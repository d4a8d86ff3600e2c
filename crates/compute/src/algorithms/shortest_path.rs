//! Distance-based centralities: closeness and betweenness.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use rayon::prelude::*;
use vigil_core::{Deadline, DetectionError};
use vigil_graph::{Graph, NodeIndex};

/// A priority queue entry for Dijkstra's algorithm.
///
/// Uses reversed ordering so `BinaryHeap` (a max-heap) behaves as a min-heap.
#[derive(Debug, Clone)]
struct State {
    distance: f64,
    node: NodeIndex,
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.distance.total_cmp(&other.distance) == Ordering::Equal
    }
}

impl Eq for State {}

impl Ord for State {
    fn cmp(&self, other: &Self) -> Ordering {
        other.distance.total_cmp(&self.distance)
    }
}

impl PartialOrd for State {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Hop distances from `source` to every node, `f64::INFINITY` when
/// unreachable. Every edge counts as distance 1.
pub fn distances_from(graph: &Graph, source: NodeIndex) -> Vec<f64> {
    let mut dist = vec![f64::INFINITY; graph.node_count()];
    if source >= dist.len() {
        return dist;
    }
    let mut heap = BinaryHeap::new();
    dist[source] = 0.0;
    heap.push(State {
        distance: 0.0,
        node: source,
    });

    while let Some(State { distance, node }) = heap.pop() {
        if distance > dist[node] {
            continue;
        }
        for &next in graph.neighbors(node) {
            let candidate = distance + 1.0;
            if candidate < dist[next] {
                dist[next] = candidate;
                heap.push(State {
                    distance: candidate,
                    node: next,
                });
            }
        }
    }
    dist
}

/// Closeness centrality `(n - 1) / Σ distance` over reachable nodes.
/// Nodes that reach nobody score 0.
pub fn closeness_centrality(graph: &Graph, deadline: &Deadline) -> Result<Vec<f64>, DetectionError> {
    let n = graph.node_count();
    let mut out = Vec::with_capacity(n);
    for node in 0..n {
        deadline.check_every(node)?;
        let total: f64 = distances_from(graph, node)
            .into_iter()
            .filter(|d| d.is_finite())
            .sum();
        out.push(if total > 0.0 {
            (n - 1) as f64 / total
        } else {
            0.0
        });
    }
    Ok(out)
}

/// Betweenness centrality by Brandes' algorithm over unweighted BFS.
///
/// Each unordered pair is counted once and scores are normalized by
/// `(n-1)(n-2)/2`, so values lie in `[0, 1]`. Sources run in parallel.
pub fn betweenness_centrality(graph: &Graph, deadline: &Deadline) -> Result<Vec<f64>, DetectionError> {
    let n = graph.node_count();
    if n < 3 {
        return Ok(vec![0.0; n]);
    }

    let partials: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|source| -> Result<Vec<f64>, DetectionError> {
            deadline.check_every(source)?;
            Ok(brandes_from(graph, source))
        })
        .collect::<Result<_, _>>()?;

    let mut scores = vec![0.0; n];
    for partial in partials {
        for (s, p) in scores.iter_mut().zip(partial) {
            *s += p;
        }
    }

    // Undirected: every pair was seen from both ends.
    let norm = ((n - 1) * (n - 2)) as f64 / 2.0;
    for s in &mut scores {
        *s = (*s / 2.0) / norm;
    }
    Ok(scores)
}

fn brandes_from(graph: &Graph, source: NodeIndex) -> Vec<f64> {
    let n = graph.node_count();
    let mut stack = Vec::with_capacity(n);
    let mut predecessors: Vec<Vec<NodeIndex>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0_f64; n];
    let mut dist = vec![-1_i64; n];
    sigma[source] = 1.0;
    dist[source] = 0;

    let mut queue = VecDeque::from([source]);
    while let Some(v) = queue.pop_front() {
        stack.push(v);
        for &w in graph.neighbors(v) {
            if dist[w] < 0 {
                dist[w] = dist[v] + 1;
                queue.push_back(w);
            }
            if dist[w] == dist[v] + 1 {
                sigma[w] += sigma[v];
                predecessors[w].push(v);
            }
        }
    }

    let mut delta = vec![0.0; n];
    let mut out = vec![0.0; n];
    while let Some(w) = stack.pop() {
        for &v in &predecessors[w] {
            delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
        }
        if w != source {
            out[w] += delta[w];
        }
    }
    out
}
