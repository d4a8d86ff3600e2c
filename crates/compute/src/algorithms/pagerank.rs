use tracing::debug;
use vigil_core::{Deadline, DetectionError};
use vigil_graph::Graph;

/// Compute PageRank scores on the undirected graph using the iterative
/// power method.
///
/// Each edge is followed in both directions. Mass held by isolated nodes is
/// spread uniformly. Returned scores are indexed by node and sum to 1.0.
pub fn pagerank(
    graph: &Graph,
    damping: f64,
    max_iterations: usize,
    convergence: f64,
    deadline: &Deadline,
) -> Result<Vec<f64>, DetectionError> {
    let n = graph.node_count();
    if n == 0 {
        return Ok(Vec::new());
    }

    let initial = 1.0 / n as f64;
    let mut scores = vec![initial; n];
    let base = (1.0 - damping) / n as f64;

    for iteration in 0..max_iterations {
        deadline.check_every(iteration)?;

        let dangling: f64 = (0..n)
            .filter(|&i| graph.degree(i) == 0)
            .map(|i| scores[i])
            .sum();
        let dangling_share = damping * dangling / n as f64;

        let new_scores: Vec<f64> = (0..n)
            .map(|node| {
                let sum: f64 = graph
                    .neighbors(node)
                    .iter()
                    .map(|&src| scores[src] / graph.degree(src) as f64)
                    .sum();
                base + dangling_share + damping * sum
            })
            .collect();

        // L1 change between iterations
        let diff: f64 = new_scores
            .iter()
            .zip(&scores)
            .map(|(a, b)| (a - b).abs())
            .sum();

        scores = new_scores;

        if diff < convergence {
            debug!(
                "PageRank converged after {} iterations (diff={:.2e})",
                iteration + 1,
                diff
            );
            return Ok(scores);
        }
    }

    debug!(
        "PageRank completed {} iterations without convergence",
        max_iterations
    );
    Ok(scores)
}

/// PageRank with damping 0.85, 100 iterations and tolerance 1e-6.
pub fn pagerank_default(graph: &Graph) -> Vec<f64> {
    pagerank(graph, 0.85, 100, 1e-6, &Deadline::none()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Graph {
        let mut g = Graph::new();
        let a = g.upsert_node("alice");
        let b = g.upsert_node("bob");
        let c = g.upsert_node("carol");
        g.add_edge(a, b, 1.0, "knows");
        g.add_edge(b, c, 1.0, "knows");
        g.add_edge(c, a, 1.0, "knows");
        g
    }

    #[test]
    fn pagerank_cycle_equal() {
        let pr = pagerank_default(&triangle());
        assert_eq!(pr.len(), 3);
        for v in &pr {
            assert!((v - 1.0 / 3.0).abs() < 1e-4, "expected ~1/3, got {}", v);
        }
    }

    #[test]
    fn pagerank_hub_ranks_highest_and_sums_to_one() {
        let mut g = Graph::new();
        let hub = g.upsert_node("hub");
        for i in 0..5 {
            let leaf = g.upsert_node(&format!("leaf{i}"));
            g.add_edge(hub, leaf, 1.0, "link");
        }
        g.upsert_node("isolated");

        let pr = pagerank_default(&g);
        let total: f64 = pr.iter().sum();
        assert!((total - 1.0).abs() < 1e-6, "sum was {total}");
        assert!(pr[1..].iter().all(|&v| v < pr[hub]));
    }

    #[test]
    fn pagerank_empty() {
        assert!(pagerank_default(&Graph::new()).is_empty());
    }
}
