//! Per-node structural scoring over a [`Graph`].

use tracing::debug;
use vigil_core::{clamp_unit, Deadline, DetectionError, PatternConfig, Severity};
use vigil_graph::Graph;

use super::types::{GraphAnalysis, GraphMetrics, Motif, MotifType, PatternAnomalyResult};
use crate::algorithms::graph_stats::{clustering_coefficients, extended_graph_stats};
use crate::algorithms::motifs::{stars, triangles, triple_count};
use crate::algorithms::pagerank::pagerank;
use crate::algorithms::shortest_path::{betweenness_centrality, closeness_centrality};
use crate::algorithms::stats;

/// Minimum centre degree for a star motif.
const STAR_MIN_DEGREE: usize = 3;

pub fn analyze(
    graph: &Graph,
    config: &PatternConfig,
    threshold: f64,
    deadline: &Deadline,
) -> Result<GraphAnalysis, DetectionError> {
    let n = graph.node_count();
    let stats_summary = extended_graph_stats(graph);
    if n < 2 {
        return Ok(GraphAnalysis {
            results: Vec::new(),
            motifs: Vec::new(),
            stats: stats_summary,
        });
    }

    let degrees: Vec<f64> = (0..n).map(|i| graph.degree(i) as f64).collect();
    let clustering = clustering_coefficients(graph);
    deadline.check()?;
    let betweenness = betweenness_centrality(graph, deadline)?;
    let closeness = closeness_centrality(graph, deadline)?;
    let ranks = pagerank(
        graph,
        config.pagerank_damping,
        config.pagerank_iterations,
        config.pagerank_tolerance,
        deadline,
    )?;

    let motifs = discover_motifs(graph);

    let (deg_mean, deg_std) = (stats::mean(&degrees), stats::std_dev(&degrees));
    let (cc_mean, cc_std) = (stats::mean(&clustering), stats::std_dev(&clustering));

    let results: Vec<PatternAnomalyResult> = (0..n)
        .map(|i| {
            let z_degree = stats::z_score(degrees[i], deg_mean, deg_std);
            let z_clustering = stats::z_score(clustering[i], cc_mean, cc_std);
            let score = clamp_unit((z_degree.abs() + z_clustering.abs()) / 2.0);
            let is_anomaly = score > threshold;
            let id = graph.node_id(i);

            let mut explanations = Vec::new();
            if z_degree.abs() >= 2.0 {
                explanations.push(format!(
                    "degree {} is {:.1} standard deviations from the graph mean {:.2}",
                    degrees[i], z_degree, deg_mean
                ));
            }
            if z_clustering.abs() >= 2.0 {
                explanations.push(format!(
                    "clustering coefficient {:.2} is {:.1} standard deviations from the mean",
                    clustering[i], z_clustering
                ));
            }
            if is_anomaly && explanations.is_empty() {
                explanations.push(format!("structural score {score:.2} above threshold {threshold:.2}"));
            }

            PatternAnomalyResult {
                entity: id.to_string(),
                index: Some(i),
                score,
                is_anomaly,
                severity: Severity::from_score(score),
                local_score: None,
                graph_metrics: Some(GraphMetrics {
                    degree: graph.degree(i),
                    betweenness: betweenness[i],
                    closeness: closeness[i],
                    clustering: clustering[i],
                    pagerank: ranks[i],
                }),
                motifs: motifs
                    .iter()
                    .filter(|m| m.members.iter().any(|member| member == id))
                    .cloned()
                    .collect(),
                explanations,
            }
        })
        .collect();

    debug!(
        nodes = n,
        edges = graph.edge_count(),
        motifs = motifs.len(),
        flagged = results.iter().filter(|r| r.is_anomaly).count(),
        "graph analysis finished"
    );

    Ok(GraphAnalysis {
        results,
        motifs,
        stats: stats_summary,
    })
}

/// Triangles scored against `C(n, 3)`, stars against `n`.
pub fn discover_motifs(graph: &Graph) -> Vec<Motif> {
    let n = graph.node_count();
    let tris = triangles(graph);
    let star_list = stars(graph, STAR_MIN_DEGREE);

    let max_triangles = triple_count(n);
    let triangle_significance = if max_triangles > 0.0 {
        tris.len() as f64 / max_triangles
    } else {
        0.0
    };
    let star_significance = if n > 0 {
        star_list.len() as f64 / n as f64
    } else {
        0.0
    };

    let mut out = Vec::with_capacity(tris.len() + star_list.len());
    for [a, b, c] in tris {
        let mut members = vec![
            graph.node_id(a).to_string(),
            graph.node_id(b).to_string(),
            graph.node_id(c).to_string(),
        ];
        members.sort();
        out.push(Motif {
            motif_type: MotifType::Triangle,
            pattern: members.join("-"),
            members,
            positions: Vec::new(),
            occurrences: 1,
            significance: triangle_significance,
        });
    }
    for (centre, leaves) in star_list {
        let centre_id = graph.node_id(centre).to_string();
        let mut members = Vec::with_capacity(leaves.len() + 1);
        members.push(centre_id.clone());
        members.extend(leaves.iter().map(|&l| graph.node_id(l).to_string()));
        out.push(Motif {
            motif_type: MotifType::Star,
            pattern: centre_id,
            members,
            positions: Vec::new(),
            occurrences: 1,
            significance: star_significance,
        });
    }
    out
}
