pub mod degree;
pub mod graph_stats;
pub mod linalg;
pub mod motifs;
pub mod pagerank;
pub mod shortest_path;
pub mod stats;
