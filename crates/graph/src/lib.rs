pub mod store;

pub use store::{Edge, Graph, GraphStats, Node, NodeIndex};
