//! Raw detection payloads and their classification into typed shapes.
//!
//! A payload arrives as arbitrary JSON. [`Payload::from`] applies the
//! classification rule once, so every downstream component works with a
//! typed variant:
//!
//! - empty array, number, or array of numbers → [`Payload::Numeric`]
//! - records carrying `timestamp` + `value` → [`Payload::TimeSeries`]
//! - records carrying a `features` map → [`Payload::Multivariate`]
//! - records carrying `id` or `source` + `target`, or an object with
//!   `nodes` / `edges` → [`Payload::Graph`]
//! - anything else → [`Payload::Mixed`]

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Inferred shape of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Univariate,
    Multivariate,
    Timeseries,
    Graph,
    Mixed,
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Univariate => write!(f, "univariate"),
            DataType::Multivariate => write!(f, "multivariate"),
            DataType::Timeseries => write!(f, "timeseries"),
            DataType::Graph => write!(f, "graph"),
            DataType::Mixed => write!(f, "mixed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// A single observation as a feature-name → value map.
///
/// Features are kept in a `BTreeMap`, so the vectorization order is the
/// sorted feature-name list and cannot drift between train and detect.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MultivariateDataPoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "de_opt_timestamp"
    )]
    pub timestamp: Option<DateTime<Utc>>,
    pub features: BTreeMap<String, f64>,
}

impl MultivariateDataPoint {
    pub fn new<I, K>(features: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            id: None,
            timestamp: None,
            features: features.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.features.keys().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub features: BTreeMap<String, f64>,
    #[serde(default, deserialize_with = "de_ids")]
    pub neighbors: Vec<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl GraphNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            features: BTreeMap::new(),
            neighbors: Vec::new(),
            weight: default_weight(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    #[serde(deserialize_with = "de_id")]
    pub source: String,
    #[serde(deserialize_with = "de_id")]
    pub target: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(rename = "type", alias = "edge_type", default = "default_edge_type")]
    pub edge_type: String,
}

impl GraphEdge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            weight: default_weight(),
            edge_type: default_edge_type(),
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

fn default_edge_type() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphPayload {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

impl GraphPayload {
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self { nodes, edges }
    }

    /// Distinct entity ids across node records, neighbour lists and edge endpoints.
    pub fn entity_ids(&self) -> BTreeSet<&str> {
        let mut ids = BTreeSet::new();
        for node in &self.nodes {
            ids.insert(node.id.as_str());
            ids.extend(node.neighbors.iter().map(String::as_str));
        }
        for edge in &self.edges {
            ids.insert(edge.source.as_str());
            ids.insert(edge.target.as_str());
        }
        ids
    }

    /// Distinct undirected links (self-loops dropped), from both the edge
    /// list and node neighbour lists.
    pub fn undirected_links(&self) -> BTreeSet<(&str, &str)> {
        let from_nodes = self.nodes.iter().flat_map(|node| {
            node.neighbors
                .iter()
                .map(move |n| (node.id.as_str(), n.as_str()))
        });
        let from_edges = self
            .edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()));
        from_nodes
            .chain(from_edges)
            .filter(|(a, b)| a != b)
            .map(|(a, b)| if a < b { (a, b) } else { (b, a) })
            .collect()
    }

    /// Node degrees in entity-id order.
    pub fn degree_sequence(&self) -> Vec<f64> {
        let mut degree: HashMap<&str, usize> = HashMap::new();
        for (a, b) in self.undirected_links() {
            *degree.entry(a).or_insert(0) += 1;
            *degree.entry(b).or_insert(0) += 1;
        }
        self.entity_ids()
            .into_iter()
            .map(|id| degree.get(id).copied().unwrap_or(0) as f64)
            .collect()
    }

    pub fn density(&self) -> f64 {
        let n = self.entity_ids().len() as f64;
        if n < 2.0 {
            return 0.0;
        }
        2.0 * self.undirected_links().len() as f64 / (n * (n - 1.0))
    }
}

/// A raw detection payload, classified into one of the supported shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Payload {
    Numeric(Vec<f64>),
    TimeSeries(Vec<TimeSeriesPoint>),
    Multivariate(Vec<MultivariateDataPoint>),
    Graph(GraphPayload),
    Mixed(Value),
}

impl Payload {
    pub fn data_type(&self) -> DataType {
        match self {
            Payload::Numeric(_) => DataType::Univariate,
            Payload::TimeSeries(_) => DataType::Timeseries,
            Payload::Multivariate(_) => DataType::Multivariate,
            Payload::Graph(_) => DataType::Graph,
            Payload::Mixed(_) => DataType::Mixed,
        }
    }

    /// Number of entities: values, records, or graph nodes.
    pub fn len(&self) -> usize {
        match self {
            Payload::Numeric(v) => v.len(),
            Payload::TimeSeries(v) => v.len(),
            Payload::Multivariate(v) => v.len(),
            Payload::Graph(g) => g.entity_ids().len(),
            Payload::Mixed(v) => numeric_leaves(v).len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The payload viewed as a single numeric sequence.
    ///
    /// Multivariate records collapse to their mean feature value, graphs to
    /// their degree sequence and mixed payloads to their numeric leaves.
    pub fn numeric_series(&self) -> Vec<f64> {
        match self {
            Payload::Numeric(v) => v.clone(),
            Payload::TimeSeries(points) => points.iter().map(|p| p.value).collect(),
            Payload::Multivariate(points) => points
                .iter()
                .map(|p| {
                    if p.features.is_empty() {
                        0.0
                    } else {
                        p.features.values().sum::<f64>() / p.features.len() as f64
                    }
                })
                .collect(),
            Payload::Graph(g) => g.degree_sequence(),
            Payload::Mixed(v) => numeric_leaves(v),
        }
    }

    /// Identifier used in explanations for entity `index`.
    pub fn entity_label(&self, index: usize) -> String {
        match self {
            Payload::Multivariate(points) => points
                .get(index)
                .and_then(|p| p.id.clone())
                .unwrap_or_else(|| format!("#{index}")),
            Payload::TimeSeries(points) => points
                .get(index)
                .map(|p| p.timestamp.to_rfc3339())
                .unwrap_or_else(|| format!("#{index}")),
            Payload::Graph(g) => g
                .entity_ids()
                .into_iter()
                .nth(index)
                .map(str::to_string)
                .unwrap_or_else(|| format!("#{index}")),
            _ => format!("#{index}"),
        }
    }

    /// Rough in-memory footprint, used for memory budgeting.
    pub fn estimated_bytes(&self) -> usize {
        const F64: usize = std::mem::size_of::<f64>();
        match self {
            Payload::Numeric(v) => v.len() * F64,
            Payload::TimeSeries(v) => v.len() * (F64 + 12),
            Payload::Multivariate(v) => v
                .iter()
                .map(|p| p.features.iter().map(|(k, _)| k.len() + F64 + 48).sum::<usize>())
                .sum(),
            Payload::Graph(g) => {
                let nodes: usize = g
                    .nodes
                    .iter()
                    .map(|n| n.id.len() + n.features.len() * (F64 + 32) + n.neighbors.len() * 24 + 64)
                    .sum();
                nodes + g.edges.len() * (F64 + 96)
            }
            Payload::Mixed(v) => v.to_string().len(),
        }
    }

    fn from_array(items: &[Value]) -> Option<Payload> {
        if items.is_empty() {
            return Some(Payload::Numeric(Vec::new()));
        }
        if items.iter().all(Value::is_number) {
            return Some(Payload::Numeric(
                items.iter().filter_map(Value::as_f64).collect(),
            ));
        }
        let records: Vec<&serde_json::Map<String, Value>> =
            items.iter().filter_map(Value::as_object).collect();
        if records.len() != items.len() {
            return None;
        }

        if records
            .iter()
            .all(|r| r.contains_key("timestamp") && r.contains_key("value"))
        {
            return items
                .iter()
                .map(|v| serde_json::from_value::<TimeSeriesPoint>(v.clone()).ok())
                .collect::<Option<Vec<_>>>()
                .map(Payload::TimeSeries);
        }

        if records
            .iter()
            .all(|r| r.get("features").is_some_and(Value::is_object))
        {
            return items
                .iter()
                .map(|v| serde_json::from_value::<MultivariateDataPoint>(v.clone()).ok())
                .collect::<Option<Vec<_>>>()
                .map(Payload::Multivariate);
        }

        let is_edge = |r: &serde_json::Map<String, Value>| {
            r.contains_key("source") && r.contains_key("target")
        };
        if records.iter().all(|r| r.contains_key("id") || is_edge(r)) {
            let mut graph = GraphPayload::default();
            for (value, record) in items.iter().zip(&records) {
                if is_edge(record) {
                    graph
                        .edges
                        .push(serde_json::from_value(value.clone()).ok()?);
                } else {
                    graph
                        .nodes
                        .push(serde_json::from_value(value.clone()).ok()?);
                }
            }
            return Some(Payload::Graph(graph));
        }

        None
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        match &value {
            Value::Number(n) => match n.as_f64() {
                Some(x) => Payload::Numeric(vec![x]),
                None => Payload::Mixed(value),
            },
            Value::Array(items) => Payload::from_array(items).unwrap_or(Payload::Mixed(value)),
            Value::Object(map) if map.contains_key("nodes") || map.contains_key("edges") => {
                match serde_json::from_value::<GraphPayload>(value.clone()) {
                    Ok(graph) => Payload::Graph(graph),
                    Err(_) => Payload::Mixed(value),
                }
            }
            _ => Payload::Mixed(value),
        }
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Numeric(v) => Value::from(v),
            Payload::TimeSeries(v) => serde_json::to_value(v).unwrap_or(Value::Null),
            Payload::Multivariate(v) => serde_json::to_value(v).unwrap_or(Value::Null),
            Payload::Graph(g) => serde_json::to_value(g).unwrap_or(Value::Null),
            Payload::Mixed(v) => v,
        }
    }
}

impl From<Vec<f64>> for Payload {
    fn from(values: Vec<f64>) -> Self {
        Payload::Numeric(values)
    }
}

/// Every numeric leaf of a JSON document, depth-first.
pub fn numeric_leaves(value: &Value) -> Vec<f64> {
    fn walk(value: &Value, out: &mut Vec<f64>) {
        match value {
            Value::Number(n) => {
                if let Some(x) = n.as_f64() {
                    out.push(x);
                }
            }
            Value::Array(items) => items.iter().for_each(|v| walk(v, out)),
            Value::Object(map) => map.values().for_each(|v| walk(v, out)),
            _ => {}
        }
    }
    let mut out = Vec::new();
    walk(value, &mut out);
    out
}

// ── serde helpers ─────────────────────────────────────────────

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => {
            let secs = n.as_f64()?;
            let whole = secs.trunc() as i64;
            let nanos = ((secs - secs.trunc()) * 1e9).round() as u32;
            Utc.timestamp_opt(whole, nanos).single()
        }
        _ => None,
    }
}

fn de_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    parse_timestamp(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {value}")))
}

fn de_opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    parse_timestamp(&value)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {value}")))
}

fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    id_from_value(&value)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid id: {value}")))
}

fn de_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    values
        .iter()
        .map(|v| id_from_value(v).ok_or_else(|| serde::de::Error::custom(format!("invalid id: {v}"))))
        .collect()
}
