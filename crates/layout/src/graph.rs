//! Validated, immutable graph model.
//!
//! Nodes and edges keep their input order; every later stage addresses them
//! by index into these vectors. The petgraph view mirrors the same indices so
//! `NodeIndex::new(i)` is node `i` and each edge weight is its edge index.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::unionfind::UnionFind;
use serde::{Deserialize, Serialize};

use crate::error::{GraphDefect, LayoutError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Opaque to the layout; importance providers may read it.
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Node {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: None,
            metadata: serde_json::Value::Null,
        }
    }
}

fn default_directed() -> bool {
    true
}

/// Rendering hint carried through from the input. Every kind is laid out
/// the same way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeKind {
    #[default]
    Normal,
    Emphasis,
    Subflow,
}

impl EdgeKind {
    fn is_normal(&self) -> bool {
        *self == EdgeKind::Normal
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default = "default_directed")]
    pub directed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "EdgeKind::is_normal")]
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: None,
            source: source.into(),
            target: target.into(),
            weight: None,
            directed: true,
            label: None,
            kind: EdgeKind::Normal,
        }
    }

    pub fn weighted(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn undirected(mut self) -> Self {
        self.directed = false;
        self
    }
}

/// Stable key of an edge in the result maps. Either the edge's explicit id or
/// `source->target`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(String);

impl EdgeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn between(source: &str, target: &str) -> Self {
        Self(format!("{source}->{target}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw, unvalidated wire form of a graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphInput {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Cluster definitions, kept verbatim. Nested layout is not performed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subgraphs: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub component_count: usize,
    pub isolated_count: usize,
    pub max_degree: usize,
    pub density: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "GraphInput", into = "GraphInput")]
pub struct Graph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    edge_ids: Vec<EdgeId>,
    endpoints: Vec<(usize, usize)>,
    index: HashMap<String, usize>,
    digraph: DiGraph<(), usize>,
    subgraphs: Vec<serde_json::Value>,
}

impl Graph {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, LayoutError> {
        let mut index = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            if index.insert(node.id.clone(), i).is_some() {
                return Err(GraphDefect::DuplicateNode(node.id.clone()).into());
            }
        }

        let mut digraph = DiGraph::with_capacity(nodes.len(), edges.len());
        for _ in &nodes {
            digraph.add_node(());
        }

        let mut pairs: HashSet<(usize, usize)> = HashSet::with_capacity(edges.len());
        let mut ids: HashSet<EdgeId> = HashSet::with_capacity(edges.len());
        let mut endpoints = Vec::with_capacity(edges.len());
        let mut edge_ids = Vec::with_capacity(edges.len());

        for (e, edge) in edges.iter().enumerate() {
            let lookup = |id: &str| {
                index.get(id).copied().ok_or_else(|| GraphDefect::UnknownNode {
                    from: edge.source.clone(),
                    to: edge.target.clone(),
                    missing: id.to_string(),
                })
            };
            let s = lookup(&edge.source)?;
            let t = lookup(&edge.target)?;
            if s == t {
                return Err(GraphDefect::SelfLoop(edge.source.clone()).into());
            }
            if let Some(w) = edge.weight {
                if !w.is_finite() || w < 0.0 {
                    return Err(GraphDefect::InvalidWeight {
                        from: edge.source.clone(),
                        to: edge.target.clone(),
                        weight: w.to_string(),
                    }
                    .into());
                }
            }
            // An undirected edge also occupies the reverse pair.
            let reverse_taken = pairs.contains(&(t, s)) && !edge.directed;
            if !pairs.insert((s, t)) || reverse_taken {
                return Err(GraphDefect::DuplicateEdge {
                    from: edge.source.clone(),
                    to: edge.target.clone(),
                }
                .into());
            }
            if !edge.directed {
                pairs.insert((t, s));
            }

            let id = match &edge.id {
                Some(id) => EdgeId::new(id.clone()),
                None => EdgeId::between(&edge.source, &edge.target),
            };
            if !ids.insert(id.clone()) {
                return Err(GraphDefect::DuplicateEdgeId(id.to_string()).into());
            }

            digraph.add_edge(NodeIndex::new(s), NodeIndex::new(t), e);
            endpoints.push((s, t));
            edge_ids.push(id);
        }

        Ok(Self {
            nodes,
            edges,
            edge_ids,
            endpoints,
            index,
            digraph,
            subgraphs: Vec::new(),
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|i| &self.nodes[i])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Node indices of edge `e` as `(source, target)`.
    pub fn endpoints(&self, e: usize) -> (usize, usize) {
        self.endpoints[e]
    }

    pub fn edge_id(&self, e: usize) -> &EdgeId {
        &self.edge_ids[e]
    }

    pub fn edge_ids(&self) -> &[EdgeId] {
        &self.edge_ids
    }

    /// Spring weight of edge `e`; unweighted edges count as 1.
    pub fn edge_weight(&self, e: usize) -> f64 {
        self.edges[e].weight.unwrap_or(1.0)
    }

    /// Subgraph definitions from the input, untouched.
    pub fn subgraphs(&self) -> &[serde_json::Value] {
        &self.subgraphs
    }

    /// Directed petgraph view. Edge weights are edge indices.
    pub fn digraph(&self) -> &DiGraph<(), usize> {
        &self.digraph
    }

    pub fn degree(&self, node: usize) -> usize {
        self.endpoints
            .iter()
            .filter(|&&(s, t)| s == node || t == node)
            .count()
    }

    /// Connected components ignoring direction, each sorted ascending and the
    /// list ordered by smallest member.
    pub fn components(&self) -> Vec<Vec<usize>> {
        let mut sets = UnionFind::new(self.nodes.len());
        for &(s, t) in &self.endpoints {
            sets.union(s, t);
        }
        let mut grouped: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut first_member: HashMap<usize, usize> = HashMap::new();
        for node in 0..self.nodes.len() {
            let root = sets.find(node);
            let key = *first_member.entry(root).or_insert(node);
            grouped.entry(key).or_default().push(node);
        }
        grouped.into_values().collect()
    }

    pub fn metrics(&self) -> GraphMetrics {
        let n = self.nodes.len();
        let mut degrees = vec![0usize; n];
        for &(s, t) in &self.endpoints {
            degrees[s] += 1;
            degrees[t] += 1;
        }
        let density = if n > 1 {
            self.edges.len() as f64 / (n * (n - 1)) as f64
        } else {
            0.0
        };
        GraphMetrics {
            node_count: n,
            edge_count: self.edges.len(),
            component_count: self.components().len(),
            isolated_count: degrees.iter().filter(|&&d| d == 0).count(),
            max_degree: degrees.iter().copied().max().unwrap_or(0),
            density,
        }
    }
}

impl TryFrom<GraphInput> for Graph {
    type Error = LayoutError;

    fn try_from(input: GraphInput) -> Result<Self, Self::Error> {
        let mut graph = Graph::new(input.nodes, input.edges)?;
        graph.subgraphs = input.subgraphs;
        Ok(graph)
    }
}

impl From<Graph> for GraphInput {
    fn from(graph: Graph) -> Self {
        GraphInput {
            nodes: graph.nodes,
            edges: graph.edges,
            subgraphs: graph.subgraphs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(ids: &[&str]) -> Vec<Node> {
        ids.iter().map(|id| Node::new(*id)).collect()
    }

    fn defect(result: Result<Graph, LayoutError>) -> GraphDefect {
        match result {
            Err(LayoutError::InvalidGraph(defect)) => defect,
            other => panic!("expected InvalidGraph, got {other:?}"),
        }
    }

    #[test]
    fn test_builds_valid_graph() {
        let graph = Graph::new(
            nodes(&["A", "B", "C"]),
            vec![Edge::new("A", "B"), Edge::new("B", "C").weighted(2.0)],
        )
        .unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.endpoints(1), (1, 2));
        assert_eq!(graph.edge_weight(0), 1.0);
        assert_eq!(graph.edge_weight(1), 2.0);
        assert_eq!(graph.edge_id(0).as_str(), "A->B");
        assert_eq!(graph.digraph().edge_count(), 2);
    }

    #[test]
    fn test_rejects_self_loop() {
        let result = Graph::new(nodes(&["A"]), vec![Edge::new("A", "A")]);
        assert_eq!(defect(result), GraphDefect::SelfLoop("A".into()));
    }

    #[test]
    fn test_rejects_duplicate_edge() {
        let result = Graph::new(
            nodes(&["A", "B"]),
            vec![Edge::new("A", "B"), Edge::new("A", "B")],
        );
        assert!(matches!(defect(result), GraphDefect::DuplicateEdge { .. }));
    }

    #[test]
    fn test_reverse_pair_is_allowed_only_when_directed() {
        assert!(
            Graph::new(
                nodes(&["A", "B"]),
                vec![Edge::new("A", "B"), Edge::new("B", "A")]
            )
            .is_ok()
        );
        let result = Graph::new(
            nodes(&["A", "B"]),
            vec![Edge::new("A", "B").undirected(), Edge::new("B", "A")],
        );
        assert!(matches!(defect(result), GraphDefect::DuplicateEdge { .. }));
        let result = Graph::new(
            nodes(&["A", "B"]),
            vec![Edge::new("A", "B"), Edge::new("B", "A").undirected()],
        );
        assert!(matches!(defect(result), GraphDefect::DuplicateEdge { .. }));
    }

    #[test]
    fn test_rejects_unknown_node() {
        let result = Graph::new(nodes(&["A"]), vec![Edge::new("A", "Z")]);
        match defect(result) {
            GraphDefect::UnknownNode { missing, .. } => assert_eq!(missing, "Z"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_rejects_duplicate_node_and_edge_id() {
        let result = Graph::new(nodes(&["A", "A"]), vec![]);
        assert_eq!(defect(result), GraphDefect::DuplicateNode("A".into()));

        let mut first = Edge::new("A", "B");
        first.id = Some("e".into());
        let mut second = Edge::new("B", "C");
        second.id = Some("e".into());
        let result = Graph::new(nodes(&["A", "B", "C"]), vec![first, second]);
        assert_eq!(defect(result), GraphDefect::DuplicateEdgeId("e".into()));
    }

    #[test]
    fn test_rejects_negative_weight() {
        let result = Graph::new(nodes(&["A", "B"]), vec![Edge::new("A", "B").weighted(-1.0)]);
        assert!(matches!(defect(result), GraphDefect::InvalidWeight { .. }));
        // zero is a valid weight
        assert!(Graph::new(nodes(&["A", "B"]), vec![Edge::new("A", "B").weighted(0.0)]).is_ok());
    }

    #[test]
    fn test_deserialize_validates() {
        let graph: Graph = serde_json::from_str(
            r#"{"nodes": [{"id": "A", "metadata": {"importance": 0.7}}, {"id": "B"}],
                "edges": [{"source": "A", "target": "B"}]}"#,
        )
        .unwrap();
        assert!(graph.edges()[0].directed);
        assert_eq!(graph.node("A").unwrap().metadata["importance"], 0.7);

        let bad = serde_json::from_str::<Graph>(
            r#"{"nodes": [{"id": "A"}], "edges": [{"source": "A", "target": "A"}]}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_cluster_document_keeps_hints() {
        let text = r#"{
            "nodes": [
                {"id": "api", "type": "node", "label": "API"},
                {"id": "db", "type": "node", "label": "Store", "children": []}
            ],
            "edges": [
                {"source": "api", "target": "db", "type": "emphasis"},
                {"source": "db", "target": "api", "type": "subflow"}
            ],
            "subgraphs": [{"id": "backend", "type": "subgraph", "children": [{"id": "db"}]}]
        }"#;
        let graph: Graph = serde_json::from_str(text).unwrap();
        assert_eq!(graph.node("api").unwrap().label.as_deref(), Some("API"));
        assert_eq!(graph.edges()[0].kind, EdgeKind::Emphasis);
        assert_eq!(graph.edges()[1].kind, EdgeKind::Subflow);
        assert_eq!(graph.subgraphs().len(), 1);

        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["edges"][0]["type"], "emphasis");
        assert_eq!(json["subgraphs"][0]["id"], "backend");
        assert_eq!(json["edges"].as_array().unwrap().len(), 2);

        // an unknown edge kind is a malformed document
        let bad = serde_json::from_str::<Graph>(
            r#"{"nodes": [{"id": "A"}, {"id": "B"}],
                "edges": [{"source": "A", "target": "B", "type": "dotted"}]}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_components_and_metrics() {
        let graph = Graph::new(
            nodes(&["A", "B", "C", "D", "E"]),
            vec![Edge::new("A", "B"), Edge::new("D", "C")],
        )
        .unwrap();
        assert_eq!(graph.components(), vec![vec![0, 1], vec![2, 3], vec![4]]);

        let metrics = graph.metrics();
        assert_eq!(metrics.component_count, 3);
        assert_eq!(metrics.isolated_count, 1);
        assert_eq!(metrics.max_degree, 1);
        assert_eq!(graph.degree(4), 0);
    }
}
