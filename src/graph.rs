use std::collections::{BTreeMap, HashMap, HashSet};

use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;

// One graph node per call identity.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub id: String,
    pub label: String,
    /// Entry-point call (nothing on the stack when it ran). Rendered with a
    /// heavier pen width.
    pub root: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Edge {
    pub label: Option<String>,
    /// Draw the arrow head at the caller end instead of the callee end.
    pub back: bool,
}

/// A directed call graph with strict-graph semantics: node insertion is
/// idempotent under a call identity, and at most one edge exists per
/// (caller, callee) pair.
#[derive(Debug, Default)]
pub struct CallGraph {
    graph: DiGraph<Node, Edge>,
    node_map: HashMap<String, NodeIndex>,
    edge_set: HashSet<(NodeIndex, NodeIndex)>,
    graph_attrs: BTreeMap<String, String>,
}

impl CallGraph {
    pub fn new(graph_attrs: BTreeMap<String, String>) -> Self {
        CallGraph {
            graph_attrs,
            ..CallGraph::default()
        }
    }

    /// Add the node for `id`, or overwrite its label if it already exists.
    /// Last write wins; the root flag is sticky.
    pub fn upsert_node(&mut self, id: &str, label: String) -> NodeIndex {
        let index = self.ensure_node(id);
        self.graph[index].label = label;
        index
    }

    // Fetch the node for `id`, creating it with the id as its label if it
    // does not exist yet.
    fn ensure_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&index) = self.node_map.get(id) {
            return index;
        }
        let index = self.graph.add_node(Node {
            id: id.to_string(),
            label: id.to_string(),
            root: false,
        });
        self.node_map.insert(id.to_string(), index);
        index
    }

    /// Flag an existing node as a graph entry point. Unknown ids are ignored.
    pub fn mark_root(&mut self, id: &str) {
        if let Some(&index) = self.node_map.get(id) {
            self.graph[index].root = true;
        }
    }

    /// Add one edge between two nodes. Missing endpoints are created on the
    /// spot (with the id as a placeholder label, until an upsert relabels
    /// them); calls finalize callee-first, so a callee's edge routinely
    /// arrives before its caller's node. A repeated (from, to) pair is
    /// dropped, keeping the first edge's attributes.
    pub fn add_edge(&mut self, from: &str, to: &str, label: Option<String>, back: bool) {
        let source = self.ensure_node(from);
        let target = self.ensure_node(to);
        if !self.edge_set.insert((source, target)) {
            return;
        }
        self.graph.add_edge(source, target, Edge { label, back });
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.node_map.contains_key(id)
    }

    pub fn node_label(&self, id: &str) -> Option<&str> {
        self.node_map
            .get(id)
            .map(|&index| self.graph[index].label.as_str())
    }

    pub fn is_root(&self, id: &str) -> bool {
        self.node_map
            .get(id)
            .map(|&index| self.graph[index].root)
            .unwrap_or(false)
    }

    pub fn graph_attrs(&self) -> &BTreeMap<String, String> {
        &self.graph_attrs
    }

    pub fn inner(&self) -> &DiGraph<Node, Edge> {
        &self.graph
    }

    /// Edges as (caller id, callee id, label) triples, for inspection.
    pub fn edges(&self) -> Vec<(String, String, Option<String>)> {
        self.graph
            .edge_indices()
            .map(|edge_idx| {
                let (source, target) = self.graph.edge_endpoints(edge_idx).unwrap();
                (
                    self.graph[source].id.clone(),
                    self.graph[target].id.clone(),
                    self.graph[edge_idx].label.clone(),
                )
            })
            .collect()
    }
}
