//! Graph data model: nodes, edges, and identity derivation.
//!
//! Identity is derived from surface strings: a node's id is built from its
//! label, an edge's id from its ordered endpoint pair. Two triples that
//! mention the same surface string therefore refer to the same node, and at
//! most one edge exists per ordered pair. Labels are not normalized before
//! id derivation: the same concept with different casing or whitespace
//! creates distinct nodes, intentionally preserved behavior.
//!
//! [`GraphModel`] is the single authoritative owner of the node and edge
//! sets; all mutation goes through replace-or-insert operations that keep
//! insertion order stable, which the layout pass relies on for determinism.

pub mod layout;
pub mod merge;

use serde::{Deserialize, Serialize};

use crate::category::Category;

/// 2-D position assigned by the layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Derive a node id from its label.
pub fn node_id(label: &str) -> String {
    format!("node-{label}")
}

/// Derive an edge id from its ordered (subject, object) label pair.
pub fn edge_id(subject: &str, object: &str) -> String {
    format!("edge-{subject}-{object}")
}

/// A graph node. Created on first mention, never deleted; category and
/// color may be upgraded in place by the merge engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub category: Category,
    pub bg_color: String,
    pub position: Position,
    /// Conversation turn at which this node was most recently touched.
    pub step: usize,
    pub opacity: f32,
}

/// A graph edge between two node ids. First predicate label wins; the
/// `step` is set at creation and never refreshed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub label: String,
    pub step: usize,
    pub opacity: f32,
}

/// The authoritative node/edge model for one conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphModel {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut GraphNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn has_edge(&self, id: &str) -> bool {
        self.edges.iter().any(|e| e.id == id)
    }

    /// Append a node. Callers must have checked identity first.
    pub(crate) fn push_node(&mut self, node: GraphNode) {
        debug_assert!(self.node(&node.id).is_none(), "duplicate node id");
        self.nodes.push(node);
    }

    /// Append an edge. Callers must have checked identity first.
    pub(crate) fn push_edge(&mut self, edge: GraphEdge) {
        debug_assert!(!self.has_edge(&edge.id), "duplicate edge id");
        self.edges.push(edge);
    }

    /// Drop nodes failing the predicate. Edges are left in place; an edge
    /// whose endpoint was suppressed simply has no node to anchor it.
    pub(crate) fn retain_nodes(&mut self, keep: impl FnMut(&GraphNode) -> bool) {
        self.nodes.retain(keep);
    }

    /// Iterate mutably over all node positions, in insertion order.
    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut GraphNode> {
        self.nodes.iter_mut()
    }
}
