//! Hierarchical rank-based layout.
//!
//! Assigns each node a rank via longest-path layering over a petgraph
//! digraph, places fixed-size node boxes on a rank grid, then centers the
//! finished bounding box in the viewport. Cycles are tolerated: DFS back
//! edges are ignored for ranking, so the pass always terminates. Within a
//! rank, nodes keep the model's insertion order, which makes the layout
//! deterministic for a given node/edge set and viewport. Re-layout may
//! reposition previously placed nodes; idempotence is not required.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{depth_first_search, Control, DfsEvent, EdgeRef};
use petgraph::Direction as PetDirection;

use super::GraphModel;

/// Layout flow direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    TopToBottom,
    LeftToRight,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tb" | "top-to-bottom" => Ok(Direction::TopToBottom),
            "lr" | "left-to-right" => Ok(Direction::LeftToRight),
            other => Err(format!("unknown direction \"{other}\" (expected tb or lr)")),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::TopToBottom => f.write_str("tb"),
            Direction::LeftToRight => f.write_str("lr"),
        }
    }
}

/// Viewport dimensions the layout centers into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

/// Geometry knobs for the layout pass.
#[derive(Debug, Clone)]
pub struct LayoutConfig {
    /// Fixed node box width.
    pub node_width: f32,
    /// Fixed node box height.
    pub node_height: f32,
    /// Gap between consecutive ranks.
    pub rank_sep: f32,
    /// Gap between neighbors within a rank.
    pub node_sep: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            node_width: 172.0,
            node_height: 86.0,
            rank_sep: 120.0,
            node_sep: 60.0,
        }
    }
}

/// Recompute positions for the whole model and center it in the viewport.
pub fn layout(model: &mut GraphModel, direction: Direction, viewport: Viewport, config: &LayoutConfig) {
    if model.node_count() == 0 {
        return;
    }

    let ranks = assign_ranks(model);

    // Place boxes on the rank grid; insertion order decides the slot
    // within each rank.
    let mut slot_in_rank: HashMap<usize, usize> = HashMap::new();
    let rank_pitch = match direction {
        Direction::TopToBottom => config.node_height + config.rank_sep,
        Direction::LeftToRight => config.node_width + config.rank_sep,
    };
    let slot_pitch = match direction {
        Direction::TopToBottom => config.node_width + config.node_sep,
        Direction::LeftToRight => config.node_height + config.node_sep,
    };

    for (i, node) in model.nodes_mut().enumerate() {
        let rank = ranks[i];
        let slot = slot_in_rank.entry(rank).or_insert(0);
        let along_rank = rank as f32 * rank_pitch;
        let along_slot = *slot as f32 * slot_pitch;
        *slot += 1;
        match direction {
            Direction::TopToBottom => {
                node.position.x = along_slot;
                node.position.y = along_rank;
            }
            Direction::LeftToRight => {
                node.position.x = along_rank;
                node.position.y = along_slot;
            }
        }
    }

    center(model, viewport, config);
}

/// Longest-path layering, ignoring DFS back edges so cycles terminate.
fn assign_ranks(model: &GraphModel) -> Vec<usize> {
    let mut graph: DiGraph<(), ()> = DiGraph::new();
    let mut index_of: HashMap<&str, NodeIndex> = HashMap::new();
    for node in model.nodes() {
        index_of.insert(node.id.as_str(), graph.add_node(()));
    }
    for edge in model.edges() {
        // Endpoints may be missing when a deny-listed label was suppressed.
        if let (Some(&s), Some(&t)) = (
            index_of.get(edge.source.as_str()),
            index_of.get(edge.target.as_str()),
        ) {
            graph.add_edge(s, t, ());
        }
    }

    let mut back: HashSet<(NodeIndex, NodeIndex)> = HashSet::new();
    depth_first_search(&graph, graph.node_indices(), |event| {
        if let DfsEvent::BackEdge(u, v) = event {
            back.insert((u, v));
        }
        Control::<()>::Continue
    });

    let keep = |u: NodeIndex, v: NodeIndex| u != v && !back.contains(&(u, v));

    // Kahn over the remaining DAG, relaxing ranks along the way.
    let mut indegree = vec![0usize; graph.node_count()];
    for e in graph.edge_references() {
        if keep(e.source(), e.target()) {
            indegree[e.target().index()] += 1;
        }
    }
    let mut queue: VecDeque<NodeIndex> = graph
        .node_indices()
        .filter(|n| indegree[n.index()] == 0)
        .collect();
    let mut rank = vec![0usize; graph.node_count()];
    while let Some(u) = queue.pop_front() {
        for e in graph.edges_directed(u, PetDirection::Outgoing) {
            let v = e.target();
            if !keep(u, v) {
                continue;
            }
            rank[v.index()] = rank[v.index()].max(rank[u.index()] + 1);
            indegree[v.index()] -= 1;
            if indegree[v.index()] == 0 {
                queue.push_back(v);
            }
        }
    }
    rank
}

/// Translate the finished bounding box to the viewport center.
fn center(model: &mut GraphModel, viewport: Viewport, config: &LayoutConfig) {
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for node in model.nodes() {
        min_x = min_x.min(node.position.x);
        min_y = min_y.min(node.position.y);
        max_x = max_x.max(node.position.x + config.node_width);
        max_y = max_y.max(node.position.y + config.node_height);
    }
    let offset_x = viewport.width / 2.0 - (min_x + max_x) / 2.0;
    let offset_y = viewport.height / 2.0 - (min_y + max_y) / 2.0;
    for node in model.nodes_mut() {
        node.position.x += offset_x;
        node.position.y += offset_y;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::annotate::Triple;
    use crate::graph::merge::{merge, MergeConfig};

    fn model_from(triples: &[Triple]) -> GraphModel {
        let mut model = GraphModel::new();
        merge(&mut model, triples, 0, &HashMap::new(), &MergeConfig::default());
        model
    }

    fn positions(model: &GraphModel) -> HashMap<String, (f32, f32)> {
        model
            .nodes()
            .iter()
            .map(|n| (n.label.clone(), (n.position.x, n.position.y)))
            .collect()
    }

    #[test]
    fn chain_ranks_descend_vertically() {
        let mut model = model_from(&[Triple::new("a", "r", "b"), Triple::new("b", "r", "c")]);
        layout(
            &mut model,
            Direction::TopToBottom,
            Viewport::default(),
            &LayoutConfig::default(),
        );
        let pos = positions(&model);
        assert!(pos["a"].1 < pos["b"].1);
        assert!(pos["b"].1 < pos["c"].1);
    }

    #[test]
    fn left_to_right_swaps_axes() {
        let mut model = model_from(&[Triple::new("a", "r", "b"), Triple::new("b", "r", "c")]);
        layout(
            &mut model,
            Direction::LeftToRight,
            Viewport::default(),
            &LayoutConfig::default(),
        );
        let pos = positions(&model);
        assert!(pos["a"].0 < pos["b"].0);
        assert!(pos["b"].0 < pos["c"].0);
    }

    #[test]
    fn cycles_terminate_with_rank_separation() {
        let mut model = model_from(&[
            Triple::new("a", "r", "b"),
            Triple::new("b", "r", "c"),
            Triple::new("c", "r", "a"),
        ]);
        layout(
            &mut model,
            Direction::TopToBottom,
            Viewport::default(),
            &LayoutConfig::default(),
        );
        let pos = positions(&model);
        // The cycle is broken somewhere; the two tree edges still rank.
        assert!(pos["a"].1 < pos["b"].1);
        assert!(pos["b"].1 < pos["c"].1);
    }

    #[test]
    fn disconnected_components_are_placed() {
        let mut model = model_from(&[Triple::new("a", "r", "b"), Triple::new("x", "r", "y")]);
        layout(
            &mut model,
            Direction::TopToBottom,
            Viewport::default(),
            &LayoutConfig::default(),
        );
        let pos = positions(&model);
        assert_eq!(pos.len(), 4);
        // Same rank, distinct slots.
        assert_eq!(pos["a"].1, pos["x"].1);
        assert_ne!(pos["a"].0, pos["x"].0);
    }

    #[test]
    fn layout_is_deterministic() {
        let triples = [
            Triple::new("a", "r", "b"),
            Triple::new("a", "r", "c"),
            Triple::new("c", "r", "d"),
        ];
        let mut m1 = model_from(&triples);
        let mut m2 = m1.clone();
        let cfg = LayoutConfig::default();
        layout(&mut m1, Direction::TopToBottom, Viewport::default(), &cfg);
        layout(&mut m2, Direction::TopToBottom, Viewport::default(), &cfg);
        assert_eq!(positions(&m1), positions(&m2));
    }

    #[test]
    fn bounding_box_is_centered_in_viewport() {
        let mut model = model_from(&[Triple::new("a", "r", "b")]);
        let viewport = Viewport {
            width: 1000.0,
            height: 600.0,
        };
        let cfg = LayoutConfig::default();
        layout(&mut model, Direction::TopToBottom, viewport, &cfg);

        let mut min_x = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        for n in model.nodes() {
            min_x = min_x.min(n.position.x);
            max_x = max_x.max(n.position.x + cfg.node_width);
        }
        let center_x = (min_x + max_x) / 2.0;
        assert!((center_x - 500.0).abs() < 0.5);
    }

    #[test]
    fn empty_model_is_a_no_op() {
        let mut model = GraphModel::new();
        layout(
            &mut model,
            Direction::TopToBottom,
            Viewport::default(),
            &LayoutConfig::default(),
        );
        assert_eq!(model.node_count(), 0);
    }

    #[test]
    fn direction_parses_from_str() {
        assert_eq!("tb".parse::<Direction>().unwrap(), Direction::TopToBottom);
        assert_eq!("LR".parse::<Direction>().unwrap(), Direction::LeftToRight);
        assert!("diagonal".parse::<Direction>().is_err());
    }
}
