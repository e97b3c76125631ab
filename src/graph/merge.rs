//! Graph merge engine: folds newly extracted triples into the model.
//!
//! Merging is a pure reducer over its inputs and cannot fail. Nodes are
//! deduplicated by label-derived id, edges by their ordered endpoint pair.
//! Existing nodes follow the upgrade policy: classification strictly
//! improves over time and never regresses to the uncategorized sentinel
//! once set. Every touched node's `step` is refreshed to the current turn
//! so the visibility controller tracks recency; existing edges are never
//! re-stepped.

use std::collections::HashMap;

use rand::Rng;

use crate::annotate::Triple;
use crate::category::Category;

use super::{edge_id, node_id, GraphEdge, GraphModel, GraphNode, Position};

/// Merge policy knobs.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Overly generic labels suppressed from the visible graph
    /// (case-insensitive substring match).
    pub deny_terms: Vec<String>,
    /// Extent of the random seed position assigned to new nodes before the
    /// layout pass repositions them.
    pub seed_span: f32,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            deny_terms: [
                "dietary supplements",
                "complementary and integrative health",
                "health interventions",
                "natural products",
            ]
            .into_iter()
            .map(str::to_string)
            .collect(),
            seed_span: 400.0,
        }
    }
}

impl MergeConfig {
    fn is_denied(&self, label: &str) -> bool {
        let lower = label.to_lowercase();
        self.deny_terms.iter().any(|term| lower.contains(term.as_str()))
    }
}

/// Whether a candidate classification may replace an existing one.
///
/// True when the existing node is still a placeholder, or the candidate is
/// a genuine (non-sentinel) category that differs from the existing one.
fn is_upgrade(existing: Category, candidate: Category) -> bool {
    existing.is_placeholder() || (!candidate.is_placeholder() && candidate != existing)
}

/// Fold `triples` into the model at the given conversation turn.
///
/// `entity_categories` maps entity names to the raw category labels
/// accumulated by the extractor across the whole conversation.
pub fn merge(
    model: &mut GraphModel,
    triples: &[Triple],
    step: usize,
    entity_categories: &HashMap<String, String>,
    config: &MergeConfig,
) {
    let mut rng = rand::thread_rng();

    for triple in triples {
        upsert_node(model, &triple.subject, step, entity_categories, config, &mut rng);
        upsert_node(model, &triple.object, step, entity_categories, config, &mut rng);

        let id = edge_id(&triple.subject, &triple.object);
        if !model.has_edge(&id) {
            model.push_edge(GraphEdge {
                id,
                source: node_id(&triple.subject),
                target: node_id(&triple.object),
                label: triple.predicate.clone(),
                step,
                opacity: 1.0,
            });
        }
    }

    // Umbrella terms are suppressed from the visible graph entirely, even
    // though they pass through the extraction output.
    model.retain_nodes(|n| !config.is_denied(&n.label));

    tracing::debug!(
        nodes = model.node_count(),
        edges = model.edge_count(),
        step,
        "merged {} triple(s)",
        triples.len()
    );
}

fn upsert_node(
    model: &mut GraphModel,
    label: &str,
    step: usize,
    entity_categories: &HashMap<String, String>,
    config: &MergeConfig,
    rng: &mut impl Rng,
) {
    let candidate = Category::normalize_opt(entity_categories.get(label).map(String::as_str));
    let id = node_id(label);

    if let Some(existing) = model.node_mut(&id) {
        if is_upgrade(existing.category, candidate) {
            existing.category = candidate;
            existing.bg_color = candidate.color().to_string();
        }
        existing.step = step;
    } else {
        model.push_node(GraphNode {
            id,
            label: label.to_string(),
            category: candidate,
            bg_color: candidate.color().to_string(),
            position: Position {
                x: rng.gen_range(0.0..config.seed_span),
                y: rng.gen_range(0.0..config.seed_span),
            },
            step,
            opacity: 1.0,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_categories() -> HashMap<String, String> {
        HashMap::new()
    }

    fn categories(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn two_step_merge_scenario() {
        let mut model = GraphModel::new();
        let cfg = MergeConfig::default();

        merge(
            &mut model,
            &[Triple::new("A", "rel1", "B")],
            0,
            &no_categories(),
            &cfg,
        );
        merge(
            &mut model,
            &[Triple::new("A", "rel2", "C")],
            1,
            &no_categories(),
            &cfg,
        );

        assert_eq!(model.node_count(), 3);
        assert_eq!(model.edge_count(), 2);
        assert_eq!(model.node("node-A").unwrap().step, 1);
        assert_eq!(model.node("node-B").unwrap().step, 0);
        assert_eq!(model.node("node-C").unwrap().step, 1);
    }

    #[test]
    fn duplicate_edge_keeps_first_predicate() {
        let mut model = GraphModel::new();
        let cfg = MergeConfig::default();

        merge(
            &mut model,
            &[
                Triple::new("A", "improves", "B"),
                Triple::new("A", "worsens", "B"),
            ],
            0,
            &no_categories(),
            &cfg,
        );
        merge(
            &mut model,
            &[Triple::new("A", "third try", "B")],
            1,
            &no_categories(),
            &cfg,
        );

        assert_eq!(model.edge_count(), 1);
        let edge = &model.edges()[0];
        assert_eq!(edge.label, "improves");
        assert_eq!(edge.step, 0, "existing edges are never re-stepped");
    }

    #[test]
    fn category_upgrades_and_never_regresses() {
        let mut model = GraphModel::new();
        let cfg = MergeConfig::default();

        // First seen without a category.
        merge(&mut model, &[Triple::new("X", "r", "Y")], 0, &no_categories(), &cfg);
        assert_eq!(model.node("node-X").unwrap().category, Category::Uncategorized);

        // Annotated later: upgrade.
        merge(
            &mut model,
            &[Triple::new("X", "r", "Z")],
            1,
            &categories(&[("X", "Drugs")]),
            &cfg,
        );
        let x = model.node("node-X").unwrap();
        assert_eq!(x.category, Category::Drugs);
        assert_eq!(x.bg_color, Category::Drugs.color());

        // Seen again without annotation: no regression to the sentinel.
        merge(&mut model, &[Triple::new("X", "r", "W")], 2, &no_categories(), &cfg);
        assert_eq!(model.node("node-X").unwrap().category, Category::Drugs);
    }

    #[test]
    fn reclassification_between_genuine_categories() {
        let mut model = GraphModel::new();
        let cfg = MergeConfig::default();

        merge(
            &mut model,
            &[Triple::new("X", "r", "Y")],
            0,
            &categories(&[("X", "Symptom")]),
            &cfg,
        );
        merge(
            &mut model,
            &[Triple::new("X", "r", "Z")],
            1,
            &categories(&[("X", "Disease")]),
            &cfg,
        );
        assert_eq!(model.node("node-X").unwrap().category, Category::Disease);
    }

    #[test]
    fn node_set_never_shrinks() {
        let mut model = GraphModel::new();
        let cfg = MergeConfig::default();
        let mut last = 0;
        for (step, t) in [
            Triple::new("a", "r", "b"),
            Triple::new("b", "r", "c"),
            Triple::new("a", "r", "c"),
            Triple::new("c", "r", "a"),
        ]
        .iter()
        .enumerate()
        {
            merge(&mut model, std::slice::from_ref(t), step, &no_categories(), &cfg);
            assert!(model.node_count() >= last);
            last = model.node_count();
        }
    }

    #[test]
    fn deny_listed_labels_are_suppressed() {
        let mut model = GraphModel::new();
        let cfg = MergeConfig::default();

        merge(
            &mut model,
            &[Triple::new("Dietary Supplements", "include", "Fish Oil")],
            0,
            &no_categories(),
            &cfg,
        );
        assert!(model.node("node-Dietary Supplements").is_none());
        assert!(model.node("node-Fish Oil").is_some());
        // The edge itself is retained; the renderer simply has no anchor.
        assert_eq!(model.edge_count(), 1);
    }

    #[test]
    fn empty_label_inserts_degenerate_node() {
        let mut model = GraphModel::new();
        let cfg = MergeConfig::default();
        merge(&mut model, &[Triple::new("", "r", "b")], 0, &no_categories(), &cfg);
        assert!(model.node("node-").is_some());
    }
}
