//! Conversation session state and the explicit pipeline orchestrator.
//!
//! A [`Session`] owns every piece of shared mutable state for one
//! conversation: the message list, the graph model, the active step, the
//! seen-triple set, and the accumulated entity-category map. The pipeline
//! stages (extract, merge, layout, visibility) are plain functions invoked
//! here whenever their declared inputs change; there are no implicit
//! reactive effects. All stages run inline on delta arrival, single
//! threaded, which is fast relative to network delay.
//!
//! Aborting a streamed answer keeps partially merged graph state as-is and
//! only clears the loading flag; there is no rollback.

use std::collections::{HashMap, HashSet};

use crate::annotate;
use crate::error::{SessionError, VitaResult};
use crate::graph::layout::{self, Direction, LayoutConfig, Viewport};
use crate::graph::merge::{self, MergeConfig};
use crate::graph::{GraphEdge, GraphModel, GraphNode};
use crate::step::{self, StepController};

/// Message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One conversation message.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: u64,
    pub role: Role,
    pub content: String,
    /// Milliseconds since the UNIX epoch.
    pub created_at_ms: u64,
}

/// Session-wide configuration.
#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub merge: MergeConfig,
    pub layout: LayoutConfig,
    pub viewport: Viewport,
    pub direction: Direction,
}

/// One conversation and its derived graph.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    messages: Vec<Message>,
    next_message_id: u64,
    graph: GraphModel,
    steps: StepController,
    seen_triples: HashSet<String>,
    entity_categories: HashMap<String, String>,
    loading: bool,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            messages: Vec::new(),
            next_message_id: 0,
            graph: GraphModel::new(),
            steps: StepController::new(),
            seen_triples: HashSet::new(),
            entity_categories: HashMap::new(),
            loading: false,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn graph(&self) -> &GraphModel {
        &self.graph
    }

    pub fn active_step(&self) -> usize {
        self.steps.active()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Entity categories accumulated across the whole conversation.
    pub fn entity_categories(&self) -> &HashMap<String, String> {
        &self.entity_categories
    }

    /// Index of the turn currently (or most recently) in progress.
    pub fn current_turn(&self) -> usize {
        StepController::max_step(self.messages.len())
    }

    // -- message lifecycle ---------------------------------------------------

    /// Append a user message. Returns its id.
    pub fn push_user(&mut self, content: impl Into<String>) -> u64 {
        let id = self.push_message(Role::User, content.into());
        self.steps.clamp(self.messages.len());
        id
    }

    /// Open a streamed answer: append an empty assistant message and set the
    /// loading flag. Returns the message id.
    pub fn begin_answer(&mut self) -> u64 {
        let id = self.push_message(Role::Assistant, String::new());
        self.loading = true;
        self.steps.clamp(self.messages.len());
        id
    }

    /// First token of the streamed answer arrived: focus the new turn.
    pub fn first_token(&mut self) {
        self.steps
            .auto_advance(self.current_turn(), self.messages.len());
    }

    /// Apply one text delta to the open answer and re-run the pipeline.
    pub fn apply_delta(&mut self, delta: &str) -> VitaResult<()> {
        let message = self.open_answer_mut()?;
        message.content.push_str(delta);
        self.ingest_open_answer();
        Ok(())
    }

    /// Close the streamed answer normally.
    pub fn finish_answer(&mut self) -> VitaResult<()> {
        self.open_answer_mut()?;
        self.loading = false;
        Ok(())
    }

    /// Abort the streamed answer. Partially merged graph state is retained;
    /// only the loading flag is cleared. Never fails.
    pub fn abort_answer(&mut self) {
        if self.loading {
            tracing::info!("answer aborted; keeping partially merged graph");
        }
        self.loading = false;
    }

    // -- step navigation -----------------------------------------------------

    pub fn next_step(&mut self) {
        self.steps.next(self.messages.len());
    }

    pub fn back_step(&mut self) {
        self.steps.back();
    }

    pub fn jump_to_step(&mut self, step: usize) {
        self.steps.jump_to(step, self.messages.len());
    }

    // -- layout triggers -----------------------------------------------------

    pub fn set_direction(&mut self, direction: Direction) {
        self.config.direction = direction;
        self.relayout();
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.config.viewport = viewport;
        self.relayout();
    }

    // -- renderable views ----------------------------------------------------

    /// Nodes with opacity projected for the active step.
    pub fn visible_nodes(&self) -> Vec<GraphNode> {
        let active = self.steps.active();
        self.graph
            .nodes()
            .iter()
            .cloned()
            .map(|mut n| {
                n.opacity = step::node_opacity(n.step, active);
                n
            })
            .collect()
    }

    /// Edges with opacity projected for the active step.
    pub fn visible_edges(&self) -> Vec<GraphEdge> {
        let active = self.steps.active();
        self.graph
            .edges()
            .iter()
            .cloned()
            .map(|mut e| {
                e.opacity = step::edge_opacity(e.step, active);
                e
            })
            .collect()
    }

    /// Clear all session-owned state for a new conversation.
    pub fn reset(&mut self) {
        self.messages.clear();
        self.next_message_id = 0;
        self.graph = GraphModel::new();
        self.steps = StepController::new();
        self.seen_triples.clear();
        self.entity_categories.clear();
        self.loading = false;
    }

    // -- internals -----------------------------------------------------------

    fn push_message(&mut self, role: Role, content: String) -> u64 {
        let id = self.next_message_id;
        self.next_message_id += 1;
        self.messages.push(Message {
            id,
            role,
            content,
            created_at_ms: now_ms(),
        });
        id
    }

    fn open_answer_mut(&mut self) -> Result<&mut Message, SessionError> {
        if !self.loading {
            return Err(SessionError::NoActiveAnswer);
        }
        match self.messages.last_mut() {
            Some(m) if m.role == Role::Assistant => Ok(m),
            _ => Err(SessionError::NoActiveAnswer),
        }
    }

    /// Re-extract the open answer's accumulated body, merge triples not yet
    /// seen, and re-layout. Re-extraction runs over the whole buffer each
    /// time; the seen-triple set keeps the merge incremental.
    fn ingest_open_answer(&mut self) {
        let Some(message) = self.messages.last() else {
            return;
        };
        let (body, _salient) = annotate::split_answer(&message.content);
        let extraction = annotate::extract(body);

        self.entity_categories.extend(extraction.entity_categories);

        let fresh: Vec<_> = extraction
            .triples
            .into_iter()
            .filter(|t| !self.seen_triples.contains(&t.key()))
            .collect();
        if fresh.is_empty() {
            return;
        }
        for t in &fresh {
            self.seen_triples.insert(t.key());
        }

        merge::merge(
            &mut self.graph,
            &fresh,
            self.steps.active(),
            &self.entity_categories,
            &self.config.merge,
        );
        self.relayout();
    }

    fn relayout(&mut self) {
        layout::layout(
            &mut self.graph,
            self.config.direction,
            self.config.viewport,
            &self.config.layout,
        );
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_turn(session: &mut Session, question: &str, answer_deltas: &[&str]) {
        session.push_user(question);
        session.begin_answer();
        let mut first = true;
        for delta in answer_deltas {
            if first {
                session.first_token();
                first = false;
            }
            session.apply_delta(delta).unwrap();
        }
        session.finish_answer().unwrap();
    }

    #[test]
    fn single_turn_builds_graph() {
        let mut session = Session::default();
        run_turn(
            &mut session,
            "What are the benefits of fish oil?",
            &[
                "[Fish Oil|Dietary Supplement]($N1) can ",
                "[reduce]($R1, $N1, $N2) [inflammation]($N2).",
            ],
        );

        assert_eq!(session.graph().node_count(), 2);
        assert_eq!(session.graph().edge_count(), 1);
        assert_eq!(session.active_step(), 0);
        assert!(!session.is_loading());
    }

    #[test]
    fn second_turn_touches_existing_nodes() {
        let mut session = Session::default();
        run_turn(
            &mut session,
            "q1",
            &["[A]($N1) [rel1]($R1, $N1, $N2) [B]($N2)"],
        );
        run_turn(
            &mut session,
            "q2",
            &["[A]($N1) [rel2]($R1, $N1, $N2) [C]($N2)"],
        );

        assert_eq!(session.graph().node_count(), 3);
        assert_eq!(session.graph().edge_count(), 2);
        assert_eq!(session.graph().node("node-A").unwrap().step, 1);
        assert_eq!(session.graph().node("node-B").unwrap().step, 0);
        assert_eq!(session.active_step(), 1);
    }

    #[test]
    fn duplicate_triples_across_deltas_merge_once() {
        let mut session = Session::default();
        session.push_user("q");
        session.begin_answer();
        session.first_token();
        // The same prefix re-parses on every delta; the seen-set keeps the
        // triple from merging twice.
        session
            .apply_delta("[A]($N1) [r]($R1, $N1, $N2) [B]($N2)")
            .unwrap();
        session.apply_delta(" and more prose").unwrap();
        session.finish_answer().unwrap();

        assert_eq!(session.graph().node_count(), 2);
        assert_eq!(session.graph().edge_count(), 1);
    }

    #[test]
    fn abort_mid_stream_retains_graph_and_clears_loading() {
        let mut session = Session::default();
        session.push_user("q");
        session.begin_answer();
        session.first_token();
        session
            .apply_delta("[A]($N1) [r]($R1, $N1, $N2) [B]($N2)")
            .unwrap();

        session.abort_answer();
        assert!(!session.is_loading());
        assert_eq!(session.graph().node_count(), 2);

        // Further deltas are rejected, graph untouched.
        assert!(session.apply_delta("[C]($N3)").is_err());
        assert_eq!(session.graph().node_count(), 2);
    }

    #[test]
    fn delta_without_open_answer_is_an_error() {
        let mut session = Session::default();
        assert!(session.apply_delta("text").is_err());
        session.push_user("q");
        assert!(session.apply_delta("text").is_err());
    }

    #[test]
    fn step_invariant_holds_across_appends() {
        let mut session = Session::default();
        for turn in 0..3 {
            run_turn(&mut session, "q", &["[A]($N1) [r]($R1, $N1, $N2) [B]($N2)"]);
            assert!(session.active_step() <= turn);
            assert_eq!(
                session.active_step(),
                StepController::max_step(session.messages().len())
            );
        }
    }

    #[test]
    fn visibility_projection_dims_other_steps() {
        let mut session = Session::default();
        run_turn(&mut session, "q1", &["[A]($N1) [r1]($R1, $N1, $N2) [B]($N2)"]);
        run_turn(&mut session, "q2", &["[C]($N1) [r2]($R1, $N1, $N2) [D]($N2)"]);

        assert_eq!(session.active_step(), 1);
        let nodes = session.visible_nodes();
        let a = nodes.iter().find(|n| n.label == "A").unwrap();
        let c = nodes.iter().find(|n| n.label == "C").unwrap();
        assert_eq!(a.opacity, crate::step::NODE_DIM_OPACITY);
        assert_eq!(c.opacity, 1.0);

        session.back_step();
        let nodes = session.visible_nodes();
        let a = nodes.iter().find(|n| n.label == "A").unwrap();
        assert_eq!(a.opacity, 1.0);

        let edges = session.visible_edges();
        let r2 = edges.iter().find(|e| e.label == "r2").unwrap();
        assert_eq!(r2.opacity, crate::step::EDGE_DIM_OPACITY);
    }

    #[test]
    fn body_after_delimiter_is_not_parsed() {
        let mut session = Session::default();
        run_turn(
            &mut session,
            "q",
            &["[A]($N1) [r]($R1, $N1, $N2) [B]($N2) || [\"A\", \"B\"]"],
        );
        assert_eq!(session.graph().node_count(), 2);
    }

    #[test]
    fn reset_clears_everything() {
        let mut session = Session::default();
        run_turn(&mut session, "q", &["[A]($N1) [r]($R1, $N1, $N2) [B]($N2)"]);
        session.reset();
        assert!(session.messages().is_empty());
        assert_eq!(session.graph().node_count(), 0);
        assert_eq!(session.active_step(), 0);
        assert!(!session.is_loading());
    }
}
