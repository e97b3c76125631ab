//! Step visibility controller.
//!
//! A conversation turn (one user/assistant pair) is a "step"; the active
//! step selects which part of the graph renders at full opacity. The
//! controller is a small state machine over the active index, clamped to
//! `[0, floor(message_count / 2) - 1]` whenever the message count changes.
//! Opacity itself is a pure projection of `(element step, active step)`
//! applied at query time, never a stored mutation.

/// Dim opacity applied to nodes outside the active step.
pub const NODE_DIM_OPACITY: f32 = 0.6;
/// Dim opacity applied to edges outside the active step.
pub const EDGE_DIM_OPACITY: f32 = 0.4;

/// Opacity for a node with the given step under the given active step.
pub fn node_opacity(step: usize, active: usize) -> f32 {
    if step == active { 1.0 } else { NODE_DIM_OPACITY }
}

/// Opacity for an edge with the given step under the given active step.
pub fn edge_opacity(step: usize, active: usize) -> f32 {
    if step == active { 1.0 } else { EDGE_DIM_OPACITY }
}

/// State machine over the active conversation turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepController {
    active: usize,
}

impl StepController {
    pub fn new() -> Self {
        Self::default()
    }

    /// The active turn index.
    pub fn active(&self) -> usize {
        self.active
    }

    /// Highest valid step for the given message count (0 when no complete
    /// turn exists yet).
    pub fn max_step(message_count: usize) -> usize {
        (message_count / 2).saturating_sub(1)
    }

    /// Advance one step, clamping at the last turn.
    pub fn next(&mut self, message_count: usize) {
        self.active = (self.active + 1).min(Self::max_step(message_count));
    }

    /// Go back one step, clamping at zero.
    pub fn back(&mut self) {
        self.active = self.active.saturating_sub(1);
    }

    /// Jump to an arbitrary step, clamped into the valid range.
    pub fn jump_to(&mut self, step: usize, message_count: usize) {
        self.active = step.min(Self::max_step(message_count));
    }

    /// First token of a new streamed answer arrived: focus its turn.
    pub fn auto_advance(&mut self, turn: usize, message_count: usize) {
        self.jump_to(turn, message_count);
    }

    /// Re-establish the range invariant after the message count changed.
    pub fn clamp(&mut self, message_count: usize) {
        self.active = self.active.min(Self::max_step(message_count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_and_back_clamp() {
        let mut steps = StepController::new();
        steps.back();
        assert_eq!(steps.active(), 0);

        // Two complete turns: valid range is [0, 1].
        steps.next(4);
        assert_eq!(steps.active(), 1);
        steps.next(4);
        assert_eq!(steps.active(), 1);
        steps.back();
        steps.back();
        assert_eq!(steps.active(), 0);
    }

    #[test]
    fn jump_clamps_into_range() {
        let mut steps = StepController::new();
        steps.jump_to(99, 6);
        assert_eq!(steps.active(), 2);
        steps.jump_to(1, 6);
        assert_eq!(steps.active(), 1);
    }

    #[test]
    fn clamp_invariant_under_message_count_changes() {
        let mut steps = StepController::new();
        steps.jump_to(3, 8); // four turns, active 3
        assert_eq!(steps.active(), 3);

        for count in [8, 6, 5, 2, 1, 0] {
            steps.clamp(count);
            assert!(steps.active() <= StepController::max_step(count));
        }
        assert_eq!(steps.active(), 0);
    }

    #[test]
    fn auto_advance_focuses_new_turn() {
        let mut steps = StepController::new();
        // Third turn just started streaming (6 messages incl. placeholder).
        steps.auto_advance(2, 6);
        assert_eq!(steps.active(), 2);
    }

    #[test]
    fn opacity_is_a_pure_projection() {
        assert_eq!(node_opacity(1, 1), 1.0);
        assert_eq!(node_opacity(0, 1), NODE_DIM_OPACITY);
        assert_eq!(edge_opacity(2, 2), 1.0);
        assert_eq!(edge_opacity(2, 0), EDGE_DIM_OPACITY);
    }
}
