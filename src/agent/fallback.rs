use super::action::{Action, PlannedAction, SwipeGesture};
use crate::config::DEFAULT_SWIPE_MS;

/// Android BACK key
pub const KEYCODE_BACK: u32 = 4;

/// Fixed navigation moves tried when the previous step changed nothing.
///
/// The move is picked by `step % len`, so consecutive stagnant steps rotate
/// through the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPolicy {
    moves: Vec<PlannedAction>,
}

impl FallbackPolicy {
    /// Returns `None` for an empty list
    pub fn new(moves: Vec<PlannedAction>) -> Option<Self> {
        if moves.is_empty() {
            None
        } else {
            Some(Self { moves })
        }
    }

    /// Back, scroll down, tap the top-left menu area
    pub fn navigation() -> Self {
        Self {
            moves: vec![
                PlannedAction::new(
                    Action::KeyEvent { code: KEYCODE_BACK },
                    "No UI change detected; pressing back to recover navigation",
                ),
                PlannedAction::new(
                    Action::Swipe(SwipeGesture {
                        x1: 540,
                        y1: 1500,
                        x2: 540,
                        y2: 800,
                        ms: DEFAULT_SWIPE_MS,
                    }),
                    "No UI change detected; scrolling to reveal hidden elements",
                ),
                PlannedAction::new(
                    Action::Tap { x: 100, y: 200 },
                    "No UI change detected; opening the menu or settings area",
                ),
            ],
        }
    }

    pub fn for_step(&self, step: u32) -> &PlannedAction {
        &self.moves[step as usize % self.moves.len()]
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::navigation()
    }
}
