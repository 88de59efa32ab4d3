//! Game flow state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse phase of a session, advanced only by flow commands inside executed frames.
///
/// ```text
/// None -> Create -> GameBegin -> RoundBegin -> ControlStart -> RoundEnd -> GameEnd
///                                    ^                             |
///                                    +-----------------------------+
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameState {
    #[default]
    None,
    Create,
    GameBegin,
    RoundBegin,
    ControlStart,
    RoundEnd,
    GameEnd,
}

impl GameState {
    /// Whether `next` is a legal successor. `stop()` may return to `None` from anywhere.
    pub fn can_transition_to(self, next: GameState) -> bool {
        use GameState::*;

        matches!(
            (self, next),
            (_, None)
                | (None, Create)
                | (Create, GameBegin)
                | (GameBegin, RoundBegin)
                | (RoundBegin, ControlStart)
                | (ControlStart, RoundEnd)
                | (RoundEnd, RoundBegin)
                | (RoundEnd, GameEnd)
        )
    }
}

impl fmt::Display for GameState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
