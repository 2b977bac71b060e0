//! Jungle-mode wild events that may fire after a regular move.
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::events::ScoreEvent;
use crate::numbers::clamp_probability;

/// A bonus effect drawn after a jungle-mode move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WildEvent {
    /// Move the current player forward. Event moves never chain another event.
    Advance { steps: u8 },
    /// Skip the next player in turn order.
    SkipNext,
    /// Grant bonus XP to the current player.
    BonusXp { xp: u32 },
}

impl WildEvent {
    /// Stable key presentation layers use to pick a message.
    #[must_use]
    pub const fn message_key(&self) -> &'static str {
        match self {
            WildEvent::Advance { steps: 1 } => "wild.vine-swing",
            WildEvent::Advance { steps: 2 } => "wild.magic-crystal",
            WildEvent::Advance { .. } => "wild.lion-ride",
            WildEvent::SkipNext => "wild.monkey-business",
            WildEvent::BonusXp { .. } => "wild.ancient-knowledge",
        }
    }

    /// Engine input applying this event to the current player.
    #[must_use]
    pub const fn score_event(self) -> ScoreEvent {
        match self {
            WildEvent::Advance { steps } => ScoreEvent::Move {
                steps: steps as i32,
            },
            WildEvent::SkipNext => ScoreEvent::Skip,
            WildEvent::BonusXp { xp } => ScoreEvent::BonusXp { xp },
        }
    }
}

/// Roll for a wild event: fires with probability `chance`, then picks one
/// of `events` uniformly.
pub fn draw_wild_event<R: Rng>(
    rng: &mut R,
    chance: f64,
    events: &[WildEvent],
) -> Option<WildEvent> {
    if events.is_empty() || !rng.gen_bool(clamp_probability(chance)) {
        return None;
    }
    let idx = rng.gen_range(0..events.len());
    events.get(idx).copied()
}
