//! Board game modes and the rules each one switches on.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::board::BoardTransformTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GameMode {
    /// Multiple choice with jungle wild events.
    Jumanji,
    /// Timed word assembly from letter tiles.
    Scrabble,
    /// Multiple choice where the move distance is a die roll on the
    /// snakes-and-ladders board.
    Snakes,
}

impl GameMode {
    pub const ALL: [GameMode; 3] = [GameMode::Jumanji, GameMode::Scrabble, GameMode::Snakes];

    /// Question category stored with content.
    #[must_use]
    pub const fn category(self) -> &'static str {
        match self {
            GameMode::Jumanji => "Jumanji",
            GameMode::Scrabble => "Scrabble",
            GameMode::Snakes => "Snakes",
        }
    }

    #[must_use]
    pub const fn difficulty(self) -> u8 {
        match self {
            GameMode::Jumanji => 1,
            GameMode::Scrabble => 2,
            GameMode::Snakes => 3,
        }
    }

    #[must_use]
    pub const fn is_timed(self) -> bool {
        matches!(self, GameMode::Scrabble)
    }

    #[must_use]
    pub const fn rolls_dice(self) -> bool {
        matches!(self, GameMode::Snakes)
    }

    #[must_use]
    pub const fn has_wild_events(self) -> bool {
        matches!(self, GameMode::Jumanji)
    }

    /// Board used by this mode. Only snakes mode has snakes and ladders.
    #[must_use]
    pub fn board(self) -> BoardTransformTable {
        if self.rolls_dice() {
            BoardTransformTable::classic()
        } else {
            BoardTransformTable::empty()
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.category())
    }
}

impl FromStr for GameMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameMode::ALL
            .into_iter()
            .find(|mode| mode.category().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown game mode: {s}"))
    }
}
