//! The 100-tile board and its snake/ladder remapping.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::constants::{CLASSIC_LADDERS, CLASSIC_SNAKES, GOAL_TILE, LOG_BOARD, START_TILE};
use crate::error::EngineError;

/// Which way a transform sends the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    Snake,
    Ladder,
}

/// A single snake or ladder hop that fired during a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transform {
    pub kind: TransformKind,
    pub from: u8,
    pub to: u8,
}

/// Errors raised when a transform table breaks the board invariants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BoardTableError {
    #[error("{kind:?} at {from}->{to} leaves the board")]
    OffBoard { kind: TransformKind, from: u8, to: u8 },
    #[error("snake at {from} must lead down (got {to})")]
    SnakeNotDescending { from: u8, to: u8 },
    #[error("ladder at {from} must lead up (got {to})")]
    LadderNotAscending { from: u8, to: u8 },
    #[error("tile {tile} is both a snake and a ladder source")]
    SharedSource { tile: u8 },
    #[error("target {to} of the hop from {from} is itself a source")]
    ChainedTarget { from: u8, to: u8 },
}

/// Immutable snake and ladder lookup for one board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BoardTransformTable {
    snakes: BTreeMap<u8, u8>,
    ladders: BTreeMap<u8, u8>,
}

impl BoardTransformTable {
    /// A board with no snakes and no ladders.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard 10-snake, 9-ladder board.
    #[must_use]
    pub fn classic() -> Self {
        Self {
            snakes: CLASSIC_SNAKES.into_iter().collect(),
            ladders: CLASSIC_LADDERS.into_iter().collect(),
        }
    }

    /// Build and validate a table from explicit pairs.
    ///
    /// # Errors
    ///
    /// Returns a [`BoardTableError`] describing the first violated invariant.
    pub fn new(
        snakes: impl IntoIterator<Item = (u8, u8)>,
        ladders: impl IntoIterator<Item = (u8, u8)>,
    ) -> Result<Self, BoardTableError> {
        let table = Self {
            snakes: snakes.into_iter().collect(),
            ladders: ladders.into_iter().collect(),
        };
        table.validate()?;
        Ok(table)
    }

    /// Check the board invariants. Deserialized tables should be validated
    /// before use.
    ///
    /// # Errors
    ///
    /// Returns a [`BoardTableError`] describing the first violated invariant.
    pub fn validate(&self) -> Result<(), BoardTableError> {
        let on_board = |t: u8| (START_TILE..=GOAL_TILE).contains(&t);
        for transform in self.transforms() {
            let Transform { kind, from, to } = transform;
            if !on_board(from) || !on_board(to) {
                return Err(BoardTableError::OffBoard { kind, from, to });
            }
            match kind {
                TransformKind::Snake if to >= from => {
                    return Err(BoardTableError::SnakeNotDescending { from, to });
                }
                TransformKind::Ladder if to <= from => {
                    return Err(BoardTableError::LadderNotAscending { from, to });
                }
                _ => {}
            }
            if kind == TransformKind::Snake && self.ladders.contains_key(&from) {
                return Err(BoardTableError::SharedSource { tile: from });
            }
            if self.lookup(to).is_some() {
                return Err(BoardTableError::ChainedTarget { from, to });
            }
        }
        Ok(())
    }

    /// Every transform on the board, snakes first, each in tile order.
    pub fn transforms(&self) -> impl Iterator<Item = Transform> + '_ {
        let snakes = self.snakes.iter().map(|(&from, &to)| Transform {
            kind: TransformKind::Snake,
            from,
            to,
        });
        let ladders = self.ladders.iter().map(|(&from, &to)| Transform {
            kind: TransformKind::Ladder,
            from,
            to,
        });
        snakes.chain(ladders)
    }

    /// The transform sourced at `tile`, if any. Absence is not an error.
    #[must_use]
    pub fn lookup(&self, tile: u8) -> Option<Transform> {
        if let Some(&to) = self.snakes.get(&tile) {
            return Some(Transform {
                kind: TransformKind::Snake,
                from: tile,
                to,
            });
        }
        self.ladders.get(&tile).map(|&to| Transform {
            kind: TransformKind::Ladder,
            from: tile,
            to,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snakes.is_empty() && self.ladders.is_empty()
    }

    /// Advance from `position` by `steps`, truncating at the goal and then
    /// taking at most one snake or ladder hop. The destination of a hop is
    /// never re-checked.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NonPositiveSteps`] for `steps < 1` and
    /// [`EngineError::TileOutOfRange`] when `position` is off the board.
    pub fn apply_move(&self, position: u8, steps: i32) -> Result<MoveOutcome, EngineError> {
        if !(START_TILE..=GOAL_TILE).contains(&position) {
            return Err(EngineError::TileOutOfRange { tile: position });
        }
        if steps < 1 {
            log::warn!(target: LOG_BOARD, "rejected move of {steps} from tile {position}");
            return Err(EngineError::NonPositiveSteps { steps });
        }

        let raw = i64::from(position) + i64::from(steps);
        let landed = u8::try_from(raw.min(i64::from(GOAL_TILE))).unwrap_or(GOAL_TILE);
        let transform = self.lookup(landed);
        let final_tile = transform.map_or(landed, |t| t.to).min(GOAL_TILE);

        if let Some(t) = transform {
            log::debug!(
                target: LOG_BOARD,
                "{:?} at {} sends player to {}",
                t.kind,
                t.from,
                t.to
            );
        }

        Ok(MoveOutcome {
            from: position,
            landed,
            position: final_tile,
            transform,
            won: final_tile >= GOAL_TILE,
        })
    }
}

/// Result of a single board move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub from: u8,
    /// Tile reached before any snake or ladder.
    pub landed: u8,
    /// Final tile after the hop.
    pub position: u8,
    pub transform: Option<Transform>,
    pub won: bool,
}
