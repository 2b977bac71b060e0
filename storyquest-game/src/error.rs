//! Errors raised when an engine call receives input outside its contract.
use thiserror::Error;

use crate::round::RoundPhase;

/// Contract violations rejected by the engine. A rejected call never
/// changes state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("move must advance at least one tile (got {steps})")]
    NonPositiveSteps { steps: i32 },
    #[error("die face {face} is not on a {faces}-sided die")]
    DieFaceOutOfRange { face: i32, faces: u8 },
    #[error("xp amount must not be negative (got {amount})")]
    NegativeXp { amount: i64 },
    #[error("time remaining {remaining} exceeds the {budget}-unit budget")]
    TimeOverBudget { remaining: u32, budget: u32 },
    #[error("correct count {correct} exceeds the {total} quiz items")]
    CorrectCountOutOfRange { correct: usize, total: usize },
    #[error("a round needs at least one player")]
    EmptyRoster,
    #[error("player index {index} is out of range for {count} players")]
    PlayerIndexOutOfRange { index: usize, count: usize },
    #[error("cannot {action} while the round is {phase}")]
    IllegalTransition {
        action: &'static str,
        phase: RoundPhase,
    },
    #[error("tile {tile} is outside the board")]
    TileOutOfRange { tile: u8 },
}
