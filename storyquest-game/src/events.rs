//! The progression engine: folds one score event into a player's state.
//!
//! Every call is a pure `state -> state` transform. The caller owns timers,
//! dice and dialogs and only hands over the final input.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::board::{BoardTransformTable, MoveOutcome};
use crate::config::RulesConfig;
use crate::constants::{DIE_FACES, LOG_BOARD, LOG_SESSION};
use crate::error::EngineError;
use crate::level::XpChange;
use crate::player::PlayerState;
use crate::scoring::{EpisodeGrade, word_speed_score};

/// Raw input for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoreEvent {
    /// Advance a fixed number of tiles.
    Move { steps: i32 },
    /// Advance by a die face.
    DiceRoll { steps: i32 },
    /// A correct answer. Timed answers carry the clock reading and earn a
    /// speed bonus; untimed answers move the fixed correct-answer distance.
    CorrectAnswer { time_remaining: Option<u32> },
    WrongAnswer,
    /// Quiz result for an episode worth `base_reward` XP per star.
    EpisodeResult { correct: usize, base_reward: u32 },
    /// Pass over the next player.
    Skip,
    BonusXp { xp: u32 },
}

/// Something the presentation layer should show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    Moved(MoveOutcome),
    XpGained { amount: u32 },
    XpLost { amount: u32 },
    LevelUp { from: u32, to: u32 },
    Graded(EpisodeGrade),
    SkipNext,
    Win,
}

pub type EngineEvents = SmallVec<[EngineEvent; 4]>;

/// Next state plus the events derived while producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub state: PlayerState,
    pub events: EngineEvents,
}

impl Resolution {
    #[must_use]
    pub fn won(&self) -> bool {
        self.events.iter().any(|e| matches!(e, EngineEvent::Win))
    }

    #[must_use]
    pub fn leveled_up(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, EngineEvent::LevelUp { .. }))
    }

    #[must_use]
    pub fn skips_next(&self) -> bool {
        self.events.iter().any(|e| matches!(e, EngineEvent::SkipNext))
    }

    /// The board move made, if any.
    #[must_use]
    pub fn movement(&self) -> Option<MoveOutcome> {
        self.events.iter().find_map(|e| match e {
            EngineEvent::Moved(outcome) => Some(*outcome),
            _ => None,
        })
    }

    /// Net XP change across all events.
    #[must_use]
    pub fn xp_delta(&self) -> i64 {
        self.events
            .iter()
            .map(|e| match e {
                EngineEvent::XpGained { amount } => i64::from(*amount),
                EngineEvent::XpLost { amount } => -i64::from(*amount),
                _ => 0,
            })
            .sum()
    }
}

/// Rules and board bound together for one game mode.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionEngine {
    rules: RulesConfig,
    board: BoardTransformTable,
}

impl Default for ProgressionEngine {
    fn default() -> Self {
        Self::new(RulesConfig::default(), BoardTransformTable::classic())
    }
}

impl ProgressionEngine {
    #[must_use]
    pub const fn new(rules: RulesConfig, board: BoardTransformTable) -> Self {
        Self { rules, board }
    }

    #[must_use]
    pub const fn rules(&self) -> &RulesConfig {
        &self.rules
    }

    #[must_use]
    pub const fn board(&self) -> &BoardTransformTable {
        &self.board
    }

    /// Fold `event` into `state`.
    ///
    /// # Errors
    ///
    /// Returns an [`EngineError`] for malformed input; the caller's state is
    /// never touched.
    pub fn apply(
        &self,
        state: &PlayerState,
        event: &ScoreEvent,
    ) -> Result<Resolution, EngineError> {
        let mut next = *state;
        let mut events = EngineEvents::new();
        let start_level = state.level();

        match *event {
            ScoreEvent::Move { steps } => {
                self.advance(&mut next, steps, &mut events)?;
            }
            ScoreEvent::DiceRoll { steps } => {
                if !(1..=i32::from(DIE_FACES)).contains(&steps) {
                    return Err(EngineError::DieFaceOutOfRange {
                        face: steps,
                        faces: DIE_FACES,
                    });
                }
                self.advance(&mut next, steps, &mut events)?;
            }
            ScoreEvent::CorrectAnswer {
                time_remaining: Some(remaining),
            } => {
                let score = word_speed_score(&self.rules.word, remaining)?;
                gain(&mut next, score.xp, &mut events)?;
                let steps = i32::try_from(score.steps).unwrap_or(i32::MAX);
                self.advance(&mut next, steps, &mut events)?;
            }
            ScoreEvent::CorrectAnswer {
                time_remaining: None,
            } => {
                let steps = i32::from(self.rules.correct_answer_steps);
                self.advance(&mut next, steps, &mut events)?;
            }
            ScoreEvent::WrongAnswer => {
                let change = next.deduct_xp(i64::from(self.rules.wrong_answer_penalty))?;
                let lost = state.xp() - change.xp;
                events.push(EngineEvent::XpLost { amount: lost });
            }
            ScoreEvent::EpisodeResult {
                correct,
                base_reward,
            } => {
                let grade = EpisodeGrade::from_correct(correct)?;
                events.push(EngineEvent::Graded(grade));
                gain(&mut next, grade.xp_earned(base_reward), &mut events)?;
            }
            ScoreEvent::Skip => events.push(EngineEvent::SkipNext),
            ScoreEvent::BonusXp { xp } => {
                gain(&mut next, xp, &mut events)?;
            }
        }

        let end_level = next.level();
        if end_level > start_level {
            log::info!(target: LOG_SESSION, "level up {start_level} -> {end_level}");
            events.push(EngineEvent::LevelUp {
                from: start_level,
                to: end_level,
            });
        }

        Ok(Resolution {
            state: next,
            events,
        })
    }

    fn advance(
        &self,
        state: &mut PlayerState,
        steps: i32,
        events: &mut EngineEvents,
    ) -> Result<(), EngineError> {
        let outcome = state.apply_move(&self.board, steps)?;
        events.push(EngineEvent::Moved(outcome));
        if outcome.won {
            log::info!(target: LOG_BOARD, "goal reached from tile {}", outcome.from);
            events.push(EngineEvent::Win);
            gain(state, self.rules.win_bonus_xp, events)?;
        }
        Ok(())
    }
}

fn gain(
    state: &mut PlayerState,
    amount: u32,
    events: &mut EngineEvents,
) -> Result<XpChange, EngineError> {
    let before = state.xp();
    let change = state.award_xp(i64::from(amount))?;
    let gained = change.xp - before;
    if gained > 0 {
        events.push(EngineEvent::XpGained { amount: gained });
    }
    Ok(change)
}
