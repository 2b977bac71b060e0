//! Per-round turn state machine.
//!
//! ```text
//! AwaitingQuestion -> Answering -> Resolved(correct)   -> Moving -> NextTurnOrWin
//!                                  Resolved(incorrect) ----------> NextTurnOrWin
//! NextTurnOrWin -> AwaitingQuestion (next seat) | Win
//! ```
//!
//! Only one question is ever active. Calls made in the wrong phase are
//! rejected without touching the round.
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::LOG_ROUND;
use crate::error::EngineError;
use crate::events::{ProgressionEngine, Resolution, ScoreEvent};
use crate::player::PlayerState;
use crate::turns::next_turn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Correct,
    Incorrect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "phase", content = "verdict", rename_all = "snake_case")]
pub enum RoundPhase {
    AwaitingQuestion,
    Answering,
    Resolved(Verdict),
    Moving,
    NextTurnOrWin,
    Win,
}

impl fmt::Display for RoundPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundPhase::AwaitingQuestion => write!(f, "awaiting a question"),
            RoundPhase::Answering => write!(f, "answering"),
            RoundPhase::Resolved(Verdict::Correct) => write!(f, "resolved correct"),
            RoundPhase::Resolved(Verdict::Incorrect) => write!(f, "resolved incorrect"),
            RoundPhase::Moving => write!(f, "moving"),
            RoundPhase::NextTurnOrWin => write!(f, "between turns"),
            RoundPhase::Win => write!(f, "won"),
        }
    }
}

/// One game round over a fixed roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RoundRecord")]
pub struct Round {
    seats: Vec<PlayerState>,
    current: usize,
    phase: RoundPhase,
    skip_next: bool,
    repeat_turn: bool,
}

/// Unchecked wire form of [`Round`].
#[derive(Deserialize)]
struct RoundRecord {
    seats: Vec<PlayerState>,
    current: usize,
    phase: RoundPhase,
    #[serde(default)]
    skip_next: bool,
    #[serde(default)]
    repeat_turn: bool,
}

impl TryFrom<RoundRecord> for Round {
    type Error = EngineError;

    fn try_from(record: RoundRecord) -> Result<Self, Self::Error> {
        if record.seats.is_empty() {
            return Err(EngineError::EmptyRoster);
        }
        if record.current >= record.seats.len() {
            return Err(EngineError::PlayerIndexOutOfRange {
                index: record.current,
                count: record.seats.len(),
            });
        }
        Ok(Self {
            seats: record.seats,
            current: record.current,
            phase: record.phase,
            skip_next: record.skip_next,
            repeat_turn: record.repeat_turn,
        })
    }
}

impl Round {
    /// Start a round with the first seat to act.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::EmptyRoster`] for an empty roster.
    pub fn new(seats: Vec<PlayerState>) -> Result<Self, EngineError> {
        if seats.is_empty() {
            return Err(EngineError::EmptyRoster);
        }
        Ok(Self {
            seats,
            current: 0,
            phase: RoundPhase::AwaitingQuestion,
            skip_next: false,
            repeat_turn: false,
        })
    }

    #[must_use]
    pub const fn phase(&self) -> RoundPhase {
        self.phase
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn seats(&self) -> &[PlayerState] {
        &self.seats
    }

    /// The seat to act. `current` always indexes `seats`: both constructors
    /// and deserialization reject an empty roster or a stray index.
    #[must_use]
    pub fn current_player(&self) -> &PlayerState {
        &self.seats[self.current]
    }

    /// Seat index of the winner once the round is over.
    #[must_use]
    pub fn winner(&self) -> Option<usize> {
        (self.phase == RoundPhase::Win).then_some(self.current)
    }

    #[must_use]
    pub fn is_over(&self) -> bool {
        self.phase == RoundPhase::Win
    }

    /// A question has been put to the current player.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IllegalTransition`] outside `AwaitingQuestion`.
    pub fn ask(&mut self) -> Result<(), EngineError> {
        self.expect(RoundPhase::AwaitingQuestion, "ask a question")?;
        self.transition(RoundPhase::Answering);
        Ok(())
    }

    /// Record the verdict on the active question.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IllegalTransition`] outside `Answering`.
    pub fn answer(&mut self, verdict: Verdict) -> Result<(), EngineError> {
        self.expect(RoundPhase::Answering, "answer")?;
        self.transition(RoundPhase::Resolved(verdict));
        Ok(())
    }

    /// Apply the wrong-answer penalty and close the turn. When the rules ask
    /// for a retry the same seat is asked again.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IllegalTransition`] outside `Resolved(incorrect)`.
    pub fn penalize(&mut self, engine: &ProgressionEngine) -> Result<Resolution, EngineError> {
        self.expect(RoundPhase::Resolved(Verdict::Incorrect), "apply a penalty")?;
        let resolution = self.apply_to_current(engine, &ScoreEvent::WrongAnswer)?;
        self.repeat_turn = engine.rules().retry_after_wrong_answer;
        self.transition(RoundPhase::NextTurnOrWin);
        Ok(resolution)
    }

    /// A correct answer hands over to movement.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IllegalTransition`] outside `Resolved(correct)`.
    pub fn start_move(&mut self) -> Result<(), EngineError> {
        self.expect(RoundPhase::Resolved(Verdict::Correct), "start moving")?;
        self.transition(RoundPhase::Moving);
        Ok(())
    }

    /// Apply the movement event for the current seat.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IllegalTransition`] outside `Moving` and
    /// propagates engine validation errors, leaving the round in `Moving`.
    pub fn complete_move(
        &mut self,
        engine: &ProgressionEngine,
        event: &ScoreEvent,
    ) -> Result<Resolution, EngineError> {
        self.expect(RoundPhase::Moving, "move")?;
        let resolution = self.apply_to_current(engine, event)?;
        self.transition(RoundPhase::NextTurnOrWin);
        Ok(resolution)
    }

    /// Apply an extra effect between turns, such as a wild event. Rejected
    /// once the current seat has reached the goal.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IllegalTransition`] outside `NextTurnOrWin` or
    /// after the current seat has won.
    pub fn apply_bonus(
        &mut self,
        engine: &ProgressionEngine,
        event: &ScoreEvent,
    ) -> Result<Resolution, EngineError> {
        self.expect(RoundPhase::NextTurnOrWin, "apply a bonus")?;
        if self.current_player().has_won() {
            return Err(EngineError::IllegalTransition {
                action: "apply a bonus after the goal",
                phase: self.phase,
            });
        }
        let resolution = self.apply_to_current(engine, event)?;
        if resolution.skips_next() {
            self.skip_next = true;
        }
        Ok(resolution)
    }

    /// Close the turn: the round ends if the current seat has won, otherwise
    /// the next seat is asked.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IllegalTransition`] outside `NextTurnOrWin`.
    pub fn end_turn(&mut self) -> Result<RoundPhase, EngineError> {
        self.expect(RoundPhase::NextTurnOrWin, "end the turn")?;
        if self.current_player().has_won() {
            log::info!(target: LOG_ROUND, "seat {} wins the round", self.current);
            self.transition(RoundPhase::Win);
            return Ok(self.phase);
        }
        if !self.repeat_turn {
            self.current = next_turn(self.seats.len(), self.current, self.skip_next)?;
        }
        self.skip_next = false;
        self.repeat_turn = false;
        self.transition(RoundPhase::AwaitingQuestion);
        Ok(self.phase)
    }

    fn apply_to_current(
        &mut self,
        engine: &ProgressionEngine,
        event: &ScoreEvent,
    ) -> Result<Resolution, EngineError> {
        let resolution = engine.apply(&self.seats[self.current], event)?;
        self.seats[self.current] = resolution.state;
        Ok(resolution)
    }

    fn expect(&self, phase: RoundPhase, action: &'static str) -> Result<(), EngineError> {
        if self.phase == phase {
            Ok(())
        } else {
            log::warn!(target: LOG_ROUND, "cannot {action} while {}", self.phase);
            Err(EngineError::IllegalTransition {
                action,
                phase: self.phase,
            })
        }
    }

    fn transition(&mut self, next: RoundPhase) {
        log::debug!(
            target: LOG_ROUND,
            "seat {}: {} -> {}",
            self.current,
            self.phase,
            next
        );
        self.phase = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::BoardTransformTable;
    use crate::config::RulesConfig;

    fn two_players() -> Round {
        Round::new(vec![PlayerState::default(), PlayerState::default()]).unwrap()
    }

    fn correct_move(round: &mut Round, engine: &ProgressionEngine, steps: i32) -> Resolution {
        round.ask().unwrap();
        round.answer(Verdict::Correct).unwrap();
        round.start_move().unwrap();
        round
            .complete_move(engine, &ScoreEvent::DiceRoll { steps })
            .unwrap()
    }

    #[test]
    fn empty_roster_rejected() {
        assert_eq!(Round::new(Vec::new()), Err(EngineError::EmptyRoster));
    }

    #[test]
    fn correct_turn_passes_to_next_seat() {
        let engine = ProgressionEngine::default();
        let mut round = two_players();
        let res = correct_move(&mut round, &engine, 2);
        assert_eq!(res.state.position(), 3);
        assert_eq!(round.phase(), RoundPhase::NextTurnOrWin);
        assert_eq!(round.end_turn().unwrap(), RoundPhase::AwaitingQuestion);
        assert_eq!(round.current_index(), 1);
    }

    #[test]
    fn winning_roll_ends_round() {
        let engine = ProgressionEngine::default();
        let mut round =
            Round::new(vec![PlayerState::resume(94, 0).unwrap(), PlayerState::default()])
                .unwrap();
        let res = correct_move(&mut round, &engine, 6);
        assert!(res.won());
        assert_eq!(round.end_turn().unwrap(), RoundPhase::Win);
        assert_eq!(round.winner(), Some(0));
        assert!(round.ask().is_err());
    }

    #[test]
    fn wrong_answer_retries_same_seat_by_default() {
        let engine = ProgressionEngine::default();
        let mut round = two_players();
        round.ask().unwrap();
        round.answer(Verdict::Incorrect).unwrap();
        assert!(round.start_move().is_err());
        round.penalize(&engine).unwrap();
        round.end_turn().unwrap();
        assert_eq!(round.current_index(), 0);
    }

    #[test]
    fn wrong_answer_passes_turn_when_retry_disabled() {
        let rules = RulesConfig {
            retry_after_wrong_answer: false,
            ..RulesConfig::default()
        };
        let engine = ProgressionEngine::new(rules, BoardTransformTable::classic());
        let mut round = two_players();
        round.ask().unwrap();
        round.answer(Verdict::Incorrect).unwrap();
        round.penalize(&engine).unwrap();
        round.end_turn().unwrap();
        assert_eq!(round.current_index(), 1);
    }

    #[test]
    fn skip_bonus_jumps_a_seat() {
        let engine = ProgressionEngine::default();
        let mut round = Round::new(vec![PlayerState::default(); 4]).unwrap();
        correct_move(&mut round, &engine, 2);
        round.apply_bonus(&engine, &ScoreEvent::Skip).unwrap();
        round.end_turn().unwrap();
        assert_eq!(round.current_index(), 2);
        correct_move(&mut round, &engine, 2);
        round.end_turn().unwrap();
        assert_eq!(round.current_index(), 3);
    }

    #[test]
    fn out_of_order_calls_leave_round_untouched() {
        let engine = ProgressionEngine::default();
        let mut round = two_players();
        let before = round.clone();
        assert!(round.answer(Verdict::Correct).is_err());
        assert!(round.start_move().is_err());
        assert!(
            round
                .complete_move(&engine, &ScoreEvent::Move { steps: 3 })
                .is_err()
        );
        assert!(round.end_turn().is_err());
        assert_eq!(round, before);
    }

    #[test]
    fn deserialize_rejects_stray_seat_index() {
        let mut json = serde_json::to_value(two_players()).unwrap();
        json["current"] = serde_json::json!(5);
        let err = serde_json::from_value::<Round>(json).unwrap_err();
        assert!(err.to_string().contains("out of range"));

        let json = serde_json::json!({
            "seats": [],
            "current": 0,
            "phase": {"phase": "awaiting_question"}
        });
        assert!(serde_json::from_value::<Round>(json).is_err());
    }

    #[test]
    fn serialized_round_restores() {
        let engine = ProgressionEngine::default();
        let mut round = two_players();
        correct_move(&mut round, &engine, 4);
        let json = serde_json::to_string(&round).unwrap();
        let restored: Round = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, round);
        assert_eq!(restored.current_player().position(), 5);
    }

    #[test]
    fn rejected_move_stays_in_moving() {
        let engine = ProgressionEngine::default();
        let mut round = two_players();
        round.ask().unwrap();
        round.answer(Verdict::Correct).unwrap();
        round.start_move().unwrap();
        assert!(
            round
                .complete_move(&engine, &ScoreEvent::Move { steps: 0 })
                .is_err()
        );
        assert_eq!(round.phase(), RoundPhase::Moving);
    }
}
