//! Seeded game session: binds a [`Round`] to content, a game mode and the
//! random draws the pure engine never makes itself.
//!
//! Each kind of draw has its own RNG stream derived from the session seed, so
//! changing how often one is consulted (say, a different wild event chance)
//! leaves the others untouched.
use hmac::{Hmac, Mac};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::board::MoveOutcome;
use crate::config::{RulesConfig, RulesConfigError};
use crate::constants::{DIE_FACES, LOG_SESSION};
use crate::content::{ContentCatalog, Question};
use crate::error::EngineError;
use crate::events::{EngineEvent, ProgressionEngine, Resolution, ScoreEvent};
use crate::mode::GameMode;
use crate::player::PlayerState;
use crate::round::{Round, RoundPhase, Verdict};
use crate::scoring::{WordAttempt, choice_matches, score_word};
use crate::store::SavedProgress;
use crate::wild::{WildEvent, draw_wild_event};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("invalid rules: {0}")]
    Rules(#[from] RulesConfigError),
    #[error("no questions available for {mode}")]
    NoQuestions { mode: GameMode },
    #[error("no question is waiting for an answer")]
    NoActiveQuestion,
    #[error("{mode} does not take that kind of answer")]
    AnswerKind { mode: GameMode },
    #[error("carried xp lists {got} seats but the session has {expected}")]
    RosterMismatch { expected: usize, got: usize },
}

/// The question currently put to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveQuestion {
    pub seat: usize,
    pub question: Question,
    /// Shuffled letter tiles; empty for multiple-choice modes.
    pub tiles: Vec<char>,
    /// Countdown handed to the player in timed modes.
    pub time_budget: Option<u32>,
}

/// What happened during one answered turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnReport {
    pub seat: usize,
    pub question_id: u32,
    pub verdict: Verdict,
    pub roll: Option<u8>,
    pub wild: Option<WildEvent>,
    pub events: Vec<EngineEvent>,
    pub xp_delta: i64,
    pub position: u8,
    /// Phase after the turn closed: the next question or the end.
    pub phase: RoundPhase,
}

impl TurnReport {
    #[must_use]
    pub fn won(&self) -> bool {
        self.phase == RoundPhase::Win
    }

    #[must_use]
    pub fn leveled_up(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, EngineEvent::LevelUp { .. }))
    }

    /// Board moves in order: the regular move, then any wild advance.
    pub fn moves(&self) -> impl Iterator<Item = &MoveOutcome> + '_ {
        self.events.iter().filter_map(|e| match e {
            EngineEvent::Moved(outcome) => Some(outcome),
            _ => None,
        })
    }
}

#[derive(Debug, Clone)]
struct SessionRng {
    dice: ChaCha20Rng,
    wild: ChaCha20Rng,
    draw: ChaCha20Rng,
}

impl SessionRng {
    fn from_user_seed(seed: u64) -> Self {
        Self {
            dice: ChaCha20Rng::seed_from_u64(derive_stream_seed(seed, b"dice")),
            wild: ChaCha20Rng::seed_from_u64(derive_stream_seed(seed, b"wild")),
            draw: ChaCha20Rng::seed_from_u64(derive_stream_seed(seed, b"draw")),
        }
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()) else {
        return user_seed;
    };
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

/// One play session of a board mode.
#[derive(Debug, Clone)]
pub struct GameSession {
    mode: GameMode,
    seed: u64,
    engine: ProgressionEngine,
    round: Round,
    content: ContentCatalog,
    rng: SessionRng,
    session_xp: Vec<u32>,
    active: Option<ActiveQuestion>,
    turns_played: u32,
}

impl GameSession {
    /// Start a session for `seats` in turn order.
    ///
    /// # Errors
    ///
    /// Returns an error when the rules are invalid, the roster is empty or
    /// the catalog has no questions for `mode`.
    pub fn new(
        mode: GameMode,
        seed: u64,
        rules: RulesConfig,
        content: ContentCatalog,
        seats: Vec<PlayerState>,
    ) -> Result<Self, SessionError> {
        rules.validate()?;
        if content.questions_for(mode).next().is_none() {
            return Err(SessionError::NoQuestions { mode });
        }
        let session_xp = vec![0; seats.len()];
        let round = Round::new(seats)?;
        log::debug!(target: LOG_SESSION, "{mode} session seeded with {seed:#x}");
        Ok(Self {
            mode,
            seed,
            engine: ProgressionEngine::new(rules, mode.board()),
            round,
            content,
            rng: SessionRng::from_user_seed(seed),
            session_xp,
            active: None,
            turns_played: 0,
        })
    }

    /// Session with bundled rules and content and `players` fresh seats.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty roster.
    pub fn with_defaults(mode: GameMode, seed: u64, players: usize) -> Result<Self, SessionError> {
        Self::new(
            mode,
            seed,
            RulesConfig::default(),
            ContentCatalog::load_from_static(),
            vec![PlayerState::default(); players],
        )
    }

    /// Carry session xp saved by an earlier sitting, one entry per seat.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::RosterMismatch`] when `earned` does not cover
    /// every seat.
    pub fn with_session_xp(mut self, earned: Vec<u32>) -> Result<Self, SessionError> {
        if earned.len() != self.session_xp.len() {
            return Err(SessionError::RosterMismatch {
                expected: self.session_xp.len(),
                got: earned.len(),
            });
        }
        self.session_xp = earned;
        Ok(self)
    }

    #[must_use]
    pub const fn mode(&self) -> GameMode {
        self.mode
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub const fn engine(&self) -> &ProgressionEngine {
        &self.engine
    }

    #[must_use]
    pub const fn round(&self) -> &Round {
        &self.round
    }

    #[must_use]
    pub const fn active_question(&self) -> Option<&ActiveQuestion> {
        self.active.as_ref()
    }

    #[must_use]
    pub const fn turns_played(&self) -> u32 {
        self.turns_played
    }

    #[must_use]
    pub fn is_over(&self) -> bool {
        self.round.is_over()
    }

    /// XP earned by `seat` during this session, floored at zero.
    #[must_use]
    pub fn session_xp(&self, seat: usize) -> Option<u32> {
        self.session_xp.get(seat).copied()
    }

    /// Progress to persist for `seat`. A winner starts over next time.
    #[must_use]
    pub fn saved_progress(&self, seat: usize) -> Option<SavedProgress> {
        let state = self.round.seats().get(seat)?;
        if state.has_won() {
            return Some(SavedProgress::default());
        }
        Some(SavedProgress {
            position: state.position(),
            xp_earned: self.session_xp.get(seat).copied().unwrap_or(0),
        })
    }

    /// Put a random question for this mode to the current player.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::IllegalTransition`] while another question is
    /// active or after the round has been won.
    pub fn draw_question(&mut self) -> Result<&ActiveQuestion, SessionError> {
        self.round.ask()?;
        let question = self
            .content
            .random_question(self.mode, &mut self.rng.draw)
            .cloned()
            .ok_or(SessionError::NoQuestions { mode: self.mode })?;
        let tiles = if self.mode.is_timed() {
            question.letter_tiles(&mut self.rng.draw)
        } else {
            Vec::new()
        };
        let time_budget = self
            .mode
            .is_timed()
            .then_some(self.engine.rules().word.time_budget);
        log::debug!(
            target: LOG_SESSION,
            "seat {} asked question {}",
            self.round.current_index(),
            question.id
        );
        Ok(self.active.insert(ActiveQuestion {
            seat: self.round.current_index(),
            question,
            tiles,
            time_budget,
        }))
    }

    /// Answer a multiple-choice question.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AnswerKind`] in timed modes and
    /// [`SessionError::NoActiveQuestion`] before a question is drawn.
    pub fn answer_choice(&mut self, choice: &str) -> Result<TurnReport, SessionError> {
        if self.mode.is_timed() {
            return Err(SessionError::AnswerKind { mode: self.mode });
        }
        let active = self.active.as_ref().ok_or(SessionError::NoActiveQuestion)?;
        let verdict = if choice_matches(choice, &active.question.correct_answer) {
            Verdict::Correct
        } else {
            Verdict::Incorrect
        };
        self.resolve(verdict, None)
    }

    /// Submit a timed word attempt.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::AnswerKind`] in multiple-choice modes,
    /// [`SessionError::NoActiveQuestion`] before a question is drawn and
    /// [`EngineError::TimeOverBudget`] for an impossible clock reading.
    pub fn answer_word(&mut self, attempt: &WordAttempt) -> Result<TurnReport, SessionError> {
        if !self.mode.is_timed() {
            return Err(SessionError::AnswerKind { mode: self.mode });
        }
        let active = self.active.as_ref().ok_or(SessionError::NoActiveQuestion)?;
        let score = score_word(
            &self.engine.rules().word,
            attempt,
            &active.question.correct_answer,
        )?;
        match (score, attempt) {
            (
                Some(_),
                WordAttempt::Completed {
                    time_remaining, ..
                },
            ) => self.resolve(Verdict::Correct, Some(*time_remaining)),
            _ => self.resolve(Verdict::Incorrect, None),
        }
    }

    /// Resolve the active question as one unit: if any step is rejected the
    /// round, draws and session xp are restored and the question stays open.
    fn resolve(
        &mut self,
        verdict: Verdict,
        time_remaining: Option<u32>,
    ) -> Result<TurnReport, SessionError> {
        let round = self.round.clone();
        let rng = self.rng.clone();
        let session_xp = self.session_xp.clone();
        let result = self.resolve_turn(verdict, time_remaining);
        if let Err(err) = &result {
            log::warn!(target: LOG_SESSION, "turn rolled back: {err}");
            self.round = round;
            self.rng = rng;
            self.session_xp = session_xp;
        }
        result
    }

    fn resolve_turn(
        &mut self,
        verdict: Verdict,
        time_remaining: Option<u32>,
    ) -> Result<TurnReport, SessionError> {
        let seat = self.round.current_index();
        let question_id = self.active.as_ref().map_or(0, |a| a.question.id);
        self.round.answer(verdict)?;

        let mut events = Vec::new();
        let mut roll = None;
        let mut wild = None;
        match verdict {
            Verdict::Incorrect => {
                let resolution = self.round.penalize(&self.engine)?;
                events.extend(resolution.events);
            }
            Verdict::Correct => {
                self.round.start_move()?;
                let event = if self.mode.rolls_dice() {
                    let face = self.rng.dice.gen_range(1..=DIE_FACES);
                    roll = Some(face);
                    ScoreEvent::DiceRoll {
                        steps: i32::from(face),
                    }
                } else {
                    ScoreEvent::CorrectAnswer { time_remaining }
                };
                let resolution = self.round.complete_move(&self.engine, &event)?;
                let won = resolution.won();
                events.extend(resolution.events);
                if self.mode.has_wild_events() && !won {
                    wild = self.jungle_bonuses(&mut events)?;
                }
            }
        }

        let xp_delta: i64 = events
            .iter()
            .map(|e| match e {
                EngineEvent::XpGained { amount } => i64::from(*amount),
                EngineEvent::XpLost { amount } => -i64::from(*amount),
                _ => 0,
            })
            .sum();
        self.credit_session_xp(seat, xp_delta);

        let position = self.round.current_player().position();
        let phase = self.round.end_turn()?;
        self.active = None;
        self.turns_played = self.turns_played.saturating_add(1);
        if phase == RoundPhase::Win {
            log::info!(target: LOG_SESSION, "{} session won by seat {seat}", self.mode);
        }
        Ok(TurnReport {
            seat,
            question_id,
            verdict,
            roll,
            wild,
            events,
            xp_delta,
            position,
            phase,
        })
    }

    /// Step XP for the regular move, then a possible wild event. Event moves
    /// earn no step XP and never draw another event.
    fn jungle_bonuses(
        &mut self,
        events: &mut Vec<EngineEvent>,
    ) -> Result<Option<WildEvent>, SessionError> {
        let rules = self.engine.rules();
        let step_xp = rules.jungle.xp_for_steps(rules.correct_answer_steps);
        if step_xp > 0 {
            let resolution = self
                .round
                .apply_bonus(&self.engine, &ScoreEvent::BonusXp { xp: step_xp })?;
            events.extend(resolution.events);
        }
        let rules = self.engine.rules();
        let Some(event) = draw_wild_event(
            &mut self.rng.wild,
            rules.jungle.event_chance,
            &rules.jungle.events,
        ) else {
            return Ok(None);
        };
        log::debug!(target: LOG_SESSION, "wild event {}", event.message_key());
        let resolution: Resolution = self
            .round
            .apply_bonus(&self.engine, &event.score_event())?;
        events.extend(resolution.events);
        Ok(Some(event))
    }

    fn credit_session_xp(&mut self, seat: usize, delta: i64) {
        if let Some(total) = self.session_xp.get_mut(seat) {
            let next = i64::from(*total).saturating_add(delta).max(0);
            *total = u32::try_from(next).unwrap_or(u32::MAX);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answer_correctly(session: &mut GameSession) -> TurnReport {
        let answer = session
            .draw_question()
            .unwrap()
            .question
            .correct_answer
            .clone();
        if session.mode().is_timed() {
            session
                .answer_word(&WordAttempt::Completed {
                    word: answer,
                    time_remaining: 20,
                })
                .unwrap()
        } else {
            session.answer_choice(&answer).unwrap()
        }
    }

    #[test]
    fn seeded_sessions_replay_identically() {
        for mode in GameMode::ALL {
            let mut a = GameSession::with_defaults(mode, 42, 2).unwrap();
            let mut b = GameSession::with_defaults(mode, 42, 2).unwrap();
            for _ in 0..25 {
                if a.is_over() {
                    break;
                }
                assert_eq!(answer_correctly(&mut a), answer_correctly(&mut b));
            }
        }
    }

    #[test]
    fn snakes_mode_rolls_a_die() {
        let mut session = GameSession::with_defaults(GameMode::Snakes, 7, 2).unwrap();
        let report = answer_correctly(&mut session);
        let face = report.roll.unwrap();
        assert!((1..=DIE_FACES).contains(&face));
        assert_eq!(report.moves().next().unwrap().landed, 1 + face);
    }

    #[test]
    fn scrabble_answers_need_words() {
        let mut session = GameSession::with_defaults(GameMode::Scrabble, 1, 1).unwrap();
        let active = session.draw_question().unwrap();
        assert_eq!(active.time_budget, Some(30));
        assert!(active.tiles.len() >= active.question.correct_answer.len());
        assert_eq!(
            session.answer_choice("x"),
            Err(SessionError::AnswerKind {
                mode: GameMode::Scrabble
            })
        );
        let report = session.answer_word(&WordAttempt::TimedOut).unwrap();
        assert_eq!(report.verdict, Verdict::Incorrect);
        assert_eq!(report.position, 1);
    }

    #[test]
    fn timed_word_moves_and_scores() {
        let mut session = GameSession::with_defaults(GameMode::Scrabble, 5, 1).unwrap();
        let answer = session
            .draw_question()
            .unwrap()
            .question
            .correct_answer
            .to_lowercase();
        let report = session
            .answer_word(&WordAttempt::Completed {
                word: answer,
                time_remaining: 5,
            })
            .unwrap();
        assert_eq!(report.verdict, Verdict::Correct);
        assert_eq!(report.position, 7);
        assert_eq!(report.xp_delta, 25);
        assert_eq!(session.session_xp(0), Some(25));
    }

    #[test]
    fn wrong_answer_keeps_turn_and_floors_session_xp() {
        let mut session = GameSession::with_defaults(GameMode::Jumanji, 3, 2).unwrap();
        session.draw_question().unwrap();
        let report = session.answer_choice("definitely wrong").unwrap();
        assert_eq!(report.verdict, Verdict::Incorrect);
        assert_eq!(report.xp_delta, 0);
        assert_eq!(session.round().current_index(), 0);
        assert_eq!(session.session_xp(0), Some(0));
    }

    #[test]
    fn answering_without_a_question_is_rejected() {
        let mut session = GameSession::with_defaults(GameMode::Jumanji, 3, 2).unwrap();
        assert_eq!(
            session.answer_choice("map"),
            Err(SessionError::NoActiveQuestion)
        );
        session.draw_question().unwrap();
        assert!(session.draw_question().is_err());
    }

    #[test]
    fn jungle_moves_earn_step_xp() {
        let rules = RulesConfig {
            jungle: crate::config::JungleRules {
                event_chance: 0.0,
                ..crate::config::JungleRules::default()
            },
            ..RulesConfig::default()
        };
        let mut session = GameSession::new(
            GameMode::Jumanji,
            9,
            rules,
            ContentCatalog::load_from_static(),
            vec![PlayerState::default(); 2],
        )
        .unwrap();
        let report = answer_correctly(&mut session);
        assert_eq!(report.position, 4);
        assert_eq!(report.xp_delta, 10);
        assert!(report.wild.is_none());
        assert_eq!(session.round().current_index(), 1);
    }

    #[test]
    fn wild_events_fire_at_full_chance() {
        let rules = RulesConfig {
            jungle: crate::config::JungleRules {
                event_chance: 1.0,
                ..crate::config::JungleRules::default()
            },
            ..RulesConfig::default()
        };
        let mut session = GameSession::new(
            GameMode::Jumanji,
            11,
            rules,
            ContentCatalog::load_from_static(),
            vec![PlayerState::default(); 3],
        )
        .unwrap();
        let report = answer_correctly(&mut session);
        let wild = report.wild.unwrap();
        match wild {
            WildEvent::Advance { steps } => {
                assert_eq!(report.position, 4 + steps);
                assert_eq!(session.round().current_index(), 1);
            }
            WildEvent::SkipNext => assert_eq!(session.round().current_index(), 2),
            WildEvent::BonusXp { xp } => assert_eq!(report.xp_delta, 10 + i64::from(xp)),
        }
    }

    #[test]
    fn winner_saves_a_fresh_start() {
        let mut session = GameSession::new(
            GameMode::Jumanji,
            2,
            RulesConfig::default(),
            ContentCatalog::load_from_static(),
            vec![PlayerState::resume(98, 0).unwrap(), PlayerState::default()],
        )
        .unwrap();
        let report = answer_correctly(&mut session);
        assert!(report.won());
        assert!(report.wild.is_none());
        assert_eq!(report.xp_delta, 50);
        assert!(session.is_over());
        assert_eq!(session.saved_progress(0), Some(SavedProgress::default()));
        assert!(session.draw_question().is_err());
    }

    #[test]
    fn zero_step_words_are_rejected_up_front() {
        let mut rules = RulesConfig::default();
        rules.word.base_steps = 0;
        let err = GameSession::new(
            GameMode::Scrabble,
            1,
            rules,
            ContentCatalog::load_from_static(),
            vec![PlayerState::default()],
        )
        .unwrap_err();
        let reported = err.clone();
        assert_eq!(err, SessionError::Rules(RulesConfigError::ZeroWordSteps));
        assert_eq!(reported, err);
    }

    #[test]
    fn rejected_move_rolls_the_turn_back() {
        let mut session = GameSession::with_defaults(GameMode::Scrabble, 4, 2).unwrap();
        let good_engine = session.engine.clone();
        let answer = session
            .draw_question()
            .unwrap()
            .question
            .correct_answer
            .clone();
        let before = session.round().clone();

        let mut rules = RulesConfig::default();
        rules.word.base_steps = 0;
        session.engine = ProgressionEngine::new(rules, GameMode::Scrabble.board());
        let attempt = WordAttempt::Completed {
            word: answer,
            time_remaining: 30,
        };
        assert_eq!(
            session.answer_word(&attempt),
            Err(SessionError::Engine(EngineError::NonPositiveSteps { steps: 0 }))
        );
        assert_eq!(session.round(), &before);
        assert_eq!(session.round().phase(), RoundPhase::Answering);
        assert!(session.active_question().is_some());
        assert_eq!(session.turns_played(), 0);

        session.engine = good_engine;
        let report = session.answer_word(&attempt).unwrap();
        assert_eq!(report.verdict, Verdict::Correct);
        assert_eq!(report.position, 2);
        assert_eq!(session.round().current_index(), 1);
    }

    #[test]
    fn carried_session_xp_survives_a_resave() {
        let session = GameSession::with_defaults(GameMode::Jumanji, 8, 2)
            .unwrap()
            .with_session_xp(vec![40, 0])
            .unwrap();
        assert_eq!(session.session_xp(0), Some(40));
        assert_eq!(session.saved_progress(0).map(|p| p.xp_earned), Some(40));
        let err = GameSession::with_defaults(GameMode::Jumanji, 8, 2)
            .unwrap()
            .with_session_xp(vec![40])
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::RosterMismatch {
                expected: 2,
                got: 1
            }
        );
    }

    #[test]
    fn empty_catalog_is_rejected() {
        let err = GameSession::new(
            GameMode::Snakes,
            1,
            RulesConfig::default(),
            ContentCatalog::empty(),
            vec![PlayerState::default()],
        )
        .unwrap_err();
        assert_eq!(
            err,
            SessionError::NoQuestions {
                mode: GameMode::Snakes
            }
        );
    }
}
