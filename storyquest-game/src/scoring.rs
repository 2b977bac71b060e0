//! Answer scoring: timed word assembly, multiple choice and episode grades.
use serde::{Deserialize, Serialize};

use crate::config::WordRules;
use crate::constants::{MAX_STARS, QUIZ_ITEMS_PER_EPISODE};
use crate::error::EngineError;

/// How a timed word attempt ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WordAttempt {
    /// Every slot was filled with `time_remaining` units left on the clock.
    Completed { word: String, time_remaining: u32 },
    /// The clock reached zero before the slots were filled.
    TimedOut,
}

/// Reward for a correctly assembled word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordScore {
    pub speed_bonus: u32,
    pub steps: u32,
    pub xp: u32,
}

/// Word comparison ignores ASCII case on both sides and nothing else.
#[must_use]
pub fn words_match(assembled: &str, target: &str) -> bool {
    assembled.eq_ignore_ascii_case(target)
}

/// Reward for a correct word completed with `time_remaining` units left.
///
/// # Errors
///
/// Returns [`EngineError::TimeOverBudget`] when more time remains than the
/// budget allows.
pub fn word_speed_score(rules: &WordRules, time_remaining: u32) -> Result<WordScore, EngineError> {
    if time_remaining > rules.time_budget {
        return Err(EngineError::TimeOverBudget {
            remaining: time_remaining,
            budget: rules.time_budget,
        });
    }
    let elapsed = rules.time_budget - time_remaining;
    let speed_bonus = elapsed / rules.bonus_window.max(1);
    Ok(WordScore {
        speed_bonus,
        steps: rules.base_steps + speed_bonus,
        xp: speed_bonus * rules.xp_per_bonus,
    })
}

/// Score a word attempt against `target`. `Ok(None)` means the attempt
/// failed: wrong word or timeout.
///
/// # Errors
///
/// Returns [`EngineError::TimeOverBudget`] for an impossible clock reading.
pub fn score_word(
    rules: &WordRules,
    attempt: &WordAttempt,
    target: &str,
) -> Result<Option<WordScore>, EngineError> {
    match attempt {
        WordAttempt::TimedOut => Ok(None),
        WordAttempt::Completed {
            word,
            time_remaining,
        } => {
            let score = word_speed_score(rules, *time_remaining)?;
            Ok(words_match(word, target).then_some(score))
        }
    }
}

/// Multiple-choice answers must match the stored answer exactly.
#[must_use]
pub fn choice_matches(chosen: &str, correct: &str) -> bool {
    chosen == correct
}

/// Per-episode grade derived from quiz correctness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeGrade {
    pub correct: usize,
    pub stars: u8,
}

impl EpisodeGrade {
    /// Grade an episode: 4 correct earns 3 stars, 3 earns 2, 2 earns 1.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::CorrectCountOutOfRange`] when `correct`
    /// exceeds the number of quiz items.
    pub fn from_correct(correct: usize) -> Result<Self, EngineError> {
        if correct > QUIZ_ITEMS_PER_EPISODE {
            return Err(EngineError::CorrectCountOutOfRange {
                correct,
                total: QUIZ_ITEMS_PER_EPISODE,
            });
        }
        let stars = match correct {
            4.. => MAX_STARS,
            3 => 2,
            2 => 1,
            _ => 0,
        };
        Ok(Self { correct, stars })
    }

    /// XP credited for this grade on an episode worth `base_reward` per star.
    #[must_use]
    pub fn xp_earned(&self, base_reward: u32) -> u32 {
        base_reward.saturating_mul(u32::from(self.stars))
    }
}
