//! Tunable scoring rules.
//!
//! Defaults come from the bundled `rules.json`; loaders may supply their own
//! copy through [`crate::ContentLoader::load_config`]. Always run
//! [`RulesConfig::validate`] on configs that did not come from `default()`.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::wild::WildEvent;

pub(crate) const DEFAULT_RULES_DATA: &str = include_str!("../assets/data/rules.json");

/// Timed word-assembly scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRules {
    /// Countdown length handed to the player.
    pub time_budget: u32,
    /// Elapsed units per speed-bonus point.
    pub bonus_window: u32,
    pub xp_per_bonus: u32,
    pub base_steps: u32,
}

impl Default for WordRules {
    fn default() -> Self {
        Self {
            time_budget: 30,
            bonus_window: 5,
            xp_per_bonus: 5,
            base_steps: 1,
        }
    }
}

/// XP granted for a regular jungle-mode move of exactly `steps`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepXp {
    pub steps: u8,
    pub xp: u32,
}

/// Jungle-mode bonuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JungleRules {
    pub event_chance: f64,
    #[serde(default)]
    pub step_xp: Vec<StepXp>,
    #[serde(default)]
    pub events: Vec<WildEvent>,
}

impl JungleRules {
    /// XP for a regular move of `steps`, zero when no entry matches.
    #[must_use]
    pub fn xp_for_steps(&self, steps: u8) -> u32 {
        self.step_xp
            .iter()
            .find(|entry| entry.steps == steps)
            .map_or(0, |entry| entry.xp)
    }
}

impl Default for JungleRules {
    fn default() -> Self {
        Self {
            event_chance: 0.2,
            step_xp: vec![StepXp { steps: 3, xp: 10 }, StepXp { steps: 1, xp: 5 }],
            events: vec![
                WildEvent::Advance { steps: 2 },
                WildEvent::Advance { steps: 3 },
                WildEvent::SkipNext,
                WildEvent::BonusXp { xp: 20 },
                WildEvent::Advance { steps: 1 },
            ],
        }
    }
}

/// Complete rule set for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub word: WordRules,
    pub wrong_answer_penalty: u32,
    pub correct_answer_steps: u8,
    pub win_bonus_xp: u32,
    /// Keep the turn with a player who answered wrong.
    #[serde(default = "RulesConfig::default_retry")]
    pub retry_after_wrong_answer: bool,
    #[serde(default)]
    pub jungle: JungleRules,
}

impl Default for RulesConfig {
    fn default() -> Self {
        serde_json::from_str(DEFAULT_RULES_DATA).unwrap_or_else(|_| RulesConfig {
            word: WordRules::default(),
            wrong_answer_penalty: 5,
            correct_answer_steps: 3,
            win_bonus_xp: 50,
            retry_after_wrong_answer: true,
            jungle: JungleRules::default(),
        })
    }
}

/// Errors raised when rule invariants are violated.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RulesConfigError {
    #[error("word time budget must be at least 1")]
    ZeroTimeBudget,
    #[error("speed bonus window must be at least 1")]
    ZeroBonusWindow,
    #[error("a correct answer must award at least one step")]
    ZeroCorrectSteps,
    #[error("a correct word must award at least one step")]
    ZeroWordSteps,
    #[error("wild event chance must be between 0 and 1 (got {chance:.2})")]
    EventChance { chance: f64 },
    #[error("wild event chance is {chance:.2} but no events are configured")]
    NoWildEvents { chance: f64 },
    #[error("wild advance events must move at least one tile")]
    ZeroAdvance,
}

impl RulesConfig {
    const fn default_retry() -> bool {
        true
    }

    #[must_use]
    pub fn load_from_static() -> Self {
        RulesConfig::default()
    }

    /// Check rule invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), RulesConfigError> {
        if self.word.time_budget == 0 {
            return Err(RulesConfigError::ZeroTimeBudget);
        }
        if self.word.bonus_window == 0 {
            return Err(RulesConfigError::ZeroBonusWindow);
        }
        if self.correct_answer_steps == 0 {
            return Err(RulesConfigError::ZeroCorrectSteps);
        }
        if self.word.base_steps == 0 {
            return Err(RulesConfigError::ZeroWordSteps);
        }
        let chance = self.jungle.event_chance;
        if !(0.0..=1.0).contains(&chance) {
            return Err(RulesConfigError::EventChance { chance });
        }
        if chance > 0.0 && self.jungle.events.is_empty() {
            return Err(RulesConfigError::NoWildEvents { chance });
        }
        if self
            .jungle
            .events
            .iter()
            .any(|e| matches!(e, WildEvent::Advance { steps: 0 }))
        {
            return Err(RulesConfigError::ZeroAdvance);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_rules_match_fallback() {
        let bundled: RulesConfig = serde_json::from_str(DEFAULT_RULES_DATA).unwrap();
        let fallback = RulesConfig {
            word: WordRules::default(),
            wrong_answer_penalty: 5,
            correct_answer_steps: 3,
            win_bonus_xp: 50,
            retry_after_wrong_answer: true,
            jungle: JungleRules::default(),
        };
        assert_eq!(bundled, fallback);
        assert!(bundled.validate().is_ok());
    }

    #[test]
    fn step_xp_lookup() {
        let rules = RulesConfig::default();
        assert_eq!(rules.jungle.xp_for_steps(3), 10);
        assert_eq!(rules.jungle.xp_for_steps(1), 5);
        assert_eq!(rules.jungle.xp_for_steps(2), 0);
    }

    #[test]
    fn validation_rejects_bad_rules() {
        let mut rules = RulesConfig::default();
        rules.word.bonus_window = 0;
        assert_eq!(rules.validate(), Err(RulesConfigError::ZeroBonusWindow));

        let mut rules = RulesConfig::default();
        rules.word.base_steps = 0;
        assert_eq!(rules.validate(), Err(RulesConfigError::ZeroWordSteps));

        let mut rules = RulesConfig::default();
        rules.jungle.event_chance = 1.5;
        assert!(matches!(
            rules.validate(),
            Err(RulesConfigError::EventChance { .. })
        ));

        let mut rules = RulesConfig::default();
        rules.jungle.events.clear();
        assert!(matches!(
            rules.validate(),
            Err(RulesConfigError::NoWildEvents { .. })
        ));

        let mut rules = RulesConfig::default();
        rules.jungle.events.push(WildEvent::Advance { steps: 0 });
        assert_eq!(rules.validate(), Err(RulesConfigError::ZeroAdvance));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let rules: RulesConfig = serde_json::from_str(
            r#"{"wrong_answer_penalty": 10, "correct_answer_steps": 2, "win_bonus_xp": 0}"#,
        )
        .unwrap();
        assert_eq!(rules.wrong_answer_penalty, 10);
        assert!(rules.retry_after_wrong_answer);
        assert_eq!(rules.word, WordRules::default());
        assert_eq!(rules.jungle.events.len(), 5);
    }
}
