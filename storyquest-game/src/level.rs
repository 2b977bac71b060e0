//! Experience and leveling.
//!
//! The early curve is a hand-tuned threshold table; past the last entry every
//! level costs a flat [`LEVEL_TAIL_STEP`] XP.

use serde::{Deserialize, Serialize};

use crate::constants::{LEVEL_TAIL_STEP, LEVEL_THRESHOLDS};
use crate::error::EngineError;
use crate::numbers::ratio_percent;

const TAIL_BASE: (u32, u32) = LEVEL_THRESHOLDS[LEVEL_THRESHOLDS.len() - 1];

/// Level reached with `xp` total experience. Total and monotonic.
#[must_use]
pub fn level_of(xp: u32) -> u32 {
    let (tail_xp, tail_level) = TAIL_BASE;
    if xp >= tail_xp {
        return tail_level + (xp - tail_xp) / LEVEL_TAIL_STEP;
    }
    LEVEL_THRESHOLDS
        .iter()
        .rev()
        .find(|(threshold, _)| xp >= *threshold)
        .map_or(1, |&(_, level)| level)
}

/// Minimum total XP at which `level` is reached. Levels below 1 map to 0.
#[must_use]
pub fn xp_required_for_level(level: u32) -> u32 {
    let (tail_xp, tail_level) = TAIL_BASE;
    if level > tail_level {
        return (level - tail_level)
            .saturating_mul(LEVEL_TAIL_STEP)
            .saturating_add(tail_xp);
    }
    LEVEL_THRESHOLDS
        .iter()
        .find(|(_, l)| *l == level)
        .map_or(0, |&(threshold, _)| threshold)
}

/// Result of applying an XP delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpChange {
    pub xp: u32,
    pub level: u32,
    pub previous_level: u32,
}

impl XpChange {
    fn between(before: u32, after: u32) -> Self {
        Self {
            xp: after,
            level: level_of(after),
            previous_level: level_of(before),
        }
    }

    #[must_use]
    pub const fn leveled_up(&self) -> bool {
        self.level > self.previous_level
    }

    #[must_use]
    pub const fn leveled_down(&self) -> bool {
        self.level < self.previous_level
    }
}

/// Add `amount` XP, saturating at `u32::MAX`.
///
/// # Errors
///
/// Returns [`EngineError::NegativeXp`] when `amount` is negative.
pub fn award_xp(current: u32, amount: i64) -> Result<XpChange, EngineError> {
    let gained = checked_amount(amount)?;
    Ok(XpChange::between(current, current.saturating_add(gained)))
}

/// Remove `amount` XP, never going below zero.
///
/// # Errors
///
/// Returns [`EngineError::NegativeXp`] when `amount` is negative.
pub fn deduct_xp(current: u32, amount: i64) -> Result<XpChange, EngineError> {
    let lost = checked_amount(amount)?;
    Ok(XpChange::between(current, current.saturating_sub(lost)))
}

fn checked_amount(amount: i64) -> Result<u32, EngineError> {
    if amount < 0 {
        log::warn!(target: crate::constants::LOG_SESSION, "rejected negative xp amount {amount}");
        return Err(EngineError::NegativeXp { amount });
    }
    Ok(u32::try_from(amount).unwrap_or(u32::MAX))
}

/// Where a player sits inside their current level, for progress bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelProgress {
    pub level: u32,
    /// XP earned since the current level began.
    pub into_level: u32,
    /// XP between the current level and the next.
    pub span: u32,
    /// Total XP at which the next level starts.
    pub next_level_at: u32,
}

impl LevelProgress {
    #[must_use]
    pub fn for_xp(xp: u32) -> Self {
        let level = level_of(xp);
        let floor = xp_required_for_level(level);
        let next_level_at = xp_required_for_level(level + 1);
        Self {
            level,
            into_level: xp - floor,
            span: next_level_at - floor,
            next_level_at,
        }
    }

    /// Percentage of the current level completed, in `0..100`.
    #[must_use]
    pub fn percent(&self) -> u8 {
        ratio_percent(self.into_level, self.span)
    }
}
