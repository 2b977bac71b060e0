//! Per-player progression state.
use serde::{Deserialize, Serialize};

use crate::board::{BoardTransformTable, MoveOutcome};
use crate::constants::{GOAL_TILE, START_TILE};
use crate::error::EngineError;
use crate::level::{LevelProgress, XpChange, award_xp, deduct_xp, level_of};

/// Board position and experience for one player. Level is always derived
/// from XP, so it is never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerState {
    position: u8,
    xp: u32,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            position: START_TILE,
            xp: 0,
        }
    }
}

impl PlayerState {
    /// Fresh player on the start tile carrying `xp` from earlier sessions.
    #[must_use]
    pub fn new(xp: u32) -> Self {
        Self {
            position: START_TILE,
            xp,
        }
    }

    /// Resume from saved progress. Placement never triggers a snake or ladder.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TileOutOfRange`] when `position` is off the board.
    pub fn resume(position: u8, xp: u32) -> Result<Self, EngineError> {
        if !(START_TILE..=GOAL_TILE).contains(&position) {
            return Err(EngineError::TileOutOfRange { tile: position });
        }
        Ok(Self { position, xp })
    }

    #[must_use]
    pub const fn position(&self) -> u8 {
        self.position
    }

    #[must_use]
    pub const fn xp(&self) -> u32 {
        self.xp
    }

    #[must_use]
    pub fn level(&self) -> u32 {
        level_of(self.xp)
    }

    #[must_use]
    pub fn progress(&self) -> LevelProgress {
        LevelProgress::for_xp(self.xp)
    }

    #[must_use]
    pub const fn has_won(&self) -> bool {
        self.position >= GOAL_TILE
    }

    /// Move along `board`; see [`BoardTransformTable::apply_move`].
    ///
    /// # Errors
    ///
    /// Propagates move validation errors; state is unchanged on error.
    pub fn apply_move(
        &mut self,
        board: &BoardTransformTable,
        steps: i32,
    ) -> Result<MoveOutcome, EngineError> {
        let outcome = board.apply_move(self.position, steps)?;
        self.position = outcome.position;
        Ok(outcome)
    }

    /// # Errors
    ///
    /// Returns [`EngineError::NegativeXp`] for negative amounts.
    pub fn award_xp(&mut self, amount: i64) -> Result<XpChange, EngineError> {
        let change = award_xp(self.xp, amount)?;
        self.xp = change.xp;
        Ok(change)
    }

    /// # Errors
    ///
    /// Returns [`EngineError::NegativeXp`] for negative amounts.
    pub fn deduct_xp(&mut self, amount: i64) -> Result<XpChange, EngineError> {
        let change = deduct_xp(self.xp, amount)?;
        self.xp = change.xp;
        Ok(change)
    }

    /// Put the player back on the start tile for a new round.
    pub fn reset_position(&mut self) {
        self.position = START_TILE;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_players_start_on_tile_one() {
        let player = PlayerState::new(450);
        assert_eq!(player.position(), 1);
        assert_eq!(player.level(), 2);
        assert_eq!(PlayerState::default().level(), 1);
    }

    #[test]
    fn resuming_on_ladder_source_does_not_climb() {
        let player = PlayerState::resume(1, 0).unwrap();
        assert_eq!(player.position(), 1);
        assert!(PlayerState::resume(0, 0).is_err());
        assert!(PlayerState::resume(101, 0).is_err());
    }

    #[test]
    fn failed_move_leaves_state_alone() {
        let mut player = PlayerState::resume(40, 10).unwrap();
        assert!(player.apply_move(&BoardTransformTable::classic(), 0).is_err());
        assert_eq!(player.position(), 40);
    }

    #[test]
    fn level_tracks_xp_changes() {
        let mut player = PlayerState::new(195);
        let change = player.award_xp(10).unwrap();
        assert!(change.leveled_up());
        assert_eq!(player.level(), 2);
        player.deduct_xp(500).unwrap();
        assert_eq!(player.xp(), 0);
        assert_eq!(player.level(), 1);
    }
}
