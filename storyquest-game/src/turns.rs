//! Turn rotation around the roster.
use crate::error::EngineError;

/// Index of the player whose turn follows `current`. With `skip` the next
/// player is passed over.
///
/// # Errors
///
/// Returns [`EngineError::EmptyRoster`] for zero players and
/// [`EngineError::PlayerIndexOutOfRange`] when `current` is not a seat.
pub fn next_turn(player_count: usize, current: usize, skip: bool) -> Result<usize, EngineError> {
    if player_count == 0 {
        return Err(EngineError::EmptyRoster);
    }
    if current >= player_count {
        return Err(EngineError::PlayerIndexOutOfRange {
            index: current,
            count: player_count,
        });
    }
    let stride = if skip { 2 } else { 1 };
    Ok((current + stride) % player_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_wraps() {
        assert_eq!(next_turn(3, 2, false), Ok(0));
        assert_eq!(next_turn(3, 0, false), Ok(1));
    }

    #[test]
    fn skip_passes_one_player() {
        assert_eq!(next_turn(4, 0, true), Ok(2));
        assert_eq!(next_turn(4, 3, true), Ok(1));
        assert_eq!(next_turn(2, 0, true), Ok(0));
    }

    #[test]
    fn solo_player_keeps_the_turn() {
        assert_eq!(next_turn(1, 0, false), Ok(0));
        assert_eq!(next_turn(1, 0, true), Ok(0));
    }

    #[test]
    fn bad_inputs_are_rejected() {
        assert_eq!(next_turn(0, 0, false), Err(EngineError::EmptyRoster));
        assert_eq!(
            next_turn(2, 2, false),
            Err(EngineError::PlayerIndexOutOfRange { index: 2, count: 2 })
        );
    }
}
