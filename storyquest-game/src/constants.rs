//! Centralized board and scoring constants for StoryQuest game logic.
//!
//! Tunable values that designers are allowed to adjust live in
//! [`crate::config::RulesConfig`]; the numbers here define the board itself
//! and the fixed level curve.

// Logging targets ----------------------------------------------------------
pub(crate) const LOG_BOARD: &str = "storyquest::board";
pub(crate) const LOG_ROUND: &str = "storyquest::round";
pub(crate) const LOG_SESSION: &str = "storyquest::session";
pub(crate) const LOG_STORY: &str = "storyquest::story";
pub(crate) const LOG_SERVICE: &str = "storyquest::service";

// Board --------------------------------------------------------------------
/// First tile; every player starts here.
pub const START_TILE: u8 = 1;
/// Goal tile; reaching or passing it wins the round.
pub const GOAL_TILE: u8 = 100;
/// Faces on the die rolled in snakes mode.
pub const DIE_FACES: u8 = 6;

pub(crate) const CLASSIC_SNAKES: [(u8, u8); 10] = [
    (16, 6),
    (47, 26),
    (49, 11),
    (56, 53),
    (62, 19),
    (64, 60),
    (87, 24),
    (93, 73),
    (95, 75),
    (98, 78),
];

pub(crate) const CLASSIC_LADDERS: [(u8, u8); 9] = [
    (1, 38),
    (4, 14),
    (9, 31),
    (21, 42),
    (28, 84),
    (36, 44),
    (51, 67),
    (71, 91),
    (80, 100),
];

// Level curve --------------------------------------------------------------
/// `(xp threshold, level)` pairs for the hand-tuned early levels.
pub(crate) const LEVEL_THRESHOLDS: [(u32, u32); 4] = [(0, 1), (200, 2), (500, 3), (900, 4)];
/// XP per level once the table runs out.
pub(crate) const LEVEL_TAIL_STEP: u32 = 500;

// Story --------------------------------------------------------------------
/// Quiz items asked after each episode.
pub const QUIZ_ITEMS_PER_EPISODE: usize = 4;
/// Highest grade an episode can award.
pub const MAX_STARS: u8 = 3;
pub(crate) const DEFAULT_EPISODE_REWARD: u32 = 20;

// Service ------------------------------------------------------------------
/// Rows returned by the leaderboard query.
pub const LEADERBOARD_LIMIT: usize = 10;
/// bcrypt work factor for stored passwords.
pub const PASSWORD_HASH_COST: u32 = 10;
