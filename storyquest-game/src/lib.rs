//! StoryQuest Game Engine
//!
//! Platform-agnostic board progression and scoring for the StoryQuest reading
//! game. This crate holds the game rules and the service operations behind
//! the server endpoints, without transport, database or UI dependencies.

pub mod board;
pub mod config;
pub mod constants;
pub mod content;
pub mod credentials;
pub mod error;
pub mod events;
pub mod level;
pub mod mode;
pub mod numbers;
pub mod player;
pub mod round;
pub mod scoring;
pub mod service;
pub mod session;
pub mod store;
pub mod story;
pub mod turns;
pub mod wild;

// Re-export commonly used types
pub use board::{BoardTableError, BoardTransformTable, MoveOutcome, Transform, TransformKind};
pub use config::{JungleRules, RulesConfig, RulesConfigError, StepXp, WordRules};
pub use content::{ContentCatalog, Question, QuizItem, ReadingMaterial, StoryEpisode};
pub use credentials::{BcryptCredentials, CredentialCheck};
pub use error::EngineError;
pub use events::{EngineEvent, EngineEvents, ProgressionEngine, Resolution, ScoreEvent};
pub use level::{LevelProgress, XpChange, award_xp, deduct_xp, level_of, xp_required_for_level};
pub use mode::GameMode;
pub use player::PlayerState;
pub use round::{Round, RoundPhase, Verdict};
pub use scoring::{EpisodeGrade, WordAttempt, WordScore, score_word, word_speed_score};
pub use service::{ProgressService, ServiceError, UserStats, XpUpdate};
pub use session::{ActiveQuestion, GameSession, SessionError, TurnReport};
pub use store::{
    GameSessionRecord, MemoryStore, MemoryStoreError, ProgressStore, SavedProgress,
    SessionStatus, UserId, UserRecord,
};
pub use story::{EpisodeOutcome, EpisodeRun, StoryError, StoryProgress};
pub use turns::next_turn;
pub use wild::{WildEvent, draw_wild_event};

use thiserror::Error;

/// Trait for abstracting content loading operations
/// Platform-specific implementations should provide this
pub trait ContentLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load reading materials, questions and the story
    ///
    /// # Errors
    ///
    /// Returns an error if the content cannot be loaded.
    fn load_content(&self) -> Result<ContentCatalog, Self::Error>;

    /// Load configuration data for a specific system
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration cannot be loaded or parsed.
    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: serde::de::DeserializeOwned;
}

#[derive(Debug, Error)]
pub enum BundledLoaderError {
    #[error("no bundled config named {name:?}")]
    UnknownConfig { name: String },
    #[error("bundled data is malformed: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Loader serving the JSON compiled into this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledContent;

impl ContentLoader for BundledContent {
    type Error = BundledLoaderError;

    fn load_content(&self) -> Result<ContentCatalog, Self::Error> {
        Ok(ContentCatalog::from_json(content::DEFAULT_CONTENT_DATA)?)
    }

    fn load_config<T>(&self, config_name: &str) -> Result<T, Self::Error>
    where
        T: serde::de::DeserializeOwned,
    {
        let raw = match config_name {
            "rules" => config::DEFAULT_RULES_DATA,
            "content" => content::DEFAULT_CONTENT_DATA,
            other => {
                return Err(BundledLoaderError::UnknownConfig {
                    name: other.to_string(),
                });
            }
        };
        Ok(serde_json::from_str(raw)?)
    }
}

/// Main game engine for starting and saving sessions
pub struct GameEngine<L, S>
where
    L: ContentLoader,
    S: ProgressStore,
{
    content_loader: L,
    store: S,
}

impl<L, S> GameEngine<L, S>
where
    L: ContentLoader,
    S: ProgressStore,
{
    /// Create a new game engine with the provided content loader and store
    pub const fn new(content_loader: L, store: S) -> Self {
        Self {
            content_loader,
            store,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Start a session for fresh players.
    ///
    /// # Errors
    ///
    /// Returns an error if content or rules cannot be loaded, or the session
    /// rejects them.
    pub fn create_session(
        &self,
        mode: GameMode,
        seed: u64,
        seats: Vec<PlayerState>,
    ) -> Result<GameSession, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
    {
        let content = self.content_loader.load_content().map_err(Into::into)?;
        let rules: RulesConfig = self
            .content_loader
            .load_config("rules")
            .map_err(Into::into)?;
        Ok(GameSession::new(mode, seed, rules, content, seats)?)
    }

    /// Start a session for registered users, placing each on their saved
    /// tile with their account xp and the session xp they had banked.
    ///
    /// # Errors
    ///
    /// Returns an error if a user is unknown or loading fails.
    pub fn resume_session(
        &self,
        mode: GameMode,
        seed: u64,
        players: &[UserId],
    ) -> Result<GameSession, anyhow::Error>
    where
        L::Error: Into<anyhow::Error>,
        S::Error: Into<anyhow::Error>,
    {
        let mut seats = Vec::with_capacity(players.len());
        let mut earned = Vec::with_capacity(players.len());
        for &user in players {
            let record = self
                .store
                .load_user(user)
                .map_err(Into::into)?
                .ok_or_else(|| anyhow::anyhow!("no such user: {user}"))?;
            let saved = self
                .store
                .load_progress(user, mode)
                .map_err(Into::into)?
                .unwrap_or_default();
            seats.push(PlayerState::resume(saved.position, record.xp)?);
            earned.push(saved.xp_earned);
        }
        Ok(self
            .create_session(mode, seed, seats)?
            .with_session_xp(earned)?)
    }

    /// Persist each seat's progress and xp for `players` in seat order.
    ///
    /// # Errors
    ///
    /// Returns an error if the roster does not match or the store fails.
    pub fn save_session(
        &self,
        session: &GameSession,
        players: &[UserId],
    ) -> Result<(), anyhow::Error>
    where
        S::Error: Into<anyhow::Error>,
    {
        let seats = session.round().seats();
        if seats.len() != players.len() {
            anyhow::bail!(
                "session has {} seats but {} players were given",
                seats.len(),
                players.len()
            );
        }
        for (seat, (&user, state)) in players.iter().zip(seats).enumerate() {
            let progress = session.saved_progress(seat).unwrap_or_default();
            self.store
                .save_progress(user, session.mode(), &progress)
                .map_err(Into::into)?;
            self.store
                .update_user_xp(user, state.xp())
                .map_err(Into::into)?;
        }
        Ok(())
    }
}
