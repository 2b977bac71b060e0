//! Account, XP and progress operations behind the server endpoints.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{GOAL_TILE, LEADERBOARD_LIMIT, LOG_SERVICE, MAX_STARS, START_TILE};
use crate::content::ContentCatalog;
use crate::credentials::CredentialCheck;
use crate::error::EngineError;
use crate::level::{XpChange, award_xp, deduct_xp};
use crate::mode::GameMode;
use crate::story::StoryProgress;
use crate::store::{GameSessionRecord, ProgressStore, SavedProgress, UserId, UserRecord};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// The store failed; the request may be retried.
    #[error("progress store failed: {0}")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("username {username:?} is already taken")]
    UsernameTaken { username: String },
    #[error("username must not be blank")]
    BlankUsername,
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("could not hash the password: {0}")]
    Credential(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("no such user: {user}")]
    UnknownUser { user: UserId },
    #[error("no such episode: {episode}")]
    UnknownEpisode { episode: u32 },
    #[error("stars must be at most {max} (got {stars})")]
    StarsOutOfRange { stars: u8, max: u8 },
    #[error("a game needs at least one player")]
    EmptyRoster,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ServiceError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Store(_))
    }

    fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        log::warn!(target: LOG_SERVICE, "store error: {err}");
        ServiceError::Store(Box::new(err))
    }
}

/// Public view of a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub id: UserId,
    pub username: String,
    pub xp: u32,
    pub level: u32,
}

impl From<&UserRecord> for UserStats {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username.clone(),
            xp: record.xp,
            level: record.level(),
        }
    }
}

/// XP and level after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpUpdate {
    pub xp: u32,
    pub level: u32,
    pub leveled_up: bool,
}

impl From<XpChange> for XpUpdate {
    fn from(change: XpChange) -> Self {
        Self {
            xp: change.xp,
            level: change.level,
            leveled_up: change.leveled_up(),
        }
    }
}

/// Server-side operations over a store and a credential check.
pub struct ProgressService<S, C>
where
    S: ProgressStore,
    C: CredentialCheck,
{
    store: S,
    credentials: C,
    content: ContentCatalog,
}

impl<S, C> ProgressService<S, C>
where
    S: ProgressStore,
    C: CredentialCheck,
{
    pub const fn new(store: S, credentials: C, content: ContentCatalog) -> Self {
        Self {
            store,
            credentials,
            content,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Create an account with zero xp.
    ///
    /// # Errors
    ///
    /// Rejects blank and duplicate usernames; store failures surface as
    /// [`ServiceError::Store`].
    pub fn register(&self, username: &str, password: &str) -> Result<UserStats, ServiceError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ServiceError::BlankUsername);
        }
        if self
            .store
            .find_user_by_name(username)
            .map_err(ServiceError::store)?
            .is_some()
        {
            return Err(ServiceError::UsernameTaken {
                username: username.to_string(),
            });
        }
        let digest = self
            .credentials
            .digest(username, password)
            .map_err(|err| ServiceError::Credential(Box::new(err)))?;
        let record = self
            .store
            .insert_user(username, &digest)
            .map_err(ServiceError::store)?;
        log::info!(target: LOG_SERVICE, "registered {}", record.id);
        Ok(UserStats::from(&record))
    }

    /// Check a username and password.
    ///
    /// # Errors
    ///
    /// Unknown users and wrong passwords both return
    /// [`ServiceError::InvalidCredentials`].
    pub fn login(&self, username: &str, password: &str) -> Result<UserStats, ServiceError> {
        let username = username.trim();
        let record = self
            .store
            .find_user_by_name(username)
            .map_err(ServiceError::store)?
            .filter(|r| {
                self.credentials
                    .verify(username, password, &r.credential)
            })
            .ok_or(ServiceError::InvalidCredentials)?;
        Ok(UserStats::from(&record))
    }

    /// # Errors
    ///
    /// Returns [`ServiceError::UnknownUser`] for missing users.
    pub fn user_stats(&self, user: UserId) -> Result<UserStats, ServiceError> {
        Ok(UserStats::from(&self.user(user)?))
    }

    /// # Errors
    ///
    /// Returns [`ServiceError::UnknownUser`] for missing users and
    /// [`EngineError::NegativeXp`] for negative amounts.
    pub fn award_xp(&self, user: UserId, amount: i64) -> Result<XpUpdate, ServiceError> {
        let record = self.user(user)?;
        let change = award_xp(record.xp, amount)?;
        self.store
            .update_user_xp(user, change.xp)
            .map_err(ServiceError::store)?;
        if change.leveled_up() {
            log::info!(
                target: LOG_SERVICE,
                "{user} reached level {}",
                change.level
            );
        }
        Ok(change.into())
    }

    /// Take xp away, never going below zero.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::UnknownUser`] for missing users and
    /// [`EngineError::NegativeXp`] for negative amounts.
    pub fn deduct_xp(&self, user: UserId, amount: i64) -> Result<XpUpdate, ServiceError> {
        let record = self.user(user)?;
        let change = deduct_xp(record.xp, amount)?;
        self.store
            .update_user_xp(user, change.xp)
            .map_err(ServiceError::store)?;
        Ok(change.into())
    }

    /// # Errors
    ///
    /// Rejects positions off the board and store failures.
    pub fn save_progress(
        &self,
        user: UserId,
        mode: GameMode,
        position: u8,
        xp_earned: u32,
    ) -> Result<SavedProgress, ServiceError> {
        if !(START_TILE..=GOAL_TILE).contains(&position) {
            return Err(EngineError::TileOutOfRange { tile: position }.into());
        }
        let progress = SavedProgress {
            position,
            xp_earned,
        };
        self.store
            .save_progress(user, mode, &progress)
            .map_err(ServiceError::store)?;
        Ok(progress)
    }

    /// Saved progress, or a fresh start when nothing was saved.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] on store failure.
    pub fn load_progress(&self, user: UserId, mode: GameMode) -> Result<SavedProgress, ServiceError> {
        Ok(self
            .store
            .load_progress(user, mode)
            .map_err(ServiceError::store)?
            .unwrap_or_default())
    }

    /// Story progress, created on first read.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] on store failure.
    pub fn story_progress(&self, user: UserId) -> Result<StoryProgress, ServiceError> {
        if let Some(progress) = self
            .store
            .load_story_progress(user)
            .map_err(ServiceError::store)?
        {
            return Ok(progress);
        }
        let fresh = StoryProgress::default();
        self.store
            .save_story_progress(user, &fresh)
            .map_err(ServiceError::store)?;
        Ok(fresh)
    }

    /// Record a finished episode and credit its xp. Both writes land or
    /// neither does: a failed xp update restores the previous story progress.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::UnknownEpisode`] for episodes outside the
    /// story, [`ServiceError::StarsOutOfRange`] above three stars,
    /// [`ServiceError::UnknownUser`] for missing users and
    /// [`ServiceError::Store`] when either write fails.
    pub fn complete_episode(
        &self,
        user: UserId,
        episode: u32,
        stars: u8,
        xp_earned: u32,
    ) -> Result<(StoryProgress, XpUpdate), ServiceError> {
        if self.content.episode(episode).is_none() {
            return Err(ServiceError::UnknownEpisode { episode });
        }
        if stars > MAX_STARS {
            return Err(ServiceError::StarsOutOfRange {
                stars,
                max: MAX_STARS,
            });
        }
        let record = self.user(user)?;
        let change = award_xp(record.xp, i64::from(xp_earned))?;
        let previous = self.story_progress(user)?;
        let mut progress = previous.clone();
        progress.record_completion(episode, stars);

        self.store
            .save_story_progress(user, &progress)
            .map_err(ServiceError::store)?;
        if let Err(err) = self.store.update_user_xp(user, change.xp) {
            if let Err(restore) = self.store.save_story_progress(user, &previous) {
                log::warn!(
                    target: LOG_SERVICE,
                    "could not restore story progress for {user}: {restore}"
                );
            }
            return Err(ServiceError::store(err));
        }
        if progress.is_finished(self.content.final_episode()) {
            log::info!(target: LOG_SERVICE, "{user} finished the story");
        }
        Ok((progress, change.into()))
    }

    /// Top users by xp.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::Store`] on store failure.
    pub fn leaderboard(&self) -> Result<Vec<UserStats>, ServiceError> {
        Ok(self
            .store
            .top_users(LEADERBOARD_LIMIT)
            .map_err(ServiceError::store)?
            .iter()
            .map(UserStats::from)
            .collect())
    }

    /// Record a multiplayer game with `players` in turn order.
    ///
    /// # Errors
    ///
    /// Rejects an empty roster and unknown players.
    pub fn open_game_session(
        &self,
        mode: GameMode,
        players: &[UserId],
    ) -> Result<GameSessionRecord, ServiceError> {
        if players.is_empty() {
            return Err(ServiceError::EmptyRoster);
        }
        for &player in players {
            self.user(player)?;
        }
        self.store
            .insert_game_session(mode, players)
            .map_err(ServiceError::store)
    }

    fn user(&self, user: UserId) -> Result<UserRecord, ServiceError> {
        self.store
            .load_user(user)
            .map_err(ServiceError::store)?
            .ok_or(ServiceError::UnknownUser { user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::BcryptCredentials;
    use crate::store::{MemoryStore, MemoryStoreError};
    use std::cell::Cell;

    fn service() -> ProgressService<MemoryStore, BcryptCredentials> {
        ProgressService::new(
            MemoryStore::new(),
            BcryptCredentials::with_cost("test-pepper", 4),
            ContentCatalog::load_from_static(),
        )
    }

    /// Memory store whose xp writes can be switched off.
    #[derive(Default)]
    struct XpOutageStore {
        inner: MemoryStore,
        xp_down: Cell<bool>,
    }

    impl ProgressStore for XpOutageStore {
        type Error = MemoryStoreError;

        fn load_progress(
            &self,
            user: UserId,
            mode: GameMode,
        ) -> Result<Option<SavedProgress>, Self::Error> {
            self.inner.load_progress(user, mode)
        }

        fn save_progress(
            &self,
            user: UserId,
            mode: GameMode,
            progress: &SavedProgress,
        ) -> Result<(), Self::Error> {
            self.inner.save_progress(user, mode, progress)
        }

        fn load_user(&self, user: UserId) -> Result<Option<UserRecord>, Self::Error> {
            self.inner.load_user(user)
        }

        fn update_user_xp(&self, user: UserId, xp: u32) -> Result<(), Self::Error> {
            if self.xp_down.get() {
                return Err(MemoryStoreError::UnknownUser { user });
            }
            self.inner.update_user_xp(user, xp)
        }

        fn insert_user(&self, username: &str, credential: &str) -> Result<UserRecord, Self::Error> {
            self.inner.insert_user(username, credential)
        }

        fn find_user_by_name(&self, username: &str) -> Result<Option<UserRecord>, Self::Error> {
            self.inner.find_user_by_name(username)
        }

        fn load_story_progress(&self, user: UserId) -> Result<Option<StoryProgress>, Self::Error> {
            self.inner.load_story_progress(user)
        }

        fn save_story_progress(
            &self,
            user: UserId,
            progress: &StoryProgress,
        ) -> Result<(), Self::Error> {
            self.inner.save_story_progress(user, progress)
        }

        fn top_users(&self, limit: usize) -> Result<Vec<UserRecord>, Self::Error> {
            self.inner.top_users(limit)
        }

        fn insert_game_session(
            &self,
            mode: GameMode,
            players: &[UserId],
        ) -> Result<GameSessionRecord, Self::Error> {
            self.inner.insert_game_session(mode, players)
        }
    }

    #[test]
    fn register_then_login() {
        let svc = service();
        let created = svc.register("ana", "pw").unwrap();
        assert_eq!(created.xp, 0);
        assert_eq!(created.level, 1);
        let logged_in = svc.login("ana", "pw").unwrap();
        assert_eq!(logged_in, created);
    }

    #[test]
    fn login_failures_look_the_same() {
        let svc = service();
        svc.register("ana", "pw").unwrap();
        assert!(matches!(
            svc.login("ana", "nope"),
            Err(ServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            svc.login("ghost", "pw"),
            Err(ServiceError::InvalidCredentials)
        ));
    }

    #[test]
    fn duplicate_and_blank_names_rejected() {
        let svc = service();
        svc.register("ana", "pw").unwrap();
        assert!(matches!(
            svc.register("ana", "other"),
            Err(ServiceError::UsernameTaken { .. })
        ));
        assert!(matches!(
            svc.register("   ", "pw"),
            Err(ServiceError::BlankUsername)
        ));
    }

    #[test]
    fn xp_updates_recompute_level() {
        let svc = service();
        let id = svc.register("ana", "pw").unwrap().id;
        let up = svc.award_xp(id, 250).unwrap();
        assert_eq!(up, XpUpdate { xp: 250, level: 2, leveled_up: true });
        let down = svc.deduct_xp(id, 1000).unwrap();
        assert_eq!(down.xp, 0);
        assert_eq!(down.level, 1);
        assert!(svc.award_xp(id, -1).is_err());
        assert!(matches!(
            svc.award_xp(UserId(404), 5),
            Err(ServiceError::UnknownUser { .. })
        ));
    }

    #[test]
    fn missing_progress_reads_as_fresh_start() {
        let svc = service();
        let id = svc.register("ana", "pw").unwrap().id;
        assert_eq!(
            svc.load_progress(id, GameMode::Snakes).unwrap(),
            SavedProgress::default()
        );
        svc.save_progress(id, GameMode::Snakes, 42, 15).unwrap();
        assert_eq!(svc.load_progress(id, GameMode::Snakes).unwrap().position, 42);
        assert!(svc.save_progress(id, GameMode::Snakes, 0, 0).is_err());
    }

    #[test]
    fn story_progress_created_on_first_read() {
        let svc = service();
        let id = svc.register("ana", "pw").unwrap().id;
        assert!(svc.store().load_story_progress(id).unwrap().is_none());
        let progress = svc.story_progress(id).unwrap();
        assert_eq!(progress.current_episode, 1);
        assert!(svc.store().load_story_progress(id).unwrap().is_some());
    }

    #[test]
    fn completing_an_episode_credits_xp() {
        let svc = service();
        let id = svc.register("ana", "pw").unwrap().id;
        let (progress, xp) = svc.complete_episode(id, 1, 3, 90).unwrap();
        assert_eq!(progress.current_episode, 2);
        assert_eq!(xp.xp, 90);
        let (progress, _) = svc.complete_episode(id, 1, 2, 60).unwrap();
        assert_eq!(progress.completed_episodes, vec![1]);
        assert_eq!(progress.total_stars, 5);
        assert!(matches!(
            svc.complete_episode(id, 9, 1, 10),
            Err(ServiceError::UnknownEpisode { episode: 9 })
        ));
        assert!(matches!(
            svc.complete_episode(id, 2, 4, 10),
            Err(ServiceError::StarsOutOfRange { .. })
        ));
    }

    #[test]
    fn failed_xp_write_leaves_episode_incomplete() {
        let svc = ProgressService::new(
            XpOutageStore::default(),
            BcryptCredentials::with_cost("test-pepper", 4),
            ContentCatalog::load_from_static(),
        );
        let id = svc.register("ana", "pw").unwrap().id;
        svc.complete_episode(id, 1, 3, 90).unwrap();

        svc.store().xp_down.set(true);
        let err = svc.complete_episode(id, 2, 2, 60).unwrap_err();
        assert!(err.is_retryable());
        let progress = svc.story_progress(id).unwrap();
        assert_eq!(progress.completed_episodes, vec![1]);
        assert_eq!(progress.current_episode, 2);
        assert_eq!(progress.total_stars, 3);
        assert_eq!(svc.user_stats(id).unwrap().xp, 90);

        svc.store().xp_down.set(false);
        let (progress, xp) = svc.complete_episode(id, 2, 2, 60).unwrap();
        assert_eq!(progress.completed_episodes, vec![1, 2]);
        assert_eq!(xp.xp, 150);
    }

    #[test]
    fn leaderboard_is_sorted_and_capped() {
        let svc = service();
        for i in 0..12_u32 {
            let id = svc.register(&format!("player{i}"), "pw").unwrap().id;
            svc.award_xp(id, i64::from(i * 10)).unwrap();
        }
        let board = svc.leaderboard().unwrap();
        assert_eq!(board.len(), LEADERBOARD_LIMIT);
        assert_eq!(board[0].username, "player11");
        assert!(board.windows(2).all(|w| w[0].xp >= w[1].xp));
    }

    #[test]
    fn game_sessions_need_known_players() {
        let svc = service();
        let a = svc.register("ana", "pw").unwrap().id;
        let b = svc.register("ben", "pw").unwrap().id;
        let record = svc.open_game_session(GameMode::Snakes, &[b, a]).unwrap();
        assert_eq!(record.players, vec![b, a]);
        assert_eq!(record.current_turn_index, 0);
        assert!(svc.open_game_session(GameMode::Snakes, &[]).is_err());
        assert!(svc.open_game_session(GameMode::Snakes, &[UserId(77)]).is_err());
    }
}
