//! Persistence collaborator and an in-memory implementation.
//!
//! The relational store lives outside this crate; [`MemoryStore`] backs tests
//! and the simulator.
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

use crate::constants::START_TILE;
use crate::level::level_of;
use crate::mode::GameMode;
use crate::story::StoryProgress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    /// Output of [`crate::credentials::CredentialCheck::digest`].
    pub credential: String,
    pub xp: u32,
}

impl UserRecord {
    /// Level derived from xp; a stored level is never trusted.
    #[must_use]
    pub fn level(&self) -> u32 {
        level_of(self.xp)
    }
}

/// Board progress saved between sessions for one user and mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedProgress {
    pub position: u8,
    pub xp_earned: u32,
}

impl Default for SavedProgress {
    fn default() -> Self {
        Self {
            position: START_TILE,
            xp_earned: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Finished,
}

/// Multiplayer roster recorded when a game opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSessionRecord {
    pub id: u64,
    pub mode: GameMode,
    /// Players in turn order.
    pub players: Vec<UserId>,
    pub current_turn_index: usize,
    pub status: SessionStatus,
}

/// Trait for abstracting persistence of users and progress.
/// Server-side implementations wrap the relational store.
pub trait ProgressStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_progress(
        &self,
        user: UserId,
        mode: GameMode,
    ) -> Result<Option<SavedProgress>, Self::Error>;

    /// Insert or replace the saved progress for `user` in `mode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn save_progress(
        &self,
        user: UserId,
        mode: GameMode,
        progress: &SavedProgress,
    ) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_user(&self, user: UserId) -> Result<Option<UserRecord>, Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the user does not exist or the store cannot be
    /// written.
    fn update_user_xp(&self, user: UserId, xp: u32) -> Result<(), Self::Error>;

    /// Create a user with zero xp.
    ///
    /// # Errors
    ///
    /// Returns an error if the username is taken or the store cannot be
    /// written.
    fn insert_user(&self, username: &str, credential: &str) -> Result<UserRecord, Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_user_by_name(&self, username: &str) -> Result<Option<UserRecord>, Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_story_progress(&self, user: UserId) -> Result<Option<StoryProgress>, Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn save_story_progress(&self, user: UserId, progress: &StoryProgress)
    -> Result<(), Self::Error>;

    /// Up to `limit` users ordered by xp, highest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn top_users(&self, limit: usize) -> Result<Vec<UserRecord>, Self::Error>;

    /// # Errors
    ///
    /// Returns an error if the store cannot be written.
    fn insert_game_session(
        &self,
        mode: GameMode,
        players: &[UserId],
    ) -> Result<GameSessionRecord, Self::Error>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MemoryStoreError {
    #[error("username {username:?} is already registered")]
    DuplicateUsername { username: String },
    #[error("no such user: {user}")]
    UnknownUser { user: UserId },
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<UserId, UserRecord>,
    progress: HashMap<(UserId, GameMode), SavedProgress>,
    story: HashMap<UserId, StoryProgress>,
    sessions: Vec<GameSessionRecord>,
    next_user: u64,
    next_session: u64,
}

/// Single-threaded in-memory store. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Rc<RefCell<Tables>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn user_count(&self) -> usize {
        self.tables.borrow().users.len()
    }

    #[must_use]
    pub fn sessions(&self) -> Vec<GameSessionRecord> {
        self.tables.borrow().sessions.clone()
    }
}

impl ProgressStore for MemoryStore {
    type Error = MemoryStoreError;

    fn load_progress(
        &self,
        user: UserId,
        mode: GameMode,
    ) -> Result<Option<SavedProgress>, Self::Error> {
        Ok(self.tables.borrow().progress.get(&(user, mode)).copied())
    }

    fn save_progress(
        &self,
        user: UserId,
        mode: GameMode,
        progress: &SavedProgress,
    ) -> Result<(), Self::Error> {
        self.tables
            .borrow_mut()
            .progress
            .insert((user, mode), *progress);
        Ok(())
    }

    fn load_user(&self, user: UserId) -> Result<Option<UserRecord>, Self::Error> {
        Ok(self.tables.borrow().users.get(&user).cloned())
    }

    fn update_user_xp(&self, user: UserId, xp: u32) -> Result<(), Self::Error> {
        let mut tables = self.tables.borrow_mut();
        let record = tables
            .users
            .get_mut(&user)
            .ok_or(MemoryStoreError::UnknownUser { user })?;
        record.xp = xp;
        Ok(())
    }

    fn insert_user(&self, username: &str, credential: &str) -> Result<UserRecord, Self::Error> {
        let mut tables = self.tables.borrow_mut();
        if tables.users.values().any(|u| u.username == username) {
            return Err(MemoryStoreError::DuplicateUsername {
                username: username.to_string(),
            });
        }
        tables.next_user += 1;
        let record = UserRecord {
            id: UserId(tables.next_user),
            username: username.to_string(),
            credential: credential.to_string(),
            xp: 0,
        };
        tables.users.insert(record.id, record.clone());
        Ok(record)
    }

    fn find_user_by_name(&self, username: &str) -> Result<Option<UserRecord>, Self::Error> {
        Ok(self
            .tables
            .borrow()
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    fn load_story_progress(&self, user: UserId) -> Result<Option<StoryProgress>, Self::Error> {
        Ok(self.tables.borrow().story.get(&user).cloned())
    }

    fn save_story_progress(
        &self,
        user: UserId,
        progress: &StoryProgress,
    ) -> Result<(), Self::Error> {
        self.tables
            .borrow_mut()
            .story
            .insert(user, progress.clone());
        Ok(())
    }

    fn top_users(&self, limit: usize) -> Result<Vec<UserRecord>, Self::Error> {
        let mut users: Vec<UserRecord> = self.tables.borrow().users.values().cloned().collect();
        // Ties keep registration order.
        users.sort_by(|a, b| b.xp.cmp(&a.xp).then(a.id.cmp(&b.id)));
        users.truncate(limit);
        Ok(users)
    }

    fn insert_game_session(
        &self,
        mode: GameMode,
        players: &[UserId],
    ) -> Result<GameSessionRecord, Self::Error> {
        let mut tables = self.tables.borrow_mut();
        tables.next_session += 1;
        let record = GameSessionRecord {
            id: tables.next_session,
            mode,
            players: players.to_vec(),
            current_turn_index: 0,
            status: SessionStatus::Active,
        };
        tables.sessions.push(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_get_sequential_ids() {
        let store = MemoryStore::new();
        let a = store.insert_user("ana", "x").unwrap();
        let b = store.insert_user("ben", "y").unwrap();
        assert_eq!(a.id, UserId(1));
        assert_eq!(b.id, UserId(2));
        assert_eq!(
            store.insert_user("ana", "z"),
            Err(MemoryStoreError::DuplicateUsername {
                username: "ana".into()
            })
        );
        assert_eq!(store.user_count(), 2);
    }

    #[test]
    fn progress_is_keyed_by_mode() {
        let store = MemoryStore::new();
        let user = store.insert_user("ana", "x").unwrap().id;
        let saved = SavedProgress {
            position: 40,
            xp_earned: 25,
        };
        store.save_progress(user, GameMode::Snakes, &saved).unwrap();
        assert_eq!(
            store.load_progress(user, GameMode::Snakes).unwrap(),
            Some(saved)
        );
        assert_eq!(store.load_progress(user, GameMode::Jumanji).unwrap(), None);
    }

    #[test]
    fn clones_share_tables() {
        let store = MemoryStore::new();
        let other = store.clone();
        let user = store.insert_user("ana", "x").unwrap().id;
        other.update_user_xp(user, 300).unwrap();
        let record = store.load_user(user).unwrap().unwrap();
        assert_eq!(record.xp, 300);
        assert_eq!(record.level(), 2);
        assert!(store.update_user_xp(UserId(99), 1).is_err());
    }
}
