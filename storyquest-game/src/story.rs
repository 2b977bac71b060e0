//! Story mode: episode quizzes and per-user story progress.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::LOG_STORY;
use crate::content::{QuizItem, StoryEpisode};
use crate::error::EngineError;
use crate::events::ScoreEvent;
use crate::scoring::{EpisodeGrade, choice_matches};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoryError {
    #[error("episode {episode} has no quiz items left to answer")]
    QuizFinished { episode: u32 },
    #[error("episode {episode} quiz answered {answered} of {total} items")]
    QuizIncomplete {
        episode: u32,
        answered: usize,
        total: usize,
    },
    #[error(transparent)]
    Grade(#[from] EngineError),
}

/// Where a user is in the story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryProgress {
    pub current_episode: u32,
    /// Completed episode numbers in completion order, each listed once.
    pub completed_episodes: Vec<u32>,
    pub total_stars: u32,
}

impl Default for StoryProgress {
    fn default() -> Self {
        Self {
            current_episode: 1,
            completed_episodes: Vec::new(),
            total_stars: 0,
        }
    }
}

impl StoryProgress {
    #[must_use]
    pub fn is_completed(&self, episode: u32) -> bool {
        self.completed_episodes.contains(&episode)
    }

    /// Record a finished episode. Stars always accumulate; the episode joins
    /// the completed set only once. Returns `true` on first completion.
    pub fn record_completion(&mut self, episode: u32, stars: u8) -> bool {
        let first = !self.is_completed(episode);
        if first {
            self.completed_episodes.push(episode);
        }
        self.current_episode = episode.saturating_add(1);
        self.total_stars = self.total_stars.saturating_add(u32::from(stars));
        log::info!(
            target: LOG_STORY,
            "episode {episode} completed with {stars} stars (first: {first})"
        );
        first
    }

    /// The story is finished once the final episode has been completed.
    #[must_use]
    pub fn is_finished(&self, final_episode: u32) -> bool {
        final_episode > 0 && self.is_completed(final_episode)
    }
}

/// Result of a graded episode quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeOutcome {
    pub episode: u32,
    pub grade: EpisodeGrade,
    pub xp_earned: u32,
}

impl EpisodeOutcome {
    /// Engine input that credits this outcome to a player.
    #[must_use]
    pub const fn score_event(&self, base_reward: u32) -> ScoreEvent {
        ScoreEvent::EpisodeResult {
            correct: self.grade.correct,
            base_reward,
        }
    }
}

/// One pass through an episode's quiz, answered strictly in order.
#[derive(Debug, Clone)]
pub struct EpisodeRun<'a> {
    episode: &'a StoryEpisode,
    answers: Vec<bool>,
}

impl<'a> EpisodeRun<'a> {
    #[must_use]
    pub fn new(episode: &'a StoryEpisode) -> Self {
        Self {
            episode,
            answers: Vec::with_capacity(episode.quizzes.len()),
        }
    }

    #[must_use]
    pub fn episode(&self) -> &'a StoryEpisode {
        self.episode
    }

    /// The item awaiting an answer, if any.
    #[must_use]
    pub fn current_item(&self) -> Option<&'a QuizItem> {
        self.episode.quizzes.get(self.answers.len())
    }

    #[must_use]
    pub fn correct_so_far(&self) -> usize {
        self.answers.iter().filter(|&&ok| ok).count()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.answers.len() >= self.episode.quizzes.len()
    }

    /// Answer the current item; returns whether the choice was right.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::QuizFinished`] once every item is answered.
    pub fn answer(&mut self, choice: &str) -> Result<bool, StoryError> {
        let item = self.current_item().ok_or(StoryError::QuizFinished {
            episode: self.episode.episode_number,
        })?;
        let correct = choice_matches(choice, &item.correct_answer);
        self.answers.push(correct);
        Ok(correct)
    }

    /// Grade the run after the last item.
    ///
    /// # Errors
    ///
    /// Returns [`StoryError::QuizIncomplete`] before the last answer and
    /// [`StoryError::Grade`] when the episode has more items than a grade
    /// can count.
    pub fn finish(&self) -> Result<EpisodeOutcome, StoryError> {
        if !self.is_complete() {
            return Err(StoryError::QuizIncomplete {
                episode: self.episode.episode_number,
                answered: self.answers.len(),
                total: self.episode.quizzes.len(),
            });
        }
        let grade = EpisodeGrade::from_correct(self.correct_so_far())?;
        Ok(EpisodeOutcome {
            episode: self.episode.episode_number,
            grade,
            xp_earned: grade.xp_earned(self.episode.xp_reward),
        })
    }
}
