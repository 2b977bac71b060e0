use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{DEFAULT_EPISODE_REWARD, QUIZ_ITEMS_PER_EPISODE};
use crate::mode::GameMode;

pub(crate) const DEFAULT_CONTENT_DATA: &str = include_str!("../assets/data/content.json");

/// A reading passage questions are drawn from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingMaterial {
    pub id: u32,
    pub title: String,
    pub content: String,
}

/// A board-mode question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub material_id: u32,
    pub category: GameMode,
    pub difficulty: u8,
    pub question_text: String,
    pub correct_answer: String,
    #[serde(default)]
    pub hint: String,
    /// Stored comma-separated, split on read.
    #[serde(default, deserialize_with = "split_csv")]
    pub distractors: Vec<String>,
}

fn split_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Joined(String),
        Split(Vec<String>),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Joined(joined) => joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Raw::Split(items) => items,
    })
}

impl Question {
    /// Answer options: the correct answer followed by the distractors.
    #[must_use]
    pub fn options(&self) -> Vec<&str> {
        std::iter::once(self.correct_answer.as_str())
            .chain(self.distractors.iter().map(String::as_str))
            .collect()
    }

    /// Letter tiles for word assembly: the answer's letters plus every
    /// distractor's letters, shuffled.
    pub fn letter_tiles<R: Rng>(&self, rng: &mut R) -> Vec<char> {
        let mut tiles: Vec<char> = self
            .options()
            .into_iter()
            .flat_map(str::chars)
            .collect();
        tiles.shuffle(rng);
        tiles
    }

    /// Number of slots the assembled word must fill.
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.correct_answer.chars().count()
    }
}

/// One item of an episode quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizItem {
    pub question_text: String,
    pub correct_answer: String,
    pub options: Vec<String>,
}

/// A story-mode episode with its quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryEpisode {
    pub episode_number: u32,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// XP per star earned on the quiz.
    #[serde(default = "default_episode_reward")]
    pub xp_reward: u32,
    #[serde(default)]
    pub quizzes: Vec<QuizItem>,
}

fn default_episode_reward() -> u32 {
    DEFAULT_EPISODE_REWARD
}

/// Container for all static content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContentCatalog {
    #[serde(default)]
    pub materials: Vec<ReadingMaterial>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub episodes: Vec<StoryEpisode>,
}

impl ContentCatalog {
    /// Create an empty catalog (useful for tests)
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load content from JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed into a catalog.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The bundled reading materials, questions and story.
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_CONTENT_DATA).unwrap_or_default()
    }

    #[must_use]
    pub fn material(&self, id: u32) -> Option<&ReadingMaterial> {
        self.materials.iter().find(|m| m.id == id)
    }

    pub fn questions_for(&self, mode: GameMode) -> impl Iterator<Item = &Question> + '_ {
        self.questions.iter().filter(move |q| q.category == mode)
    }

    /// Draw a question for `mode` uniformly at random.
    pub fn random_question<R: Rng>(&self, mode: GameMode, rng: &mut R) -> Option<&Question> {
        let pool: Vec<&Question> = self.questions_for(mode).collect();
        pool.choose(rng).copied()
    }

    #[must_use]
    pub fn episode(&self, number: u32) -> Option<&StoryEpisode> {
        self.episodes.iter().find(|e| e.episode_number == number)
    }

    /// Highest episode number in the story, zero when there is none.
    #[must_use]
    pub fn final_episode(&self) -> u32 {
        self.episodes
            .iter()
            .map(|e| e.episode_number)
            .max()
            .unwrap_or(0)
    }

    /// Content problems that would break a game, one message each.
    #[must_use]
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for mode in GameMode::ALL {
            if self.questions_for(mode).next().is_none() {
                problems.push(format!("no questions for {mode}"));
            }
        }
        for q in &self.questions {
            if q.correct_answer.trim().is_empty() {
                problems.push(format!("question {} has no answer", q.id));
            }
            if self.material(q.material_id).is_none() {
                problems.push(format!(
                    "question {} references missing material {}",
                    q.id, q.material_id
                ));
            }
        }
        for ep in &self.episodes {
            if ep.quizzes.len() != QUIZ_ITEMS_PER_EPISODE {
                problems.push(format!(
                    "episode {} has {} quiz items",
                    ep.episode_number,
                    ep.quizzes.len()
                ));
            }
            for item in &ep.quizzes {
                if !item.options.contains(&item.correct_answer) {
                    problems.push(format!(
                        "episode {} quiz '{}' does not offer its answer",
                        ep.episode_number, item.question_text
                    ));
                }
            }
        }
        problems
    }
}
