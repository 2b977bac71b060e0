use storyquest_game::GameMode;

use crate::util::split_csv;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioKind {
    Board(GameMode),
    Story,
    Service,
}

#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub key: &'static str,
    pub description: &'static str,
    pub kind: ScenarioKind,
}

const CATALOG: [Scenario; 5] = [
    Scenario {
        key: "jumanji",
        description: "Multiple choice on the plain board with wild events",
        kind: ScenarioKind::Board(GameMode::Jumanji),
    },
    Scenario {
        key: "scrabble",
        description: "Timed word assembly with speed bonuses",
        kind: ScenarioKind::Board(GameMode::Scrabble),
    },
    Scenario {
        key: "snakes",
        description: "Dice rolls on the snakes and ladders board",
        kind: ScenarioKind::Board(GameMode::Snakes),
    },
    Scenario {
        key: "story",
        description: "All story episodes, quizzes and star grading",
        kind: ScenarioKind::Story,
    },
    Scenario {
        key: "service",
        description: "Registration, login, xp updates and the leaderboard",
        kind: ScenarioKind::Service,
    },
];

pub fn list_scenarios() -> impl Iterator<Item = (&'static str, &'static str)> {
    CATALOG.iter().map(|s| (s.key, s.description))
}

pub fn get_scenario(key: &str) -> Option<Scenario> {
    let key = key.trim().to_ascii_lowercase();
    CATALOG.iter().find(|s| s.key == key).copied()
}

/// Scenario keys requested on the command line; `all` expands to the catalog.
pub fn expand_scenarios(arg: &str) -> Vec<String> {
    let mut keys = split_csv(arg);
    if keys.iter().any(|k| k == "all") {
        keys.retain(|k| k != "all");
        for scenario in &CATALOG {
            if !keys.iter().any(|k| k == scenario.key) {
                keys.push(scenario.key.to_string());
            }
        }
    }
    keys
}
