use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::scenarios::{Scenario, ScenarioKind};
use crate::simulation::{SimulationPlan, exercise_service, play_board, play_story};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    /// Turns per board game, episodes per story, users per service run.
    pub average_work: f64,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
}

/// What one passing iteration did.
struct IterationStats {
    work: usize,
    detail: String,
}

pub struct LogicTester {
    plan: SimulationPlan,
    verbose: bool,
}

impl LogicTester {
    pub const fn new(plan: SimulationPlan, verbose: bool) -> Self {
        Self { plan, verbose }
    }

    pub fn run_scenario(
        &self,
        scenario: &Scenario,
        seeds: &[u64],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        let mut results = Vec::new();
        for &seed in seeds {
            if self.verbose {
                println!(
                    "🧪 Testing scenario: {} (seed: {seed})",
                    scenario.key.bright_white()
                );
            }
            results.push(self.run_single_scenario(scenario, seed, iterations));
        }
        results
    }

    fn run_single_scenario(
        &self,
        scenario: &Scenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut successes = 0;
        let mut failures = Vec::new();
        let mut durations = Vec::new();
        let mut work = 0_usize;

        for i in 0..iterations {
            let start_time = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
            match self.run_iteration(scenario.kind, iteration_seed) {
                Ok(stats) => {
                    successes += 1;
                    work += stats.work;
                    let duration = start_time.elapsed();
                    durations.push(duration);
                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{iterations} passed ({duration:?}) {}",
                            i + 1,
                            stats.detail
                        );
                    }
                }
                Err(err) => {
                    let message = format!("Iteration {} (seed {iteration_seed}): {err}", i + 1);
                    if self.verbose {
                        println!("  ❌ {}", message.clone().red());
                    }
                    log::warn!("{message}");
                    failures.push(message);
                }
            }
        }

        let average_duration = if durations.is_empty() {
            Duration::ZERO
        } else {
            durations.iter().sum::<Duration>() / u32::try_from(durations.len()).unwrap_or(1)
        };
        #[allow(clippy::cast_precision_loss)]
        let average_work = if successes == 0 {
            0.0
        } else {
            work as f64 / successes as f64
        };

        ScenarioResult {
            scenario_name: scenario.key.to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: successes,
            failures,
            average_work,
            average_duration,
        }
    }

    fn run_iteration(&self, kind: ScenarioKind, seed: u64) -> Result<IterationStats, String> {
        match kind {
            ScenarioKind::Board(mode) => {
                let first = play_board(mode, seed, &self.plan).map_err(|e| format!("{e:#}"))?;
                let replay = play_board(mode, seed, &self.plan).map_err(|e| format!("{e:#}"))?;
                if first.fingerprint != replay.fingerprint {
                    return Err("replay with the same seed diverged".to_string());
                }
                if !first.violations.is_empty() {
                    return Err(first.violations.join("; "));
                }
                Ok(IterationStats {
                    work: usize::try_from(first.turns).unwrap_or(usize::MAX),
                    detail: format!(
                        "turns:{} winner:{:?} wrong:{} wild:{}",
                        first.turns, first.winner, first.wrong_answers, first.wild_events
                    ),
                })
            }
            ScenarioKind::Story => {
                let summary = play_story(seed, &self.plan).map_err(|e| format!("{e:#}"))?;
                if !summary.violations.is_empty() {
                    return Err(summary.violations.join("; "));
                }
                Ok(IterationStats {
                    work: summary.episodes_completed,
                    detail: format!("stars:{} xp:{}", summary.total_stars, summary.xp),
                })
            }
            ScenarioKind::Service => {
                let summary = exercise_service(seed, &self.plan).map_err(|e| format!("{e:#}"))?;
                if !summary.violations.is_empty() {
                    return Err(summary.violations.join("; "));
                }
                Ok(IterationStats {
                    work: summary.users,
                    detail: format!("users:{}", summary.users),
                })
            }
        }
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::get_scenario;

    #[test]
    fn every_scenario_passes_a_short_run() {
        let tester = LogicTester::new(SimulationPlan::default(), false);
        for key in ["jumanji", "scrabble", "snakes", "story", "service"] {
            let scenario = get_scenario(key).unwrap();
            let results = tester.run_scenario(&scenario, &[1, 2], 2);
            assert_eq!(results.len(), 2);
            for result in results {
                assert!(result.passed, "{key}: {:?}", result.failures);
                assert_eq!(result.successful_iterations, 2);
                assert!(result.average_work > 0.0);
            }
        }
    }

    #[test]
    fn result_serializes_duration_as_millis() {
        let result = ScenarioResult {
            scenario_name: "snakes".into(),
            seed: 1,
            passed: true,
            iterations_run: 1,
            successful_iterations: 1,
            failures: Vec::new(),
            average_work: 40.0,
            average_duration: Duration::from_millis(12),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["average_duration"], 12);
    }
}
