//! Scripted play-throughs with invariant checks after every turn.
use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use std::collections::HashSet;

use storyquest_game::{
    ActiveQuestion, BcryptCredentials, ContentCatalog, EngineEvent, EpisodeRun, GameMode,
    GameSession, MemoryStore, PlayerState, ProgressService, RoundPhase, RulesConfig, TurnReport,
    Verdict, WordAttempt, constants::LEADERBOARD_LIMIT, level_of,
};

/// Lowest bcrypt cost; simulated accounts need no real protection.
const SIMULATION_HASH_COST: u32 = 4;

/// Knobs shared by every scenario run.
#[derive(Debug, Clone, Copy)]
pub struct SimulationPlan {
    pub players: usize,
    /// Chance a scripted player answers correctly.
    pub accuracy: f64,
    pub max_turns: u32,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            players: 2,
            accuracy: 0.75,
            max_turns: 2_000,
        }
    }
}

/// Scripted answers drawn from their own stream so the game's draws are
/// unaffected by the answer policy.
struct AnswerPolicy {
    rng: ChaCha20Rng,
    accuracy: f64,
}

impl AnswerPolicy {
    fn new(seed: u64, accuracy: f64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed ^ 0x5EED_A115_u64),
            accuracy: accuracy.clamp(0.0, 1.0),
        }
    }

    fn knows_it(&mut self) -> bool {
        self.rng.gen_bool(self.accuracy)
    }

    fn choose<'a>(&mut self, correct: &'a str, options: &'a [String]) -> &'a str {
        if self.knows_it() {
            return correct;
        }
        options
            .iter()
            .filter(|o| o.as_str() != correct)
            .collect::<Vec<_>>()
            .choose(&mut self.rng)
            .copied()
            .map_or("", String::as_str)
    }

    fn attempt_word(&mut self, active: &ActiveQuestion) -> WordAttempt {
        let budget = active.time_budget.unwrap_or(0);
        let time_remaining = self.rng.gen_range(0..=budget);
        if self.knows_it() {
            return WordAttempt::Completed {
                word: active.question.correct_answer.clone(),
                time_remaining,
            };
        }
        if self.rng.gen_bool(0.5) {
            return WordAttempt::TimedOut;
        }
        let word = active
            .question
            .distractors
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_default();
        WordAttempt::Completed {
            word,
            time_remaining,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardSummary {
    pub mode: GameMode,
    pub seed: u64,
    pub turns: u32,
    pub winner: Option<usize>,
    pub wrong_answers: u32,
    pub wild_events: u32,
    pub level_ups: u32,
    pub final_positions: Vec<u8>,
    /// Digest of every turn report, for replay comparison.
    pub fingerprint: String,
    pub violations: Vec<String>,
}

/// Play one board game to a win or the turn cap.
///
/// # Errors
///
/// Returns an error if the session cannot start or rejects a scripted call.
pub fn play_board(mode: GameMode, seed: u64, plan: &SimulationPlan) -> Result<BoardSummary> {
    let rules = RulesConfig::default();
    let penalty = rules.wrong_answer_penalty;
    let retry = rules.retry_after_wrong_answer;
    let mut session = GameSession::new(
        mode,
        seed,
        rules,
        ContentCatalog::load_from_static(),
        vec![PlayerState::default(); plan.players],
    )
    .with_context(|| format!("starting {mode} session"))?;
    let mut policy = AnswerPolicy::new(seed, plan.accuracy);

    let mut reports: Vec<TurnReport> = Vec::new();
    let mut violations = Vec::new();
    let mut summary = BoardSummary {
        mode,
        seed,
        turns: 0,
        winner: None,
        wrong_answers: 0,
        wild_events: 0,
        level_ups: 0,
        final_positions: Vec::new(),
        fingerprint: String::new(),
        violations: Vec::new(),
    };

    while !session.is_over() && summary.turns < plan.max_turns {
        let seat = session.round().current_index();
        let before = *session.round().current_player();
        let active = session.draw_question().context("drawing question")?.clone();
        let report = if mode.is_timed() {
            let attempt = policy.attempt_word(&active);
            session.answer_word(&attempt)
        } else {
            let options: Vec<String> = active
                .question
                .options()
                .into_iter()
                .map(String::from)
                .collect();
            let choice = policy.choose(&active.question.correct_answer, &options);
            session.answer_choice(choice)
        }
        .with_context(|| format!("turn {} for seat {seat}", summary.turns + 1))?;

        let after = session.round().seats()[seat];
        check_turn(
            &mut violations,
            &report,
            TurnContext {
                turn: summary.turns + 1,
                seat,
                before,
                after,
                penalty,
                retry,
                next_seat: session.round().current_index(),
            },
        );
        for state in session.round().seats() {
            if !(1..=100).contains(&state.position()) {
                violations.push(format!("seat left the board at {}", state.position()));
            }
        }

        summary.turns += 1;
        if report.verdict == Verdict::Incorrect {
            summary.wrong_answers += 1;
        }
        if report.wild.is_some() {
            summary.wild_events += 1;
        }
        if report.leveled_up() {
            summary.level_ups += 1;
        }
        reports.push(report);
    }

    if !session.is_over() {
        violations.push(format!("no winner after {} turns", plan.max_turns));
    }
    summary.winner = session.round().winner();
    if let Some(winner) = summary.winner
        && session.saved_progress(winner).map(|p| p.position) != Some(1)
    {
        violations.push("winner's saved progress was not reset".to_string());
    }
    summary.final_positions = session
        .round()
        .seats()
        .iter()
        .map(PlayerState::position)
        .collect();
    summary.fingerprint = fingerprint(&reports)?;
    summary.violations = violations;
    Ok(summary)
}

struct TurnContext {
    turn: u32,
    seat: usize,
    before: PlayerState,
    after: PlayerState,
    penalty: u32,
    retry: bool,
    next_seat: usize,
}

fn check_turn(violations: &mut Vec<String>, report: &TurnReport, ctx: TurnContext) {
    let turn = ctx.turn;
    if report.seat != ctx.seat {
        violations.push(format!("turn {turn}: report names seat {}", report.seat));
    }
    let xp_change = i64::from(ctx.after.xp()) - i64::from(ctx.before.xp());
    if xp_change != report.xp_delta {
        violations.push(format!(
            "turn {turn}: xp moved by {xp_change} but report says {}",
            report.xp_delta
        ));
    }
    match report.verdict {
        Verdict::Incorrect => {
            if ctx.after.position() != ctx.before.position() {
                violations.push(format!("turn {turn}: wrong answer moved the player"));
            }
            if ctx.after.xp() != ctx.before.xp().saturating_sub(ctx.penalty) {
                violations.push(format!("turn {turn}: wrong answer penalty not applied"));
            }
            if ctx.retry && ctx.next_seat != ctx.seat {
                violations.push(format!("turn {turn}: turn passed after a wrong answer"));
            }
        }
        Verdict::Correct => {
            if ctx.after.position() < ctx.before.position() && !took_snake(report) {
                violations.push(format!("turn {turn}: moved backwards without a snake"));
            }
        }
    }
    if let Some(face) = report.roll
        && !(1..=6).contains(&face)
    {
        violations.push(format!("turn {turn}: rolled {face}"));
    }
    for event in &report.events {
        if let EngineEvent::LevelUp { from, to } = event
            && (to <= from || *to > level_of(ctx.after.xp()))
        {
            violations.push(format!("turn {turn}: bogus level up {from} -> {to}"));
        }
    }
    if report.won() != ctx.after.has_won() {
        violations.push(format!("turn {turn}: win flag disagrees with position"));
    }
    if report.won() && report.phase != RoundPhase::Win {
        violations.push(format!("turn {turn}: round kept going after a win"));
    }
}

fn took_snake(report: &TurnReport) -> bool {
    report.moves().any(|m| m.position < m.landed)
}

fn fingerprint(reports: &[TurnReport]) -> Result<String> {
    let bytes = serde_json::to_vec(reports).context("serializing turn reports")?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorySummary {
    pub seed: u64,
    pub episodes_completed: usize,
    pub total_stars: u32,
    pub xp: u32,
    pub violations: Vec<String>,
}

/// Read through the whole story as one registered user.
///
/// # Errors
///
/// Returns an error if the service rejects a scripted call.
pub fn play_story(seed: u64, plan: &SimulationPlan) -> Result<StorySummary> {
    let content = ContentCatalog::load_from_static();
    let service = ProgressService::new(
        MemoryStore::new(),
        BcryptCredentials::with_cost(seed.to_le_bytes().to_vec(), SIMULATION_HASH_COST),
        content.clone(),
    );
    let user = service
        .register(&format!("reader-{seed}"), "tester")
        .context("registering reader")?
        .id;
    let mut policy = AnswerPolicy::new(seed, plan.accuracy);
    let mut violations = Vec::new();
    let final_episode = content.final_episode();

    let mut guard = 0;
    loop {
        let progress = service.story_progress(user)?;
        if progress.is_finished(final_episode) {
            break;
        }
        guard += 1;
        if guard > final_episode + 1 {
            violations.push("story never finished".to_string());
            break;
        }
        let Some(episode) = content.episode(progress.current_episode) else {
            violations.push(format!(
                "current episode {} is missing",
                progress.current_episode
            ));
            break;
        };

        let mut run = EpisodeRun::new(episode);
        while let Some(item) = run.current_item() {
            let choice = policy.choose(&item.correct_answer, &item.options).to_string();
            run.answer(&choice)?;
        }
        let outcome = run.finish()?;
        if outcome.xp_earned != episode.xp_reward * u32::from(outcome.grade.stars) {
            violations.push(format!("episode {} xp mismatch", episode.episode_number));
        }
        let xp_before = service.user_stats(user)?.xp;
        let (after, xp) = service.complete_episode(
            user,
            outcome.episode,
            outcome.grade.stars,
            outcome.xp_earned,
        )?;
        if xp.xp != xp_before + outcome.xp_earned {
            violations.push(format!("episode {} xp not credited", outcome.episode));
        }
        if after.current_episode != outcome.episode + 1 {
            violations.push(format!("episode {} did not advance", outcome.episode));
        }
        if has_repeats(&after.completed_episodes) {
            violations.push("completed episodes repeat".to_string());
        }
    }

    let progress = service.story_progress(user)?;
    let stats = service.user_stats(user)?;
    if stats.level != level_of(stats.xp) {
        violations.push("stored level disagrees with xp".to_string());
    }
    Ok(StorySummary {
        seed,
        episodes_completed: progress.completed_episodes.len(),
        total_stars: progress.total_stars,
        xp: stats.xp,
        violations,
    })
}

fn has_repeats(episodes: &[u32]) -> bool {
    let mut seen = HashSet::with_capacity(episodes.len());
    !episodes.iter().all(|episode| seen.insert(*episode))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSummary {
    pub seed: u64,
    pub users: usize,
    pub violations: Vec<String>,
}

/// Register a crowd, hand out xp and check logins and the leaderboard.
///
/// # Errors
///
/// Returns an error if the service rejects a scripted call.
pub fn exercise_service(seed: u64, plan: &SimulationPlan) -> Result<ServiceSummary> {
    let service = ProgressService::new(
        MemoryStore::new(),
        BcryptCredentials::with_cost(b"tester-pepper".to_vec(), SIMULATION_HASH_COST),
        ContentCatalog::load_from_static(),
    );
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let mut violations = Vec::new();
    let users = plan.players.max(1) * 6;

    let mut ids = Vec::with_capacity(users);
    for i in 0..users {
        let name = format!("player-{i}");
        let stats = service.register(&name, &name)?;
        service.award_xp(stats.id, rng.gen_range(0..2_000))?;
        if rng.gen_bool(0.3) {
            service.deduct_xp(stats.id, rng.gen_range(0..300))?;
        }
        ids.push(stats.id);
    }
    if service.register("player-0", "again").is_ok() {
        violations.push("duplicate username accepted".to_string());
    }
    for (i, id) in ids.iter().enumerate() {
        let name = format!("player-{i}");
        match service.login(&name, &name) {
            Ok(stats) if stats.id == *id => {}
            _ => violations.push(format!("{name} could not log in")),
        }
        if service.login(&name, "wrong").is_ok() {
            violations.push(format!("{name} logged in with a wrong password"));
        }
    }

    let board = service.leaderboard()?;
    if board.len() != users.min(LEADERBOARD_LIMIT) {
        violations.push(format!("leaderboard has {} rows", board.len()));
    }
    if board.windows(2).any(|w| w[0].xp < w[1].xp) {
        violations.push("leaderboard out of order".to_string());
    }
    if board.iter().any(|row| row.level != level_of(row.xp)) {
        violations.push("leaderboard level disagrees with xp".to_string());
    }

    Ok(ServiceSummary {
        seed,
        users,
        violations,
    })
}
