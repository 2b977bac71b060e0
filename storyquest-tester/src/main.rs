mod reports;
mod scenarios;
mod simulation;
mod tester;
mod util;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::{Path, PathBuf};
use std::time::Instant;

use scenarios::{expand_scenarios, get_scenario, list_scenarios};
use simulation::SimulationPlan;
use tester::{LogicTester, ScenarioResult};
use util::{parse_seeds, timestamp};

#[derive(Debug, Parser)]
#[command(name = "storyquest-tester", version)]
#[command(about = "Seeded play-throughs of the StoryQuest board, story and account rules")]
struct Args {
    /// Scenarios to run (comma-separated, `all` for every scenario)
    #[arg(long, default_value = "all")]
    modes: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of iterations per scenario and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Players seated at each board
    #[arg(long, default_value_t = 2)]
    players: usize,

    /// Chance a scripted player answers correctly (0.0 to 1.0)
    #[arg(long, default_value_t = 0.75)]
    accuracy: f64,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    let plan = build_plan(&args)?;
    let seeds = parse_seeds(&args.seeds)?;
    if args.report == "console" {
        announce_banner();
    }

    let start_time = Instant::now();
    let scenarios = expand_scenarios(&args.modes);
    let results = run_logic_scenarios(&args, plan, &scenarios, &seeds);

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut out = report_sink(args.output.as_deref())?;
    writeln!(out, "Available scenarios:")?;
    for (key, description) in list_scenarios() {
        writeln!(out, "  {key:12} - {description}")?;
    }
    out.flush()?;
    Ok(true)
}

fn build_plan(args: &Args) -> Result<SimulationPlan> {
    if args.players == 0 {
        bail!("--players must be at least 1");
    }
    if !(0.0..=1.0).contains(&args.accuracy) {
        bail!("--accuracy must be between 0.0 and 1.0, got {}", args.accuracy);
    }
    Ok(SimulationPlan {
        players: args.players,
        accuracy: args.accuracy,
        ..SimulationPlan::default()
    })
}

fn announce_banner() {
    println!("{}", "🎲 StoryQuest Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
    println!("Started {}", timestamp());
}

fn run_logic_scenarios(
    args: &Args,
    plan: SimulationPlan,
    scenarios: &[String],
    seeds: &[u64],
) -> Vec<ScenarioResult> {
    let mut results = Vec::new();
    let logic_tester = LogicTester::new(plan, args.verbose);

    for scenario_name in scenarios {
        if let Some(scenario) = get_scenario(scenario_name) {
            log::info!(
                "running {} over {} seed(s) x {} iteration(s)",
                scenario.key,
                seeds.len(),
                args.iterations
            );
            results.extend(logic_tester.run_scenario(&scenario, seeds, args.iterations));
        } else {
            eprintln!("⚠️  Unknown scenario: {}", scenario_name.yellow());
        }
    }

    results
}

fn write_reports(args: &Args, results: &[ScenarioResult], start_time: Instant) -> Result<()> {
    let mut out = report_sink(args.output.as_deref())?;

    match args.report.as_str() {
        "json" => {
            if results.is_empty() {
                writeln!(out, "[]")?;
            } else {
                reports::generate_json_report(&mut out, results)?;
            }
        }
        "markdown" => {
            if results.is_empty() {
                writeln!(out, "# StoryQuest Logic Test Results\n\n_No scenarios executed._")?;
            } else {
                reports::generate_markdown_report(&mut out, results)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(out, "No logic scenarios executed.")?;
            } else {
                reports::generate_console_report(&mut out, results, start_time.elapsed())?;
            }
            writeln!(out)?;
            writeln!(out, "🏁 Total time: {:?}", start_time.elapsed())?;
        }
    }

    out.flush()?;
    Ok(())
}

/// Buffered destination for reports: the `--output` file, or stdout.
fn report_sink(path: Option<&Path>) -> Result<Box<dyn Write>> {
    let Some(path) = path else {
        return Ok(Box::new(BufWriter::new(stdout())));
    };
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    Ok(Box::new(BufWriter::new(file)))
}
