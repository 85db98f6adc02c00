//! Headless runner: plays one run with the autopilot and prints the result

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use quizfire::assessment::CompletionHandler;
use quizfire::consts::FRAME_RATE;
use quizfire::driver::{Driver, autopilot};
use quizfire::quiz::bank::CuratedBank;
use quizfire::quiz::session;
use quizfire::quiz::source::{QuestionSource, Unavailable};
use quizfire::sim::{GameEvent, RunPhase};
use quizfire::telemetry::CadenceDetector;
use quizfire::{RunMode, Settings, Tier};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Difficulty tier (easy, medium, hard, spartan)
    #[arg(short, long, value_parser = parse_tier)]
    tier: Option<Tier>,

    /// Question topic; math topics are generated locally
    #[arg(long)]
    topic: Option<String>,

    /// Number of questions in the run
    #[arg(short, long)]
    questions: Option<u32>,

    /// Correct answers needed to win
    #[arg(long)]
    pass: Option<u32>,

    /// Report pass/fail as an assessment
    #[arg(long)]
    assessment: bool,

    /// Restart automatically after a terminal state
    #[arg(long)]
    auto_restart: bool,

    /// Load settings from a JSON file (flags override it)
    #[arg(long, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// Write the effective settings to a JSON file and exit
    #[arg(long, value_name = "PATH")]
    write_settings: Option<PathBuf>,

    /// Ignore the curated bank; every question comes from the fallback
    #[arg(long)]
    offline: bool,

    /// Chance the autopilot goes for the correct answer
    #[arg(long, default_value_t = 0.8)]
    accuracy: f64,

    /// Simulated collaborator latency in frames
    #[arg(long, default_value_t = 12)]
    latency: u32,

    /// Give up after this many frames
    #[arg(long, default_value_t = 60 * 60 * 10)]
    max_frames: u64,

    #[arg(long, default_value_t = 0x5ba7_7a11)]
    seed: u64,
}

fn parse_tier(s: &str) -> Result<Tier, String> {
    Tier::from_str(s).ok_or_else(|| format!("unknown tier '{s}'"))
}

/// Prints the assessment outcome
#[derive(Default)]
struct Report {
    calls: u32,
}

impl CompletionHandler for Report {
    fn on_pass(&mut self, final_score: u64) {
        self.calls += 1;
        println!("Assessment passed with {final_score} points");
    }

    fn on_fail(&mut self) {
        self.calls += 1;
        println!("Assessment failed");
    }
}

fn build_settings(args: &Args) -> Result<Settings> {
    let mut settings = match &args.settings {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(tier) = args.tier {
        settings.tier = tier;
    }
    if let Some(topic) = &args.topic {
        settings.topic = topic.clone();
    }
    if let Some(questions) = args.questions {
        settings.total_questions = questions;
    }
    if let Some(pass) = args.pass {
        settings.pass_threshold = pass;
    }
    if args.assessment {
        settings.mode = RunMode::Assessment;
    }
    if args.auto_restart {
        settings.auto_restart = true;
    }
    Ok(settings.validate())
}

fn play<Q: QuestionSource>(mut driver: Driver<Q, CadenceDetector>, args: &Args) -> Result<()> {
    let mut pilot_rng = Pcg32::seed_from_u64(args.seed ^ 0xa11);
    let mut report = Report::default();
    let mut aim_wrong = false;
    let mut runs_finished = 0;

    driver.input.select_tier = Some(driver.state.settings.tier);

    for frame in 0..args.max_frames {
        if driver.state.phase != RunPhase::Menu {
            let mut input = autopilot(&driver.state, aim_wrong);
            let ms = frame as f64 * 1000.0 / FRAME_RATE as f64;
            if input.fire {
                input.key_presses.push(ms);
            }
            driver.input = input;
        }

        for event in driver.step(&mut report) {
            match event {
                GameEvent::QuestionReady {
                    question_index,
                    origin,
                } => {
                    aim_wrong = !pilot_rng.random_bool(args.accuracy.clamp(0.0, 1.0));
                    if let Some(prompt) = session::display_prompt(&driver.state) {
                        log::info!("Q{} ({:?}): {}", question_index + 1, origin, prompt);
                    }
                }
                GameEvent::CorrectAnswer { points } => log::info!("Correct (+{points})"),
                GameEvent::WrongAnswer { damage } => log::info!("Wrong (-{damage} health)"),
                GameEvent::AmmoExhausted { question_index } => {
                    log::info!("Out of ammo on Q{}", question_index + 1)
                }
                GameEvent::Escalated { reason } => log::warn!("Escalated: {reason}"),
                GameEvent::AssessmentComplete { recommendation, .. } => {
                    println!("{} {}", recommendation.message, recommendation.next_step);
                }
                GameEvent::PhaseChanged { to, .. } if to.is_terminal() => {
                    runs_finished += 1;
                    let state = &driver.state;
                    println!(
                        "{:?}: {}/{} correct, score {}, health {:.0}",
                        to,
                        state.correct_count,
                        state.settings.total_questions,
                        state.score,
                        state.health
                    );
                    if let Some(message) = &state.message {
                        println!("{message}");
                    }
                }
                _ => {}
            }
        }

        let state = &driver.state;
        let done = match state.settings.mode {
            RunMode::Assessment => report.calls > 0,
            RunMode::Training => state.phase.is_terminal() && !state.settings.auto_restart,
        };
        if done || (state.settings.auto_restart && runs_finished >= 3) {
            return Ok(());
        }
    }

    bail!("run did not finish within {} frames", args.max_frames)
}

fn main() -> Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let settings = build_settings(&args)?;

    if let Some(path) = &args.write_settings {
        settings
            .save_to(path)
            .with_context(|| format!("writing settings to {}", path.display()))?;
        return Ok(());
    }

    log::info!(
        "{} run on '{}' at {} ({} questions, pass at {})",
        if settings.mode == RunMode::Assessment { "Assessment" } else { "Training" },
        settings.topic,
        settings.tier.as_str(),
        settings.total_questions,
        settings.pass_threshold
    );

    let detector = CadenceDetector::default();
    if !args.offline && CuratedBank::handles(&settings.topic) {
        let driver = Driver::new(settings, args.seed, CuratedBank, detector).with_latency(args.latency);
        play(driver, &args)
    } else {
        let driver = Driver::new(settings, args.seed, Unavailable, detector).with_latency(args.latency);
        play(driver, &args)
    }
}
