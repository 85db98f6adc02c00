//! Per-frame simulation tick and the run state machine
//!
//! `Menu -> Countdown -> Playing -> {Victory | GameOver}`. Each `tick` is one
//! 60 Hz frame. Within a playing frame the order is fixed: player input,
//! enemies, bullets, bombs, then collision resolution.

use glam::Vec2;
use rand::Rng;

use super::combat;
use super::kinematics::{advance_bomb, advance_bullet, fire_bullet, spawn_bomb};
use super::state::{GameEvent, Player, RunPhase, RunState};
use super::swarm::{self, SwarmParams};
use super::timers::TimerKind;
use crate::assessment;
use crate::consts::*;
use crate::quiz::session;
use crate::settings::{RunMode, Tier};
use crate::telemetry;

/// Input commands for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    pub left: bool,
    pub right: bool,
    /// Fire one bullet (edge-triggered)
    pub fire: bool,
    /// Shield held
    pub shield: bool,
    pub restart: bool,
    pub toggle_auto_restart: bool,
    /// Abort to the menu
    pub menu: bool,
    /// Difficulty chosen on the menu
    pub select_tier: Option<Tier>,
    /// A text field has focus; every key is ignored
    pub text_input_focused: bool,
    /// Key-press timestamps (ms) since the last tick, for telemetry
    pub key_presses: Vec<f64>,
}

/// Advance the run by one frame
pub fn tick(state: &mut RunState, input: &TickInput) {
    state.time_ticks += 1;

    let idle = TickInput::default();
    let input = if input.text_input_focused { &idle } else { input };

    if input.menu && state.phase != RunPhase::Menu {
        return_to_menu(state);
    } else if input.restart && state.phase != RunPhase::Menu {
        let tier = state.settings.tier;
        start_run(state, tier);
    }
    if input.toggle_auto_restart {
        toggle_auto_restart(state);
    }
    if state.phase != RunPhase::Menu {
        for &timestamp in &input.key_presses {
            telemetry::record_key_press(state, timestamp);
        }
    }

    match state.phase {
        RunPhase::Menu => {
            if let Some(tier) = input.select_tier {
                start_run(state, tier);
            }
        }
        RunPhase::Countdown => {
            // Enemies settle; player input is not applied yet
            step_swarm(state);
            state.update_particles();
        }
        RunPhase::Playing => play_frame(state, input),
        RunPhase::Victory | RunPhase::GameOver => state.update_particles(),
    }

    run_timers(state);
}

/// Reset everything and start a new run at `tier`
pub fn start_run(state: &mut RunState, tier: Tier) {
    flush_completion(state);
    state.epoch += 1;
    state.timers.clear();

    state.settings.tier = tier;
    state.tier = tier;
    state.question_index = 0;
    state.correct_count = 0;
    state.score = 0;
    state.health = MAX_HEALTH;
    state.shield_energy = MAX_SHIELD_ENERGY;
    state.ammo_remaining = state.settings.ammo_per_question;
    state.player = Player::new(&state.arena);
    state.clear_entities();
    state.session.reset();
    state.telemetry.reset();
    state.corrupted = false;
    state.feedback = None;
    state.message = None;
    state.completion_reported = false;
    state.countdown = COUNTDOWN_START;

    log::info!(
        "Starting run (epoch {}, tier {}, {} questions)",
        state.epoch,
        tier.as_str(),
        state.settings.total_questions
    );
    state.set_phase(RunPhase::Countdown);
    state
        .timers
        .schedule(TimerKind::CountdownStep, state.time_ticks, COUNTDOWN_STEP_FRAMES, state.epoch);
    session::request_question(state);
}

/// Abort the run; pending responses and timers become stale
pub fn return_to_menu(state: &mut RunState) {
    flush_completion(state);
    state.epoch += 1;
    state.timers.clear();
    state.clear_entities();
    state.session.reset();
    state.telemetry.reset();
    state.corrupted = false;
    state.tier = state.settings.tier;
    state.feedback = None;
    state.message = None;
    state.set_phase(RunPhase::Menu);
}

/// Enter a terminal phase. Has no effect if the run already ended.
pub fn finish_run(state: &mut RunState, victory: bool, message: impl Into<String>) {
    if state.phase.is_terminal() || state.phase == RunPhase::Menu {
        return;
    }
    let message = message.into();
    log::info!("Run over: {message}");

    state.timers.cancel(TimerKind::CountdownStep);
    state.timers.cancel(TimerKind::AmmoGrace { question_index: 0 });
    state.enemies.clear();
    state.session.current = None;
    state.session.pending = None;
    state.player.shielding = false;
    state.message = Some(message);
    state.set_phase(if victory { RunPhase::Victory } else { RunPhase::GameOver });

    match state.settings.mode {
        RunMode::Assessment => state.timers.schedule(
            TimerKind::AssessmentReport,
            state.time_ticks,
            ASSESSMENT_REPORT_FRAMES,
            state.epoch,
        ),
        RunMode::Training if state.settings.auto_restart => state.timers.schedule(
            TimerKind::AutoRestart,
            state.time_ticks,
            AUTO_RESTART_FRAMES,
            state.epoch,
        ),
        RunMode::Training => {}
    }
}

fn toggle_auto_restart(state: &mut RunState) {
    state.settings.auto_restart = !state.settings.auto_restart;
    log::info!("Auto-restart {}", if state.settings.auto_restart { "on" } else { "off" });

    if !state.settings.auto_restart {
        state.timers.cancel(TimerKind::AutoRestart);
    } else if state.phase.is_terminal() && state.settings.mode != RunMode::Assessment {
        state
            .timers
            .schedule(TimerKind::AutoRestart, state.time_ticks, AUTO_RESTART_FRAMES, state.epoch);
    }
}

fn run_timers(state: &mut RunState) {
    let epoch = state.epoch;
    for kind in state.timers.take_due(state.time_ticks, epoch) {
        // An earlier timer in this batch started a new run
        if state.epoch != epoch {
            break;
        }
        match kind {
            TimerKind::CountdownStep => {
                if state.phase != RunPhase::Countdown {
                    continue;
                }
                state.countdown = state.countdown.saturating_sub(1);
                if state.countdown == 0 {
                    state.set_phase(RunPhase::Playing);
                } else {
                    state.timers.schedule(
                        TimerKind::CountdownStep,
                        state.time_ticks,
                        COUNTDOWN_STEP_FRAMES,
                        state.epoch,
                    );
                }
            }
            TimerKind::AutoRestart => {
                if state.phase.is_terminal()
                    && state.settings.auto_restart
                    && state.settings.mode != RunMode::Assessment
                {
                    let tier = state.settings.tier;
                    start_run(state, tier);
                }
            }
            TimerKind::FeedbackExpiry => state.feedback = None,
            TimerKind::AmmoGrace { question_index } => {
                combat::apply_ammo_exhaustion(state, question_index)
            }
            TimerKind::AssessmentReport => report_completion(state),
        }
    }
}

/// Report a finished assessment now instead of losing its pending report
fn flush_completion(state: &mut RunState) {
    if state.settings.mode == RunMode::Assessment && state.timers.is_pending(TimerKind::AssessmentReport) {
        report_completion(state);
    }
}

fn report_completion(state: &mut RunState) {
    if state.completion_reported || !state.phase.is_terminal() {
        return;
    }
    state.completion_reported = true;

    let passed = state.phase == RunPhase::Victory;
    let recommendation = assessment::recommend(
        &state.settings.topic,
        state.settings.tier,
        state.correct_count,
        state.settings.total_questions,
    );
    log::info!(
        "Assessment {} with score {} ({:?})",
        if passed { "passed" } else { "failed" },
        state.score,
        recommendation.status
    );
    state.events.push(GameEvent::AssessmentComplete {
        passed,
        score: state.score,
        recommendation,
    });
}

fn step_swarm(state: &mut RunState) {
    let region = state.arena.swarm_region();
    let params = SwarmParams::for_tier(state.tier);
    swarm::step(&mut state.enemies, region, &params, &mut state.rng);
}

fn play_frame(state: &mut RunState, input: &TickInput) {
    // Player
    let direction = input.right as i32 - input.left as i32;
    if direction != 0 {
        state.player.steer(direction as f32, &state.arena);
    }
    if input.shield && state.shield_energy > 0.0 {
        state.player.shielding = true;
        state.shield_energy = (state.shield_energy - SHIELD_DRAIN).max(0.0);
    } else {
        state.player.shielding = false;
        if !input.shield {
            state.shield_energy = (state.shield_energy + SHIELD_REGEN).min(MAX_SHIELD_ENERGY);
        }
    }
    if input.fire && state.ammo_remaining > 0 && state.session.current.is_some() {
        state.ammo_remaining -= 1;
        let muzzle = state.player.pos - Vec2::new(0.0, PLAYER_HIT_RADIUS);
        state.bullets.push(fire_bullet(muzzle));
    }

    step_swarm(state);

    for bullet in state.bullets.iter_mut() {
        advance_bullet(bullet);
    }

    if state.session.current.is_some() {
        enemy_fire(state);
    }

    let player_pos = state.player.pos;
    let mut fragments = Vec::new();
    for bomb in state.bombs.iter_mut() {
        fragments.extend(advance_bomb(bomb, player_pos, &state.arena));
    }
    state.bombs.extend(fragments);

    combat::resolve(state);
    if state.phase == RunPhase::Playing {
        combat::check_ammo_exhaustion(state);
    }

    state.bullets.retain(|b| b.active);
    state.bombs.retain(|b| b.active);
    state.enemies.retain(|e| e.active);
    state.update_particles();
}

/// Each active enemy drops a bomb with the tier's per-frame probability
fn enemy_fire(state: &mut RunState) {
    let params = state.tier.params();
    if params.bomb_kinds.is_empty() {
        return;
    }
    let rate = (params.fire_rate + state.correct_count as f32 * params.fire_rate_per_correct)
        .clamp(0.0, 1.0) as f64;
    let player_pos = state.player.pos;
    let muzzles: Vec<Vec2> = state.active_enemies().map(|e| e.muzzle()).collect();

    for muzzle in muzzles {
        if state.rng.random_bool(rate) {
            let kind = params.bomb_kinds[state.rng.random_range(0..params.bomb_kinds.len())];
            state.bombs.push(spawn_bomb(kind, muzzle, player_pos));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use proptest::prelude::*;

    fn math_settings() -> Settings {
        Settings {
            topic: "Arithmetic".to_string(),
            total_questions: 3,
            pass_threshold: 2,
            ..Settings::default()
        }
    }

    fn run_frames(state: &mut RunState, frames: u32) {
        let input = TickInput::default();
        for _ in 0..frames {
            tick(state, &input);
        }
    }

    fn started(settings: Settings) -> RunState {
        let mut state = RunState::new(settings, 99);
        let input = TickInput {
            select_tier: Some(Tier::Easy),
            ..TickInput::default()
        };
        tick(&mut state, &input);
        state
    }

    #[test]
    fn test_menu_selection_starts_countdown() {
        let state = started(math_settings());
        assert_eq!(state.phase, RunPhase::Countdown);
        assert_eq!(state.countdown, COUNTDOWN_START);
        assert_eq!(state.tier, Tier::Easy);
        assert_eq!(state.enemies.len(), 4);
    }

    #[test]
    fn test_countdown_reaches_playing() {
        let mut state = started(math_settings());
        run_frames(&mut state, COUNTDOWN_STEP_FRAMES * 3 - 1);
        assert_eq!(state.phase, RunPhase::Countdown);
        assert_eq!(state.countdown, 1);
        run_frames(&mut state, 1);
        assert_eq!(state.phase, RunPhase::Playing);
    }

    #[test]
    fn test_countdown_ignores_player_input() {
        let mut state = started(math_settings());
        let x = state.player.pos.x;
        let input = TickInput {
            left: true,
            fire: true,
            ..TickInput::default()
        };
        tick(&mut state, &input);
        assert_eq!(state.player.pos.x, x);
        assert!(state.bullets.is_empty());
    }

    #[test]
    fn test_fire_consumes_ammo_only_with_question() {
        let mut state = started(math_settings());
        run_frames(&mut state, COUNTDOWN_STEP_FRAMES * 3);
        let fire = TickInput {
            fire: true,
            ..TickInput::default()
        };
        tick(&mut state, &fire);
        assert_eq!(state.ammo_remaining, state.settings.ammo_per_question - 1);
    }

    #[test]
    fn test_text_focus_blocks_keys() {
        let mut state = RunState::new(math_settings(), 1);
        let input = TickInput {
            select_tier: Some(Tier::Hard),
            text_input_focused: true,
            ..TickInput::default()
        };
        tick(&mut state, &input);
        assert_eq!(state.phase, RunPhase::Menu);
    }

    #[test]
    fn test_shield_drains_and_regenerates() {
        let mut state = started(math_settings());
        run_frames(&mut state, COUNTDOWN_STEP_FRAMES * 3);
        let hold = TickInput {
            shield: true,
            ..TickInput::default()
        };
        for _ in 0..10 {
            tick(&mut state, &hold);
        }
        assert!(state.player.shielding);
        assert!((state.shield_energy - (MAX_SHIELD_ENERGY - 10.0 * SHIELD_DRAIN)).abs() < 1e-3);
        run_frames(&mut state, 1);
        assert!(!state.player.shielding);

        state.shield_energy = 0.0;
        tick(&mut state, &hold);
        assert!(!state.player.shielding);
    }

    #[test]
    fn test_menu_return_makes_timers_stale() {
        let mut state = started(math_settings());
        let menu = TickInput {
            menu: true,
            ..TickInput::default()
        };
        tick(&mut state, &menu);
        assert_eq!(state.phase, RunPhase::Menu);
        assert!(state.timers.is_empty());
        run_frames(&mut state, 400);
        assert_eq!(state.phase, RunPhase::Menu);
    }

    #[test]
    fn test_restart_supersedes_countdown() {
        let mut state = started(math_settings());
        run_frames(&mut state, COUNTDOWN_STEP_FRAMES * 2);
        let epoch = state.epoch;
        let restart = TickInput {
            restart: true,
            ..TickInput::default()
        };
        tick(&mut state, &restart);
        assert_eq!(state.epoch, epoch + 1);
        assert_eq!(state.countdown, COUNTDOWN_START);
        // The old schedule would have finished the countdown by now
        run_frames(&mut state, COUNTDOWN_STEP_FRAMES + 5);
        assert_eq!(state.phase, RunPhase::Countdown);
    }

    #[test]
    fn test_auto_restart_after_terminal() {
        let mut state = started(Settings {
            auto_restart: true,
            ..math_settings()
        });
        finish_run(&mut state, false, "test");
        let epoch = state.epoch;
        run_frames(&mut state, AUTO_RESTART_FRAMES);
        assert_eq!(state.phase, RunPhase::Countdown);
        assert_eq!(state.epoch, epoch + 1);
    }

    #[test]
    fn test_toggle_auto_restart_while_terminal() {
        let mut state = started(math_settings());
        finish_run(&mut state, true, "test");
        let toggle = TickInput {
            toggle_auto_restart: true,
            ..TickInput::default()
        };
        tick(&mut state, &toggle);
        assert!(state.timers.is_pending(TimerKind::AutoRestart));
        tick(&mut state, &toggle);
        assert!(!state.timers.is_pending(TimerKind::AutoRestart));
    }

    #[test]
    fn test_assessment_never_auto_restarts_and_reports_once() {
        let mut state = started(Settings {
            auto_restart: true,
            mode: RunMode::Assessment,
            ..math_settings()
        });
        finish_run(&mut state, true, "test");
        state.drain_events();
        run_frames(&mut state, AUTO_RESTART_FRAMES * 2);
        assert_eq!(state.phase, RunPhase::Victory);
        let reports = state
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::AssessmentComplete { passed: true, .. }))
            .count();
        assert_eq!(reports, 1);
        assert!(state.completion_reported);
    }

    fn completions(state: &mut RunState) -> usize {
        state
            .drain_events()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::AssessmentComplete { .. }))
            .count()
    }

    #[test]
    fn test_menu_during_settle_still_reports() {
        let mut state = started(Settings {
            mode: RunMode::Assessment,
            ..math_settings()
        });
        finish_run(&mut state, false, "test");
        run_frames(&mut state, ASSESSMENT_REPORT_FRAMES / 3);
        assert_eq!(completions(&mut state), 0);

        return_to_menu(&mut state);
        assert_eq!(completions(&mut state), 1);
        run_frames(&mut state, ASSESSMENT_REPORT_FRAMES * 2);
        assert_eq!(completions(&mut state), 0);
    }

    #[test]
    fn test_restart_during_settle_reports_once() {
        let mut state = started(Settings {
            mode: RunMode::Assessment,
            ..math_settings()
        });
        finish_run(&mut state, true, "test");
        state.drain_events();

        let restart = TickInput {
            restart: true,
            ..Default::default()
        };
        tick(&mut state, &restart);
        assert_eq!(state.phase, RunPhase::Countdown);
        assert_eq!(completions(&mut state), 1);

        // A restart mid-run has nothing to report
        tick(&mut state, &restart);
        assert_eq!(completions(&mut state), 0);
    }

    #[test]
    fn test_finish_run_is_idempotent() {
        let mut state = started(math_settings());
        finish_run(&mut state, true, "first");
        finish_run(&mut state, false, "second");
        assert_eq!(state.phase, RunPhase::Victory);
        assert_eq!(state.message.as_deref(), Some("first"));
    }

    #[test]
    fn test_feedback_expires() {
        let mut state = started(math_settings());
        combat::show_feedback(&mut state, "hello");
        run_frames(&mut state, FEEDBACK_FRAMES);
        assert_eq!(state.feedback, None);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_counters_stay_ordered(seed in any::<u64>(), inputs in proptest::collection::vec(0u8..16, 1..1500)) {
            let mut state = RunState::new(math_settings(), seed);
            let select = TickInput { select_tier: Some(Tier::Hard), ..TickInput::default() };
            tick(&mut state, &select);
            for bits in inputs {
                let input = TickInput {
                    left: bits & 1 != 0,
                    right: bits & 2 != 0,
                    fire: bits & 4 != 0,
                    shield: bits & 8 != 0,
                    ..TickInput::default()
                };
                tick(&mut state, &input);
                prop_assert!(state.correct_count <= state.question_index);
                prop_assert!(state.question_index <= state.settings.total_questions);
                prop_assert!(state.health >= 0.0 && state.health <= MAX_HEALTH);
                prop_assert!(state.enemies.iter().filter(|e| e.is_correct).count() <= 1);
                if state.health == 0.0 {
                    prop_assert_eq!(state.phase, RunPhase::GameOver);
                }
            }
        }
    }
}
