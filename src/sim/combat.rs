//! Combat resolution
//!
//! Bullets against enemy boxes, bombs against the shield and the player, and
//! the ammo-exhaustion rule. Health reaching zero ends the run before any
//! question transition from the same frame is applied.

use super::collision::within_radius;
use super::state::{BombKind, GameEvent, RunPhase, RunState};
use super::tick;
use super::timers::TimerKind;
use crate::consts::*;
use crate::quiz::session::{self, Outcome};

/// Apply damage and a tier-scaled score penalty
fn penalize(state: &mut RunState, damage: f32, penalty: u64) {
    let multiplier = state.tier.params().score_multiplier;
    state.health = (state.health - damage).max(0.0);
    state.score = state.score.saturating_sub(penalty * multiplier);
}

/// Show a short message that clears itself
pub fn show_feedback(state: &mut RunState, message: impl Into<String>) {
    state.feedback = Some(message.into());
    state
        .timers
        .schedule(TimerKind::FeedbackExpiry, state.time_ticks, FEEDBACK_FRAMES, state.epoch);
}

fn damage_for(state: &RunState, kind: BombKind) -> f32 {
    match kind {
        BombKind::Piercing => PIERCING_DAMAGE,
        _ => state.tier.params().bomb_damage,
    }
}

/// Resolve every collision for this frame
pub fn resolve(state: &mut RunState) {
    let correct_hit = resolve_bullets(state);
    resolve_bombs(state);

    if state.health <= 0.0 {
        state.health = 0.0;
        log::info!("Player destroyed on question {}", state.question_index);
        tick::finish_run(state, false, "Your shield has fallen. Game over.");
        return;
    }

    if correct_hit {
        award(state);
    }
}

/// Returns true when the correct enemy was destroyed
fn resolve_bullets(state: &mut RunState) -> bool {
    for bi in 0..state.bullets.len() {
        if !state.bullets[bi].active {
            continue;
        }
        let pos = state.bullets[bi].pos;
        let Some(ei) = state
            .enemies
            .iter()
            .position(|e| e.active && e.rect().contains(pos))
        else {
            continue;
        };

        state.bullets[bi].active = false;
        let center = state.enemies[ei].center();
        state.spawn_explosion(center);

        if state.enemies[ei].is_correct {
            for enemy in state.enemies.iter_mut() {
                enemy.active = false;
            }
            return true;
        }

        state.enemies[ei].active = false;
        penalize(state, WRONG_HIT_DAMAGE, WRONG_HIT_PENALTY);
        state.events.push(GameEvent::WrongAnswer {
            damage: WRONG_HIT_DAMAGE,
        });
        show_feedback(state, "Wrong answer!");
    }
    false
}

fn resolve_bombs(state: &mut RunState) {
    let player = state.player.pos;
    let shielding = state.player.shielding;

    for i in 0..state.bombs.len() {
        let bomb = &state.bombs[i];
        if !bomb.active {
            continue;
        }
        let (pos, kind) = (bomb.pos, bomb.kind);

        if shielding && kind.shieldable() && within_radius(pos, player, SHIELD_RADIUS) {
            state.bombs[i].active = false;
            state.events.push(GameEvent::ShieldBlock { kind });
            state.spawn_shield_spark(pos);
        } else if within_radius(pos, player, PLAYER_HIT_RADIUS) {
            state.bombs[i].active = false;
            let damage = damage_for(state, kind);
            state.health = (state.health - damage).max(0.0);
            state.events.push(GameEvent::PlayerHit { kind, damage });
            state.spawn_explosion(pos);
        }
    }
}

fn award(state: &mut RunState) {
    let (level, explanation) = match state.session.current.as_ref() {
        Some(q) => (q.difficulty_level, q.explanation.clone()),
        None => (1, None),
    };
    let points = BASE_POINTS * state.tier.params().score_multiplier * level as u64;
    state.score = state.score.saturating_add(points);
    state.events.push(GameEvent::CorrectAnswer { points });
    log::debug!("Correct answer on question {} (+{points})", state.question_index);

    session::advance(state, Outcome::Correct);
    if !state.phase.is_terminal() {
        let message = match explanation {
            Some(text) => format!("Correct! {text}"),
            None => "Correct!".to_string(),
        };
        show_feedback(state, message);
    }
}

/// Start the grace timer once every bullet for the question is spent
pub fn check_ammo_exhaustion(state: &mut RunState) {
    if state.ammo_remaining > 0 || state.bullets_in_flight() > 0 || state.session.current.is_none() {
        return;
    }
    let question_index = state.question_index;
    let kind = TimerKind::AmmoGrace { question_index };
    if state.session.exhausted_for == Some(question_index) || state.timers.is_pending(kind) {
        return;
    }
    state
        .timers
        .schedule(kind, state.time_ticks, AMMO_GRACE_FRAMES, state.epoch);
}

/// Grace period expired: treat the question as missed
pub fn apply_ammo_exhaustion(state: &mut RunState, question_index: u32) {
    if state.phase != RunPhase::Playing
        || question_index != state.question_index
        || state.session.current.is_none()
        || state.session.exhausted_for == Some(question_index)
        || state.ammo_remaining > 0
        || state.bullets_in_flight() > 0
    {
        return;
    }

    state.session.exhausted_for = Some(question_index);
    penalize(state, AMMO_EXHAUSTION_DAMAGE, AMMO_EXHAUSTION_PENALTY);
    state.events.push(GameEvent::AmmoExhausted { question_index });
    log::info!("Out of ammo on question {question_index}");

    if state.health <= 0.0 {
        tick::finish_run(state, false, "Your shield has fallen. Game over.");
        return;
    }

    session::advance(state, Outcome::Missed);
    if !state.phase.is_terminal() {
        show_feedback(state, "Out of ammo! Question missed.");
    }
}
