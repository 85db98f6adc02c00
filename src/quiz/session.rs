//! Per-run question lifecycle
//!
//! Requests question `question_index`, validates whatever comes back, and
//! turns it into a fresh swarm of enemies. Any source failure other than the
//! quota gate is recovered by the procedural generator.

use super::procedural;
use super::source::{QuestionPayload, QuestionRequest, SourceError};
use super::Question;
use crate::sim::state::{GameEvent, QuestionOrigin, RunState, Ticket};
use crate::sim::swarm::{self, SwarmParams};
use crate::sim::tick;
use crate::sim::timers::TimerKind;
use crate::telemetry;

/// Question bookkeeping for the current run
#[derive(Debug, Clone, Default)]
pub struct QuestionSession {
    /// Question being played (None while loading or between questions)
    pub current: Option<Question>,
    /// Outstanding remote request
    pub pending: Option<Ticket>,
    /// Prompts shown this run, sent with each request
    pub seen_prompts: Vec<String>,
    pub origin: Option<QuestionOrigin>,
    /// Question index already penalized for ammo exhaustion
    pub exhausted_for: Option<u32>,
}

impl QuestionSession {
    /// Waiting on the question source
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// How a question ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Missed,
}

/// Ask for the question at the current index
///
/// Math topics are answered locally when `prefer_local_math` is set;
/// everything else goes out as a [`GameEvent::QuestionRequested`].
pub fn request_question(state: &mut RunState) {
    let ticket = state.ticket();

    if state.settings.prefer_local_math && state.settings.is_math_topic() {
        log::info!("Question {}: generating locally ({})", ticket.question_index, state.settings.topic);
        let question = procedural::generate(state.tier, state.settings.options_per_question, &mut state.rng);
        install_question(state, question, QuestionOrigin::Procedural);
        return;
    }

    let request = QuestionRequest {
        topic: state.settings.topic.clone(),
        difficulty_tier: state.tier.index(),
        question_index: ticket.question_index,
        previous_prompts: state.session.seen_prompts.clone(),
    };
    log::info!(
        "Question {}: requesting '{}' at tier {}",
        ticket.question_index,
        request.topic,
        request.difficulty_tier
    );
    state.session.pending = Some(ticket);
    state.events.push(GameEvent::QuestionRequested { ticket, request });
}

/// Apply a question source response. Returns false when the response was
/// stale and discarded.
pub fn deliver_question(
    state: &mut RunState,
    ticket: Ticket,
    result: Result<QuestionPayload, SourceError>,
) -> bool {
    if ticket != state.ticket()
        || state.session.pending != Some(ticket)
        || !state.phase.accepts_questions()
    {
        log::debug!(
            "Discarding stale question response (epoch {}, index {}); now epoch {}, index {}",
            ticket.epoch,
            ticket.question_index,
            state.epoch,
            state.question_index
        );
        return false;
    }
    state.session.pending = None;

    let expected = state.settings.options_per_question;
    let validated = result.and_then(|payload| {
        Question::from_payload(payload, expected).map_err(|e| SourceError::Malformed(e.to_string()))
    });

    match validated {
        Ok(question) => install_question(state, question, QuestionOrigin::Remote),
        Err(e) if e.is_hard_stop() => {
            log::warn!("Question source refused: {e}; ending run");
            state.events.push(GameEvent::QuotaExhausted);
            tick::finish_run(
                state,
                false,
                "Question quota exhausted. Upgrade your plan to keep training.",
            );
        }
        Err(e) => {
            log::warn!("Question source failed ({e}); using fallback generator");
            let question = procedural::generate(state.tier, expected, &mut state.rng);
            install_question(state, question, QuestionOrigin::Procedural);
        }
    }
    true
}

/// Make `question` the live question: reset ammo, clear feedback, and spawn
/// one enemy per option
fn install_question(state: &mut RunState, question: Question, origin: QuestionOrigin) {
    state.ammo_remaining = state.settings.ammo_per_question;
    state.feedback = None;
    state.bullets.clear();
    state.timers.cancel(TimerKind::FeedbackExpiry);
    state.timers.cancel(TimerKind::AmmoGrace { question_index: 0 });

    let region = state.arena.swarm_region();
    let params = SwarmParams::for_tier(state.tier);
    let first_id = state.reserve_entity_ids(question.options.len() as u32);
    let mut enemies = swarm::spawn_enemies(
        &question.options,
        question.correct_index,
        region,
        &params,
        &mut state.rng,
        first_id,
    );
    if state.corrupted {
        for enemy in enemies.iter_mut() {
            enemy.label = telemetry::distort(&enemy.text, enemy.id as u64);
        }
    }
    state.enemies = enemies;

    log::debug!("Question {} ready ({:?}): {}", state.question_index, origin, question.prompt);
    state.session.seen_prompts.push(question.prompt.clone());
    state.session.origin = Some(origin);
    state.session.current = Some(question);
    state.events.push(GameEvent::QuestionReady {
        question_index: state.question_index,
        origin,
    });
}

/// Close the current question and move on: next request, or end of run
pub fn advance(state: &mut RunState, outcome: Outcome) {
    if outcome == Outcome::Correct {
        state.correct_count += 1;
    }
    state.question_index += 1;
    state.enemies.clear();
    state.session.current = None;
    state.session.pending = None;
    state.timers.cancel(TimerKind::AmmoGrace { question_index: 0 });

    if state.question_index >= state.settings.total_questions {
        let passed = state.correct_count >= state.settings.pass_threshold;
        let message = format!(
            "{} {}/{} correct, score {}",
            if passed { "Victory!" } else { "Defeat." },
            state.correct_count,
            state.settings.total_questions,
            state.score
        );
        tick::finish_run(state, passed, message);
    } else {
        request_question(state);
    }
}

/// Prompt as it should be displayed (distorted while corrupted)
pub fn display_prompt(state: &RunState) -> Option<String> {
    let question = state.session.current.as_ref()?;
    if state.corrupted {
        Some(telemetry::distort(&question.prompt, state.question_index as u64))
    } else {
        Some(question.prompt.clone())
    }
}

impl RunState {
    /// See [`deliver_question`]
    pub fn deliver_question(&mut self, ticket: Ticket, result: Result<QuestionPayload, SourceError>) -> bool {
        deliver_question(self, ticket, result)
    }
}
