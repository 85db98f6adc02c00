//! Host loop
//!
//! Owns the run state and the collaborators. Real time is accumulated into
//! fixed 60 Hz ticks; question and telemetry requests raised by a tick are
//! answered by the collaborators and handed back to the engine after a
//! configurable number of frames, which is how a response can arrive after
//! the run it was meant for has already moved on.

use glam::Vec2;

use crate::assessment::CompletionHandler;
use crate::consts::*;
use crate::distance;
use crate::quiz::source::{QuestionPayload, QuestionSource, SourceError};
use crate::settings::Settings;
use crate::sim::state::{GameEvent, RunPhase, RunState, Ticket};
use crate::sim::tick::{TickInput, tick};
use crate::telemetry::{AnomalyDetector, AnomalyVerdict, TelemetryError};

enum Reply {
    Question {
        ticket: Ticket,
        result: Result<QuestionPayload, SourceError>,
    },
    Anomaly {
        epoch: u64,
        result: Result<AnomalyVerdict, TelemetryError>,
    },
}

struct Delivery {
    due: u64,
    reply: Reply,
}

pub struct Driver<Q: QuestionSource, A: AnomalyDetector> {
    pub state: RunState,
    /// Input applied on the next tick; one-shot fields are cleared after it
    pub input: TickInput,
    /// Frames between a request and its response
    pub latency_frames: u32,
    /// Responses dropped because their run or question had moved on
    pub stale_discarded: u32,
    source: Q,
    detector: A,
    inbox: Vec<Delivery>,
    accumulator: f32,
}

impl<Q: QuestionSource, A: AnomalyDetector> Driver<Q, A> {
    pub fn new(settings: Settings, seed: u64, source: Q, detector: A) -> Self {
        Self {
            state: RunState::new(settings, seed),
            input: TickInput::default(),
            latency_frames: 0,
            stale_discarded: 0,
            source,
            detector,
            inbox: Vec::new(),
            accumulator: 0.0,
        }
    }

    pub fn with_latency(mut self, frames: u32) -> Self {
        self.latency_frames = frames;
        self
    }

    /// Requests still waiting on their simulated latency
    pub fn in_flight(&self) -> usize {
        self.inbox.len()
    }

    /// Run as many fixed ticks as `dt` seconds cover (capped)
    pub fn update(&mut self, dt: f32, handler: &mut impl CompletionHandler) -> Vec<GameEvent> {
        let dt = dt.min(0.1);
        self.accumulator += dt;

        let mut events = Vec::new();
        let mut substeps = 0;
        while self.accumulator >= FRAME_DT && substeps < MAX_SUBSTEPS {
            events.extend(self.step(handler));
            self.accumulator -= FRAME_DT;
            substeps += 1;
        }
        events
    }

    /// Deliver due responses, run one tick, and dispatch what it asked for
    pub fn step(&mut self, handler: &mut impl CompletionHandler) -> Vec<GameEvent> {
        self.deliver_due();

        let input = self.input.clone();
        tick(&mut self.state, &input);

        // Clear one-shot inputs after processing
        self.input.fire = false;
        self.input.restart = false;
        self.input.toggle_auto_restart = false;
        self.input.menu = false;
        self.input.select_tier = None;
        self.input.key_presses.clear();

        let events = self.state.drain_events();
        for event in &events {
            self.dispatch(event, handler);
        }
        events
    }

    fn dispatch(&mut self, event: &GameEvent, handler: &mut impl CompletionHandler) {
        let due = self.state.time_ticks + self.latency_frames as u64;
        match event {
            GameEvent::QuestionRequested { ticket, request } => {
                let result = self.source.fetch(request);
                self.inbox.push(Delivery {
                    due,
                    reply: Reply::Question {
                        ticket: *ticket,
                        result,
                    },
                });
            }
            GameEvent::TelemetryRequested { epoch, post } => {
                let result = self.detector.inspect(post);
                self.inbox.push(Delivery {
                    due,
                    reply: Reply::Anomaly {
                        epoch: *epoch,
                        result,
                    },
                });
            }
            GameEvent::AssessmentComplete { passed, score, .. } => {
                if *passed {
                    handler.on_pass(*score);
                } else {
                    handler.on_fail();
                }
            }
            _ => {}
        }
    }

    fn deliver_due(&mut self) {
        let now = self.state.time_ticks;
        let (due, pending): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.inbox).into_iter().partition(|d| d.due <= now);
        self.inbox = pending;

        for delivery in due {
            let applied = match delivery.reply {
                Reply::Question { ticket, result } => self.state.deliver_question(ticket, result),
                Reply::Anomaly { epoch, result } => self.state.deliver_anomaly(epoch, result),
            };
            if !applied {
                self.stale_discarded += 1;
            }
        }
    }
}

/// Scripted player: lead the chosen target, fire when lined up, shield
/// against close bombs
///
/// With `aim_wrong` the pilot goes for a wrong option when one is left.
pub fn autopilot(state: &RunState, aim_wrong: bool) -> TickInput {
    let mut input = TickInput::default();
    if state.phase != RunPhase::Playing || state.session.current.is_none() {
        return input;
    }

    let target = state
        .active_enemies()
        .find(|e| e.is_correct != aim_wrong)
        .or_else(|| state.active_enemies().find(|e| e.is_correct));
    if let Some(enemy) = target {
        let muzzle_y = state.player.pos.y - PLAYER_HIT_RADIUS;
        let flight = ((muzzle_y - enemy.center().y) / BULLET_SPEED).max(0.0);
        let lead_x = enemy.center().x + enemy.vel.x * flight;
        let dx = lead_x - state.player.pos.x;

        input.left = dx < -PLAYER_SPEED;
        input.right = dx > PLAYER_SPEED;
        input.fire = dx.abs() < enemy.width * 0.25 && state.bullets_in_flight() == 0;
    }

    let threat = state.bombs.iter().any(|b| {
        b.active && b.kind.shieldable() && distance(b.pos, state.player.pos) < SHIELD_RADIUS * 1.5
    });
    input.shield = threat && state.shield_energy > 20.0;

    // Dodge what the shield cannot stop
    let piercing = state.bombs.iter().find(|b| {
        b.active && !b.kind.shieldable() && distance(b.pos, state.player.pos) < SHIELD_RADIUS * 2.0
    });
    if let Some(bomb) = piercing {
        let away = state.player.pos.x - bomb.pos.x;
        let go_right = if away == 0.0 {
            state.player.pos.x < state.arena.width / 2.0
        } else {
            away > 0.0
        };
        input.left = !go_right;
        input.right = go_right;
        input.fire = false;
    }

    input
}

/// Center of the correct enemy, if one is on screen
pub fn correct_target(state: &RunState) -> Option<Vec2> {
    state.active_enemies().find(|e| e.is_correct).map(|e| e.center())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::bank::CuratedBank;
    use crate::settings::Tier;
    use crate::telemetry::CadenceDetector;

    fn driver(latency: u32) -> Driver<CuratedBank, CadenceDetector> {
        let settings = Settings {
            topic: "Ancient Greece".to_string(),
            ..Settings::default()
        };
        Driver::new(settings, 5, CuratedBank, CadenceDetector::default()).with_latency(latency)
    }

    #[test]
    fn test_update_caps_substeps() {
        let mut d = driver(0);
        // A long stall is not replayed in one go
        d.accumulator = 1.0;
        d.update(0.0, &mut ());
        assert_eq!(d.state.time_ticks, MAX_SUBSTEPS as u64);
    }

    #[test]
    fn test_update_accumulates_partial_frames() {
        let mut d = driver(0);
        d.update(FRAME_DT * 0.6, &mut ());
        assert_eq!(d.state.time_ticks, 0);
        d.update(FRAME_DT * 0.6, &mut ());
        assert_eq!(d.state.time_ticks, 1);
    }

    #[test]
    fn test_question_arrives_after_latency() {
        let mut d = driver(10);
        d.input.select_tier = Some(Tier::Easy);
        d.step(&mut ());
        assert!(d.state.session.is_loading());
        assert_eq!(d.in_flight(), 1);
        for _ in 0..10 {
            d.step(&mut ());
        }
        assert!(d.state.session.is_loading());
        d.step(&mut ());
        assert!(d.state.session.current.is_some());
        assert_eq!(d.in_flight(), 0);
    }

    #[test]
    fn test_one_shot_inputs_clear() {
        let mut d = driver(0);
        d.input.select_tier = Some(Tier::Easy);
        d.input.fire = true;
        d.step(&mut ());
        assert_eq!(d.input.select_tier, None);
        assert!(!d.input.fire);
    }

    #[test]
    fn test_autopilot_idle_outside_play() {
        let d = driver(0);
        let input = autopilot(&d.state, false);
        assert!(!input.fire && !input.left && !input.right);
    }
}
