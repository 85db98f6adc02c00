//! Run state and core simulation types
//!
//! Everything the frame loop mutates lives in [`RunState`]. Component
//! functions receive it by `&mut` each tick; nothing is shared behind it.

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::collision::Rect;
use super::timers::Timers;
use crate::assessment::Recommendation;
use crate::consts::*;
use crate::quiz::session::QuestionSession;
use crate::quiz::source::QuestionRequest;
use crate::settings::{Settings, Tier};
use crate::telemetry::{TelemetryBuffer, TelemetryPost};

/// Current phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Waiting for a difficulty selection
    Menu,
    /// 3..1 lead-in; enemies spawn and settle, input is not applied
    Countdown,
    /// Active combat
    Playing,
    /// Pass threshold met after the last question
    Victory,
    /// Health depleted, threshold missed, or quota exhausted
    GameOver,
}

impl RunPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Victory | RunPhase::GameOver)
    }

    /// Phases in which a question response may still be applied
    pub fn accepts_questions(&self) -> bool {
        matches!(self, RunPhase::Countdown | RunPhase::Playing)
    }
}

/// Identifies an asynchronous request by the run epoch and question index it
/// was issued under. Responses carrying a stale ticket are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket {
    pub epoch: u64,
    pub question_index: u32,
}

/// Arena dimensions and the derived sub-regions
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
}

impl Arena {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Region the enemy boxes must stay inside
    pub fn swarm_region(&self) -> Rect {
        Rect::new(
            Vec2::new(PLAYER_EDGE_MARGIN, 60.0),
            Vec2::new(self.width - PLAYER_EDGE_MARGIN, self.height * 0.5),
        )
    }

    pub fn player_y(&self) -> f32 {
        self.height - PLAYER_OFFSET_FROM_BOTTOM
    }

    /// Altitude at which cluster bombs burst
    pub fn cluster_trigger_y(&self) -> f32 {
        self.height * 0.45
    }

    /// Whether a projectile has left the arena (with a small margin)
    pub fn is_outside(&self, pos: Vec2) -> bool {
        const MARGIN: f32 = 20.0;
        pos.x < -MARGIN
            || pos.x > self.width + MARGIN
            || pos.y < -MARGIN
            || pos.y > self.height + MARGIN
    }
}

/// The player's ship
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub pos: Vec2,
    /// Shield held and energy available this frame
    pub shielding: bool,
}

impl Player {
    pub fn new(arena: &Arena) -> Self {
        Self {
            pos: Vec2::new(arena.width / 2.0, arena.player_y()),
            shielding: false,
        }
    }

    /// Move horizontally, clamped to the arena
    pub fn steer(&mut self, direction: f32, arena: &Arena) {
        self.pos.x = (self.pos.x + direction * PLAYER_SPEED)
            .clamp(PLAYER_EDGE_MARGIN, arena.width - PLAYER_EDGE_MARGIN);
    }
}

/// One answer option, drifting in the swarm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enemy {
    pub id: u32,
    /// Top-left corner
    pub pos: Vec2,
    pub vel: Vec2,
    pub width: f32,
    pub height: f32,
    /// Authoritative option text
    pub text: String,
    /// Text as displayed (distorted while the run is corrupted)
    pub label: String,
    pub is_correct: bool,
    pub active: bool,
}

impl Enemy {
    pub fn rect(&self) -> Rect {
        Rect::from_origin_size(self.pos, Vec2::new(self.width, self.height))
    }

    pub fn center(&self) -> Vec2 {
        self.pos + Vec2::new(self.width, self.height) * 0.5
    }

    /// Where bombs leave the enemy
    pub fn muzzle(&self) -> Vec2 {
        self.pos + Vec2::new(self.width * 0.5, self.height)
    }
}

/// Player-fired projectile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bullet {
    pub pos: Vec2,
    pub active: bool,
}

/// Enemy-fired projectile motion families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BombKind {
    /// Aimed once at spawn
    Straight,
    /// Weaves around its spawn column
    Sine,
    /// Steps toward the player's current column
    Tracking,
    /// Continuously re-aims; ignores the shield
    Piercing,
    /// Bursts into fragments at the trigger altitude
    Cluster,
    /// Ballistic shrapnel from a cluster burst
    ClusterFragment,
}

impl BombKind {
    /// Whether the shield absorbs this bomb
    pub fn shieldable(&self) -> bool {
        !matches!(self, BombKind::Piercing)
    }
}

/// Enemy-fired projectile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bomb {
    pub pos: Vec2,
    pub vel: Vec2,
    pub kind: BombKind,
    pub spawn_x: f32,
    pub spawn_y: f32,
    /// Frames since spawn
    pub age: u32,
    pub active: bool,
}

/// Visual-only particle kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParticleKind {
    Explosion,
    ShieldSpark,
}

/// A particle for visual effects (not gameplay-affecting)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub pos: Vec2,
    pub vel: Vec2,
    pub kind: ParticleKind,
    /// 0-1, decreases over time
    pub life: f32,
    pub size: f32,
}

/// Maximum particles
pub const MAX_PARTICLES: usize = 256;

/// Where the current question came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionOrigin {
    Remote,
    Procedural,
}

/// Notifications for the host, drained after each tick
#[derive(Debug, Clone)]
pub enum GameEvent {
    PhaseChanged { from: RunPhase, to: RunPhase },
    /// Host should call the question source and deliver the result
    QuestionRequested {
        ticket: Ticket,
        request: QuestionRequest,
    },
    QuestionReady {
        question_index: u32,
        origin: QuestionOrigin,
    },
    /// Host should post telemetry to the anomaly detector
    TelemetryRequested { epoch: u64, post: TelemetryPost },
    CorrectAnswer { points: u64 },
    WrongAnswer { damage: f32 },
    AmmoExhausted { question_index: u32 },
    ShieldBlock { kind: BombKind },
    PlayerHit { kind: BombKind, damage: f32 },
    Explosion { pos: Vec2 },
    /// Anomaly detected; run escalated to the hardest tier
    Escalated { reason: String },
    QuotaExhausted,
    /// Assessment run finished; fired once after the settle delay
    AssessmentComplete {
        passed: bool,
        score: u64,
        recommendation: Recommendation,
    },
}

/// Complete run state
#[derive(Debug, Clone)]
pub struct RunState {
    pub settings: Settings,
    pub arena: Arena,
    /// Effective tier (may be escalated above the selected one)
    pub tier: Tier,
    pub phase: RunPhase,
    /// Remaining countdown ticks (3..1)
    pub countdown: u32,
    /// Bumped on every reset; stale async results and timers carry old values
    pub epoch: u64,
    pub question_index: u32,
    pub correct_count: u32,
    pub score: u64,
    /// 0-100
    pub health: f32,
    pub ammo_remaining: u32,
    /// 0-100
    pub shield_energy: f32,
    pub player: Player,
    pub enemies: Vec<Enemy>,
    pub bullets: Vec<Bullet>,
    pub bombs: Vec<Bomb>,
    pub particles: Vec<Particle>,
    pub session: QuestionSession,
    pub telemetry: TelemetryBuffer,
    /// Anomaly escalation is active for the rest of the run
    pub corrupted: bool,
    /// Short-lived in-game message ("Wrong answer!")
    pub feedback: Option<String>,
    /// Terminal-state message
    pub message: Option<String>,
    pub completion_reported: bool,
    pub timers: Timers,
    /// Simulation frame counter
    pub time_ticks: u64,
    pub events: Vec<GameEvent>,
    pub rng: Pcg32,
    next_id: u32,
}

impl RunState {
    /// Create a run sitting on the menu
    pub fn new(settings: Settings, seed: u64) -> Self {
        let settings = settings.validate();
        let arena = Arena::new(settings.arena_width, settings.arena_height);
        Self {
            tier: settings.tier,
            arena,
            phase: RunPhase::Menu,
            countdown: 0,
            epoch: 0,
            question_index: 0,
            correct_count: 0,
            score: 0,
            health: MAX_HEALTH,
            ammo_remaining: settings.ammo_per_question,
            shield_energy: MAX_SHIELD_ENERGY,
            player: Player::new(&arena),
            enemies: Vec::new(),
            bullets: Vec::new(),
            bombs: Vec::new(),
            particles: Vec::new(),
            session: QuestionSession::default(),
            telemetry: TelemetryBuffer::default(),
            corrupted: false,
            feedback: None,
            message: None,
            completion_reported: false,
            timers: Timers::default(),
            time_ticks: 0,
            events: Vec::new(),
            rng: Pcg32::seed_from_u64(seed),
            next_id: 1,
            settings,
        }
    }

    /// Reserve `count` consecutive entity IDs, returning the first
    pub fn reserve_entity_ids(&mut self, count: u32) -> u32 {
        let first = self.next_id;
        self.next_id = self.next_id.wrapping_add(count);
        first
    }

    /// Change phase and notify the host
    pub fn set_phase(&mut self, to: RunPhase) {
        let from = self.phase;
        if from != to {
            log::info!("Phase {:?} -> {:?}", from, to);
            self.phase = to;
            self.events.push(GameEvent::PhaseChanged { from, to });
        }
    }

    /// Drop every transient entity
    pub fn clear_entities(&mut self) {
        self.enemies.clear();
        self.bullets.clear();
        self.bombs.clear();
        self.particles.clear();
    }

    pub fn bullets_in_flight(&self) -> usize {
        self.bullets.iter().filter(|b| b.active).count()
    }

    pub fn active_enemies(&self) -> impl Iterator<Item = &Enemy> {
        self.enemies.iter().filter(|e| e.active)
    }

    /// Take the pending host notifications
    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    /// Current ticket for the question being played
    pub fn ticket(&self) -> Ticket {
        Ticket {
            epoch: self.epoch,
            question_index: self.question_index,
        }
    }

    /// Emit a burst of explosion particles
    pub fn spawn_explosion(&mut self, pos: Vec2) {
        self.events.push(GameEvent::Explosion { pos });
        self.spawn_particles(pos, ParticleKind::Explosion, 12, 3.0);
    }

    /// Emit a small shower of shield sparks
    pub fn spawn_shield_spark(&mut self, pos: Vec2) {
        self.spawn_particles(pos, ParticleKind::ShieldSpark, 6, 2.0);
    }

    fn spawn_particles(&mut self, pos: Vec2, kind: ParticleKind, count: u32, speed: f32) {
        for j in 0..count {
            if self.particles.len() >= MAX_PARTICLES {
                break;
            }
            // Cheap hash spread; particles never feed back into gameplay
            let hash = (self.time_ticks as u32)
                .wrapping_mul(2654435761)
                .wrapping_add(j * 7919);
            let angle = (hash % 1000) as f32 / 1000.0 * std::f32::consts::TAU;
            let jitter = ((hash >> 10) % 1000) as f32 / 1000.0;
            self.particles.push(Particle {
                pos,
                vel: Vec2::new(angle.cos(), angle.sin()) * speed * (0.5 + jitter),
                kind,
                life: 1.0,
                size: 2.0 + jitter * 2.0,
            });
        }
    }

    /// Advance and expire particles
    pub fn update_particles(&mut self) {
        for particle in self.particles.iter_mut() {
            particle.pos += particle.vel;
            particle.vel *= 0.95;
            particle.life -= 1.0 / 30.0;
            particle.size *= 0.98;
        }
        self.particles.retain(|p| p.life > 0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_run_starts_on_menu() {
        let state = RunState::new(Settings::default(), 7);
        assert_eq!(state.phase, RunPhase::Menu);
        assert_eq!(state.health, MAX_HEALTH);
        assert_eq!(state.shield_energy, MAX_SHIELD_ENERGY);
        assert!(state.enemies.is_empty());
        assert_eq!(state.player.pos.y, state.arena.player_y());
    }

    #[test]
    fn test_swarm_region_fits_enemy_box() {
        let arena = Arena::new(ARENA_WIDTH, ARENA_HEIGHT);
        let region = arena.swarm_region();
        assert!(region.width() > ENEMY_WIDTH);
        assert!(region.height() > ENEMY_HEIGHT);
        // Enemies never drift down into the player's lane
        assert!(region.max.y < arena.player_y() - PLAYER_HIT_RADIUS);
    }

    #[test]
    fn test_player_steer_clamps() {
        let arena = Arena::new(ARENA_WIDTH, ARENA_HEIGHT);
        let mut player = Player::new(&arena);
        for _ in 0..500 {
            player.steer(-1.0, &arena);
        }
        assert_eq!(player.pos.x, PLAYER_EDGE_MARGIN);
        for _ in 0..500 {
            player.steer(1.0, &arena);
        }
        assert_eq!(player.pos.x, arena.width - PLAYER_EDGE_MARGIN);
    }

    #[test]
    fn test_only_piercing_ignores_shield() {
        assert!(BombKind::Straight.shieldable());
        assert!(BombKind::ClusterFragment.shieldable());
        assert!(!BombKind::Piercing.shieldable());
    }

    #[test]
    fn test_particles_are_capped() {
        let mut state = RunState::new(Settings::default(), 1);
        for _ in 0..100 {
            state.spawn_explosion(Vec2::new(100.0, 100.0));
        }
        assert_eq!(state.particles.len(), MAX_PARTICLES);
        for _ in 0..60 {
            state.update_particles();
        }
        assert!(state.particles.is_empty());
    }
}
