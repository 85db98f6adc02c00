//! Quizfire - a quiz-driven bullet-hell combat engine
//!
//! Core modules:
//! - `sim`: Frame-driven simulation (swarm physics, projectiles, combat, run state machine)
//! - `quiz`: Question model, sources, procedural fallback, session lifecycle
//! - `telemetry`: Input timing ring buffer and anomaly escalation
//! - `assessment`: Completion callbacks and post-run recommendation
//! - `driver`: Host loop that dispatches collaborator requests
//! - `settings`: Run configuration and difficulty tiers

pub mod assessment;
pub mod driver;
pub mod quiz;
pub mod settings;
pub mod sim;
pub mod telemetry;

pub use driver::Driver;
pub use settings::{RunMode, Settings, Tier};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Frames per second the simulation is tuned for
    pub const FRAME_RATE: u32 = 60;
    /// Real-time length of one frame
    pub const FRAME_DT: f32 = 1.0 / FRAME_RATE as f32;
    /// Maximum ticks per host update to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Default arena dimensions (y grows downward)
    pub const ARENA_WIDTH: f32 = 800.0;
    pub const ARENA_HEIGHT: f32 = 600.0;

    /// Player ship
    pub const PLAYER_OFFSET_FROM_BOTTOM: f32 = 50.0;
    pub const PLAYER_SPEED: f32 = 7.0;
    pub const PLAYER_EDGE_MARGIN: f32 = 20.0;
    pub const PLAYER_HIT_RADIUS: f32 = 20.0;
    pub const SHIELD_RADIUS: f32 = 60.0;
    pub const MAX_HEALTH: f32 = 100.0;
    pub const MAX_SHIELD_ENERGY: f32 = 100.0;
    /// Shield energy drained per frame while held
    pub const SHIELD_DRAIN: f32 = 0.6;
    /// Shield energy regenerated per frame while released
    pub const SHIELD_REGEN: f32 = 0.25;

    /// Enemy (answer target) box
    pub const ENEMY_WIDTH: f32 = 140.0;
    pub const ENEMY_HEIGHT: f32 = 40.0;

    /// Player bullets travel straight up
    pub const BULLET_SPEED: f32 = 10.0;

    /// Scoring
    pub const BASE_POINTS: u64 = 250;
    pub const WRONG_HIT_PENALTY: u64 = 50;
    pub const AMMO_EXHAUSTION_PENALTY: u64 = 100;

    /// Damage
    pub const WRONG_HIT_DAMAGE: f32 = 20.0;
    pub const AMMO_EXHAUSTION_DAMAGE: f32 = 25.0;
    pub const PIERCING_DAMAGE: f32 = 50.0;

    /// Timers, in frames
    pub const COUNTDOWN_START: u32 = 3;
    pub const COUNTDOWN_STEP_FRAMES: u32 = FRAME_RATE;
    pub const AUTO_RESTART_FRAMES: u32 = 3 * FRAME_RATE;
    pub const ASSESSMENT_REPORT_FRAMES: u32 = FRAME_RATE * 3 / 2;
    pub const FEEDBACK_FRAMES: u32 = FRAME_RATE * 3 / 2;
    pub const AMMO_GRACE_FRAMES: u32 = FRAME_RATE * 3 / 4;
}

/// Euclidean distance between two points
#[inline]
pub fn distance(a: Vec2, b: Vec2) -> f32 {
    (a - b).length()
}

/// Unit vector from `from` toward `to`, or zero when they coincide
#[inline]
pub fn direction_to(from: Vec2, to: Vec2) -> Vec2 {
    (to - from).normalize_or_zero()
}
