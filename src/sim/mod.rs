//! Frame-driven simulation module
//!
//! All gameplay logic lives here:
//! - One `tick` per 60 Hz frame; velocities are px/frame
//! - Seeded RNG only
//! - No I/O; collaborator calls leave as `GameEvent`s and come back through
//!   the epoch-guarded `deliver_*` entry points

pub mod collision;
pub mod combat;
pub mod kinematics;
pub mod state;
pub mod swarm;
pub mod tick;
pub mod timers;

pub use collision::{Rect, within_radius};
pub use state::{
    Arena, Bomb, BombKind, Bullet, Enemy, GameEvent, Particle, ParticleKind, Player,
    QuestionOrigin, RunPhase, RunState, Ticket, MAX_PARTICLES,
};
pub use tick::{TickInput, finish_run, return_to_menu, start_run, tick};
pub use timers::{TimerKind, Timers};
