//! Projectile motion
//!
//! One motion rule per [`BombKind`], selected by an exhaustive match. All
//! units are pixels per frame; y grows downward.

use std::f32::consts::TAU;

use glam::Vec2;

use super::state::{Arena, Bomb, BombKind, Bullet};
use crate::consts::BULLET_SPEED;
use crate::direction_to;

pub const STRAIGHT_SPEED: f32 = 4.0;

pub const SINE_FALL: f32 = 2.5;
pub const SINE_AMPLITUDE: f32 = 60.0;
/// Radians per pixel fallen
pub const SINE_FREQUENCY: f32 = 0.03;

pub const TRACKING_FALL: f32 = 3.0;
/// Max horizontal correction per frame
pub const TRACKING_STEP: f32 = 1.5;

pub const PIERCING_ACCEL: f32 = 0.25;
pub const PIERCING_MAX_SPEED: f32 = 6.0;
pub const PIERCING_DECAY: f32 = 0.985;
pub const PIERCING_INITIAL_SPEED: f32 = 1.5;
/// After this many frames a piercing bomb stops re-aiming and coasts
pub const PIERCING_LOCK_FRAMES: u32 = 360;

pub const CLUSTER_FALL: f32 = 2.5;
pub const CLUSTER_FRAGMENTS: usize = 8;
pub const FRAGMENT_SPEED: f32 = 3.0;
pub const FRAGMENT_GRAVITY: f32 = 0.08;

/// Create a bullet at the player's muzzle
pub fn fire_bullet(origin: Vec2) -> Bullet {
    Bullet {
        pos: origin,
        active: true,
    }
}

/// Move a bullet up one frame; it expires past the top edge
pub fn advance_bullet(bullet: &mut Bullet) {
    if !bullet.active {
        return;
    }
    bullet.pos.y -= BULLET_SPEED;
    if bullet.pos.y < 0.0 {
        bullet.active = false;
    }
}

/// Create a bomb of `kind` at `origin`, aimed using the player's position at
/// spawn time where the kind needs it
pub fn spawn_bomb(kind: BombKind, origin: Vec2, player_pos: Vec2) -> Bomb {
    let vel = match kind {
        BombKind::Straight => {
            let dir = direction_to(origin, player_pos);
            // Degenerate aim falls straight down
            if dir == Vec2::ZERO {
                Vec2::new(0.0, STRAIGHT_SPEED)
            } else {
                dir * STRAIGHT_SPEED
            }
        }
        BombKind::Sine => Vec2::new(0.0, SINE_FALL),
        BombKind::Tracking => Vec2::new(0.0, TRACKING_FALL),
        BombKind::Piercing => direction_to(origin, player_pos) * PIERCING_INITIAL_SPEED,
        BombKind::Cluster => Vec2::new(0.0, CLUSTER_FALL),
        BombKind::ClusterFragment => Vec2::new(0.0, FRAGMENT_SPEED),
    };
    Bomb {
        pos: origin,
        vel,
        kind,
        spawn_x: origin.x,
        spawn_y: origin.y,
        age: 0,
        active: true,
    }
}

/// Uniform radial burst of fragments around `center`
pub fn cluster_burst(center: Vec2) -> Vec<Bomb> {
    (0..CLUSTER_FRAGMENTS)
        .map(|i| {
            let angle = i as f32 * TAU / CLUSTER_FRAGMENTS as f32;
            let mut fragment = spawn_bomb(BombKind::ClusterFragment, center, center);
            fragment.vel = Vec2::new(angle.cos(), angle.sin()) * FRAGMENT_SPEED;
            fragment
        })
        .collect()
}

/// Advance a bomb by one frame. Returns the fragments produced when a cluster
/// bomb crosses its trigger altitude (the cluster itself deactivates).
pub fn advance_bomb(bomb: &mut Bomb, player_pos: Vec2, arena: &Arena) -> Vec<Bomb> {
    if !bomb.active {
        return Vec::new();
    }
    bomb.age = bomb.age.saturating_add(1);
    let mut spawned = Vec::new();

    match bomb.kind {
        BombKind::Straight => {
            bomb.pos += bomb.vel;
        }
        BombKind::Sine => {
            bomb.pos.y += SINE_FALL;
            let fallen = bomb.pos.y - bomb.spawn_y;
            let x = bomb.spawn_x + SINE_AMPLITUDE * (fallen * SINE_FREQUENCY).sin();
            bomb.vel = Vec2::new(x - bomb.pos.x, SINE_FALL);
            bomb.pos.x = x;
        }
        BombKind::Tracking => {
            bomb.pos.y += TRACKING_FALL;
            let dx = (player_pos.x - bomb.pos.x).clamp(-TRACKING_STEP, TRACKING_STEP);
            bomb.pos.x += dx;
            bomb.vel = Vec2::new(dx, TRACKING_FALL);
        }
        BombKind::Piercing => {
            if bomb.age <= PIERCING_LOCK_FRAMES {
                let to_player = player_pos - bomb.pos;
                let angle = to_player.y.atan2(to_player.x);
                bomb.vel += Vec2::new(angle.cos(), angle.sin()) * PIERCING_ACCEL;
                bomb.vel = bomb.vel.clamp_length_max(PIERCING_MAX_SPEED);
                bomb.vel *= PIERCING_DECAY;
            }
            bomb.pos += bomb.vel;
        }
        BombKind::Cluster => {
            bomb.pos.y += CLUSTER_FALL;
            if bomb.pos.y >= arena.cluster_trigger_y() {
                bomb.active = false;
                spawned = cluster_burst(bomb.pos);
            }
        }
        BombKind::ClusterFragment => {
            bomb.vel.y += FRAGMENT_GRAVITY;
            bomb.pos += bomb.vel;
        }
    }

    if !bomb.pos.is_finite() || arena.is_outside(bomb.pos) {
        bomb.active = false;
    }

    spawned
}
