//! Answer-target swarm physics
//!
//! Every active enemy gets a small random kick, an inverse-distance pull
//! toward every other enemy, and an inverse-square push from any enemy closer
//! than [`REPULSION_RADIUS`]. Beyond that radius the pull wins, inside it the
//! push wins, so the options stay grouped but never stack on top of each
//! other. Velocities are damped, floored, capped, and the boxes bounce off the
//! swarm region walls.

use glam::Vec2;
use rand::Rng;

use super::collision::Rect;
use super::state::Enemy;
use crate::consts::{ENEMY_HEIGHT, ENEMY_WIDTH};
use crate::settings::Tier;

pub const DAMPING: f32 = 0.99;
pub const ATTRACTION: f32 = 2.0;
pub const REPULSION: f32 = 400.0;
pub const REPULSION_RADIUS: f32 = 160.0;
/// Below this speed an enemy gets a fresh random heading
pub const MIN_SPEED: f32 = 0.3;

/// Swarm tuning for one tier
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwarmParams {
    pub entropy: f32,
    pub base_speed: f32,
    pub max_speed: f32,
}

impl SwarmParams {
    pub fn for_tier(tier: Tier) -> Self {
        let params = tier.params();
        Self {
            entropy: params.entropy,
            base_speed: params.base_speed,
            max_speed: params.max_speed,
        }
    }
}

fn random_heading<R: Rng>(rng: &mut R, speed: f32) -> Vec2 {
    let angle = rng.random_range(0.0..std::f32::consts::TAU);
    Vec2::new(angle.cos(), angle.sin()) * speed
}

/// Lay out one enemy per option across the region in evenly spaced columns
/// with a random height and heading
pub fn spawn_enemies<R: Rng>(
    options: &[String],
    correct_index: usize,
    region: Rect,
    params: &SwarmParams,
    rng: &mut R,
    first_id: u32,
) -> Vec<Enemy> {
    let count = options.len().max(1) as f32;
    let slot = region.width() / count;
    let max_x = region.max.x - ENEMY_WIDTH;
    let max_y = (region.max.y - ENEMY_HEIGHT).max(region.min.y);

    options
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let x = (region.min.x + (i as f32 + 0.5) * slot - ENEMY_WIDTH / 2.0)
                .clamp(region.min.x, max_x);
            let y = if max_y > region.min.y {
                rng.random_range(region.min.y..max_y)
            } else {
                region.min.y
            };
            Enemy {
                id: first_id.wrapping_add(i as u32),
                pos: Vec2::new(x, y),
                vel: random_heading(rng, params.base_speed),
                width: ENEMY_WIDTH,
                height: ENEMY_HEIGHT,
                text: text.clone(),
                label: text.clone(),
                is_correct: i == correct_index,
                active: true,
            }
        })
        .collect()
}

/// Pairwise force on `a` from `b` (centers)
fn pair_force(a: Vec2, b: Vec2) -> Vec2 {
    let delta = b - a;
    let dist = delta.length().max(1.0);
    let dir = if delta == Vec2::ZERO {
        // Coincident centers: push apart along x
        Vec2::X
    } else {
        delta / dist
    };
    let mut magnitude = ATTRACTION / dist;
    if dist < REPULSION_RADIUS {
        magnitude -= REPULSION / (dist * dist);
    }
    dir * magnitude
}

/// Advance the swarm by one frame
///
/// Forces come from a snapshot of the centers taken before any enemy moves,
/// so the result does not depend on iteration order.
pub fn step<R: Rng>(enemies: &mut [Enemy], region: Rect, params: &SwarmParams, rng: &mut R) {
    let centers: Vec<Option<Vec2>> = enemies
        .iter()
        .map(|e| e.active.then(|| e.center()))
        .collect();

    for (i, enemy) in enemies.iter_mut().enumerate() {
        let Some(center) = centers[i] else {
            continue;
        };

        let kick = Vec2::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0));
        enemy.vel += kick * params.entropy;

        for (j, other) in centers.iter().enumerate() {
            if i == j {
                continue;
            }
            if let Some(other) = other {
                let force = pair_force(center, *other);
                // Coincident pairs push in opposite directions
                enemy.vel += if *other == center && j < i { -force } else { force };
            }
        }

        enemy.vel *= DAMPING;

        let speed = enemy.vel.length();
        if !speed.is_finite() || speed < MIN_SPEED {
            enemy.vel = random_heading(rng, params.base_speed);
        } else if speed > params.max_speed {
            enemy.vel = enemy.vel / speed * params.max_speed;
        }
    }

    for enemy in enemies.iter_mut().filter(|e| e.active) {
        enemy.pos += enemy.vel;
        bounce(enemy, region);
    }
}

/// Keep the whole box inside `region`, reflecting velocity on contact
fn bounce(enemy: &mut Enemy, region: Rect) {
    let max_x = (region.max.x - enemy.width).max(region.min.x);
    let max_y = (region.max.y - enemy.height).max(region.min.y);

    if !enemy.pos.is_finite() {
        enemy.pos = Vec2::new(region.min.x, region.min.y);
    }

    if enemy.pos.x < region.min.x {
        enemy.pos.x = region.min.x;
        enemy.vel.x = enemy.vel.x.abs();
    } else if enemy.pos.x > max_x {
        enemy.pos.x = max_x;
        enemy.vel.x = -enemy.vel.x.abs();
    }

    if enemy.pos.y < region.min.y {
        enemy.pos.y = region.min.y;
        enemy.vel.y = enemy.vel.y.abs();
    } else if enemy.pos.y > max_y {
        enemy.pos.y = max_y;
        enemy.vel.y = -enemy.vel.y.abs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{ARENA_HEIGHT, ARENA_WIDTH};
    use crate::sim::state::Arena;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn options(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("option {i}")).collect()
    }

    fn swarm(seed: u64, tier: Tier) -> (Vec<Enemy>, Rect, SwarmParams, Pcg32) {
        let region = Arena::new(ARENA_WIDTH, ARENA_HEIGHT).swarm_region();
        let params = SwarmParams::for_tier(tier);
        let mut rng = Pcg32::seed_from_u64(seed);
        let enemies = spawn_enemies(&options(4), 2, region, &params, &mut rng, 1);
        (enemies, region, params, rng)
    }

    #[test]
    fn test_spawn_marks_exactly_one_correct() {
        let (enemies, region, _, _) = swarm(3, Tier::Easy);
        assert_eq!(enemies.len(), 4);
        assert_eq!(enemies.iter().filter(|e| e.is_correct).count(), 1);
        assert!(enemies[2].is_correct);
        for enemy in &enemies {
            assert!(region.contains_rect(&enemy.rect()));
        }
    }

    #[test]
    fn test_close_pair_repels_far_pair_attracts() {
        let near = pair_force(Vec2::ZERO, Vec2::new(50.0, 0.0));
        assert!(near.x < 0.0);
        let far = pair_force(Vec2::ZERO, Vec2::new(300.0, 0.0));
        assert!(far.x > 0.0);
    }

    #[test]
    fn test_speed_cap_and_floor() {
        let (mut enemies, region, params, mut rng) = swarm(9, Tier::Medium);
        enemies[0].vel = Vec2::new(100.0, 0.0);
        enemies[1].vel = Vec2::ZERO;
        step(&mut enemies, region, &params, &mut rng);
        for enemy in &enemies {
            let speed = enemy.vel.length();
            assert!(speed <= params.max_speed + 1e-3);
            assert!(speed >= MIN_SPEED * 0.99 || speed >= params.base_speed * 0.99);
        }
    }

    #[test]
    fn test_inactive_enemies_are_frozen() {
        let (mut enemies, region, params, mut rng) = swarm(5, Tier::Hard);
        enemies[3].active = false;
        let frozen = enemies[3].pos;
        for _ in 0..50 {
            step(&mut enemies, region, &params, &mut rng);
        }
        assert_eq!(enemies[3].pos, frozen);
    }

    #[test]
    fn test_stacked_enemies_separate() {
        let (mut enemies, region, params, mut rng) = swarm(11, Tier::Easy);
        let stack = region.center();
        for enemy in enemies.iter_mut() {
            enemy.pos = stack;
        }
        for _ in 0..300 {
            step(&mut enemies, region, &params, &mut rng);
        }
        let a = enemies[0].center();
        assert!(enemies[1..].iter().any(|e| e.center().distance(a) > 10.0));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn prop_swarm_stays_in_bounds(seed in any::<u64>(), tier_index in 0u8..4) {
            let (mut enemies, region, params, mut rng) = swarm(seed, Tier::from_index(tier_index));
            for _ in 0..10_000 {
                step(&mut enemies, region, &params, &mut rng);
                for enemy in &enemies {
                    prop_assert!(region.contains_rect(&enemy.rect()));
                    prop_assert!(enemy.vel.length() <= params.max_speed + 1e-3);
                }
            }
        }
    }
}
