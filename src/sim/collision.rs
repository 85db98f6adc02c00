//! Collision primitives
//!
//! Answer targets are axis-aligned boxes; the player is a pair of circles
//! (hit radius and shield radius). That is all the geometry the resolver needs.

use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_origin_size(origin: Vec2, size: Vec2) -> Self {
        Self {
            min: origin,
            max: origin + size,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Inclusive point containment
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    /// Whether `inner` lies entirely inside this rectangle
    pub fn contains_rect(&self, inner: &Rect) -> bool {
        inner.min.x >= self.min.x
            && inner.min.y >= self.min.y
            && inner.max.x <= self.max.x
            && inner.max.y <= self.max.y
    }
}

/// Circle test used for bomb-vs-player and bomb-vs-shield
#[inline]
pub fn within_radius(a: Vec2, b: Vec2, radius: f32) -> bool {
    a.distance_squared(b) <= radius * radius
}
