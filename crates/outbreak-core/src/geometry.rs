use serde::{Deserialize, Serialize};

/// World width in map units.
pub const WORLD_WIDTH: f32 = 800.0;
/// World height in map units.
pub const WORLD_HEIGHT: f32 = 600.0;

/// A position on the city map.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    pub fn distance(self, other: Point) -> f32 {
        self.distance_sq(other).sqrt()
    }

    /// True when `other` lies within `radius` (inclusive).
    pub fn within(self, other: Point, radius: f32) -> bool {
        self.distance_sq(other) <= radius * radius
    }

    /// Linear interpolation towards `other`; `t = 0` is `self`, `t = 1` is `other`.
    pub fn lerp(self, other: Point, t: f32) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Clamp into the world rectangle, keeping `margin` units from every edge.
    pub fn clamp_to_world(self, margin: f32) -> Point {
        Point {
            x: self.x.clamp(margin, WORLD_WIDTH - margin),
            y: self.y.clamp(margin, WORLD_HEIGHT - margin),
        }
    }
}

/// Unit vector for a heading, rotated by `angle` radians.
pub fn rotate(dir: (f32, f32), angle: f32) -> (f32, f32) {
    let (sin, cos) = angle.sin_cos();
    (dir.0 * cos - dir.1 * sin, dir.0 * sin + dir.1 * cos)
}
