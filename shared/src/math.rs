//! Vector and kinematics helpers shared by the simulator and combat code

use serde::{Deserialize, Serialize};

/// Represents a vector in 2D screen space (y grows downwards).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    pub x: f32,
    pub y: f32,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Vector2 { x, y }
    }

    /// Unit vector pointing along `angle` (radians), scaled by `length`.
    pub fn from_angle(angle: f32, length: f32) -> Self {
        Vector2 {
            x: angle.cos() * length,
            y: angle.sin() * length,
        }
    }

    ///Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    ///Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vector2 {
        Vector2 {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }

    ///Returns the sum of two vectors.
    pub fn add(&self, other: &Vector2) -> Vector2 {
        Vector2 {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    pub fn distance_to(&self, other: &Vector2) -> f32 {
        distance(self.x, self.y, other.x, other.y)
    }

    pub fn angle_to(&self, other: &Vector2) -> f32 {
        angle_to(self.x, self.y, other.x, other.y)
    }
}

/// Angle in radians from `(from_x, from_y)` towards `(to_x, to_y)`.
pub fn angle_to(from_x: f32, from_y: f32, to_x: f32, to_y: f32) -> f32 {
    (to_y - from_y).atan2(to_x - from_x)
}

pub fn distance(ax: f32, ay: f32, bx: f32, by: f32) -> f32 {
    let dx = bx - ax;
    let dy = by - ay;
    (dx * dx + dy * dy).sqrt()
}

/// Clamps each velocity axis to `[-max, max]`.
pub fn clamp_velocity(velocity: Vector2, max: f32) -> Vector2 {
    Vector2 {
        x: velocity.x.clamp(-max, max),
        y: velocity.y.clamp(-max, max),
    }
}

/// Applies one frame of friction damping.
pub fn damp(velocity: Vector2, friction: f32) -> Vector2 {
    velocity.scale(friction)
}

/// Advances `position` by one frame of `velocity`.
pub fn integrate(position: Vector2, velocity: Vector2) -> Vector2 {
    position.add(&velocity)
}

/// Displacement that moves `a` away from `b` by half of their overlap.
///
/// Returns `None` when the two points are at least `min_distance` apart.
/// The caller moves `a` by the result and `b` by its negation. Coincident
/// points separate along +x so the push is never NaN.
pub fn separation(a: Vector2, b: Vector2, min_distance: f32) -> Option<Vector2> {
    let dist = a.distance_to(&b);
    if dist >= min_distance {
        return None;
    }

    let overlap = min_distance - dist;
    let angle = if dist < 0.001 { 0.0 } else { b.angle_to(&a) };
    Some(Vector2::from_angle(angle, overlap / 2.0))
}
