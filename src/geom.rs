//! Small 2D vector type for particle positions and velocities.
//!
//! Kept deliberately minimal: only the operations the stepper needs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn from_angle(theta: f32) -> Self {
        Self {
            x: theta.cos(),
            y: theta.sin(),
        }
    }

    #[inline]
    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    #[inline]
    pub fn angle(self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Unit vector in the same direction, or `None` for the zero vector.
    #[inline]
    pub fn normalized(self) -> Option<Vec2> {
        let len = self.length();
        if len > 0.0 {
            Some(Vec2::new(self.x / len, self.y / len))
        } else {
            None
        }
    }

    /// Rescale so the magnitude does not exceed `max`.
    #[inline]
    pub fn clamped_magnitude(self, max: f32) -> Vec2 {
        let len = self.length();
        if len > max && len > 0.0 {
            self.scaled(max / len)
        } else {
            self
        }
    }

    /// Rotate counterclockwise by `theta` radians.
    #[inline]
    pub fn rotated(self, theta: f32) -> Vec2 {
        let (s, c) = theta.sin_cos();
        Vec2::new(self.x * c - self.y * s, self.x * s + self.y * c)
    }

    #[inline]
    pub fn scaled(self, k: f32) -> Vec2 {
        Vec2::new(self.x * k, self.y * k)
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;

    #[inline]
    fn add(self, other: Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, other: Vec2) {
        self.x += other.x;
        self.y += other.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI, TAU};

    #[test]
    fn zero_vector_has_no_direction() {
        assert!(Vec2::ZERO.normalized().is_none());
    }

    #[test]
    fn normalize_preserves_direction() {
        let v = Vec2::new(3.0, 4.0);
        let n = v.normalized().unwrap();
        assert!((n.length() - 1.0).abs() < 1e-6);
        assert!((n.x - 0.6).abs() < 1e-6);
        assert!((n.y - 0.8).abs() < 1e-6);
    }

    #[test]
    fn clamp_magnitude_only_shrinks() {
        let v = Vec2::new(3.0, 4.0);
        assert!((v.clamped_magnitude(2.0).length() - 2.0).abs() < 1e-6);
        // Below the cap it is untouched.
        let w = Vec2::new(0.3, 0.4);
        assert_eq!(w.clamped_magnitude(2.0), w);
    }

    #[test]
    fn rotation_quarter_turn() {
        let v = Vec2::new(1.0, 0.0).rotated(FRAC_PI_2);
        assert!(v.x.abs() < 1e-6);
        assert!((v.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn angle_matches_from_angle() {
        // Compare along the shortest arc: atan2 can land on the other side
        // of the ±π branch cut (sin(-PI) is a tiny positive value in f32).
        for k in 0..8 {
            let theta = -PI + (k as f32) * 0.7;
            let v = Vec2::from_angle(theta);
            let d = (v.angle() - theta).rem_euclid(TAU);
            assert!(d.min(TAU - d) < 1e-5, "theta={theta} angle={}", v.angle());
        }
    }
}
