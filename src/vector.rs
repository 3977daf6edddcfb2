//! Shared 2D vector type and angle helpers.
//!
//! A thin wrapper over `nalgebra`'s `Vector2<f64>` so the rest of the crate
//! doesn't need to know which math crate backs it.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

pub type Vector = Vector2<f64>;

pub fn vector(x: f64, y: f64) -> Vector {
    Vector2::new(x, y)
}

/// Plain `{x, y}` used on the wire, distinct from the `nalgebra` type used
/// internally for arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_vector(self) -> Vector {
        vector(self.x, self.y)
    }

    pub fn from_vector(v: Vector) -> Self {
        Self { x: v.x, y: v.y }
    }
}

/// Wraps an angle to `(-π, π]`, matching `World::set_angle`'s contract.
pub fn wrap_angle(theta: f64) -> f64 {
    let two_pi = std::f64::consts::TAU;
    let mut wrapped = (theta + std::f64::consts::PI) % two_pi;
    if wrapped <= 0.0 {
        wrapped += two_pi;
    }
    wrapped - std::f64::consts::PI
}

/// Shortest-arc difference `a - b`, wrapped to `(-π, π]`.
pub fn shortest_arc_diff(a: f64, b: f64) -> f64 {
    wrap_angle(a - b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_angle_identity_inside_range() {
        assert!((wrap_angle(0.5) - 0.5).abs() < 1e-12);
        assert!((wrap_angle(std::f64::consts::PI) - std::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn wrap_angle_handles_overflow() {
        let two_pi = std::f64::consts::TAU;
        assert!((wrap_angle(two_pi + 0.1) - 0.1).abs() < 1e-9);
        assert!((wrap_angle(-two_pi - 0.1) + 0.1).abs() < 1e-9);
    }

    #[test]
    fn wrap_angle_never_returns_negative_pi() {
        // (-π, π] is the target range, so -π itself must map to π.
        assert!((wrap_angle(-std::f64::consts::PI) - std::f64::consts::PI).abs() < 1e-9);
    }

    #[test]
    fn shortest_arc_diff_wraps_across_boundary() {
        let diff = shortest_arc_diff(-3.1, 3.1);
        assert!(diff.abs() < 0.3, "expected short wraparound, got {diff}");
    }
}
