//! Core shared types for `tyre` (engine-agnostic).
// tyre/types.rs
use std::fmt;

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

pub type Vec3 = Vector3<f32>;
pub type Pos3 = Point3<f32>;

/// World up. Local frame convention: +Z forward, +Y up, -X right.
pub const WORLD_UP: Vec3 = Vec3::new(0.0, 1.0, 0.0);
pub const GRAVITY: f32 = 9.81;

const EPS: f32 = 1e-6;

// ----- small vector helpers shared by the solver stages -----

#[inline]
pub fn safe_normalize(v: Vec3) -> Option<Vec3> {
    let m = v.norm();
    if m > EPS && m.is_finite() { Some(v / m) } else { None }
}

#[inline]
pub fn normalize_or_zero(v: Vec3) -> Vec3 {
    safe_normalize(v).unwrap_or_else(Vec3::zeros)
}

/// Remove the component of `v` along the (unit) `normal`.
#[inline]
pub fn project_on_plane(v: Vec3, normal: Vec3) -> Vec3 {
    v - normal * normal.dot(&v)
}

/// Unsigned angle between two vectors in degrees.
pub fn angle_deg(from: Vec3, to: Vec3) -> f32 {
    let (Some(a), Some(b)) = (safe_normalize(from), safe_normalize(to)) else {
        return 0.0;
    };
    a.dot(&b).clamp(-1.0, 1.0).acos().to_degrees()
}

/// Signed angle in degrees from `from` to `to`, sign taken around `axis`
/// (right-hand rule).
pub fn signed_angle_deg(from: Vec3, to: Vec3, axis: Vec3) -> f32 {
    let unsigned = angle_deg(from, to);
    let cross = from.cross(&to);
    if axis.dot(&cross) < 0.0 { -unsigned } else { unsigned }
}

/// Right vector for a forward/up pair (+Z forward, +Y up -> -X right).
#[inline]
pub fn right_of(forward: Vec3, up: Vec3) -> Vec3 {
    forward.cross(&up)
}

#[inline]
pub fn finite_or_zero(v: Vec3) -> Vec3 {
    if v.iter().all(|c| c.is_finite()) { v } else { Vec3::zeros() }
}

#[inline]
pub fn finite_scalar(x: f32) -> f32 {
    if x.is_finite() { x } else { 0.0 }
}

#[inline]
pub fn sigmoid(gain: f32, x: f32) -> f32 {
    1.0 / (1.0 + (-gain * x).exp())
}

/// Linear interpolation without clamping (extrapolates outside `start..end`).
#[inline]
pub fn lerp_unclamped(now: f32, start: f32, end: f32, start_val: f32, end_val: f32) -> f32 {
    let t = (now - start) / (end - start);
    t * (end_val - start_val) + start_val
}

/// Linear interpolation, clamped to the end values.
#[inline]
pub fn lerp_clamped(now: f32, start: f32, end: f32, start_val: f32, end_val: f32) -> f32 {
    if now < start { return start_val; }
    if now > end { return end_val; }
    lerp_unclamped(now, start, end, start_val, end_val)
}

/// Step `current` toward `target` by at most `max_delta`.
#[inline]
pub fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else {
        current + (target - current).signum() * max_delta
    }
}

#[inline]
pub fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

// ============================================
// Wheel identification
// ============================================

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum WheelId {
    /// Bike front / rear.
    F,
    R,
    FL,
    FR,
    RL,
    RR,
}

impl WheelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            WheelId::F => "F",
            WheelId::R => "R",
            WheelId::FL => "FL",
            WheelId::FR => "FR",
            WheelId::RL => "RL",
            WheelId::RR => "RR",
        }
    }

    pub fn is_front(&self) -> bool {
        matches!(self, WheelId::F | WheelId::FL | WheelId::FR)
    }

    pub fn is_rear(&self) -> bool {
        !self.is_front()
    }

    /// Mirror sign used for toe: left wheels +1, right wheels -1, bike 0.
    pub fn side_sign(&self) -> f32 {
        match self {
            WheelId::FL | WheelId::RL => 1.0,
            WheelId::FR | WheelId::RR => -1.0,
            WheelId::F | WheelId::R => 0.0,
        }
    }
}

impl fmt::Display for WheelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn signed_angle_follows_right_hand_rule() {
        let fwd = Vec3::z();
        // Up tipped toward -X (right) rolls positive around +Z.
        let tipped = Vec3::new(-0.5, 1.0, 0.0);
        assert!(signed_angle_deg(WORLD_UP, tipped, fwd) > 0.0);
        let tipped_left = Vec3::new(0.5, 1.0, 0.0);
        assert!(signed_angle_deg(WORLD_UP, tipped_left, fwd) < 0.0);
        assert_abs_diff_eq!(signed_angle_deg(WORLD_UP, Vec3::new(-1.0, 1.0, 0.0), fwd), 45.0, epsilon = 1e-3);
    }

    #[test]
    fn right_of_forward_is_minus_x() {
        assert_abs_diff_eq!(right_of(Vec3::z(), WORLD_UP), -Vec3::x(), epsilon = 1e-6);
    }

    #[test]
    fn move_towards_never_overshoots() {
        assert_eq!(move_towards(0.0, 1.0, 0.3), 0.3);
        assert_eq!(move_towards(0.9, 1.0, 0.3), 1.0);
        assert_eq!(move_towards(0.0, -1.0, 0.3), -0.3);
    }

    #[test]
    fn zero_vector_does_not_normalize() {
        assert!(safe_normalize(Vec3::zeros()).is_none());
        assert_eq!(angle_deg(Vec3::zeros(), Vec3::y()), 0.0);
    }

    #[test]
    fn non_finite_vectors_collapse_to_zero() {
        assert_eq!(finite_or_zero(Vec3::new(f32::NAN, 1.0, 0.0)), Vec3::zeros());
        assert_eq!(finite_scalar(f32::INFINITY), 0.0);
    }
}
