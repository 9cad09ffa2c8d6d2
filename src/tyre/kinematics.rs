// ==============================================================================
// kinematics.rs — WHEEL BASIS + BODY ROLL (WORLD SPACE)
// ------------------------------------------------------------------------------
// wheel_basis(...):
// - Starts with chassis forward (rotation * +Z)
// - Rotates it about chassis up by the wheel's steer angle (handle + toe)
// - right = forward × up  (+Z forward, +Y up -> -X right)
//
// roll_angle_deg(...):
// - forward_on_ground = chassis forward flattened onto the world XZ plane
// - chassis up projected on the plane orthogonal to forward_on_ground
// - signed angle from world up, about forward_on_ground. Positive = leaning
//   right.
//
// Steer sign: a positive angle turns the wheel LEFT (right-hand rotation about
// +Y takes +Z toward +X).
// ==============================================================================

use nalgebra::{Unit, UnitQuaternion};

use crate::tyre::state::WheelState;
use crate::tyre::types::{
    normalize_or_zero, project_on_plane, right_of, safe_normalize, signed_angle_deg, Vec3, WORLD_UP,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelBasis {
    pub forward: Vec3,
    pub right: Vec3,
}

/// Steer angle (deg) seen by one wheel.
#[inline]
pub fn wheel_steer_deg(wheel: &WheelState, handle_angle: f32) -> f32 {
    if wheel.steered { handle_angle + wheel.toe_deg } else { wheel.toe_deg }
}

pub fn wheel_basis(chassis_rot: &UnitQuaternion<f32>, steer_deg: f32) -> WheelBasis {
    let up = chassis_rot * Vec3::y();
    let chassis_fwd = chassis_rot * Vec3::z();

    let forward = if steer_deg == 0.0 {
        chassis_fwd
    } else {
        let steer = UnitQuaternion::from_axis_angle(&Unit::new_normalize(up), steer_deg.to_radians());
        steer * chassis_fwd
    };

    WheelBasis {
        forward,
        right: normalize_or_zero(right_of(forward, up)),
    }
}

/// Chassis forward flattened onto the ground plane. Zero when pointing straight up/down.
#[inline]
pub fn forward_on_ground(chassis_forward: Vec3) -> Vec3 {
    normalize_or_zero(project_on_plane(chassis_forward, WORLD_UP))
}

/// Signed roll in degrees. Positive = leaning right.
pub fn roll_angle_deg(chassis_up: Vec3, chassis_forward: Vec3) -> f32 {
    let Some(fwd_ground) = safe_normalize(project_on_plane(chassis_forward, WORLD_UP)) else {
        return 0.0;
    };
    let Some(side) = safe_normalize(project_on_plane(chassis_up, fwd_ground)) else {
        return 0.0;
    };
    signed_angle_deg(WORLD_UP, side, fwd_ground)
}
