// ==============================================================================
// stabilizer.rs — PID LEAN STABILIZER (ROLL ONLY)
// ------------------------------------------------------------------------------
// Drives the chassis roll toward the player's target lean. Pitch is left alone.
//
//   target  = target_lean * min(1, v / v_low)            (fade near standstill)
//           + centrifugal offset                          (optional)
//   error   = target - roll
//   ∫       = clamp(∫ + error dt, ±integral_max)
//   d/dt    = (error - prev) / dt                         (0 when dt == 0)
//   torque  = forward_on_ground * (Kp e + Ki ∫ + Kd d/dt) * torque_scale
//
// Centrifugal offset: the "felt" up is tilted into the turn by
// a = v * yaw_rate * gain, blended with world up by an influence that ramps
// between two speeds, and the signed angle of the blend is added to target.
//
// Nothing is applied while every wheel is airborne.
// ==============================================================================

use serde::Serialize;

use crate::config::StabilizerConfig;
use crate::tyre::kinematics::{forward_on_ground, roll_angle_deg};
use crate::tyre::state::StabilizerState;
use crate::tyre::types::{
    clamp01, finite_or_zero, finite_scalar, right_of, safe_normalize, signed_angle_deg, Vec3, GRAVITY,
    WORLD_UP,
};

#[derive(Debug, Clone, Copy)]
pub struct StabilizerInputs {
    pub chassis_up: Vec3,
    pub chassis_forward: Vec3,
    pub angular_velocity: Vec3,
    pub speed: f32,
    pub any_wheel_grounded: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StabilizerTelemetry {
    pub roll_deg: f32,
    pub target_deg: f32,
    pub centrifugal_offset_deg: f32,
    pub error: f32,
    pub integral: f32,
    pub derivative: f32,
    pub output: f32,
}

#[derive(Debug, Clone, Copy)]
pub struct StabilizerOutput {
    pub torque: Vec3,
    pub telemetry: StabilizerTelemetry,
}

#[derive(Debug, Clone, Copy)]
pub struct LeanStabilizer {
    pub config: StabilizerConfig,
}

impl LeanStabilizer {
    pub fn new(config: StabilizerConfig) -> Self {
        Self { config }
    }

    /// Roll offset (deg) the centrifugal target adds at this speed and yaw rate.
    pub fn centrifugal_offset(&self, forward_ground: Vec3, angular_velocity: Vec3, speed: f32) -> f32 {
        let c = &self.config.centrifugal;
        if !c.enabled || speed <= c.min_speed {
            return 0.0;
        }

        let yaw_rate = angular_velocity.dot(&WORLD_UP);
        let lateral_accel = speed * yaw_rate * c.gain;
        let left = -right_of(forward_ground, WORLD_UP);

        let Some(centrifugal_up) = safe_normalize(WORLD_UP * GRAVITY + left * lateral_accel) else {
            return 0.0;
        };

        let span = c.influence_full_speed - c.influence_start_speed;
        let ramp = if span > 0.0 {
            clamp01((speed - c.influence_start_speed) / span)
        } else if speed >= c.influence_full_speed {
            1.0
        } else {
            0.0
        };
        let influence = ramp * c.max_influence;

        let Some(blended) = safe_normalize(WORLD_UP.lerp(&centrifugal_up, influence)) else {
            return 0.0;
        };
        signed_angle_deg(WORLD_UP, blended, forward_ground)
    }

    pub fn update(
        &self,
        state: &mut StabilizerState,
        inputs: StabilizerInputs,
        dt: f32,
    ) -> Option<StabilizerOutput> {
        if !inputs.any_wheel_grounded {
            return None;
        }
        let cfg = &self.config;

        let fwd_ground = forward_on_ground(inputs.chassis_forward);
        let roll = roll_angle_deg(inputs.chassis_up, inputs.chassis_forward);

        let mut target = state.target_lean_angle;
        if inputs.speed < cfg.low_speed_threshold && cfg.low_speed_threshold > 0.0 {
            target *= inputs.speed / cfg.low_speed_threshold;
        }
        let offset = self.centrifugal_offset(fwd_ground, inputs.angular_velocity, inputs.speed);
        target += offset;

        let error = finite_scalar(target - roll);
        state.roll_error_integral =
            (state.roll_error_integral + error * dt).clamp(-cfg.integral_max, cfg.integral_max);
        let derivative = if dt > 0.0 { (error - state.roll_error_prev) / dt } else { 0.0 };
        state.roll_error_prev = error;

        let output = finite_scalar(error * cfg.kp + state.roll_error_integral * cfg.ki + derivative * cfg.kd);
        let torque = finite_or_zero(fwd_ground * output * cfg.torque_scale);

        Some(StabilizerOutput {
            torque,
            telemetry: StabilizerTelemetry {
                roll_deg: roll,
                target_deg: target,
                centrifugal_offset_deg: offset,
                error,
                integral: state.roll_error_integral,
                derivative,
                output,
            },
        })
    }
}
