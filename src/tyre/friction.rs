// ==============================================================================
// friction.rs — FRICTION-CIRCLE TYRE MODEL
// ------------------------------------------------------------------------------
// Converts normal load, contact-patch velocity and drive input into one
// world-space friction force:
//
//   1. forward/right projected onto the contact plane
//   2. contact velocity stripped of its normal component (v_plane)
//   3. lateral vector = v_plane - forward * dot(v_plane, forward)
//   4. slip angle = acos(dot(v̂_plane, forward)), signed by cross(v̂, up)·forward
//   5. cornering envelope cf_max = sigmoid(|slip| / knee) * cornering_force_max
//   6. cf = -lateral * cornering_stiffness, |cf| <= cf_max
//   7. drive = forward * input * drive_force_gain (normal component removed)
//   8. R = (Fz * radius_gain + radius_offset) * friction_multiplier
//   9. ratio = |cf + drive| / R; above 1 the sum is scaled by mu(ratio)
//
// The model is stateless; everything a debug overlay or audio host wants is
// returned in `TyreTelemetry`.
// ==============================================================================

use serde::Serialize;

use crate::config::FrictionCircleConfig;
use crate::tyre::types::{
    finite_or_zero, lerp_unclamped, normalize_or_zero, project_on_plane, safe_normalize, sigmoid,
    Pos3, Vec3, WORLD_UP,
};

/// Usage above this is reported as an audible squeal.
pub const SQUEAL_USAGE: f32 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSample {
    pub normal_force: f32,
    pub contact_point: Pos3,
    pub contact_normal: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub contact_velocity: Vec3,
    pub accel_input: f32,
    pub friction_multiplier: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TyreTelemetry {
    pub slip_angle: f32,      // rad, signed
    pub slip_angle_deg: f32,
    pub lateral_speed: f32,   // m/s along the tyre's right
    pub mu: f32,
    pub radius: f32,          // friction circle radius, N
    pub usage: f32,           // |sum| / R before the mu scaling
    pub cornering_force: f32, // N
    pub drive_force: f32,     // N
    pub total_force: f32,     // N, after mu
    pub squeal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrictionResult {
    pub force: Vec3,
    pub telemetry: TyreTelemetry,
}

impl FrictionResult {
    fn none() -> Self {
        Self {
            force: Vec3::zeros(),
            telemetry: TyreTelemetry { mu: 1.0, ..TyreTelemetry::default() },
        }
    }
}

/// Anything that can turn a contact sample into a friction force.
pub trait TyreFrictionModel {
    fn friction_force(&self, sample: &ContactSample) -> FrictionResult;
}

/// Three-segment traction-loss curve. Continuous at 1.0, the knee and the floor.
pub fn mu_curve(ratio: f32, cfg: &FrictionCircleConfig) -> f32 {
    if ratio <= 1.0 {
        1.0
    } else if ratio <= cfg.knee_ratio {
        lerp_unclamped(ratio, 1.0, cfg.knee_ratio, 1.0, cfg.knee_mu)
    } else if ratio < cfg.floor_ratio {
        lerp_unclamped(ratio, cfg.knee_ratio, cfg.floor_ratio, cfg.knee_mu, cfg.mu_min)
    } else {
        cfg.mu_min
    }
}

/// Signed slip angle (rad) between the planar velocity and the tyre forward.
pub fn slip_angle(velocity_on_plane: Vec3, forward: Vec3) -> f32 {
    let Some(dir) = safe_normalize(velocity_on_plane) else {
        return 0.0;
    };
    let magnitude = dir.dot(&forward).clamp(-1.0, 1.0).acos();
    if dir.cross(&WORLD_UP).dot(&forward) < 0.0 { -magnitude } else { magnitude }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FrictionCircle {
    pub config: FrictionCircleConfig,
}

impl FrictionCircle {
    pub fn new(config: FrictionCircleConfig) -> Self {
        Self { config }
    }

    pub fn radius(&self, normal_force: f32, friction_multiplier: f32) -> f32 {
        (normal_force * self.config.radius_gain + self.config.radius_offset) * friction_multiplier
    }
}

impl TyreFrictionModel for FrictionCircle {
    fn friction_force(&self, s: &ContactSample) -> FrictionResult {
        let cfg = &self.config;
        if !(s.normal_force > 0.0) {
            return FrictionResult::none();
        }

        let n = normalize_or_zero(s.contact_normal);
        let forward = normalize_or_zero(project_on_plane(s.forward, n));
        let right = normalize_or_zero(project_on_plane(s.right, n));

        let v_plane = s.contact_velocity - n * n.dot(&s.contact_velocity);
        let longitudinal = v_plane.dot(&forward);
        let lateral = v_plane - forward * longitudinal;

        let slip = slip_angle(v_plane, forward);

        let knee = cfg.slip_knee_deg.to_radians();
        let cf_curve = if knee > 0.0 {
            sigmoid(cfg.sigmoid_gain, slip.abs() / knee).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let cf_max = cf_curve * cfg.cornering_force_max;

        let mut cf = -lateral * cfg.cornering_stiffness;
        let cf_mag = cf.norm();
        if cf_mag > cf_max && cf_mag > 0.0 {
            cf *= cf_max / cf_mag;
        }

        let mut drive = forward * s.accel_input * cfg.drive_force_gain;
        drive -= n * n.dot(&drive);

        let mut sum = cf + drive;
        let radius = self.radius(s.normal_force, s.friction_multiplier);

        // no capacity, no grip
        if !(radius > 0.0) {
            return FrictionResult::none();
        }

        let usage = sum.norm() / radius;
        let mu = mu_curve(usage, cfg);
        sum *= mu;
        let force = finite_or_zero(sum);

        FrictionResult {
            force,
            telemetry: TyreTelemetry {
                slip_angle: slip,
                slip_angle_deg: slip.to_degrees(),
                lateral_speed: v_plane.dot(&right),
                mu,
                radius,
                usage,
                cornering_force: cf.norm(),
                drive_force: drive.norm(),
                total_force: force.norm(),
                squeal: usage > SQUEAL_USAGE,
            },
        }
    }
}
