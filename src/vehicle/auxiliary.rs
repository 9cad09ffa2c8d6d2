// ==============================================================================
// auxiliary.rs — FORCES OUTSIDE THE TYRE MODEL
// ------------------------------------------------------------------------------
// - ground drag        linear + quadratic, at the centre of mass, grounded only
// - air damping        angvel *= exp(-k dt), airborne only
// - air control        roll about forward, pitch about right, airborne only
// - downforce          -up * speed_kmh * downforce_per_kmh
// - turbo boost        forward_on_ground * boost_force, grounded only
// - reset              teleport above the ground, yaw kept, velocities damped
// - flip recovery      restore the last all-wheels-down pose after a timeout
// - collision kick     random shove on collision enter, scaled with speed
// ==============================================================================

use log::{debug, info};
use nalgebra::UnitQuaternion;
use rand::Rng;
use serde::Serialize;

use crate::config::{
    AirControlConfig, CollisionKickConfig, FlipRecoveryConfig, ResetConfig, ResistanceConfig,
};
use crate::host::{GroundQuery, InputState, RigidBody};
use crate::tyre::kinematics::forward_on_ground;
use crate::tyre::types::{finite_or_zero, Pos3, Vec3, WORLD_UP};

pub const MS_TO_KMH: f32 = 3.6;

/// Ground probe starts this far above the body so a sunken chassis still finds the surface.
const RESET_PROBE_HEADROOM: f32 = 2.0;

pub fn apply_ground_drag<B: RigidBody + ?Sized>(body: &mut B, cfg: &ResistanceConfig) -> Vec3 {
    let v = body.linear_velocity();
    let drag = finite_or_zero(-v * cfg.linear_drag - v * v.norm() * cfg.quadratic_drag);
    let com = body.center_of_mass();
    body.apply_force_at_point(drag, com);
    drag
}

pub fn apply_air_damping<B: RigidBody + ?Sized>(body: &mut B, cfg: &ResistanceConfig, dt: f32) {
    let factor = (-cfg.air_angular_damping * dt).exp();
    let w = body.angular_velocity();
    body.set_angular_velocity(finite_or_zero(w * factor));
}

pub fn apply_air_control<B: RigidBody + ?Sized>(body: &mut B, input: &InputState, cfg: &AirControlConfig) -> Vec3 {
    if !cfg.enabled {
        return Vec3::zeros();
    }
    // + horizontal rolls right, + vertical pitches the nose down
    let torque = body.forward() * input.horizontal * cfg.roll_torque
        - body.right() * input.vertical * cfg.pitch_torque;
    let torque = finite_or_zero(torque);
    body.apply_torque(torque);
    torque
}

pub fn apply_downforce<B: RigidBody + ?Sized>(body: &mut B, cfg: &ResistanceConfig) -> Vec3 {
    if cfg.downforce_per_kmh == 0.0 {
        return Vec3::zeros();
    }
    let speed_kmh = body.speed() * MS_TO_KMH;
    let force = finite_or_zero(-WORLD_UP * speed_kmh * cfg.downforce_per_kmh);
    let at = body.position();
    body.apply_force_at_point(force, at);
    force
}

pub fn apply_turbo_boost<B: RigidBody + ?Sized>(body: &mut B, boost_force: f32) -> Vec3 {
    let force = finite_or_zero(forward_on_ground(body.forward()) * boost_force);
    let com = body.center_of_mass();
    body.apply_force_at_point(force, com);
    force
}

/// Upright orientation that keeps the current heading.
pub fn upright_with_heading(orientation: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    let heading = forward_on_ground(orientation * Vec3::z());
    if heading == Vec3::zeros() {
        // nose vertical: fall back to wherever the roof points
        let roof = forward_on_ground(orientation * Vec3::y());
        if roof == Vec3::zeros() {
            return UnitQuaternion::identity();
        }
        return UnitQuaternion::face_towards(&roof, &WORLD_UP);
    }
    UnitQuaternion::face_towards(&heading, &WORLD_UP)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResetOutcome {
    pub position: Pos3,
    pub orientation: UnitQuaternion<f32>,
    pub ground_found: bool,
}

/// Teleport the body above the ground below it and damp its velocities.
pub fn perform_reset<B, G>(body: &mut B, ground: &G, cfg: &ResetConfig) -> ResetOutcome
where
    B: RigidBody + ?Sized,
    G: GroundQuery + ?Sized,
{
    let origin = body.position() + WORLD_UP * RESET_PROBE_HEADROOM;
    let hit = ground.cast(origin, -WORLD_UP, cfg.probe_distance + RESET_PROBE_HEADROOM);

    let position = match hit {
        Some(h) => h.point + h.normal * cfg.lift_height,
        None => body.position() + WORLD_UP * cfg.lift_height,
    };
    let orientation = upright_with_heading(&body.orientation());

    let keep = 1.0 - cfg.velocity_damping.clamp(0.0, 1.0);
    let v = body.linear_velocity();
    let w = body.angular_velocity();

    body.set_pose(position, orientation);
    body.set_linear_velocity(finite_or_zero(v * keep));
    body.set_angular_velocity(finite_or_zero(w * keep));

    info!("vehicle reset to ({:.2}, {:.2}, {:.2})", position.x, position.y, position.z);
    ResetOutcome { position, orientation, ground_found: hit.is_some() }
}

// ================================================================================
// - flip recovery
// ================================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlipRecovery {
    pub unsafe_time: f32,
    pub safe_pose: Option<(Pos3, UnitQuaternion<f32>)>,
}

impl FlipRecovery {
    /// Returns true when the body was restored this tick.
    pub fn update<B: RigidBody + ?Sized>(
        &mut self,
        body: &mut B,
        all_grounded: bool,
        cfg: &FlipRecoveryConfig,
        dt: f32,
    ) -> bool {
        if !cfg.enabled {
            return false;
        }

        if all_grounded {
            self.unsafe_time = 0.0;
            self.safe_pose = Some((body.position(), body.orientation()));
            return false;
        }

        self.unsafe_time += dt;
        if self.unsafe_time <= cfg.timeout {
            return false;
        }
        self.unsafe_time = 0.0;

        let Some((position, orientation)) = self.safe_pose else {
            debug!("flip recovery timed out with no safe pose yet");
            return false;
        };
        body.set_pose(position, orientation);
        body.set_linear_velocity(Vec3::zeros());
        body.set_angular_velocity(Vec3::zeros());
        info!("flip recovery: restored last safe pose");
        true
    }
}

// ================================================================================
// - collision kick
// ================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CollisionContact {
    pub point: [f32; 3],
    /// Points from the obstacle toward the vehicle.
    pub normal: [f32; 3],
}

pub fn kick_ratio(speed_kmh: f32, cfg: &CollisionKickConfig) -> f32 {
    cfg.ratio_offset + speed_kmh / 100.0 * cfg.ratio_per_100_kmh
}

/// Random shove for each new contact. Returns the summed force.
pub fn apply_collision_kick<B, R>(
    body: &mut B,
    contacts: &[CollisionContact],
    cfg: &CollisionKickConfig,
    rng: &mut R,
) -> Vec3
where
    B: RigidBody + ?Sized,
    R: Rng,
{
    if !cfg.enabled || contacts.is_empty() {
        return Vec3::zeros();
    }

    let ratio = kick_ratio(body.speed() * MS_TO_KMH, cfg);
    let mut total = Vec3::zeros();

    for c in contacts {
        let point = Pos3::new(c.point[0], c.point[1], c.point[2]);
        let normal = Vec3::new(c.normal[0], c.normal[1], c.normal[2]);

        let mut vertical = rng.gen_range(cfg.vertical_min..=cfg.vertical_max) * ratio;
        if rng.gen_bool(0.5) {
            vertical = -vertical;
        }
        let along_normal = rng.gen_range(cfg.normal_min..=cfg.normal_max) * ratio;

        let up_force = finite_or_zero(WORLD_UP * vertical);
        let normal_force = finite_or_zero(normal * along_normal);
        body.apply_force_at_point(up_force, point);
        body.apply_force_at_point(normal_force, point);
        total += up_force + normal_force;
    }

    debug!("collision kick: {} contacts, ratio {:.2}", contacts.len(), ratio);
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{point, BodyProxy, FlatGround};
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn drag_opposes_motion() {
        let mut body = BodyProxy::new(point(0.0, 1.0, 0.0), UnitQuaternion::identity())
            .with_velocity(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros());
        let cfg = ResistanceConfig { linear_drag: 2.0, quadratic_drag: 0.5, ..ResistanceConfig::default() };
        let drag = apply_ground_drag(&mut body, &cfg);
        assert_abs_diff_eq!(drag.z, -(20.0 + 50.0), epsilon = 1e-4);
    }

    #[test]
    fn air_damping_is_exponential() {
        let mut body = BodyProxy::new(point(0.0, 1.0, 0.0), UnitQuaternion::identity())
            .with_velocity(Vec3::zeros(), Vec3::new(2.0, 0.0, 0.0));
        let cfg = ResistanceConfig { air_angular_damping: 1.0, ..ResistanceConfig::default() };
        apply_air_damping(&mut body, &cfg, 1.0);
        assert_abs_diff_eq!(body.angvel.x, 2.0 * (-1.0f32).exp(), epsilon = 1e-5);
    }

    #[test]
    fn downforce_scales_with_kmh() {
        let mut body = BodyProxy::new(point(0.0, 1.0, 0.0), UnitQuaternion::identity())
            .with_velocity(Vec3::new(0.0, 0.0, 10.0), Vec3::zeros());
        let cfg = ResistanceConfig { downforce_per_kmh: 3.1, ..ResistanceConfig::default() };
        let f = apply_downforce(&mut body, &cfg);
        assert_abs_diff_eq!(f.y, -36.0 * 3.1, epsilon = 1e-3);
    }

    #[test]
    fn reset_lands_above_ground_upright_with_heading() {
        let tilted = UnitQuaternion::from_euler_angles(0.0, 0.7, 1.2);
        let mut body = BodyProxy::new(point(3.0, 0.2, -4.0), tilted)
            .with_velocity(Vec3::new(10.0, 0.0, 0.0), Vec3::new(0.0, 4.0, 0.0));
        let cfg = ResetConfig::default();

        let out = perform_reset(&mut body, &FlatGround { height: 0.0 }, &cfg);

        assert!(out.ground_found);
        assert_abs_diff_eq!(body.position, point(3.0, 1.0, -4.0), epsilon = 1e-5);
        assert_abs_diff_eq!(body.up(), WORLD_UP, epsilon = 1e-5);
        assert_abs_diff_eq!(body.forward().y, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(body.linvel.x, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn flip_recovery_restores_after_timeout() {
        let cfg = FlipRecoveryConfig { enabled: true, timeout: 1.0 };
        let mut flip = FlipRecovery::default();
        let mut body = BodyProxy::new(point(0.0, 0.5, 0.0), UnitQuaternion::identity());

        assert!(!flip.update(&mut body, true, &cfg, 0.1));

        body.position = point(5.0, 3.0, 0.0);
        body.linvel = Vec3::new(1.0, 1.0, 1.0);
        let mut restored = false;
        for _ in 0..11 {
            restored |= flip.update(&mut body, false, &cfg, 0.1);
        }
        assert!(restored);
        assert_eq!(body.position, point(0.0, 0.5, 0.0));
        assert_eq!(body.linvel, Vec3::zeros());
    }

    #[test]
    fn kick_ratio_grows_with_speed() {
        let cfg = CollisionKickConfig::default();
        assert_abs_diff_eq!(kick_ratio(0.0, &cfg), -0.1, epsilon = 1e-6);
        assert_abs_diff_eq!(kick_ratio(100.0, &cfg), 2.1, epsilon = 1e-5);
    }

    #[test]
    fn kick_stays_inside_its_bounds() {
        let cfg = CollisionKickConfig { enabled: true, ..CollisionKickConfig::default() };
        let mut rng = StdRng::seed_from_u64(7);
        // 100 km/h -> ratio 2.1
        let mut body = BodyProxy::new(point(0.0, 1.0, 0.0), UnitQuaternion::identity())
            .with_velocity(Vec3::new(0.0, 0.0, 100.0 / 3.6), Vec3::zeros());
        let contact = CollisionContact { point: [0.0, 1.0, 1.0], normal: [0.0, 0.0, -1.0] };

        for _ in 0..50 {
            body.clear_applied();
            apply_collision_kick(&mut body, &[contact], &cfg, &mut rng);
            assert_eq!(body.forces.len(), 2);
            let vertical = body.forces[0].force.y.abs();
            assert!(vertical >= 1000.0 * 2.1 - 1e-2 && vertical <= 2000.0 * 2.1 + 1e-2);
            let along = -body.forces[1].force.z;
            assert!(along >= -1500.0 * 2.1 - 1e-2 && along <= 2500.0 * 2.1 + 1e-2);
        }
    }
}
