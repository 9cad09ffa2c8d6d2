// ==============================================================================
// host.rs — ENGINE-FACING SEAMS (RIGID BODY, GROUND QUERY, INPUT)
// ------------------------------------------------------------------------------
// The physics core never touches engine globals. Each tick it receives:
// - a `RigidBody` (pose, velocities, force/torque application)
// - a `GroundQuery` (raycast against the ground layer)
// - an `InputState` polled by the host
// - an explicit `dt`
//
// `BodyProxy` snapshots a body and records every write. The rapier host uses it
// to run the controller against an immutable world, then flushes the recorded
// forces into the real body (collect first, apply later).
// ==============================================================================

use nalgebra::{Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::tyre::types::{Pos3, Vec3};

/// Rigid body abstraction consumed by the vehicle core.
pub trait RigidBody {
    fn position(&self) -> Pos3;
    fn orientation(&self) -> UnitQuaternion<f32>;
    fn linear_velocity(&self) -> Vec3;
    fn angular_velocity(&self) -> Vec3;
    fn set_linear_velocity(&mut self, v: Vec3);
    fn set_angular_velocity(&mut self, w: Vec3);
    /// Teleport (used by reset and flip recovery).
    fn set_pose(&mut self, position: Pos3, orientation: UnitQuaternion<f32>);
    fn apply_force_at_point(&mut self, force: Vec3, point: Pos3);
    fn apply_torque(&mut self, torque: Vec3);
    fn velocity_at_point(&self, point: Pos3) -> Vec3;

    /// World-space centre of mass. Hosts without one fall back to the origin.
    fn center_of_mass(&self) -> Pos3 {
        self.position()
    }

    fn forward(&self) -> Vec3 {
        self.orientation() * Vector3::z()
    }

    fn up(&self) -> Vec3 {
        self.orientation() * Vector3::y()
    }

    /// +Z forward, +Y up -> right is -X.
    fn right(&self) -> Vec3 {
        self.orientation() * -Vector3::x()
    }

    fn transform_point(&self, local: &Pos3) -> Pos3 {
        self.position() + self.orientation() * local.coords
    }

    fn speed(&self) -> f32 {
        self.linear_velocity().norm()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundHit {
    pub distance: f32,
    pub point: Pos3,
    pub normal: Vec3,
}

/// Raycast against the ground collision layer.
pub trait GroundQuery {
    fn cast(&self, origin: Pos3, direction: Vec3, max_distance: f32) -> Option<GroundHit>;
}

/// Infinite horizontal plane. Handy for headless hosts and tests.
#[derive(Debug, Clone, Copy)]
pub struct FlatGround {
    pub height: f32,
}

impl GroundQuery for FlatGround {
    fn cast(&self, origin: Pos3, direction: Vec3, max_distance: f32) -> Option<GroundHit> {
        // Only rays heading downward can reach the plane.
        if direction.y >= -1e-6 {
            return None;
        }
        let distance = (self.height - origin.y) / direction.y;
        if !(0.0..=max_distance).contains(&distance) {
            return None;
        }
        Some(GroundHit {
            distance,
            point: origin + direction * distance,
            normal: Vector3::y(),
        })
    }
}

/// Externally polled controls for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputState {
    pub horizontal: f32, // -1..1, + = right
    pub vertical: f32,   // -1..1, + = forward
    pub accelerate: bool,
    pub brake: bool,
    pub turbo: bool,
    pub drift: bool,
    pub reset: bool,
}

impl InputState {
    pub fn clamped(mut self) -> Self {
        self.horizontal = crate::tyre::types::finite_scalar(self.horizontal).clamp(-1.0, 1.0);
        self.vertical = crate::tyre::types::finite_scalar(self.vertical).clamp(-1.0, 1.0);
        self
    }
}

/// One recorded force application.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedForce {
    pub force: Vec3,
    pub point: Pos3,
}

/// Snapshot of a body plus a log of everything the controller asked for.
#[derive(Debug, Clone)]
pub struct BodyProxy {
    pub position: Pos3,
    pub orientation: UnitQuaternion<f32>,
    pub linvel: Vec3,
    pub angvel: Vec3,
    /// World-space centre of mass (point velocities are taken about it).
    pub center_of_mass: Pos3,

    pub forces: Vec<AppliedForce>,
    pub torques: Vec<Vec3>,
    pub pose_written: bool,
    pub linvel_written: bool,
    pub angvel_written: bool,
}

impl BodyProxy {
    pub fn new(position: Pos3, orientation: UnitQuaternion<f32>) -> Self {
        Self {
            position,
            orientation,
            linvel: Vector3::zeros(),
            angvel: Vector3::zeros(),
            center_of_mass: position,
            forces: Vec::new(),
            torques: Vec::new(),
            pose_written: false,
            linvel_written: false,
            angvel_written: false,
        }
    }

    pub fn with_velocity(mut self, linvel: Vec3, angvel: Vec3) -> Self {
        self.linvel = linvel;
        self.angvel = angvel;
        self
    }

    pub fn net_force(&self) -> Vec3 {
        self.forces.iter().fold(Vector3::zeros(), |acc, f| acc + f.force)
    }

    /// Net torque about the centre of mass, including force moments.
    pub fn net_torque(&self) -> Vec3 {
        let moments = self.forces.iter().fold(Vector3::zeros(), |acc, f| {
            acc + (f.point - self.center_of_mass).cross(&f.force)
        });
        self.torques.iter().fold(moments, |acc, t| acc + t)
    }

    pub fn clear_applied(&mut self) {
        self.forces.clear();
        self.torques.clear();
        self.pose_written = false;
        self.linvel_written = false;
        self.angvel_written = false;
    }
}

impl RigidBody for BodyProxy {
    fn position(&self) -> Pos3 { self.position }
    fn orientation(&self) -> UnitQuaternion<f32> { self.orientation }
    fn linear_velocity(&self) -> Vec3 { self.linvel }
    fn angular_velocity(&self) -> Vec3 { self.angvel }
    fn center_of_mass(&self) -> Pos3 { self.center_of_mass }

    fn set_linear_velocity(&mut self, v: Vec3) {
        self.linvel = v;
        self.linvel_written = true;
    }

    fn set_angular_velocity(&mut self, w: Vec3) {
        self.angvel = w;
        self.angvel_written = true;
    }

    fn set_pose(&mut self, position: Pos3, orientation: UnitQuaternion<f32>) {
        let local_com = self.orientation.inverse() * (self.center_of_mass - self.position);
        self.position = position;
        self.orientation = orientation;
        self.center_of_mass = position + orientation * local_com;
        self.pose_written = true;
    }

    fn apply_force_at_point(&mut self, force: Vec3, point: Pos3) {
        self.forces.push(AppliedForce { force, point });
    }

    fn apply_torque(&mut self, torque: Vec3) {
        self.torques.push(torque);
    }

    fn velocity_at_point(&self, point: Pos3) -> Vec3 {
        let r = point - self.center_of_mass;
        self.linvel + self.angvel.cross(&r)
    }
}

/// `Point3` shorthand used by hosts building proxies from raw arrays.
pub fn point(x: f32, y: f32, z: f32) -> Pos3 {
    Point3::new(x, y, z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn flat_ground_reports_distance_along_ray() {
        let ground = FlatGround { height: 0.0 };
        let hit = ground.cast(point(0.0, 2.0, 0.0), -Vector3::y(), 5.0).unwrap();
        assert_abs_diff_eq!(hit.distance, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(hit.point.y, 0.0, epsilon = 1e-6);
        assert!(ground.cast(point(0.0, 2.0, 0.0), -Vector3::y(), 1.5).is_none());
        assert!(ground.cast(point(0.0, 2.0, 0.0), Vector3::y(), 5.0).is_none());
    }

    #[test]
    fn proxy_point_velocity_includes_spin() {
        let body = BodyProxy::new(point(0.0, 0.0, 0.0), UnitQuaternion::identity())
            .with_velocity(Vector3::zeros(), Vector3::new(0.0, 1.0, 0.0));
        // w x r with w=+Y, r=+Z gives +X
        let v = body.velocity_at_point(point(0.0, 0.0, 1.0));
        assert_abs_diff_eq!(v, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn basis_matches_frame_convention() {
        let body = BodyProxy::new(point(0.0, 0.0, 0.0), UnitQuaternion::identity());
        assert_abs_diff_eq!(body.forward(), Vector3::z(), epsilon = 1e-6);
        assert_abs_diff_eq!(body.right(), -Vector3::x(), epsilon = 1e-6);
    }
}
