#![allow(dead_code)]

use arcade_dynamics::host::BodyProxy;
use arcade_dynamics::tyre::types::{Vec3, GRAVITY};
use nalgebra::UnitQuaternion;

pub const DT: f32 = 0.01;

/// Semi-implicit Euler on the proxy with a scalar inertia, gravity included.
/// Clears the recorded forces afterwards.
pub fn integrate(body: &mut BodyProxy, mass: f32, inertia: f32, dt: f32) {
    let force = body.net_force() - Vec3::y() * GRAVITY * mass;
    let torque = body.net_torque();

    body.linvel += force / mass * dt;
    body.angvel += torque / inertia * dt;

    let step = body.linvel * dt;
    body.position += step;
    body.center_of_mass += step;

    let spin = UnitQuaternion::from_scaled_axis(body.angvel * dt);
    let local_com = body.orientation.inverse() * (body.center_of_mass - body.position);
    body.orientation = spin * body.orientation;
    body.center_of_mass = body.position + body.orientation * local_com;

    body.clear_applied();
}

pub fn all_finite(v: &[f32]) -> bool {
    v.iter().all(|x| x.is_finite())
}
