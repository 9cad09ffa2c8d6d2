mod common;

use approx::assert_abs_diff_eq;
use arcade_dynamics::host::{point, BodyProxy, FlatGround, InputState, RigidBody};
use arcade_dynamics::tyre::kinematics::roll_angle_deg;
use arcade_dynamics::tyre::types::Vec3;
use arcade_dynamics::{VehicleConfig, VehicleController};
use nalgebra::UnitQuaternion;

use common::{all_finite, integrate, DT};

const GROUND: FlatGround = FlatGround { height: 0.0 };

fn bike_at(y: f32) -> (VehicleController, BodyProxy) {
    let ctrl = VehicleController::new(VehicleConfig::sport_bike()).unwrap();
    (ctrl, BodyProxy::new(point(0.0, y, 0.0), UnitQuaternion::identity()))
}

#[test]
fn upright_bike_settles_at_static_sag() {
    let (mut ctrl, mut body) = bike_at(0.8);
    let mass = ctrl.config().chassis.mass;

    // 5 s, damping ratio ~0.2 at ~10.6 rad/s
    for _ in 0..500 {
        ctrl.tick(&mut body, &GROUND, InputState::default(), DT);
        integrate(&mut body, mass, 40.0, DT);
    }

    // mg shared by two springs: 160 * 9.81 / (2 * 9000) = 0.0872 m of sag
    let expected_y = 0.1 + 0.33 + 0.45 - 0.0872;
    assert_abs_diff_eq!(body.position.y, expected_y, epsilon = 5e-3);
    assert!(body.linvel.norm() < 1e-2);
    assert!(roll_angle_deg(body.up(), body.forward()).abs() < 1e-3);
}

#[test]
fn dropped_bike_lands_without_bouncing_away() {
    let (mut ctrl, mut body) = bike_at(2.0);
    let mass = ctrl.config().chassis.mass;

    let mut landed_at = None;
    for i in 0..400 {
        let t = ctrl.tick(&mut body, &GROUND, InputState::default(), DT);
        if landed_at.is_none() && t.all_grounded {
            landed_at = Some(i);
        }
        integrate(&mut body, mass, 40.0, DT);
    }

    assert!(landed_at.is_some());
    assert!(ctrl.all_grounded());
    assert!(body.position.y > 0.5 && body.position.y < 1.0, "y = {}", body.position.y);
}

#[test]
fn held_lean_input_walks_target_to_forty_degrees() {
    let mut cfg = VehicleConfig::sport_bike();
    cfg.lean.max_lean_angle = 40.0;
    cfg.lean.accumulation_rate = 30.0;
    let mut ctrl = VehicleController::new(cfg).unwrap();
    let mut body = BodyProxy::new(point(0.0, 0.8, 0.0), UnitQuaternion::identity());

    let right = InputState { horizontal: 1.0, ..InputState::default() };
    let dt = 0.02;
    let mut reached = None;
    for tick in 1..=100 {
        let t = ctrl.tick(&mut body, &GROUND, right, dt);
        body.clear_applied();
        if reached.is_none() && (t.target_lean - 40.0).abs() < 1e-3 {
            reached = Some(tick as f32 * dt);
        }
    }

    let t = reached.unwrap();
    assert!((1.30..=1.36).contains(&t), "reached 40 deg at {t} s");
    assert_eq!(ctrl.stabilizer_state.target_lean_angle, 40.0);
}

#[test]
fn double_reset_request_matches_single() {
    let moving = |ctrl: &mut VehicleController| {
        let mut body = BodyProxy::new(point(3.0, 0.3, -2.0), UnitQuaternion::from_euler_angles(0.4, 0.9, 0.1))
            .with_velocity(Vec3::new(4.0, -1.0, 6.0), Vec3::new(0.5, 2.0, -1.0));
        ctrl.tick(&mut body, &GROUND, InputState { horizontal: 1.0, ..InputState::default() }, DT);
        body.clear_applied();
        body
    };

    let (mut once, _) = bike_at(0.8);
    let (mut twice, _) = bike_at(0.8);
    let mut a = moving(&mut once);
    let mut b = moving(&mut twice);

    once.request_reset();
    twice.request_reset();
    twice.request_reset();

    let ta = once.tick(&mut a, &GROUND, InputState::default(), DT);
    let tb = twice.tick(&mut b, &GROUND, InputState::default(), DT);
    assert!(ta.reset && tb.reset);

    assert_eq!(a.position, b.position);
    assert_eq!(a.orientation, b.orientation);
    assert_eq!(a.linvel, b.linvel);
    assert_eq!(a.angvel, b.angvel);
    assert_eq!(once.stabilizer_state, twice.stabilizer_state);
    assert_eq!(once.stabilizer_state.target_lean_angle, 0.0);

    // teleported 1 m above the ground, heading kept, upright
    assert_abs_diff_eq!(a.position.y, 1.0, epsilon = 1e-5);
    assert!(roll_angle_deg(a.up(), a.forward()).abs() < 1e-3);
    assert_abs_diff_eq!(a.up().y, 1.0, epsilon = 1e-5);

    // next tick has nothing pending
    assert!(!once.tick(&mut a, &GROUND, InputState::default(), DT).reset);
}

#[test]
fn hatchback_drive_stays_finite() {
    let mut ctrl = VehicleController::new(VehicleConfig::hatchback()).unwrap();
    let mut body = BodyProxy::new(point(0.0, 1.0, 0.0), UnitQuaternion::identity());
    // chassis_com_offset lowers the centre of mass
    body.center_of_mass = point(0.0, 0.85, 0.0);
    let mass = ctrl.config().chassis.mass;

    for i in 0..300 {
        let input = InputState {
            accelerate: i < 200,
            brake: i >= 250,
            horizontal: if (100..150).contains(&i) { 0.6 } else { 0.0 },
            turbo: (50..80).contains(&i),
            drift: (120..140).contains(&i),
            ..InputState::default()
        };
        let t = ctrl.tick(&mut body, &GROUND, input, DT);

        assert!(all_finite(&t.position));
        assert!(all_finite(&t.rotation));
        assert!(t.speed.is_finite());
        assert!(t.handle_angle.abs() <= 30.0 + 1e-3);
        for w in &t.wheels {
            assert!(w.normal_force >= 0.0);
            assert!(w.current_length.is_finite());
        }
        integrate(&mut body, mass, 900.0, DT);
    }

    assert!(body.position.y > 0.0);
    assert!(body.position.z > 1.0, "car should have moved forward, z = {}", body.position.z);
}
