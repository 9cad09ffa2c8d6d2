// ==============================================================================
// vehicle/mod.rs — VEHICLE CONTROLLER (ONE FIXED TICK)
// ------------------------------------------------------------------------------
// Owns every piece of per-vehicle state and runs the tick in a fixed order:
//
//   1) input       clamp axes, latch reset button edge
//   2) intent      turbo gauge -> drive target -> smoothing -> overspeed fade
//                  lean target accumulation, drift blend
//   3) wheels      suspension raycast + spring/damper, friction when grounded
//   4) steering    handle column / rack integration
//   5) stabilizer  PID roll torque (skipped when fully airborne)
//   6) auxiliary   drag | air damping + air control, downforce, turbo boost
//   7) recovery    flip recovery, pending reset
//
// The controller only talks to the world through `RigidBody` + `GroundQuery`,
// so it runs the same against rapier, a `BodyProxy`, or a test double.
// ==============================================================================

pub mod auxiliary;
pub mod drive;
pub mod lean;

use log::{debug, info};
use rand::Rng;

use crate::config::VehicleConfig;
use crate::error::VehicleError;
use crate::host::{GroundQuery, InputState, RigidBody};
use crate::telemetry::{p3, q4, TickTelemetry, WheelTelemetry};
use crate::tyre::friction::{ContactSample, FrictionCircle, TyreFrictionModel};
use crate::tyre::kinematics::{roll_angle_deg, wheel_basis, wheel_steer_deg};
use crate::tyre::stabilizer::{LeanStabilizer, StabilizerInputs};
use crate::tyre::state::{StabilizerState, SteeringState, WheelState};
use crate::tyre::steering::{Steering, SteeringInputs};
use crate::tyre::suspension::resolve_contact;
use crate::tyre::types::{clamp01, Vec3};

use self::auxiliary::{CollisionContact, FlipRecovery, MS_TO_KMH};
use self::drive::{target_drive, DriveState, TurboGauge};
use self::lean::accumulate_lean;

pub struct VehicleController {
    config: VehicleConfig,

    pub wheels: Vec<WheelState>,
    pub steering_state: SteeringState,
    pub stabilizer_state: StabilizerState,
    pub drive: DriveState,
    pub turbo: TurboGauge,
    pub drift_multiplier: f32,

    steering: Steering,
    stabilizer: Option<LeanStabilizer>,
    friction: Box<dyn TyreFrictionModel + Send + Sync>,
    flip: FlipRecovery,

    reset_requested: bool,
    reset_button_held: bool,
    was_airborne: bool,
}

impl VehicleController {
    pub fn new(config: VehicleConfig) -> Result<Self, VehicleError> {
        let friction = FrictionCircle::new(config.friction);
        Self::with_friction_model(config, Box::new(friction))
    }

    /// Same as `new`, with a caller-supplied tyre model.
    pub fn with_friction_model(
        config: VehicleConfig,
        friction: Box<dyn TyreFrictionModel + Send + Sync>,
    ) -> Result<Self, VehicleError> {
        config.validate()?;

        let wheels: Vec<WheelState> = config.wheels.iter().map(WheelState::from_config).collect();
        let steering = Steering::from_config(&config.steering);
        let stabilizer = config.stabilizer.map(LeanStabilizer::new);
        let turbo = TurboGauge::full(&config.turbo);

        info!(
            "vehicle '{}' ready: {} wheels, stabilizer {}",
            config.name,
            wheels.len(),
            if stabilizer.is_some() { "on" } else { "off" }
        );

        Ok(Self {
            config,
            wheels,
            steering_state: SteeringState::default(),
            stabilizer_state: StabilizerState::default(),
            drive: DriveState::default(),
            turbo,
            drift_multiplier: 1.0,
            steering,
            stabilizer,
            friction,
            flip: FlipRecovery::default(),
            reset_requested: false,
            reset_button_held: false,
            was_airborne: false,
        })
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Ask for a reset at the end of the next tick. Repeated requests before
    /// that tick collapse into one.
    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    pub fn reset_pending(&self) -> bool {
        self.reset_requested
    }

    pub fn any_grounded(&self) -> bool {
        self.wheels.iter().any(|w| w.is_grounded)
    }

    pub fn all_grounded(&self) -> bool {
        self.wheels.iter().all(|w| w.is_grounded)
    }

    /// Random shove for chassis contacts that started this tick.
    pub fn on_collision<B, R>(&self, body: &mut B, contacts: &[CollisionContact], rng: &mut R) -> Vec3
    where
        B: RigidBody + ?Sized,
        R: Rng,
    {
        auxiliary::apply_collision_kick(body, contacts, &self.config.collision_kick, rng)
    }

    pub fn tick<B, G>(&mut self, body: &mut B, ground: &G, input: InputState, dt: f32) -> TickTelemetry
    where
        B: RigidBody + ?Sized,
        G: GroundQuery + ?Sized,
    {
        let input = input.clamped();
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };

        // ----------------------------------------------------------------
        // 1) input
        // ----------------------------------------------------------------
        if input.reset && !self.reset_button_held {
            self.request_reset();
        }
        self.reset_button_held = input.reset;

        // ----------------------------------------------------------------
        // 2) intent
        // ----------------------------------------------------------------
        let speed = body.speed();
        let turbo_active = self.turbo.update(input.turbo, &self.config.turbo, dt);
        let max_speed = if turbo_active {
            self.config.drive.max_speed_threshold * self.config.turbo.speed_multiplier
        } else {
            self.config.drive.max_speed_threshold
        };
        let target = target_drive(&input, &self.config.drive, turbo_active);
        let drive_input = self.drive.advance(target, speed, max_speed, &self.config.drive, dt);

        self.stabilizer_state.target_lean_angle = accumulate_lean(
            self.stabilizer_state.target_lean_angle,
            input.horizontal,
            &self.config.lean,
            dt,
        );

        let drifting = self.update_drift(input.drift, dt);

        for w in &mut self.wheels {
            w.drive_input = if drive_input > 0.0 && w.drive {
                drive_input
            } else if drive_input < 0.0 && w.brake {
                drive_input
            } else {
                0.0
            };
        }

        // ----------------------------------------------------------------
        // 3) wheels
        // ----------------------------------------------------------------
        let orientation = body.orientation();
        let handle_angle = self.steering_state.handle_angle;
        let mut wheel_telemetry = Vec::with_capacity(self.wheels.len());

        for w in &mut self.wheels {
            let contact = resolve_contact(w, body, ground, dt);
            let steer_deg = wheel_steer_deg(w, handle_angle);

            let tyre = if contact.grounded && w.normal_force > 0.0 {
                let basis = wheel_basis(&orientation, steer_deg);
                let sample = ContactSample {
                    normal_force: w.normal_force,
                    contact_point: w.contact_point,
                    contact_normal: w.contact_normal,
                    forward: basis.forward,
                    right: basis.right,
                    contact_velocity: body.velocity_at_point(w.contact_point),
                    accel_input: w.drive_input,
                    friction_multiplier: w.friction_multiplier,
                };
                let out = self.friction.friction_force(&sample);
                body.apply_force_at_point(out.force, w.contact_point);
                Some(out.telemetry)
            } else {
                None
            };

            wheel_telemetry.push(WheelTelemetry {
                id: w.id,
                grounded: contact.grounded,
                base: p3(contact.base_position),
                current_length: w.current_length,
                compression: w.compression(),
                normal_force: w.normal_force,
                steer_deg,
                drive_input: w.drive_input,
                friction_multiplier: w.friction_multiplier,
                tyre,
            });
        }

        let any_grounded = self.any_grounded();
        let all_grounded = self.all_grounded();
        if any_grounded == self.was_airborne {
            if any_grounded {
                debug!("'{}' landed", self.config.name);
            } else {
                debug!("'{}' airborne", self.config.name);
            }
        }
        self.was_airborne = !any_grounded;

        // ----------------------------------------------------------------
        // 4) steering
        // ----------------------------------------------------------------
        let roll_deg = roll_angle_deg(body.up(), body.forward());
        let steering = self.steering.update(
            &mut self.steering_state,
            SteeringInputs { speed, roll_deg, horizontal: input.horizontal },
            dt,
        );

        // ----------------------------------------------------------------
        // 5) stabilizer
        // ----------------------------------------------------------------
        let stabilizer = self.stabilizer.as_ref().and_then(|stab| {
            let out = stab.update(
                &mut self.stabilizer_state,
                StabilizerInputs {
                    chassis_up: body.up(),
                    chassis_forward: body.forward(),
                    angular_velocity: body.angular_velocity(),
                    speed,
                    any_wheel_grounded: any_grounded,
                },
                dt,
            )?;
            body.apply_torque(out.torque);
            Some(out.telemetry)
        });

        // ----------------------------------------------------------------
        // 6) auxiliary
        // ----------------------------------------------------------------
        if any_grounded {
            auxiliary::apply_ground_drag(body, &self.config.resistance);
            if turbo_active {
                auxiliary::apply_turbo_boost(body, self.config.turbo.boost_force);
            }
        } else {
            auxiliary::apply_air_damping(body, &self.config.resistance, dt);
            auxiliary::apply_air_control(body, &input, &self.config.air_control);
        }
        auxiliary::apply_downforce(body, &self.config.resistance);

        // ----------------------------------------------------------------
        // 7) recovery
        // ----------------------------------------------------------------
        let flip_recovered = self.flip.update(body, all_grounded, &self.config.flip_recovery, dt);

        let reset = self.reset_requested;
        if reset {
            self.reset_requested = false;
            auxiliary::perform_reset(body, ground, &self.config.reset);
            self.clear_motion_state();
        }

        TickTelemetry {
            position: p3(body.position()),
            rotation: q4(&body.orientation()),
            speed,
            speed_kmh: speed * MS_TO_KMH,
            roll_deg,
            handle_angle: self.steering_state.handle_angle,
            handle_velocity: self.steering_state.angular_velocity,
            target_lean: self.stabilizer_state.target_lean_angle,
            drive_target: self.drive.target,
            drive_input: self.drive.current,
            turbo: self.turbo,
            drifting,
            drift_multiplier: self.drift_multiplier,
            any_grounded,
            all_grounded,
            steering,
            stabilizer,
            wheels: wheel_telemetry,
            reset,
            flip_recovered,
            collision_kick: None,
        }
    }

    /// Blend the drift friction scale toward its goal; returns whether drift is held.
    fn update_drift(&mut self, requested: bool, dt: f32) -> bool {
        let cfg = &self.config.drift;
        let drifting = cfg.enabled && requested;
        let goal = if drifting { cfg.friction_multiplier } else { 1.0 };

        let t = clamp01(1.0 - (-cfg.blend_rate * dt).exp());
        self.drift_multiplier += (goal - self.drift_multiplier) * t;

        for w in &mut self.wheels {
            w.friction_multiplier = if !cfg.rear_only || w.id.is_rear() {
                self.drift_multiplier
            } else {
                1.0
            };
        }
        drifting
    }

    /// Lean, PID, drift and handle state back to neutral.
    fn clear_motion_state(&mut self) {
        self.stabilizer_state.reset();
        self.steering_state = SteeringState::default();
        self.drift_multiplier = 1.0;
        for w in &mut self.wheels {
            w.friction_multiplier = 1.0;
            w.last_length = w.rest_length;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{point, BodyProxy, FlatGround};
    use approx::assert_abs_diff_eq;
    use nalgebra::UnitQuaternion;

    const DT: f32 = 1.0 / 50.0;

    fn bike_on_ground() -> (VehicleController, BodyProxy) {
        let ctrl = VehicleController::new(VehicleConfig::sport_bike()).unwrap();
        // mounts at y 0.7: springs sit 8 cm under rest (radius 0.33, rest 0.45)
        let body = BodyProxy::new(point(0.0, 0.8, 0.0), UnitQuaternion::identity());
        (ctrl, body)
    }

    #[test]
    fn invalid_config_never_builds() {
        let mut cfg = VehicleConfig::sport_bike();
        cfg.wheels.clear();
        assert!(matches!(
            VehicleController::new(cfg),
            Err(VehicleError::MissingWheel { found: 0, .. })
        ));
    }

    #[test]
    fn grounded_bike_gets_suspension_and_stabilizer() {
        let (mut ctrl, mut body) = bike_on_ground();
        let t = ctrl.tick(&mut body, &FlatGround { height: 0.0 }, InputState::default(), DT);
        assert!(t.all_grounded);
        assert_eq!(t.wheels.len(), 2);
        assert!(t.stabilizer.is_some());
        assert!(body.net_force().y > 0.0);
    }

    #[test]
    fn airborne_bike_skips_stabilizer_and_damps_spin() {
        let (mut ctrl, _) = bike_on_ground();
        let mut body = BodyProxy::new(point(0.0, 20.0, 0.0), UnitQuaternion::identity())
            .with_velocity(Vec3::zeros(), Vec3::new(0.0, 3.0, 0.0));
        let t = ctrl.tick(&mut body, &FlatGround { height: 0.0 }, InputState::default(), DT);
        assert!(!t.any_grounded);
        assert!(t.stabilizer.is_none());
        assert!(body.angvel.y < 3.0);
    }

    #[test]
    fn drive_goes_to_rear_and_brake_to_brake_wheels() {
        let mut cfg = VehicleConfig::hatchback();
        cfg.drive.input_smoothness = 1_000.0;
        let mut ctrl = VehicleController::new(cfg).unwrap();
        let mut body = BodyProxy::new(point(0.0, 0.9, 0.0), UnitQuaternion::identity());
        let ground = FlatGround { height: 0.0 };

        let t = ctrl.tick(&mut body, &ground, InputState { accelerate: true, ..InputState::default() }, DT);
        for w in &t.wheels {
            if w.id.is_rear() {
                assert_abs_diff_eq!(w.drive_input, 1.0, epsilon = 1e-6);
            } else {
                assert_eq!(w.drive_input, 0.0);
            }
        }

        let t = ctrl.tick(&mut body, &ground, InputState { brake: true, ..InputState::default() }, DT);
        for w in &t.wheels {
            if w.id.is_front() {
                assert!(w.drive_input < 0.0);
            } else {
                assert_eq!(w.drive_input, 0.0);
            }
        }
    }

    #[test]
    fn drift_softens_rear_grip_only() {
        let (mut ctrl, mut body) = bike_on_ground();
        let ground = FlatGround { height: 0.0 };
        for _ in 0..100 {
            ctrl.tick(&mut body, &ground, InputState { drift: true, ..InputState::default() }, DT);
            body.clear_applied();
        }
        let rear = ctrl.wheels.iter().find(|w| w.id.is_rear()).unwrap();
        let front = ctrl.wheels.iter().find(|w| w.id.is_front()).unwrap();
        assert_abs_diff_eq!(rear.friction_multiplier, 0.55, epsilon = 1e-3);
        assert_eq!(front.friction_multiplier, 1.0);
    }

    #[test]
    fn held_reset_button_fires_once() {
        let (mut ctrl, mut body) = bike_on_ground();
        let ground = FlatGround { height: 0.0 };
        let held = InputState { reset: true, ..InputState::default() };

        assert!(ctrl.tick(&mut body, &ground, held, DT).reset);
        assert!(!ctrl.tick(&mut body, &ground, held, DT).reset);
        assert!(!ctrl.tick(&mut body, &ground, InputState::default(), DT).reset);
        assert!(ctrl.tick(&mut body, &ground, held, DT).reset);
    }

    #[test]
    fn reset_clears_lean_and_drift() {
        let (mut ctrl, mut body) = bike_on_ground();
        let ground = FlatGround { height: 0.0 };
        for _ in 0..30 {
            ctrl.tick(
                &mut body,
                &ground,
                InputState { horizontal: 1.0, drift: true, ..InputState::default() },
                DT,
            );
        }
        assert!(ctrl.stabilizer_state.target_lean_angle > 0.0);

        ctrl.request_reset();
        ctrl.tick(&mut body, &ground, InputState::default(), DT);
        assert_eq!(ctrl.stabilizer_state, StabilizerState::default());
        assert_eq!(ctrl.drift_multiplier, 1.0);
    }
}
