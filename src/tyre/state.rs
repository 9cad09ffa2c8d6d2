// ==============================================================================
// state.rs — PER-TICK MUTABLE STATE OWNED BY THE VEHICLE CONTROLLER
// ------------------------------------------------------------------------------
// WheelState        one per wheel, tuning copied from WheelConfig at spawn
// SteeringState     handlebar angle (deg) + angular velocity (deg/s)
// StabilizerState   player lean target + PID memory
//
// The solvers in this module tree are stateless; everything that survives a
// tick lives here.
// ==============================================================================

use crate::config::WheelConfig;
use crate::tyre::types::{Pos3, Vec3, WheelId, WORLD_UP};

#[derive(Debug, Clone)]
pub struct WheelState {
    pub id: WheelId,
    pub offset: Pos3,
    pub tyre_radius: f32,

    pub rest_length: f32,
    pub max_length: f32,
    pub spring_constant: f32,
    pub damper_constant: f32,

    pub current_length: f32,
    pub last_length: f32,
    pub is_grounded: bool,
    pub contact_point: Pos3,
    pub contact_normal: Vec3,

    // force of the last grounded tick (zeroed when airborne)
    pub spring_force: Vec3,
    pub damper_force: Vec3,
    pub normal_force: f32,

    pub drive_input: f32,
    pub friction_multiplier: f32,

    pub drive: bool,
    pub brake: bool,
    pub steered: bool,
    pub toe_deg: f32,
}

impl WheelState {
    pub fn from_config(cfg: &WheelConfig) -> Self {
        Self {
            id: cfg.id,
            offset: Pos3::new(cfg.offset[0], cfg.offset[1], cfg.offset[2]),
            tyre_radius: cfg.tyre_radius,
            rest_length: cfg.rest_length,
            max_length: cfg.max_length,
            spring_constant: cfg.spring_constant,
            damper_constant: cfg.damper_constant,
            current_length: cfg.rest_length,
            last_length: cfg.rest_length,
            is_grounded: false,
            contact_point: Pos3::origin(),
            contact_normal: WORLD_UP,
            spring_force: Vec3::zeros(),
            damper_force: Vec3::zeros(),
            normal_force: 0.0,
            drive_input: 0.0,
            friction_multiplier: 1.0,
            drive: cfg.drive,
            brake: cfg.brake,
            steered: cfg.steered,
            toe_deg: cfg.toe_deg,
        }
    }

    pub fn ray_length(&self) -> f32 {
        self.max_length + self.tyre_radius
    }

    pub fn compression(&self) -> f32 {
        self.rest_length - self.current_length
    }

    /// Airborne bookkeeping: no force, spring fully extended.
    pub fn clear_contact(&mut self) {
        self.is_grounded = false;
        self.current_length = self.max_length;
        self.spring_force = Vec3::zeros();
        self.damper_force = Vec3::zeros();
        self.normal_force = 0.0;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SteeringState {
    pub handle_angle: f32,      // deg, + turns left
    pub angular_velocity: f32,  // deg/s
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StabilizerState {
    pub target_lean_angle: f32, // deg, + leans right
    pub roll_error_integral: f32,
    pub roll_error_prev: f32,
}

impl StabilizerState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
