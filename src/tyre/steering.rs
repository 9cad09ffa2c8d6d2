// ==============================================================================
// steering.rs — HANDLEBAR SIMULATION (COLUMN) + RATE-LIMITED RACK
// ==============================================================================
// Two ways to move `SteeringState::handle_angle` (deg, + turns left):
//
// SteeringColumn (bikes): second-order rotational integrator, player never
// turns the bar directly:
//
// τ_net =
//        + τ_center      = -θ * centering * 0.5 * m
//        + τ_self        = -roll * self_steer_strength          (v > v_min)
//        + τ_caster      = -roll * caster_effect - θ * trail * m (v > v_min)
//        - c * ω
//        + τ_low_speed                                          (v < v_low)
//
// where:
//        m      = steering input held ? steering_centering_multiplier : 1
//        caster_effect = sin(caster) * strength * clamp01(v / v_caster)
//        trail  = sin(caster) * clamp01(v / v_caster) * 2
//
// α = τ_net / I; ω += α dt; θ += ω dt; θ clamped, ω zeroed when the stop is
// hit while still moving outward.
//
// HandleRack (cars): the handle follows the horizontal input at a fixed
// angular rate with a low-speed bonus, and decays back when released.
// ==============================================================================

use serde::Serialize;

use crate::config::{HandleRackConfig, LowSpeedSteerMode, SteeringColumnConfig, SteeringConfig};
use crate::tyre::state::SteeringState;
use crate::tyre::types::{clamp01, finite_scalar, move_towards};

/// Per-tick inputs shared by both steering kinds.
#[derive(Debug, Clone, Copy, Default)]
pub struct SteeringInputs {
    pub speed: f32,      // m/s
    pub roll_deg: f32,   // + leaning right
    pub horizontal: f32, // -1..1, + right
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SteeringTelemetry {
    pub centering_torque: f32,
    pub self_steer_torque: f32,
    pub caster_torque: f32,
    pub damping_torque: f32,
    pub low_speed_torque: f32,
    pub total_torque: f32,
    pub clamped: bool,
}

// ================================================================================
// - steering column
// ================================================================================

#[derive(Debug, Clone, Copy)]
pub struct SteeringColumn {
    pub config: SteeringColumnConfig,
}

impl SteeringColumn {
    pub fn new(config: SteeringColumnConfig) -> Self {
        Self { config }
    }

    pub fn update(&self, state: &mut SteeringState, inputs: SteeringInputs, dt: f32) -> SteeringTelemetry {
        let cfg = &self.config;
        let angle = state.handle_angle;
        let speed = inputs.speed;

        let steering_input_active = inputs.horizontal.abs() > cfg.input_deadzone;
        let centering_mul = if steering_input_active { cfg.steering_centering_multiplier } else { 1.0 };

        let centering_torque = -angle * cfg.centering_torque * 0.5 * centering_mul;

        let mut self_steer_torque = 0.0;
        let mut caster_torque = 0.0;
        if speed > cfg.self_steer_min_speed {
            if cfg.self_steer_enabled {
                self_steer_torque = -inputs.roll_deg * cfg.self_steer_strength;
            }
            if cfg.caster_enabled {
                let caster_sin = cfg.caster_angle_deg.to_radians().sin();
                let speed_factor = if cfg.caster_max_effect_speed > 0.0 {
                    clamp01(speed / cfg.caster_max_effect_speed)
                } else {
                    1.0
                };
                let caster_effect = caster_sin * cfg.caster_effect_strength * speed_factor;
                let trail_effect = caster_sin * speed_factor * 2.0;

                caster_torque = -inputs.roll_deg * caster_effect - angle * trail_effect * centering_mul;
            }
        }

        let damping_torque = -state.angular_velocity * cfg.handle_damping;

        let mut low_speed_torque = 0.0;
        if speed < cfg.low_speed_threshold && cfg.low_speed_threshold > 0.0 {
            let speed_factor = 1.0 - speed / cfg.low_speed_threshold;
            let multiplier = 1.0 + (cfg.low_speed_multiplier - 1.0) * speed_factor;
            low_speed_torque = match cfg.low_speed_mode {
                LowSpeedSteerMode::HandleAngle => -angle * cfg.low_speed_torque_gain * multiplier,
                // input scaled to handle degrees so both modes share one gain
                LowSpeedSteerMode::Input => {
                    -inputs.horizontal * cfg.max_handle_angle * cfg.low_speed_torque_gain * multiplier
                }
            };
        }

        let total_torque = finite_scalar(
            centering_torque + self_steer_torque + caster_torque + damping_torque + low_speed_torque,
        );

        let alpha = total_torque / cfg.inertia_moment;
        state.angular_velocity = finite_scalar(state.angular_velocity + alpha * dt);
        let next = finite_scalar(state.handle_angle + state.angular_velocity * dt);

        let clamped = clamp_to_stops(state, next, cfg.max_handle_angle);

        SteeringTelemetry {
            centering_torque,
            self_steer_torque,
            caster_torque,
            damping_torque,
            low_speed_torque,
            total_torque,
            clamped,
        }
    }
}

/// Hard mechanical stops. Returns true when the stop was hit.
fn clamp_to_stops(state: &mut SteeringState, next: f32, max_angle: f32) -> bool {
    let clamped = next.clamp(-max_angle, max_angle);
    state.handle_angle = clamped;

    let at_stop = clamped != next;
    if (clamped >= max_angle && state.angular_velocity > 0.0)
        || (clamped <= -max_angle && state.angular_velocity < 0.0)
    {
        state.angular_velocity = 0.0;
    }
    at_stop
}

// ================================================================================
// - handle rack
// ================================================================================

#[derive(Debug, Clone, Copy)]
pub struct HandleRack {
    pub config: HandleRackConfig,
}

impl HandleRack {
    pub fn new(config: HandleRackConfig) -> Self {
        Self { config }
    }

    /// Handle rate in deg/s at the given speed.
    pub fn rate(&self, speed_kmh: f32) -> f32 {
        let cfg = &self.config;
        let bonus = if cfg.low_speed_reference_kmh > 0.0 {
            clamp01(1.0 - speed_kmh / cfg.low_speed_reference_kmh)
        } else {
            0.0
        };
        cfg.base_rate + cfg.low_speed_bonus_rate * bonus
    }

    pub fn update(&self, state: &mut SteeringState, inputs: SteeringInputs, dt: f32) -> SteeringTelemetry {
        let cfg = &self.config;
        let prev = state.handle_angle;
        let h = inputs.horizontal;

        let next = if h.abs() > cfg.input_threshold {
            // + input is right, + handle is left
            let target = -h * cfg.max_handle_angle;
            move_towards(prev, target, self.rate(inputs.speed * 3.6) * dt)
        } else {
            prev * (-cfg.release_decay * dt).exp()
        };

        state.angular_velocity = if dt > 0.0 { finite_scalar((next - prev) / dt) } else { 0.0 };
        let clamped = clamp_to_stops(state, finite_scalar(next), cfg.max_handle_angle);

        SteeringTelemetry { clamped, ..SteeringTelemetry::default() }
    }
}

// ================================================================================
// - dispatch
// ================================================================================

#[derive(Debug, Clone, Copy)]
pub enum Steering {
    Column(SteeringColumn),
    Rack(HandleRack),
}

impl Steering {
    pub fn from_config(config: &SteeringConfig) -> Self {
        match config {
            SteeringConfig::Column(c) => Steering::Column(SteeringColumn::new(*c)),
            SteeringConfig::Rack(r) => Steering::Rack(HandleRack::new(*r)),
        }
    }

    pub fn update(&self, state: &mut SteeringState, inputs: SteeringInputs, dt: f32) -> SteeringTelemetry {
        match self {
            Steering::Column(c) => c.update(state, inputs, dt),
            Steering::Rack(r) => r.update(state, inputs, dt),
        }
    }
}
