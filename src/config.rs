// ==============================================================================
// config.rs — VEHICLE TUNING (SERDE, PRESETS, VALIDATION)
// ------------------------------------------------------------------------------
// Every tunable in the simulation lives here. Angles that the player or the
// handlebar sees are in DEGREES (lean, handle, caster, toe); everything else is
// SI (m, kg, N, s).
//
// Presets:
// - VehicleConfig::sport_bike()  two wheels, steering column + lean stabilizer
// - VehicleConfig::hatchback()   four wheels, handle rack, no stabilizer
// ==============================================================================

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, VehicleError};
use crate::tyre::types::WheelId;

// ----------------------------------------------------------------------------
// Wheels
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WheelConfig {
    pub id: WheelId,
    pub offset: [f32; 3],        // mount point in chassis local space
    pub tyre_radius: f32,        // m
    pub rest_length: f32,        // m, spring neutral length
    pub max_length: f32,         // m, full extension
    pub spring_constant: f32,    // N/m
    pub damper_constant: f32,    // N*s/m

    pub drive: bool,             // receives positive drive input
    pub brake: bool,             // receives negative drive input
    pub steered: bool,           // follows the handle angle
    pub toe_deg: f32,            // static toe, signed
}

impl Default for WheelConfig {
    fn default() -> Self {
        Self {
            id: WheelId::R,
            offset: [0.0, 0.0, 0.0],
            tyre_radius: 0.4,
            rest_length: 0.5,
            max_length: 0.7,
            spring_constant: 10.0,
            damper_constant: 1.0,
            drive: false,
            brake: false,
            steered: false,
            toe_deg: 0.0,
        }
    }
}

// ----------------------------------------------------------------------------
// Tyre friction
// ----------------------------------------------------------------------------

/// Friction-circle tyre constants.
///
/// Radius: `R = (normal_force * radius_gain + radius_offset) * friction_multiplier`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FrictionCircleConfig {
    pub radius_gain: f32,
    pub radius_offset: f32,          // N
    pub drive_force_gain: f32,       // N at full drive input
    pub cornering_stiffness: f32,    // N per m/s of lateral slip
    pub cornering_force_max: f32,    // N, envelope ceiling
    pub slip_knee_deg: f32,          // slip angle that maps to sigmoid input 1
    pub sigmoid_gain: f32,

    // traction-loss knee: mu(1.0)=1, mu(knee_ratio)=knee_mu, mu(floor_ratio)=mu_min
    pub knee_ratio: f32,
    pub knee_mu: f32,
    pub floor_ratio: f32,
    pub mu_min: f32,
}

impl Default for FrictionCircleConfig {
    fn default() -> Self {
        Self {
            radius_gain: 0.9,
            radius_offset: 0.0,
            drive_force_gain: 400.0,
            cornering_stiffness: 60.0,
            cornering_force_max: 3000.0,
            slip_knee_deg: 10.0,
            sigmoid_gain: 1.0,
            knee_ratio: 1.02,
            knee_mu: 1.02,
            floor_ratio: 1.06,
            mu_min: 0.16,
        }
    }
}

impl FrictionCircleConfig {
    /// Constants of the older inline wheel code (spring-load radius with a
    /// constant offset, weak drive). Kept selectable for comparison runs.
    pub fn legacy_inline() -> Self {
        Self {
            radius_gain: 2.0,
            radius_offset: 10.0,
            drive_force_gain: 40.0,
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Steering
// ----------------------------------------------------------------------------

/// Where the low-speed extra handle torque takes its direction from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LowSpeedSteerMode {
    /// Pull the handle back toward centre, harder at walking pace.
    HandleAngle,
    /// Turn the handle in the direction of the horizontal input.
    Input,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SteeringColumnConfig {
    pub max_handle_angle: f32,              // deg
    pub inertia_moment: f32,
    pub handle_damping: f32,
    pub centering_torque: f32,
    pub steering_centering_multiplier: f32, // centering scale while input is held

    pub self_steer_enabled: bool,
    pub self_steer_strength: f32,
    pub self_steer_min_speed: f32,          // m/s

    pub caster_enabled: bool,
    pub caster_angle_deg: f32,
    pub caster_effect_strength: f32,
    pub caster_max_effect_speed: f32,       // m/s

    pub low_speed_threshold: f32,           // m/s
    pub low_speed_multiplier: f32,
    pub low_speed_torque_gain: f32,
    pub low_speed_mode: LowSpeedSteerMode,

    pub input_deadzone: f32,
}

impl Default for SteeringColumnConfig {
    fn default() -> Self {
        Self {
            max_handle_angle: 30.0,
            inertia_moment: 0.5,
            handle_damping: 5.0,
            centering_torque: 2.0,
            steering_centering_multiplier: 0.5,
            self_steer_enabled: true,
            self_steer_strength: 5.0,
            self_steer_min_speed: 2.0,
            caster_enabled: true,
            caster_angle_deg: 25.0,
            caster_effect_strength: 2.0,
            caster_max_effect_speed: 10.0,
            low_speed_threshold: 5.5,
            low_speed_multiplier: 1.5,
            low_speed_torque_gain: 0.2,
            low_speed_mode: LowSpeedSteerMode::HandleAngle,
            input_deadzone: 0.01,
        }
    }
}

/// Rate-limited handle used by four-wheel vehicles.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleRackConfig {
    pub max_handle_angle: f32,      // deg
    pub base_rate: f32,             // deg/s
    pub low_speed_bonus_rate: f32,  // deg/s added at standstill
    pub low_speed_reference_kmh: f32,
    pub input_threshold: f32,       // |input| above this turns the handle
    pub release_decay: f32,         // 1/s exponential return when released
}

impl Default for HandleRackConfig {
    fn default() -> Self {
        Self {
            max_handle_angle: 30.0,
            base_rate: 25.0,
            low_speed_bonus_rate: 50.0,
            low_speed_reference_kmh: 40.0,
            input_threshold: 0.5,
            release_decay: 2.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SteeringConfig {
    Column(SteeringColumnConfig),
    Rack(HandleRackConfig),
}

impl SteeringConfig {
    pub fn max_handle_angle(&self) -> f32 {
        match self {
            SteeringConfig::Column(c) => c.max_handle_angle,
            SteeringConfig::Rack(r) => r.max_handle_angle,
        }
    }
}

// ----------------------------------------------------------------------------
// Lean stabilizer
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CentrifugalConfig {
    pub enabled: bool,
    pub min_speed: f32,             // m/s
    pub gain: f32,
    pub influence_start_speed: f32, // m/s, influence 0
    pub influence_full_speed: f32,  // m/s, influence max_influence
    pub max_influence: f32,         // 0..1
}

impl Default for CentrifugalConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_speed: 3.0,
            gain: 1.0,
            influence_start_speed: 5.0,
            influence_full_speed: 15.0,
            max_influence: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
    pub integral_max: f32,
    pub low_speed_threshold: f32, // m/s, target lean fades to 0 below this
    pub torque_scale: f32,
    pub centrifugal: CentrifugalConfig,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            kp: 120.0,
            ki: 6.0,
            kd: 12.0,
            integral_max: 5.0,
            low_speed_threshold: 2.0,
            torque_scale: 0.5,
            centrifugal: CentrifugalConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LeanInputConfig {
    pub max_lean_angle: f32,     // deg
    pub accumulation_rate: f32,  // deg/s toward the input target
    pub decay_rate: f32,         // deg/s back to upright
    pub input_deadzone: f32,
}

impl Default for LeanInputConfig {
    fn default() -> Self {
        Self {
            max_lean_angle: 30.0,
            accumulation_rate: 30.0,
            decay_rate: 15.0,
            input_deadzone: 0.01,
        }
    }
}

// ----------------------------------------------------------------------------
// Drive / auxiliaries
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub acceleration_sensitivity: f32,
    pub brake_sensitivity: f32,
    pub input_smoothness: f32,     // 1/s
    pub max_speed_threshold: f32,  // m/s, drive fades above this
    pub overspeed_band: f32,       // fraction of threshold until drive reaches 0
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            acceleration_sensitivity: 1.0,
            brake_sensitivity: 1.0,
            input_smoothness: 5.0,
            max_speed_threshold: 16.7,
            overspeed_band: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TurboConfig {
    pub enabled: bool,
    pub gauge_max: f32,
    pub consume_rate: f32,      // gauge/s while boosting
    pub recover_rate: f32,      // gauge/s otherwise
    pub speed_multiplier: f32,  // raises the max speed threshold while boosting
    pub boost_force: f32,       // N along ground-forward while boosting
}

impl Default for TurboConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            gauge_max: 100.0,
            consume_rate: 35.0,
            recover_rate: 15.0,
            speed_multiplier: 1.3,
            boost_force: 600.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    pub enabled: bool,
    pub friction_multiplier: f32, // friction-circle scale while drifting
    pub blend_rate: f32,          // 1/s
    pub rear_only: bool,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            friction_multiplier: 0.55,
            blend_rate: 6.0,
            rear_only: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ResistanceConfig {
    pub linear_drag: f32,          // N per m/s
    pub quadratic_drag: f32,       // N per (m/s)^2
    pub air_angular_damping: f32,  // 1/s
    pub downforce_per_kmh: f32,    // N per km/h
}

impl Default for ResistanceConfig {
    fn default() -> Self {
        Self {
            linear_drag: 3.0,
            quadratic_drag: 0.4,
            air_angular_damping: 1.5,
            downforce_per_kmh: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct AirControlConfig {
    pub enabled: bool,
    pub roll_torque: f32,   // N*m at full horizontal input
    pub pitch_torque: f32,  // N*m at full vertical input
}

impl Default for AirControlConfig {
    fn default() -> Self {
        Self { enabled: true, roll_torque: 40.0, pitch_torque: 40.0 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    pub lift_height: f32,        // m above the ground contact
    pub velocity_damping: f32,   // 0..1 fraction removed
    pub probe_distance: f32,     // m, ground search below the body
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self { lift_height: 1.0, velocity_damping: 0.9, probe_distance: 50.0 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FlipRecoveryConfig {
    pub enabled: bool,
    pub timeout: f32, // s without full ground contact before restoring
}

impl Default for FlipRecoveryConfig {
    fn default() -> Self {
        Self { enabled: false, timeout: 4.0 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionKickConfig {
    pub enabled: bool,
    pub vertical_min: f32,  // N
    pub vertical_max: f32,  // N
    pub normal_min: f32,    // N
    pub normal_max: f32,    // N
    pub ratio_offset: f32,
    pub ratio_per_100_kmh: f32,
}

impl Default for CollisionKickConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            vertical_min: 1000.0,
            vertical_max: 2000.0,
            normal_min: -1500.0,
            normal_max: 2500.0,
            ratio_offset: -0.1,
            ratio_per_100_kmh: 2.2,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ChassisConfig {
    pub mass: f32,                // kg
    pub half_extents: [f32; 3],   // m
    pub com_offset: [f32; 3],     // local offset of the collider
    pub linear_damping: f32,
    pub angular_damping: f32,
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self {
            mass: 160.0,
            half_extents: [0.25, 0.4, 0.9],
            com_offset: [0.0, -0.1, 0.0],
            linear_damping: 0.05,
            angular_damping: 0.5,
        }
    }
}

// ----------------------------------------------------------------------------
// Vehicle
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleConfig {
    pub name: String,
    #[serde(default)]
    pub chassis: ChassisConfig,
    pub wheels: Vec<WheelConfig>,
    #[serde(default)]
    pub friction: FrictionCircleConfig,
    pub steering: SteeringConfig,
    #[serde(default)]
    pub stabilizer: Option<StabilizerConfig>,
    #[serde(default)]
    pub lean: LeanInputConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub turbo: TurboConfig,
    #[serde(default)]
    pub drift: DriftConfig,
    #[serde(default)]
    pub resistance: ResistanceConfig,
    #[serde(default)]
    pub air_control: AirControlConfig,
    #[serde(default)]
    pub reset: ResetConfig,
    #[serde(default)]
    pub flip_recovery: FlipRecoveryConfig,
    #[serde(default)]
    pub collision_kick: CollisionKickConfig,
}

pub const MIN_WHEELS: usize = 2;

impl VehicleConfig {
    pub fn sport_bike() -> Self {
        let wheel = |id, z: f32, steered: bool| WheelConfig {
            id,
            offset: [0.0, -0.1, z],
            tyre_radius: 0.33,
            rest_length: 0.45,
            max_length: 0.6,
            spring_constant: 9_000.0,
            damper_constant: 700.0,
            drive: !steered,
            brake: !steered,
            steered,
            toe_deg: 0.0,
        };

        Self {
            name: "sport_bike".to_string(),
            chassis: ChassisConfig::default(),
            wheels: vec![wheel(WheelId::F, 0.65, true), wheel(WheelId::R, -0.65, false)],
            friction: FrictionCircleConfig::default(),
            steering: SteeringConfig::Column(SteeringColumnConfig::default()),
            stabilizer: Some(StabilizerConfig::default()),
            lean: LeanInputConfig::default(),
            drive: DriveConfig::default(),
            turbo: TurboConfig::default(),
            drift: DriftConfig::default(),
            resistance: ResistanceConfig::default(),
            air_control: AirControlConfig::default(),
            reset: ResetConfig::default(),
            flip_recovery: FlipRecoveryConfig::default(),
            collision_kick: CollisionKickConfig::default(),
        }
    }

    pub fn hatchback() -> Self {
        let front_toe = 0.5;
        let rear_toe = 0.25;
        let wheel = |id: WheelId, x: f32, z: f32| {
            let front = id.is_front();
            WheelConfig {
                id,
                offset: [x, -0.2, z],
                tyre_radius: 0.33,
                rest_length: 0.45,
                max_length: 0.6,
                spring_constant: 35_000.0,
                damper_constant: 3_500.0,
                drive: !front,
                brake: front,
                steered: front,
                toe_deg: id.side_sign() * if front { front_toe } else { rear_toe },
            }
        };

        Self {
            name: "hatchback".to_string(),
            chassis: ChassisConfig {
                mass: 900.0,
                half_extents: [0.85, 0.35, 2.0],
                com_offset: [0.0, -0.15, 0.0],
                linear_damping: 0.05,
                angular_damping: 0.6,
            },
            wheels: vec![
                wheel(WheelId::FL, 0.75, 1.3),
                wheel(WheelId::FR, -0.75, 1.3),
                wheel(WheelId::RL, 0.75, -1.3),
                wheel(WheelId::RR, -0.75, -1.3),
            ],
            friction: FrictionCircleConfig { drive_force_gain: 1_200.0, ..FrictionCircleConfig::default() },
            steering: SteeringConfig::Rack(HandleRackConfig::default()),
            stabilizer: None,
            lean: LeanInputConfig::default(),
            drive: DriveConfig { max_speed_threshold: 30.0, ..DriveConfig::default() },
            turbo: TurboConfig { boost_force: 2_500.0, ..TurboConfig::default() },
            drift: DriftConfig::default(),
            resistance: ResistanceConfig { downforce_per_kmh: 3.1, ..ResistanceConfig::default() },
            air_control: AirControlConfig { enabled: false, ..AirControlConfig::default() },
            reset: ResetConfig::default(),
            flip_recovery: FlipRecoveryConfig { enabled: true, ..FlipRecoveryConfig::default() },
            collision_kick: CollisionKickConfig { enabled: true, ..CollisionKickConfig::default() },
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: VehicleConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Fail fast on anything that would leave the vehicle half-working.
    pub fn validate(&self) -> Result<(), VehicleError> {
        if self.wheels.len() < MIN_WHEELS {
            return Err(VehicleError::MissingWheel {
                required: MIN_WHEELS,
                found: self.wheels.len(),
            });
        }

        for w in &self.wheels {
            let invalid = |reason: &str| VehicleError::InvalidWheel { id: w.id, reason: reason.to_string() };
            if !(w.rest_length > 0.0 && w.rest_length <= w.max_length) {
                return Err(invalid("rest_length must satisfy 0 < rest_length <= max_length"));
            }
            if w.tyre_radius < 0.0 {
                return Err(invalid("tyre_radius must be >= 0"));
            }
            if w.spring_constant < 0.0 || w.damper_constant < 0.0 {
                return Err(invalid("spring and damper constants must be >= 0"));
            }
        }

        if !self.wheels.iter().any(|w| w.steered) {
            return Err(VehicleError::MissingSteering("no steered wheel".to_string()));
        }

        match &self.steering {
            SteeringConfig::Column(c) => {
                if c.inertia_moment <= 0.0 {
                    return Err(VehicleError::InvalidTuning("steering inertia_moment must be > 0".into()));
                }
                if c.max_handle_angle <= 0.0 {
                    return Err(VehicleError::InvalidTuning("max_handle_angle must be > 0".into()));
                }
            }
            SteeringConfig::Rack(r) => {
                if r.max_handle_angle <= 0.0 {
                    return Err(VehicleError::InvalidTuning("max_handle_angle must be > 0".into()));
                }
                if self.stabilizer.is_some() {
                    return Err(VehicleError::MissingSteering(
                        "lean stabilizer requires a steering column".to_string(),
                    ));
                }
            }
        }

        let lean = &self.lean;
        if !(lean.max_lean_angle >= 0.0) {
            return Err(VehicleError::InvalidTuning("max_lean_angle must be >= 0".into()));
        }
        if !(lean.accumulation_rate >= 0.0 && lean.decay_rate >= 0.0) {
            return Err(VehicleError::InvalidTuning("lean accumulation and decay rates must be >= 0".into()));
        }

        // rand panics on empty or non-finite ranges
        let kick = &self.collision_kick;
        let ordered = |lo: f32, hi: f32| lo.is_finite() && hi.is_finite() && lo <= hi;
        if !ordered(kick.vertical_min, kick.vertical_max) {
            return Err(VehicleError::InvalidTuning("collision kick vertical_min must be <= vertical_max".into()));
        }
        if !ordered(kick.normal_min, kick.normal_max) {
            return Err(VehicleError::InvalidTuning("collision kick normal_min must be <= normal_max".into()));
        }

        if let Some(s) = &self.stabilizer {
            if s.integral_max < 0.0 {
                return Err(VehicleError::InvalidTuning("integral_max must be >= 0".into()));
            }
        }

        if self.chassis.mass <= 0.0 {
            return Err(VehicleError::InvalidTuning("chassis mass must be > 0".into()));
        }

        Ok(())
    }
}
