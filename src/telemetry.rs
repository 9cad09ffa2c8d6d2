// ==============================================================================
// telemetry.rs — READ-ONLY TICK SNAPSHOTS (CORE -> HOST)
// ------------------------------------------------------------------------------
// Everything a debug overlay, audio host or log wants to know about a tick is
// returned here by value. Nothing in this file feeds back into the physics.
//
// - WheelTelemetry:  per-wheel suspension + tyre numbers
// - TickTelemetry:   one vehicle, one tick
// - Snapshot:        every vehicle in a world, serialized as one JSON line
// ==============================================================================

use nalgebra::UnitQuaternion;
use serde::Serialize;

use crate::tyre::friction::TyreTelemetry;
use crate::tyre::stabilizer::StabilizerTelemetry;
use crate::tyre::steering::SteeringTelemetry;
use crate::tyre::types::{Pos3, Vec3, WheelId};
use crate::vehicle::drive::TurboGauge;

#[inline] pub fn v3(v: Vec3) -> [f32; 3] { [v.x, v.y, v.z] }
#[inline] pub fn p3(p: Pos3) -> [f32; 3] { [p.x, p.y, p.z] }
#[inline] pub fn q4(q: &UnitQuaternion<f32>) -> [f32; 4] { [q.i, q.j, q.k, q.w] }

#[derive(Debug, Clone, Serialize)]
pub struct WheelTelemetry {
    pub id: WheelId,
    pub grounded: bool,
    pub base: [f32; 3],
    pub current_length: f32,
    pub compression: f32,
    pub normal_force: f32,
    pub steer_deg: f32,
    pub drive_input: f32,
    pub friction_multiplier: f32,
    pub tyre: Option<TyreTelemetry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TickTelemetry {
    pub position: [f32; 3],
    pub rotation: [f32; 4], // quaternion
    pub speed: f32,
    pub speed_kmh: f32,
    pub roll_deg: f32,

    pub handle_angle: f32,
    pub handle_velocity: f32,
    pub target_lean: f32,
    pub drive_target: f32,
    pub drive_input: f32,
    pub turbo: TurboGauge,
    pub drifting: bool,
    pub drift_multiplier: f32,

    pub any_grounded: bool,
    pub all_grounded: bool,

    pub steering: SteeringTelemetry,
    pub stabilizer: Option<StabilizerTelemetry>,
    pub wheels: Vec<WheelTelemetry>,

    pub reset: bool,
    pub flip_recovered: bool,
    pub collision_kick: Option<[f32; 3]>,
}

impl TickTelemetry {
    /// Wheels currently loud enough to squeal.
    pub fn squealing(&self) -> impl Iterator<Item = WheelId> + '_ {
        self.wheels
            .iter()
            .filter(|w| w.tyre.is_some_and(|t| t.squeal))
            .map(|w| w.id)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleSnapshot {
    pub id: String,
    #[serde(flatten)]
    pub telemetry: TickTelemetry,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub tick: u64,
    pub vehicles: Vec<VehicleSnapshot>,
}

impl Snapshot {
    pub fn to_json_line(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
