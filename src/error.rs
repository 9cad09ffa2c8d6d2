use std::io;

use thiserror::Error;

use crate::tyre::types::WheelId;

/// Construction / lookup failures. A vehicle that fails validation never runs.
#[derive(Debug, Error)]
pub enum VehicleError {
    #[error("vehicle needs at least {required} wheels, found {found}")]
    MissingWheel { required: usize, found: usize },

    #[error("wheel {id}: {reason}")]
    InvalidWheel { id: WheelId, reason: String },

    #[error("missing steering: {0}")]
    MissingSteering(String),

    #[error("no rigid body attached to vehicle '{0}'")]
    MissingRigidBody(String),

    #[error("unknown vehicle '{0}'")]
    UnknownVehicle(String),

    #[error("invalid tuning: {0}")]
    InvalidTuning(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config rejected: {0}")]
    Rejected(#[from] VehicleError),
}
