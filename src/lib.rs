//! Arcade bike and car dynamics: spring-damper suspension, a friction-circle
//! tyre model and a PID lean stabilizer, driven once per fixed tick.
//!
//! The core only sees the world through [`host::RigidBody`] and
//! [`host::GroundQuery`]; [`physics::PhysicsWorld`] is the rapier-backed host.

pub mod config;
pub mod error;
pub mod host;
pub mod physics;
pub mod script;
pub mod telemetry;
pub mod tyre;
pub mod vehicle;

pub use config::VehicleConfig;
pub use error::{ConfigError, VehicleError};
pub use host::{BodyProxy, FlatGround, GroundHit, GroundQuery, InputState, RigidBody};
pub use physics::PhysicsWorld;
pub use telemetry::{Snapshot, TickTelemetry};
pub use vehicle::VehicleController;
