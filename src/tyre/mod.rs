//! tyre - engine-agnostic wheel, steering and lean physics (pure types + solvers)

pub mod types;
pub mod state;
pub mod suspension;
pub mod friction;
pub mod kinematics;
pub mod steering;
pub mod stabilizer;

pub use types::*;
pub use state::{StabilizerState, SteeringState, WheelState};
pub use friction::{FrictionCircle, TyreFrictionModel};
