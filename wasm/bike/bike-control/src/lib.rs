//! Pedal-driven bike control, independent of any physics engine.
//!
//! Once per fixed tick the loop samples the pedal axis, banks and decays
//! drive force, relays IK foot targets and eases the handlebars toward the
//! stick. Physics bodies are reached only through [`BikeRig`].

pub mod config;
pub mod control;
pub mod drive;
pub mod error;
pub mod feet;
pub mod pedal;
pub mod rig;
pub mod steering;

pub use config::{BikeConfig, Drivetrain, SteeringMode};
pub use control::{step, BikeControlLoop, ControlState, Telemetry, TickInput, TickOutput};
pub use drive::{DriveCommand, DriveForce};
pub use error::{ConfigError, RigFault, RigPart, TickError};
pub use feet::FootPair;
pub use pedal::{Foot, PedalEvent, PedalState};
pub use rig::BikeRig;
pub use steering::{SteerCommand, SteeringState};
