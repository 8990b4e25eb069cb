//! Rapier3D world and bike rig driven by `bike-control`.

pub mod physics;
pub mod rig;

pub use physics::PhysicsWorld;
pub use rig::{BikeGeometry, BikeLink, BikeWorld};
