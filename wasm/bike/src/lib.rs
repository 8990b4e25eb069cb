//! Pedal-driven bike WASM app - Bevy 3D + Rapier physics.

pub mod config;

// Bevy modules
pub mod camera;
pub mod input;
pub mod render;
pub mod scene;
pub mod simulation;
pub mod ui;

mod web_bevy;
pub use web_bevy::{BikePlugin, BikeState, WebHandle};
