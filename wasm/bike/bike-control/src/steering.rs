//! Handlebar steering resolver.
//!
//! The stick axis sets a target heading, the heading eases toward it at
//! `turn_speed` per second and the result stays inside `±turn_scale`.
//! Angles are in degrees.

use serde::Serialize;

use crate::config::{BikeConfig, SteeringMode};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SteeringState {
    pub target_rotation: f32,
    pub last_turn_rotation: f32,
}

/// Where the resolved heading goes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SteerCommand {
    /// Local yaw for the handlebar proxy.
    pub proxy_yaw_deg: f32,
    /// Front wheel steer angle, when the front wheel steers.
    pub front_wheel_deg: Option<f32>,
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

impl SteeringState {
    pub fn resolve(&mut self, axis: f32, config: &BikeConfig, dt: f32) -> SteerCommand {
        let scale = config.turn_scale;
        let x = if axis.is_finite() { axis.clamp(-1.0, 1.0) } else { 0.0 };

        self.target_rotation = x * scale;
        let target = self.target_rotation.clamp(-scale, scale);
        // Both ends are inside the range so the blend is too; clamp again for float slop.
        self.last_turn_rotation =
            lerp(self.last_turn_rotation, target, config.turn_speed * dt).clamp(-scale, scale);

        let heading = self.last_turn_rotation;
        SteerCommand {
            proxy_yaw_deg: heading,
            front_wheel_deg: match config.steering {
                SteeringMode::ProxyOnly => None,
                SteeringMode::ProxyAndFrontWheel => Some(heading),
            },
        }
    }
}
