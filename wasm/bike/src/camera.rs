//! Orbit camera that follows the bike frame.

use bevy::prelude::*;

use crate::config::HostConfig;
use crate::web_bevy::BikeState;

/// Main camera marker.
#[derive(Component)]
pub struct MainCamera;

/// Camera orbit state.
#[derive(Resource)]
pub struct CameraOrbit {
    pub target: Vec3,
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
    pub following: bool,
}

impl Default for CameraOrbit {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            distance: HostConfig::CAMERA_DISTANCE,
            yaw: 30.0_f32.to_radians(),
            pitch: 20.0_f32.to_radians(),
            following: true,
        }
    }
}

impl CameraOrbit {
    // Y = 0 is the physics ground
    pub const MIN_HEIGHT: f32 = 0.3;

    /// Eye position for the current orbit, kept above the ground.
    pub fn eye(&self) -> Vec3 {
        let mut pos = self.target
            + Vec3::new(
                self.distance * self.yaw.sin() * self.pitch.cos(),
                self.distance * self.pitch.sin(),
                self.distance * self.yaw.cos() * self.pitch.cos(),
            );
        pos.y = pos.y.max(Self::MIN_HEIGHT);
        pos
    }
}

/// Drag to orbit, shift+drag to pan, scroll to zoom.
pub fn camera_input(
    mut orbit: ResMut<CameraOrbit>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    mut mouse_motion: EventReader<bevy::input::mouse::MouseMotion>,
    mut mouse_wheel: EventReader<bevy::input::mouse::MouseWheel>,
) {
    let shift_held = keyboard.pressed(KeyCode::ShiftLeft) || keyboard.pressed(KeyCode::ShiftRight);
    let sensitivity = 0.005;

    // Handle mouse drag
    if mouse_button.pressed(MouseButton::Left) || mouse_button.pressed(MouseButton::Middle) {
        for ev in mouse_motion.read() {
            if shift_held || mouse_button.pressed(MouseButton::Middle) {
                // Pan mode: Shift+Drag or Middle Mouse. Panning detaches the camera from the bike
                let right = Vec3::new(orbit.yaw.cos(), 0.0, -orbit.yaw.sin());
                let scale = sensitivity * orbit.distance;
                orbit.target -= right * ev.delta.x * scale;
                orbit.target += Vec3::Y * ev.delta.y * scale;
                orbit.following = false;
            } else {
                // Orbit mode: regular drag
                orbit.yaw -= ev.delta.x * sensitivity;
                // Clamp pitch to avoid gimbal lock
                orbit.pitch = (orbit.pitch + ev.delta.y * sensitivity).clamp(-1.4, 1.4);
            }
        }
    } else {
        // Clear events when not dragging
        mouse_motion.clear();
    }

    // Handle scroll zoom
    for ev in mouse_wheel.read() {
        orbit.distance = (orbit.distance - ev.y * 0.1).clamp(0.5, 20.0);
    }
}

/// Keep the orbit target on the frame while following.
pub fn follow_bike(state: Res<BikeState>, mut orbit: ResMut<CameraOrbit>) {
    if !orbit.following {
        return;
    }
    if let Some(pose) = state.world.frame_pose() {
        let t = pose.translation;
        orbit.target = Vec3::new(t.x, t.y, t.z);
    }
}

/// Place the camera from the orbit parameters
pub fn camera_follow(orbit: Res<CameraOrbit>, mut camera_query: Query<&mut Transform, With<MainCamera>>) {
    if let Ok(mut camera_transform) = camera_query.get_single_mut() {
        *camera_transform = Transform::from_translation(orbit.eye()).looking_at(orbit.target, Vec3::Y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eye_stays_above_ground() {
        let orbit = CameraOrbit {
            pitch: -1.2,
            ..Default::default()
        };
        assert_eq!(orbit.eye().y, CameraOrbit::MIN_HEIGHT);
    }

    #[test]
    fn test_eye_at_orbit_distance() {
        let orbit = CameraOrbit {
            target: Vec3::new(1.0, 0.5, -2.0),
            ..Default::default()
        };
        assert!((orbit.eye().distance(orbit.target) - orbit.distance).abs() < 1e-4);
    }
}
