//! Rider input: gamepad triggers and stick, with a keyboard fallback.
//!
//! The pedal axis is one trigger-style value: right trigger pushes toward +1,
//! left trigger toward -1. Steering is the left stick's X axis.

use bevy::input::gamepad::{GamepadConnection, GamepadConnectionEvent};
use bevy::prelude::*;

use crate::config::HostConfig;
use crate::web_bevy::BikeState;

/// Where the pedal and steer values come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PedalSource {
    #[default]
    Keyboard,
    Gamepad(Entity),
}

/// Latest axis values, read once per frame and consumed by the fixed tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct RiderInput {
    pub pedal: f32,
    pub steer: f32,
    pub source: PedalSource,
}

/// Combine both triggers into the signed pedal axis.
pub fn trigger_pedal(right: f32, left: f32) -> f32 {
    (right - left).clamp(-1.0, 1.0)
}

/// Sweep a virtual trigger toward `target`; snaps back faster on release.
pub fn ramp_toward(current: f32, target: f32, dt: f32) -> f32 {
    let rate = if target == 0.0 {
        HostConfig::KEY_RELEASE_RATE
    } else {
        HostConfig::KEY_PEDAL_RATE
    };
    let step = rate * dt;
    if (target - current).abs() <= step {
        target
    } else {
        current + step * (target - current).signum()
    }
}

fn key_axis(keyboard: &ButtonInput<KeyCode>, negative: &[KeyCode], positive: &[KeyCode]) -> f32 {
    let mut axis = 0.0;
    if keyboard.any_pressed(negative.iter().copied()) {
        axis -= 1.0;
    }
    if keyboard.any_pressed(positive.iter().copied()) {
        axis += 1.0;
    }
    axis
}

/// Pick up newly connected pads and fall back to the keyboard when the
/// active pad goes away.
pub fn track_gamepads(mut state: ResMut<BikeState>, mut events: EventReader<GamepadConnectionEvent>) {
    for event in events.read() {
        match &event.connection {
            GamepadConnection::Connected { name, .. } => {
                if state.input.source == PedalSource::Keyboard {
                    state.input.source = PedalSource::Gamepad(event.gamepad);
                    log::info!("pedalling with gamepad {}", name);
                }
            }
            GamepadConnection::Disconnected => {
                if state.input.source == PedalSource::Gamepad(event.gamepad) {
                    state.input.source = PedalSource::Keyboard;
                    log::info!("gamepad disconnected, pedalling with keyboard");
                }
            }
        }
    }
}

/// Read this frame's pedal and steer values and handle toggles.
///
/// Keys: J/L sweep the pedal left/right, A/D or arrows steer, P toggles the
/// control loop, Tab toggles the panel.
pub fn rider_input(
    mut state: ResMut<BikeState>,
    keyboard: Res<ButtonInput<KeyCode>>,
    gamepads: Query<&Gamepad>,
    time: Res<Time>,
) {
    if keyboard.just_pressed(KeyCode::Tab) {
        state.ui_visible = !state.ui_visible;
    }
    if keyboard.just_pressed(KeyCode::KeyP) {
        if state.control.is_active() {
            state.control.disable();
        } else {
            state.control.enable();
        }
    }

    let pad = match state.input.source {
        PedalSource::Gamepad(entity) => gamepads.get(entity).ok(),
        PedalSource::Keyboard => None,
    };

    let (pedal, steer) = match pad {
        Some(pad) => {
            let right = pad.get(GamepadButton::RightTrigger2).unwrap_or(0.0);
            let left = pad.get(GamepadButton::LeftTrigger2).unwrap_or(0.0);
            let stick = pad.get(GamepadAxis::LeftStickX).unwrap_or(0.0);
            (trigger_pedal(right, left), stick)
        }
        None => {
            let target = key_axis(&keyboard, &[KeyCode::KeyJ], &[KeyCode::KeyL]);
            let pedal = ramp_toward(state.input.pedal, target, time.delta_secs());
            let steer = key_axis(
                &keyboard,
                &[KeyCode::KeyA, KeyCode::ArrowLeft],
                &[KeyCode::KeyD, KeyCode::ArrowRight],
            );
            (pedal, steer)
        }
    };

    state.input.pedal = pedal;
    state.input.steer = steer;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triggers_combine_and_clamp() {
        assert_eq!(trigger_pedal(0.7, 0.0), 0.7);
        assert_eq!(trigger_pedal(0.0, 0.4), -0.4);
        assert_eq!(trigger_pedal(1.0, 1.0), 0.0);
        assert_eq!(trigger_pedal(1.5, 0.0), 1.0);
    }

    #[test]
    fn test_ramp_reaches_full_stroke() {
        let dt = 1.0 / 60.0;
        let mut pedal = 0.0;
        for _ in 0..30 {
            pedal = ramp_toward(pedal, 1.0, dt);
            assert!(pedal <= 1.0);
        }
        assert_eq!(pedal, 1.0);
    }

    #[test]
    fn test_ramp_release_returns_to_zero() {
        let dt = 1.0 / 60.0;
        let mut pedal = -1.0;
        for _ in 0..15 {
            pedal = ramp_toward(pedal, 0.0, dt);
        }
        assert_eq!(pedal, 0.0);
    }
}
