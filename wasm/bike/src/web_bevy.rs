//! WASM entrypoint for the Bevy bike.
//!
//! Module structure:
//! - camera: Orbit camera that follows the frame
//! - render: Ground grid, foot pop gizmos, visual sync
//! - scene: Camera, light and bike meshes
//! - input: Gamepad triggers and stick with keyboard fallback
//! - simulation: Fixed-tick control loop and physics step
//! - ui: egui telemetry panel

use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use wasm_bindgen::prelude::*;

use bike_control::{BikeConfig, BikeControlLoop};
use bike_physics::BikeWorld;

use crate::config::{load_bike_config, BIKE_JSON};
use crate::input::RiderInput;
use crate::simulation::TelemetryHistory;
use crate::{camera, input, render, scene, simulation, ui};

/// WebHandle for the Bevy bike app.
#[wasm_bindgen]
pub struct WebHandle {}

#[wasm_bindgen]
impl WebHandle {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        console_error_panic_hook::set_once();
        Self {}
    }

    #[wasm_bindgen]
    pub async fn start(&self, canvas: web_sys::HtmlCanvasElement) -> Result<(), JsValue> {
        let canvas_id = canvas.id();
        let selector = if canvas_id.is_empty() {
            "#bevy-canvas".to_string()
        } else {
            format!("#{}", canvas_id)
        };

        App::new()
            .add_plugins(DefaultPlugins.set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Pedal Bike".into(),
                    canvas: Some(selector),
                    fit_canvas_to_parent: true,
                    prevent_default_event_handling: false,
                    ..Default::default()
                }),
                ..Default::default()
            }))
            .add_plugins(EguiPlugin)
            .add_plugins(BikePlugin)
            .run();

        Ok(())
    }

    #[wasm_bindgen]
    pub fn destroy(&self) {}

    #[wasm_bindgen]
    pub fn has_panicked(&self) -> bool {
        false
    }
}

impl Default for WebHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Bike plugin for Bevy.
pub struct BikePlugin;

impl Plugin for BikePlugin {
    fn build(&self, app: &mut App) {
        let state = BikeState::default();
        let tick = state.control.config().fixed_dt as f64;

        app.insert_resource(ClearColor(Color::BLACK))
            .insert_resource(Time::<Fixed>::from_seconds(tick))
            .insert_resource(state)
            .add_systems(Startup, scene::setup_scene)
            .add_systems(FixedUpdate, simulation::bike_step)
            .add_systems(Update, input::track_gamepads)
            .add_systems(Update, input::rider_input.after(input::track_gamepads))
            .add_systems(Update, camera::camera_input)
            .add_systems(Update, scene::spawn_bike_visuals)
            .add_systems(Update, render::draw_ground_grid)
            .add_systems(Update, render::draw_foot_pops)
            .add_systems(Update, render::sync_visuals.after(scene::spawn_bike_visuals))
            .add_systems(Update, camera::follow_bike.after(render::sync_visuals))
            .add_systems(Update, camera::camera_follow.after(camera::follow_bike))
            .add_systems(Update, ui::ui_system.after(camera::camera_follow));
    }
}

/// Main simulation state.
#[derive(Resource)]
pub struct BikeState {
    pub world: BikeWorld,
    pub control: BikeControlLoop,
    pub input: RiderInput,
    pub history: TelemetryHistory,
    pub last_fault: Option<String>,
    pub ui_visible: bool,
    /// Set when the rig was rebuilt and its meshes must be respawned.
    pub visuals_dirty: bool,
}

impl BikeState {
    /// Fresh world and an enabled control loop for `config`.
    pub fn with_config(config: BikeConfig) -> Self {
        let world = BikeWorld::new(&config);
        let mut control = BikeControlLoop::new(config);
        control.enable();

        Self {
            world,
            control,
            input: RiderInput::default(),
            history: TelemetryHistory::default(),
            last_fault: None,
            ui_visible: true,
            visuals_dirty: true,
        }
    }

    /// Rebuild the rig for `config`, keeping the rider's input source and
    /// whether the control loop was running.
    pub fn rebuild(&mut self, config: BikeConfig) {
        let input = self.input;
        let ui_visible = self.ui_visible;
        let active = self.control.is_active();
        *self = Self::with_config(config);
        self.input = input;
        self.ui_visible = ui_visible;
        if !active {
            self.control.disable();
        }
    }
}

impl Default for BikeState {
    fn default() -> Self {
        Self::with_config(load_bike_config(BIKE_JSON))
    }
}

#[wasm_bindgen(start)]
pub fn wasm_main() {}

#[cfg(test)]
mod tests {
    use super::*;
    use bike_control::Drivetrain;

    #[test]
    fn test_rebuild_keeps_disabled_loop_off() {
        let mut state = BikeState::with_config(BikeConfig::default());
        state.control.disable();
        state.ui_visible = false;

        state.rebuild(BikeConfig { drivetrain: Drivetrain::WheelTorque, ..Default::default() });
        assert!(!state.control.is_active());
        assert!(!state.ui_visible);
        assert!(state.visuals_dirty);
        assert_eq!(state.world.drivetrain(), Drivetrain::WheelTorque);
    }

    #[test]
    fn test_rebuild_keeps_running_loop_on() {
        let mut state = BikeState::with_config(BikeConfig::default());
        state.rebuild(BikeConfig { drivetrain: Drivetrain::WheelTorque, ..Default::default() });
        assert!(state.control.is_active());
    }
}
