//! egui telemetry panel.

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};

use bike_control::{DriveCommand, Drivetrain, Foot, SteeringMode};

use crate::camera::CameraOrbit;
use crate::input::PedalSource;
use crate::web_bevy::BikeState;

/// Main UI system - renders the bike panel
pub fn ui_system(mut contexts: EguiContexts, mut state: ResMut<BikeState>, mut orbit: ResMut<CameraOrbit>) {
    if !state.ui_visible {
        return;
    }
    let ctx = contexts.ctx_mut();

    // Edit copies; changes are applied after the window closure returns
    let telemetry = state.control.telemetry();
    let mut config = state.control.config().clone();
    let mut active = telemetry.active;

    egui::Window::new("Bike")
        .default_pos(egui::pos2(12.0, 12.0))
        .default_width(280.0)
        .show(ctx, |ui| {
            egui::CollapsingHeader::new("Rig")
                .default_open(true)
                .show(ui, |ui| {
                    ui.checkbox(&mut active, "Control enabled (P)");
                    egui::ComboBox::from_label("Drivetrain")
                        .selected_text(format!("{:?}", config.drivetrain))
                        .show_ui(ui, |ui| {
                            ui.selectable_value(&mut config.drivetrain, Drivetrain::HingeMotor, "HingeMotor");
                            ui.selectable_value(&mut config.drivetrain, Drivetrain::WheelTorque, "WheelTorque");
                        });
                    egui::ComboBox::from_label("Steering")
                        .selected_text(format!("{:?}", config.steering))
                        .show_ui(ui, |ui| {
                            ui.selectable_value(&mut config.steering, SteeringMode::ProxyOnly, "ProxyOnly");
                            ui.selectable_value(
                                &mut config.steering,
                                SteeringMode::ProxyAndFrontWheel,
                                "ProxyAndFrontWheel",
                            );
                        });
                });

            egui::CollapsingHeader::new("Input")
                .default_open(true)
                .show(ui, |ui| {
                    let source = match state.input.source {
                        PedalSource::Keyboard => "keyboard (J/L pedal, A/D steer)".to_string(),
                        PedalSource::Gamepad(entity) => format!("gamepad {:?}", entity),
                    };
                    ui.label(format!("Source: {}", source));
                    ui.label(format!("Pedal {:+.2}  Steer {:+.2}", state.input.pedal, state.input.steer));
                    let foot = match telemetry.foot {
                        Foot::Right => "right",
                        Foot::Left => "left",
                    };
                    ui.label(format!(
                        "Active foot: {}  (R {:.2} / L {:.2})",
                        foot, telemetry.last_right, telemetry.last_left
                    ));
                });

            egui::CollapsingHeader::new("Drive")
                .default_open(true)
                .show(ui, |ui| {
                    ui.label(format!("Pending force: {:.3}", telemetry.force_to_apply));
                    match telemetry.last_drive {
                        Some(DriveCommand::HingeMotor { target_velocity, force }) => {
                            ui.monospace(format!("motor vel {:.3}  force {:.1}", target_velocity, force));
                        }
                        Some(DriveCommand::WheelTorque { motor_torque, crank_rotation_deg }) => {
                            ui.monospace(format!("torque {:.3}  crank +{:.2}°", motor_torque, crank_rotation_deg));
                        }
                        None => {
                            ui.monospace("idle");
                        }
                    }
                    ui.label(format!(
                        "Heading {:+.1}° (target {:+.1}°)",
                        telemetry.turn_rotation, telemetry.target_rotation
                    ));
                    ui.label(format!("Ticks {}  skipped {}", telemetry.ticks, telemetry.skipped_ticks));
                    if let Some(fault) = &state.last_fault {
                        ui.colored_label(egui::Color32::from_rgb(255, 120, 90), fault);
                    }
                });

            // Time series graph of the last few seconds
            egui::CollapsingHeader::new("History")
                .default_open(false)
                .show(ui, |ui| {
                    use egui_plot::{Line, Plot, PlotPoints};

                    if state.history.is_empty() {
                        ui.label("No data yet...");
                        return;
                    }
                    let pedal: PlotPoints = state.history.samples().map(|s| [s.time as f64, s.pedal as f64]).collect();
                    let force: PlotPoints = state.history.samples().map(|s| [s.time as f64, s.force as f64]).collect();
                    // Heading is normalised so all three lines share the [-1, 1] band
                    let scale = config.turn_scale.max(f32::EPSILON) as f64;
                    let heading: PlotPoints = state
                        .history
                        .samples()
                        .map(|s| [s.time as f64, s.heading as f64 / scale])
                        .collect();

                    Plot::new("bike_plot")
                        .height(150.0)
                        .include_y(-1.0)
                        .include_y(1.0)
                        .show(ui, |plot_ui| {
                            plot_ui.line(Line::new(pedal).color(egui::Color32::from_rgb(255, 200, 100)).name("pedal"));
                            plot_ui.line(Line::new(force).color(egui::Color32::from_rgb(255, 100, 100)).name("force"));
                            plot_ui.line(Line::new(heading).color(egui::Color32::from_rgb(100, 200, 255)).name("heading"));
                        });
                });

            egui::CollapsingHeader::new("Camera")
                .default_open(false)
                .show(ui, |ui| {
                    ui.checkbox(&mut orbit.following, "Follow Bike");
                    ui.add(egui::Slider::new(&mut orbit.distance, 0.5..=10.0).text("Distance"));
                    ui.label("Drag to Orbit, Shift+Drag to Pan, Scroll to Zoom");
                });
        });

    // Drivetrain or steering switch needs a new rig
    if &config != state.control.config() {
        log::info!("rebuilding bike for {:?} / {:?}", config.drivetrain, config.steering);
        state.rebuild(config);
    } else if active != telemetry.active {
        if active {
            state.control.enable();
        } else {
            state.control.disable();
        }
    }
}
