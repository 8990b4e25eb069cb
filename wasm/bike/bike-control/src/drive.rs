//! Drive force accumulation and drivetrain commands.

use serde::Serialize;

use crate::config::{BikeConfig, Drivetrain};

/// What the rear drivetrain receives each tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum DriveCommand {
    /// Revolute joint motor.
    HingeMotor { target_velocity: f32, force: f32 },
    /// Wheel engine torque plus a cosmetic crank rotation (degrees).
    WheelTorque { motor_torque: f32, crank_rotation_deg: f32 },
}

/// Pending drive force. Never negative.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DriveForce {
    force_to_apply: f32,
}

impl DriveForce {
    pub fn new(force_to_apply: f32) -> Self {
        Self { force_to_apply: force_to_apply.max(0.0) }
    }

    pub fn value(&self) -> f32 {
        self.force_to_apply
    }

    /// Bank a pedal impulse.
    pub fn accumulate(&mut self, impulse: f32, config: &BikeConfig, dt: f32) {
        self.force_to_apply += impulse * config.back_wheel_torque_multiplier * dt;
    }

    /// Command for the configured drivetrain at the current force.
    pub fn command(&self, config: &BikeConfig, dt: f32) -> DriveCommand {
        let f = self.force_to_apply;
        match config.drivetrain {
            Drivetrain::HingeMotor => DriveCommand::HingeMotor {
                target_velocity: f,
                force: f * config.back_wheel_torque_multiplier,
            },
            Drivetrain::WheelTorque => DriveCommand::WheelTorque {
                motor_torque: f,
                crank_rotation_deg: f * config.pedal_torque_multiplier * dt,
            },
        }
    }

    /// Linear decay with a hard floor at zero.
    pub fn decay(&mut self, config: &BikeConfig, dt: f32) {
        if self.force_to_apply > 0.0 {
            self.force_to_apply -= dt * config.decay_rate();
        }
        if self.force_to_apply < 0.0 {
            self.force_to_apply = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BikeConfig {
        BikeConfig { back_wheel_torque_multiplier: 10.0, ..Default::default() }
    }

    #[test]
    fn test_accumulation_increments() {
        let config = config();
        let mut drive = DriveForce::default();
        let mut seen = Vec::new();
        for impulse in [0.1, 0.2, 0.2] {
            drive.accumulate(impulse, &config, 0.02);
            seen.push(drive.value());
        }
        for (got, want) in seen.iter().zip([0.02, 0.06, 0.10]) {
            assert!((got - want).abs() < 1e-6, "{} vs {}", got, want);
        }
    }

    #[test]
    fn test_decay_reaches_zero_after_thirteen_ticks() {
        let config = config();
        let mut drive = DriveForce::new(0.05);
        let mut previous = drive.value();
        for tick in 1..=12 {
            drive.decay(&config, 0.02);
            assert!(drive.value() < previous, "tick {}", tick);
            assert!(drive.value() > 0.0, "tick {}", tick);
            assert!((previous - drive.value() - 0.004).abs() < 1e-6);
            previous = drive.value();
        }
        drive.decay(&config, 0.02);
        assert_eq!(drive.value(), 0.0);
        for _ in 0..5 {
            drive.decay(&config, 0.02);
            assert_eq!(drive.value(), 0.0);
        }
    }

    #[test]
    fn test_hinge_motor_command() {
        let config = config();
        let drive = DriveForce::new(0.5);
        assert_eq!(
            drive.command(&config, 0.02),
            DriveCommand::HingeMotor { target_velocity: 0.5, force: 5.0 }
        );
    }

    #[test]
    fn test_wheel_torque_command() {
        let config = BikeConfig {
            drivetrain: Drivetrain::WheelTorque,
            pedal_torque_multiplier: 4.0,
            ..config()
        };
        let drive = DriveForce::new(0.5);
        match drive.command(&config, 0.5) {
            DriveCommand::WheelTorque { motor_torque, crank_rotation_deg } => {
                assert_eq!(motor_torque, 0.5);
                assert_eq!(crank_rotation_deg, 1.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_negative_seed_floors_at_zero() {
        assert_eq!(DriveForce::new(-3.0).value(), 0.0);
    }
}
