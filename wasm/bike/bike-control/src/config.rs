use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How drive force reaches the rear wheel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Drivetrain {
    /// Rear wheel on a revolute joint; force drives the joint motor.
    #[default]
    HingeMotor,
    /// Ray-cast wheel; force is written as engine torque and the crank spins cosmetically.
    WheelTorque,
}

/// Where the smoothed steering heading is written.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteeringMode {
    /// Handlebar proxy only.
    #[default]
    ProxyOnly,
    /// Handlebar proxy plus the front wheel's steer angle.
    ProxyAndFrontWheel,
}

/// Per-bike tuning. Set once before activation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BikeConfig {
    /// Crank torque impulse per unit of pedal travel.
    pub pedal_torque_multiplier: f32,
    /// Scales both drive accumulation and its decay.
    pub back_wheel_torque_multiplier: f32,
    /// Maximum handlebar deflection in degrees.
    pub turn_scale: f32,
    /// Steering smoothing rate (1/s).
    pub turn_speed: f32,
    pub drivetrain: Drivetrain,
    pub steering: SteeringMode,
    /// Host fixed timestep in seconds.
    pub fixed_dt: f32,
}

impl BikeConfig {
    pub const PEDAL_TORQUE_MULTIPLIER: f32 = 2.0;
    pub const BACK_WHEEL_TORQUE_MULTIPLIER: f32 = 10.0;
    pub const TURN_SCALE: f32 = 30.0;
    pub const TURN_SPEED: f32 = 5.0;
    pub const FIXED_DT: f32 = 0.02;

    /// Divisor applied to the back wheel multiplier to get the per-second decay.
    pub const DECAY_DIVISOR: f32 = 50.0;

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let multipliers = [
            ("pedal_torque_multiplier", self.pedal_torque_multiplier),
            ("back_wheel_torque_multiplier", self.back_wheel_torque_multiplier),
            ("turn_scale", self.turn_scale),
            ("turn_speed", self.turn_speed),
        ];
        for (field, value) in multipliers {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        if !self.fixed_dt.is_finite() || self.fixed_dt <= 0.0 {
            return Err(ConfigError::OutOfRange {
                field: "fixed_dt",
                value: self.fixed_dt,
            });
        }
        Ok(())
    }

    /// Per-second decay of pending drive force.
    pub fn decay_rate(&self) -> f32 {
        self.back_wheel_torque_multiplier / Self::DECAY_DIVISOR
    }
}

impl Default for BikeConfig {
    fn default() -> Self {
        Self {
            pedal_torque_multiplier: Self::PEDAL_TORQUE_MULTIPLIER,
            back_wheel_torque_multiplier: Self::BACK_WHEEL_TORQUE_MULTIPLIER,
            turn_scale: Self::TURN_SCALE,
            turn_speed: Self::TURN_SPEED,
            drivetrain: Drivetrain::default(),
            steering: SteeringMode::default(),
            fixed_dt: Self::FIXED_DT,
        }
    }
}
