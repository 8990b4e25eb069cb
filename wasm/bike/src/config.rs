use bike_control::BikeConfig;

/// Tuning shipped with the app.
pub const BIKE_JSON: &str = include_str!("../assets/bike.json");

pub struct HostConfig;

impl HostConfig {
    // Keyboard pedal: how fast a held key sweeps the virtual trigger (units/s)
    pub const KEY_PEDAL_RATE: f32 = 3.0;
    pub const KEY_RELEASE_RATE: f32 = 6.0;

    // Telemetry graph
    pub const HISTORY_LEN: usize = 300;

    pub const CAMERA_DISTANCE: f32 = 3.5;
}

/// Parse the bike tuning, falling back to defaults when it is unusable.
pub fn load_bike_config(json: &str) -> BikeConfig {
    match BikeConfig::from_json(json) {
        Ok(config) => config,
        Err(err) => {
            log::warn!("using default bike config: {}", err);
            BikeConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bike_control::{Drivetrain, SteeringMode};

    #[test]
    fn test_shipped_config_loads() {
        let config = BikeConfig::from_json(BIKE_JSON).unwrap();
        assert_eq!(config.drivetrain, Drivetrain::HingeMotor);
        assert_eq!(config.steering, SteeringMode::ProxyAndFrontWheel);
        assert_eq!(load_bike_config(BIKE_JSON), config);
    }

    #[test]
    fn test_bad_config_falls_back_to_defaults() {
        assert_eq!(load_bike_config("{ not json"), BikeConfig::default());
        assert_eq!(load_bike_config(r#"{"fixed_dt": 0.0}"#), BikeConfig::default());
    }
}
