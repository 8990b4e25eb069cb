//! Actuator and sensor interface between the control loop and whatever owns
//! the physics bodies.

use nalgebra as na;

use crate::config::{BikeConfig, SteeringMode};
use crate::drive::DriveCommand;
use crate::error::{RigFault, RigPart};
use crate::feet::FootPair;

/// Handles the bike reads from and writes to once per tick.
///
/// Implementations report absent handles as [`RigFault::Missing`] and handles
/// that no longer resolve as [`RigFault::Stale`]. The control loop calls
/// [`BikeRig::check`] before computing a tick so a broken rig skips the tick
/// instead of half-applying it.
pub trait BikeRig {
    /// Whether `part` is attached and resolvable.
    fn has(&self, part: RigPart) -> Result<(), RigFault>;

    fn foot_targets(&self) -> Result<FootPair, RigFault>;
    fn set_foot_pops(&mut self, pops: &FootPair) -> Result<(), RigFault>;

    /// Impulse torque around the crank axle.
    fn apply_crank_impulse(&mut self, torque: f32) -> Result<(), RigFault>;
    fn drive(&mut self, command: &DriveCommand) -> Result<(), RigFault>;

    fn set_proxy_yaw(&mut self, yaw_deg: f32) -> Result<(), RigFault>;
    /// World rotation of the handlebar proxy after its yaw was set.
    fn proxy_rotation(&self) -> Result<na::UnitQuaternion<f32>, RigFault>;
    fn set_handlebar_rotation(&mut self, rotation: na::UnitQuaternion<f32>) -> Result<(), RigFault>;
    fn set_front_wheel_steer(&mut self, angle_deg: f32) -> Result<(), RigFault>;

    /// Verify every part the configured variants touch.
    fn check(&self, config: &BikeConfig) -> Result<(), RigFault> {
        for part in required_parts(config) {
            self.has(part)?;
        }
        Ok(())
    }
}

pub fn required_parts(config: &BikeConfig) -> Vec<RigPart> {
    let mut parts = vec![
        RigPart::Crank,
        RigPart::RearWheel,
        RigPart::HandlebarProxy,
        RigPart::Handlebars,
        RigPart::RightFootTarget,
        RigPart::LeftFootTarget,
        RigPart::RightFootPop,
        RigPart::LeftFootPop,
    ];
    if config.steering == SteeringMode::ProxyAndFrontWheel {
        parts.push(RigPart::FrontWheel);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_front_wheel_only_needed_when_steered() {
        let base = BikeConfig::default();
        assert!(!required_parts(&base).contains(&RigPart::FrontWheel));

        let steered = BikeConfig { steering: SteeringMode::ProxyAndFrontWheel, ..Default::default() };
        assert!(required_parts(&steered).contains(&RigPart::FrontWheel));
    }
}
