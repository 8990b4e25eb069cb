//! The per-tick bike control loop.
//!
//! [`step`] is the whole computation: pedal sampling, drive accumulation and
//! decay, foot relay and steering, with no access to the outside world.
//! [`BikeControlLoop`] owns the state between ticks, handles activation and
//! pushes each tick's output into a [`BikeRig`].

use serde::Serialize;

use crate::config::{BikeConfig, Drivetrain};
use crate::drive::{DriveCommand, DriveForce};
use crate::error::{RigFault, TickError};
use crate::feet::FootPair;
use crate::pedal::{Foot, PedalState};
use crate::rig::BikeRig;
use crate::steering::{SteerCommand, SteeringState};

/// Everything the loop mutates between ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ControlState {
    pub pedal: PedalState,
    pub drive: DriveForce,
    pub steering: SteeringState,
}

/// One tick's worth of sensor data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickInput {
    /// Trigger axis: right foot positive, left foot negative.
    pub pedal: f32,
    /// Stick X axis.
    pub steer: f32,
    pub dt: f32,
    pub foot_targets: FootPair,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickOutput {
    /// Crank torque impulse for this tick's pedal gain (hinge drivetrain only).
    pub crank_impulse: Option<f32>,
    pub drive: DriveCommand,
    pub foot_pops: FootPair,
    pub steer: SteerCommand,
    pub flipped: bool,
}

/// Advance `state` by one tick.
pub fn step(state: &ControlState, input: &TickInput, config: &BikeConfig) -> (ControlState, TickOutput) {
    let mut next = *state;
    let dt = input.dt;

    // 1. pedal
    let event = next.pedal.sample(input.pedal);
    let mut crank_impulse = None;
    if let Some(impulse) = event.impulse() {
        next.drive.accumulate(impulse, config, dt);
        if config.drivetrain == Drivetrain::HingeMotor {
            crank_impulse = Some(impulse * config.pedal_torque_multiplier);
        }
    }

    // 2. drivetrain, then decay
    let drive = next.drive.command(config, dt);
    next.drive.decay(config, dt);

    // 3. feet
    let foot_pops = FootPair::mirror(&input.foot_targets);

    // 4. steering
    let steer = next.steering.resolve(input.steer, config, dt);

    let output = TickOutput {
        crank_impulse,
        drive,
        foot_pops,
        steer,
        flipped: event.flipped(),
    };
    (next, output)
}

fn valid_dt(dt: f32) -> bool {
    dt.is_finite() && dt > 0.0
}

/// Snapshot for overlays and logs.
#[derive(Clone, Debug, Serialize)]
pub struct Telemetry {
    pub active: bool,
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub last_pedal_sample: f32,
    pub foot: Foot,
    pub last_right: f32,
    pub last_left: f32,
    pub force_to_apply: f32,
    pub target_rotation: f32,
    pub turn_rotation: f32,
    pub last_drive: Option<DriveCommand>,
}

pub struct BikeControlLoop {
    config: BikeConfig,
    state: ControlState,
    active: bool,
    ticks: u64,
    skipped_ticks: u64,
    last_pedal_sample: f32,
    last_drive: Option<DriveCommand>,
}

impl BikeControlLoop {
    /// Created inactive; call [`enable`](Self::enable) before ticking.
    pub fn new(config: BikeConfig) -> Self {
        Self {
            config,
            state: ControlState::default(),
            active: false,
            ticks: 0,
            skipped_ticks: 0,
            last_pedal_sample: 0.0,
            last_drive: None,
        }
    }

    pub fn config(&self) -> &BikeConfig {
        &self.config
    }

    pub fn state(&self) -> &ControlState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start sampling from a clean state.
    pub fn enable(&mut self) {
        self.state = ControlState::default();
        self.last_pedal_sample = 0.0;
        self.last_drive = None;
        self.active = true;
        log::info!(
            "bike control enabled ({:?} drivetrain, {:?} steering)",
            self.config.drivetrain,
            self.config.steering
        );
    }

    /// Stop sampling and drop all per-activation state.
    pub fn disable(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.state = ControlState::default();
        log::info!("bike control disabled after {} ticks", self.ticks);
    }

    /// Pure tick against already-gathered input. Returns `None` for an
    /// inactive loop or an unusable `dt`.
    pub fn tick(&mut self, input: &TickInput) -> Option<TickOutput> {
        if !self.active || !valid_dt(input.dt) {
            return None;
        }
        let (next, output) = step(&self.state, input, &self.config);
        self.commit(next, input.pedal, &output);
        Some(output)
    }

    /// Read the rig, tick, and write the result back.
    ///
    /// A faulty rig skips the tick: nothing is committed and the fault is
    /// logged and returned so the host can carry on.
    pub fn drive<R: BikeRig + ?Sized>(
        &mut self,
        pedal: f32,
        steer: f32,
        dt: f32,
        rig: &mut R,
    ) -> Result<Option<TickOutput>, TickError> {
        if !self.active || !valid_dt(dt) {
            return Ok(None);
        }

        match self.try_drive(pedal, steer, dt, rig) {
            Ok(output) => Ok(Some(output)),
            Err(err) => {
                self.skipped_ticks += 1;
                log::warn!("skipping bike tick {}: {}", self.ticks, err);
                Err(err)
            }
        }
    }

    fn try_drive<R: BikeRig + ?Sized>(
        &mut self,
        pedal: f32,
        steer: f32,
        dt: f32,
        rig: &mut R,
    ) -> Result<TickOutput, TickError> {
        rig.check(&self.config).map_err(TickError::NotReady)?;
        let foot_targets = rig.foot_targets().map_err(TickError::NotReady)?;

        let input = TickInput { pedal, steer, dt, foot_targets };
        let (next, output) = step(&self.state, &input, &self.config);
        apply(rig, &output).map_err(TickError::Apply)?;

        self.commit(next, pedal, &output);
        Ok(output)
    }

    fn commit(&mut self, next: ControlState, pedal: f32, output: &TickOutput) {
        self.state = next;
        self.ticks += 1;
        self.last_pedal_sample = pedal;
        self.last_drive = Some(output.drive);
        log::trace!(
            "tick {}: force {:.4}, heading {:.2}",
            self.ticks,
            self.state.drive.value(),
            self.state.steering.last_turn_rotation
        );
    }

    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            active: self.active,
            ticks: self.ticks,
            skipped_ticks: self.skipped_ticks,
            last_pedal_sample: self.last_pedal_sample,
            foot: self.state.pedal.phase,
            last_right: self.state.pedal.last_right,
            last_left: self.state.pedal.last_left,
            force_to_apply: self.state.drive.value(),
            target_rotation: self.state.steering.target_rotation,
            turn_rotation: self.state.steering.last_turn_rotation,
            last_drive: self.last_drive,
        }
    }
}

fn apply<R: BikeRig + ?Sized>(rig: &mut R, output: &TickOutput) -> Result<(), RigFault> {
    rig.drive(&output.drive)?;
    rig.set_foot_pops(&output.foot_pops)?;

    rig.set_proxy_yaw(output.steer.proxy_yaw_deg)?;
    let rotation = rig.proxy_rotation()?;
    rig.set_handlebar_rotation(rotation)?;
    if let Some(angle) = output.steer.front_wheel_deg {
        rig.set_front_wheel_steer(angle)?;
    }

    // Crank push goes last: a rejected tick must not have pushed it.
    if let Some(torque) = output.crank_impulse {
        rig.apply_crank_impulse(torque)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SteeringMode;
    use crate::error::RigPart;
    use nalgebra as na;
    use std::collections::HashSet;

    /// Records every write; parts can be detached to simulate broken handles.
    #[derive(Default)]
    struct RecordingRig {
        detached: HashSet<RigPart>,
        targets: FootPair,
        pops: Option<FootPair>,
        crank_impulses: Vec<f32>,
        drives: Vec<DriveCommand>,
        proxy_yaw: f32,
        handlebars: Option<na::UnitQuaternion<f32>>,
        front_wheel: Option<f32>,
        reject_drive: bool,
    }

    impl RecordingRig {
        fn attached(&self, part: RigPart) -> Result<(), RigFault> {
            if self.detached.contains(&part) {
                Err(RigFault::Missing(part))
            } else {
                Ok(())
            }
        }
    }

    impl BikeRig for RecordingRig {
        fn has(&self, part: RigPart) -> Result<(), RigFault> {
            self.attached(part)
        }

        fn foot_targets(&self) -> Result<FootPair, RigFault> {
            Ok(self.targets)
        }

        fn set_foot_pops(&mut self, pops: &FootPair) -> Result<(), RigFault> {
            self.pops = Some(*pops);
            Ok(())
        }

        fn apply_crank_impulse(&mut self, torque: f32) -> Result<(), RigFault> {
            self.crank_impulses.push(torque);
            Ok(())
        }

        fn drive(&mut self, command: &DriveCommand) -> Result<(), RigFault> {
            if self.reject_drive {
                return Err(RigFault::Stale(RigPart::RearWheel));
            }
            self.drives.push(*command);
            Ok(())
        }

        fn set_proxy_yaw(&mut self, yaw_deg: f32) -> Result<(), RigFault> {
            self.proxy_yaw = yaw_deg;
            Ok(())
        }

        fn proxy_rotation(&self) -> Result<na::UnitQuaternion<f32>, RigFault> {
            Ok(na::UnitQuaternion::from_axis_angle(&na::Vector3::y_axis(), self.proxy_yaw.to_radians()))
        }

        fn set_handlebar_rotation(&mut self, rotation: na::UnitQuaternion<f32>) -> Result<(), RigFault> {
            self.handlebars = Some(rotation);
            Ok(())
        }

        fn set_front_wheel_steer(&mut self, angle_deg: f32) -> Result<(), RigFault> {
            self.front_wheel = Some(angle_deg);
            Ok(())
        }
    }

    fn enabled(config: BikeConfig) -> BikeControlLoop {
        let mut bike = BikeControlLoop::new(config);
        bike.enable();
        bike
    }

    fn input(pedal: f32, steer: f32) -> TickInput {
        TickInput { pedal, steer, dt: 0.02, foot_targets: FootPair::default() }
    }

    #[test]
    fn test_inactive_loop_ignores_ticks() {
        let mut bike = BikeControlLoop::new(BikeConfig::default());
        assert!(bike.tick(&input(-0.5, 0.0)).is_none());
        assert_eq!(bike.telemetry().ticks, 0);
    }

    #[test]
    fn test_non_positive_dt_is_noop() {
        let mut bike = enabled(BikeConfig::default());
        for dt in [0.0, -0.02, f32::NAN] {
            let tick = TickInput { dt, ..input(-0.5, 1.0) };
            assert!(bike.tick(&tick).is_none());
        }
        assert_eq!(*bike.state(), ControlState::default());
    }

    #[test]
    fn test_force_never_negative_and_decays() {
        let mut bike = enabled(BikeConfig::default());
        bike.tick(&input(-1.0, 0.0));
        let mut previous = bike.state().drive.value();
        assert!(previous > 0.0);
        for _ in 0..200 {
            bike.tick(&input(0.0, 0.0));
            let force = bike.state().drive.value();
            assert!(force >= 0.0);
            assert!(force < previous || force == 0.0);
            previous = force;
        }
        assert_eq!(previous, 0.0);
    }

    #[test]
    fn test_impulse_drives_same_tick() {
        let config = BikeConfig { back_wheel_torque_multiplier: 10.0, ..Default::default() };
        let mut bike = enabled(config);
        let output = bike.tick(&input(-0.5, 0.0)).unwrap();
        // 0.5 * 10 * 0.02 is applied before decay takes 0.004 off.
        match output.drive {
            DriveCommand::HingeMotor { target_velocity, force } => {
                assert!((target_velocity - 0.1).abs() < 1e-6);
                assert!((force - 1.0).abs() < 1e-5);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!((bike.state().drive.value() - 0.096).abs() < 1e-6);
        assert_eq!(output.crank_impulse, Some(0.5 * BikeConfig::PEDAL_TORQUE_MULTIPLIER));
    }

    #[test]
    fn test_wheel_torque_has_no_crank_impulse() {
        let config = BikeConfig { drivetrain: Drivetrain::WheelTorque, ..Default::default() };
        let mut bike = enabled(config);
        let output = bike.tick(&input(-0.5, 0.0)).unwrap();
        assert_eq!(output.crank_impulse, None);
        assert!(matches!(output.drive, DriveCommand::WheelTorque { .. }));
    }

    #[test]
    fn test_enable_resets_state() {
        let mut bike = enabled(BikeConfig::default());
        bike.tick(&input(-0.7, 1.0));
        assert_ne!(*bike.state(), ControlState::default());
        bike.disable();
        assert!(!bike.is_active());
        bike.enable();
        assert_eq!(*bike.state(), ControlState::default());
    }

    #[test]
    fn test_drive_writes_every_actuator() {
        let config = BikeConfig { steering: SteeringMode::ProxyAndFrontWheel, ..Default::default() };
        let mut bike = enabled(config);
        let mut rig = RecordingRig {
            targets: FootPair::new(na::Point3::new(0.1, 0.3, 0.0), na::Point3::new(-0.1, 0.2, 0.0)),
            ..Default::default()
        };

        let output = bike.drive(-0.4, 0.5, 0.02, &mut rig).unwrap().unwrap();

        assert_eq!(rig.crank_impulses.len(), 1);
        assert_eq!(rig.drives, vec![output.drive]);
        assert_eq!(rig.pops, Some(rig.targets));
        assert_eq!(rig.proxy_yaw, output.steer.proxy_yaw_deg);
        assert!(rig.handlebars.is_some());
        assert_eq!(rig.front_wheel, Some(output.steer.proxy_yaw_deg));
        assert_eq!(bike.telemetry().last_pedal_sample, -0.4);
    }

    #[test]
    fn test_missing_handle_skips_tick() {
        let mut bike = enabled(BikeConfig::default());
        let mut rig = RecordingRig::default();
        rig.detached.insert(RigPart::Handlebars);

        let err = bike.drive(-0.5, 1.0, 0.02, &mut rig).unwrap_err();
        assert_eq!(err, TickError::NotReady(RigFault::Missing(RigPart::Handlebars)));
        assert!(rig.drives.is_empty());
        assert_eq!(*bike.state(), ControlState::default());
        assert_eq!(bike.telemetry().skipped_ticks, 1);
    }

    #[test]
    fn test_rejected_write_leaves_state_untouched() {
        let mut bike = enabled(BikeConfig::default());
        let mut rig = RecordingRig { reject_drive: true, ..Default::default() };

        let err = bike.drive(-0.5, 0.0, 0.02, &mut rig).unwrap_err();
        assert!(matches!(err, TickError::Apply(RigFault::Stale(RigPart::RearWheel))));
        assert_eq!(*bike.state(), ControlState::default());

        rig.reject_drive = false;
        assert!(bike.drive(-0.5, 0.0, 0.02, &mut rig).unwrap().is_some());
        assert_eq!(bike.telemetry().ticks, 1);
    }

    #[test]
    fn test_retried_tick_pushes_crank_once() {
        let mut bike = enabled(BikeConfig::default());
        let mut rig = RecordingRig { reject_drive: true, ..Default::default() };

        assert!(bike.drive(-0.5, 0.0, 0.02, &mut rig).is_err());
        assert!(rig.crank_impulses.is_empty());

        rig.reject_drive = false;
        bike.drive(-0.5, 0.0, 0.02, &mut rig).unwrap();
        assert_eq!(rig.crank_impulses, vec![0.5 * BikeConfig::PEDAL_TORQUE_MULTIPLIER]);
    }

    #[test]
    fn test_unused_front_wheel_not_required() {
        let mut bike = enabled(BikeConfig::default());
        let mut rig = RecordingRig::default();
        rig.detached.insert(RigPart::FrontWheel);
        assert!(bike.drive(0.0, 0.3, 0.02, &mut rig).is_ok());
        assert_eq!(rig.front_wheel, None);
    }
}
