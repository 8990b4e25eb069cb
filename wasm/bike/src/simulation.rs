//! Fixed-tick simulation: control loop, then physics.

use std::collections::VecDeque;

use bevy::prelude::*;

use crate::config::HostConfig;
use crate::web_bevy::BikeState;

/// One graph sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistorySample {
    pub time: f32,
    pub pedal: f32,
    pub force: f32,
    pub heading: f32,
}

/// Rolling window of recent ticks for the telemetry graph.
#[derive(Debug, Default)]
pub struct TelemetryHistory {
    samples: VecDeque<HistorySample>,
    elapsed: f32,
}

impl TelemetryHistory {
    pub fn record(&mut self, dt: f32, pedal: f32, force: f32, heading: f32) {
        self.elapsed += dt;
        if self.samples.len() == HostConfig::HISTORY_LEN {
            self.samples.pop_front();
        }
        self.samples.push_back(HistorySample {
            time: self.elapsed,
            pedal,
            force,
            heading,
        });
    }

    pub fn samples(&self) -> impl Iterator<Item = &HistorySample> {
        self.samples.iter()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Drive the bike from the latest rider input and advance physics.
pub fn bike_step(mut state: ResMut<BikeState>, time: Res<Time<Fixed>>) {
    let dt = time.delta_secs();
    let BikeState {
        world,
        control,
        input,
        history,
        last_fault,
        ..
    } = &mut *state;

    // The loop logs skipped ticks itself.
    match control.drive(input.pedal, input.steer, dt, world) {
        Ok(_) => *last_fault = None,
        Err(err) => *last_fault = Some(err.to_string()),
    }
    world.step();

    if control.is_active() {
        let telemetry = control.telemetry();
        history.record(dt, input.pedal, telemetry.force_to_apply, telemetry.turn_rotation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_keeps_latest_window() {
        let mut history = TelemetryHistory::default();
        for i in 0..HostConfig::HISTORY_LEN + 10 {
            history.record(0.02, 0.0, i as f32, 0.0);
        }
        assert_eq!(history.len(), HostConfig::HISTORY_LEN);
        let first = history.samples().next().unwrap();
        assert_eq!(first.force, 10.0);
        let last = history.samples().last().unwrap();
        assert_eq!(last.force, (HostConfig::HISTORY_LEN + 9) as f32);
    }
}
