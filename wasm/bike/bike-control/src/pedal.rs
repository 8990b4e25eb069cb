//! Pedal input sampler.
//!
//! Turns a trigger-style axis into alternating-foot impulses. Only the gain
//! since the active foot's last sample counts, and once that foot reaches the
//! end of its stroke the other foot has to take over. Right foot travels
//! `0 → 1`, left foot `0 → -1`.

use serde::Serialize;

/// Which foot is currently pushing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Foot {
    Right,
    #[default]
    Left,
}

impl Foot {
    pub fn other(self) -> Self {
        match self {
            Foot::Right => Foot::Left,
            Foot::Left => Foot::Right,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PedalState {
    pub last_right: f32,
    pub last_left: f32,
    pub phase: Foot,
}

/// Result of one sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PedalEvent {
    /// Active foot gained this much travel.
    Impulse(f32),
    /// Active foot gained travel and reached the end of its stroke.
    ImpulseAndFlip(f32),
    /// Active foot was already at the end of its stroke.
    Flip,
    Idle,
}

impl PedalEvent {
    pub fn impulse(self) -> Option<f32> {
        match self {
            PedalEvent::Impulse(f) | PedalEvent::ImpulseAndFlip(f) => Some(f),
            PedalEvent::Flip | PedalEvent::Idle => None,
        }
    }

    pub fn flipped(self) -> bool {
        matches!(self, PedalEvent::Flip | PedalEvent::ImpulseAndFlip(_))
    }
}

impl PedalState {
    pub fn on_right(&self) -> bool {
        self.phase == Foot::Right
    }

    /// Feed one axis sample. Non-finite samples are ignored.
    pub fn sample(&mut self, value: f32) -> PedalEvent {
        if !value.is_finite() {
            return PedalEvent::Idle;
        }
        let v = value.clamp(-1.0, 1.0);

        match self.phase {
            Foot::Right => {
                if self.last_right >= 1.0 {
                    self.bottom_out();
                    return PedalEvent::Flip;
                }
                if v <= self.last_right {
                    return PedalEvent::Idle;
                }
                let impulse = v - self.last_right;
                self.last_right = v;
                if self.last_right >= 1.0 {
                    self.bottom_out();
                    PedalEvent::ImpulseAndFlip(impulse)
                } else {
                    PedalEvent::Impulse(impulse)
                }
            }
            Foot::Left => {
                if self.last_left <= -1.0 {
                    self.bottom_out();
                    return PedalEvent::Flip;
                }
                if v >= self.last_left {
                    return PedalEvent::Idle;
                }
                let impulse = (v - self.last_left).abs();
                self.last_left = v;
                if self.last_left <= -1.0 {
                    self.bottom_out();
                    PedalEvent::ImpulseAndFlip(impulse)
                } else {
                    PedalEvent::Impulse(impulse)
                }
            }
        }
    }

    /// Hand the stroke to the other foot and rearm it from zero.
    fn bottom_out(&mut self) {
        match self.phase {
            Foot::Right => self.last_left = 0.0,
            Foot::Left => self.last_right = 0.0,
        }
        self.phase = self.phase.other();
        log::debug!("pedal bottomed out, now on {:?} foot", self.phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn right_from(last_right: f32) -> PedalState {
        PedalState { last_right, last_left: 0.0, phase: Foot::Right }
    }

    #[test]
    fn test_starts_on_left_foot() {
        let state = PedalState::default();
        assert!(!state.on_right());
        assert_eq!(state.last_left, 0.0);
    }

    #[test]
    fn test_documented_stroke() {
        let mut state = right_from(0.5);
        let events: Vec<PedalEvent> = [0.6, 0.8, 1.0].iter().map(|&v| state.sample(v)).collect();

        let impulses: Vec<f32> = events.iter().filter_map(|e| e.impulse()).collect();
        assert_eq!(impulses.len(), 3);
        for (got, want) in impulses.iter().zip([0.1, 0.2, 0.2]) {
            assert!((got - want).abs() < 1e-6, "{} vs {}", got, want);
        }
        assert!(events[2].flipped());
        assert!(!state.on_right());
        assert_eq!(state.last_left, 0.0);
    }

    #[test]
    fn test_increasing_stroke_telescopes() {
        let start = 0.13;
        let mut state = right_from(start);
        let mut total = 0.0;
        let mut flips = 0;
        let mut v = start;
        while v < 1.2 {
            v += 0.07;
            let event = state.sample(v);
            total += event.impulse().unwrap_or(0.0);
            if event.flipped() {
                flips += 1;
                break;
            }
        }
        assert!((total - (1.0 - start)).abs() < 1e-5);
        assert_eq!(flips, 1);
        assert_eq!(state.phase, Foot::Left);
    }

    #[test]
    fn test_release_does_not_emit() {
        let mut state = right_from(0.4);
        assert_eq!(state.sample(0.2), PedalEvent::Idle);
        assert_eq!(state.sample(-0.5), PedalEvent::Idle);
        assert_eq!(state.last_right, 0.4);
    }

    #[test]
    fn test_left_stroke_emits_magnitude() {
        let mut state = PedalState::default();
        assert_eq!(state.sample(-0.25), PedalEvent::Impulse(0.25));
        assert_eq!(state.sample(-1.0), PedalEvent::ImpulseAndFlip(0.75));
        assert!(state.on_right());
        assert_eq!(state.last_right, 0.0);
    }

    #[test]
    fn test_new_foot_silent_on_flip_tick() {
        // Left bottoms out; the same sample must not count for the right foot.
        let mut state = PedalState { last_right: 0.0, last_left: -0.9, phase: Foot::Left };
        let event = state.sample(-1.0);
        assert!(event.flipped());
        assert_eq!(state.last_right, 0.0);
    }

    #[test]
    fn test_stored_extreme_flips_without_impulse() {
        let mut state = right_from(1.0);
        assert_eq!(state.sample(1.0), PedalEvent::Flip);
        assert_eq!(state.phase, Foot::Left);
    }

    #[test]
    fn test_out_of_range_sample_clamped() {
        let mut state = right_from(0.5);
        assert_eq!(state.sample(3.0), PedalEvent::ImpulseAndFlip(0.5));
    }

    #[test]
    fn test_nan_sample_ignored() {
        let mut state = right_from(0.5);
        assert_eq!(state.sample(f32::NAN), PedalEvent::Idle);
        assert_eq!(state, right_from(0.5));
    }

    #[test]
    fn test_phase_alternates_over_long_sequence() {
        let mut state = PedalState::default();
        let mut flips = 0;
        // Sweep the full axis back and forth; each sweep end bottoms out one foot.
        for i in 0..400 {
            let t = i as f32 * 0.05;
            let event = state.sample(1.2 * t.sin());
            if event.flipped() {
                flips += 1;
            }
            assert!(state.last_right >= 0.0 && state.last_right <= 1.0);
            assert!(state.last_left <= 0.0 && state.last_left >= -1.0);
        }
        assert!(flips > 2);
    }
}
