//! Breathing sway
//!
//! A slow pitch oscillation on the spine with a slower roll underneath. The
//! phase comes from the peer id so a row of avatars never breathes in unison.

use std::f64::consts::TAU;

use serde::Deserialize;
use studio_core::{Euler, PeerId, SceneTime};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreathingConfig {
    /// Vertical (pitch) period in seconds
    pub period: f32,
    /// Pitch amplitude in radians
    pub amplitude: f32,
    /// Lateral (roll) period in seconds
    pub lateral_period: f32,
    /// Roll amplitude in radians
    pub lateral_amplitude: f32,
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self {
            period: 4.0,
            amplitude: 0.012,
            lateral_period: 7.3,
            lateral_amplitude: 0.006,
        }
    }
}

impl BreathingConfig {
    /// Barely visible sway, for close framing
    pub fn subtle() -> Self {
        Self {
            amplitude: 0.006,
            lateral_amplitude: 0.003,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breathing {
    phase: f32,
}

impl Breathing {
    pub fn new(peer: &PeerId) -> Self {
        Self {
            phase: peer.phase_offset(),
        }
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Additive spine rotation at `now`
    pub fn sample(&self, now: SceneTime, config: &BreathingConfig) -> Euler {
        let t = now.as_secs_f64();
        let phase = f64::from(self.phase);
        let vertical = oscillate(t, config.period, phase);
        // Offset so the two components do not peak together
        let lateral = oscillate(t, config.lateral_period, phase * 0.61 + 1.3);
        Euler::new(vertical * config.amplitude, 0.0, lateral * config.lateral_amplitude)
    }
}

fn oscillate(t: f64, period: f32, phase: f64) -> f32 {
    if period <= 0.0 {
        return 0.0;
    }
    let cycles = (t / f64::from(period)).fract();
    (cycles * TAU + phase).sin() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amplitude_bounded() {
        let config = BreathingConfig::default();
        let breathing = Breathing::new(&PeerId::from("a"));
        for i in 0..1000 {
            let s = breathing.sample(SceneTime::from_millis(i * 37), &config);
            assert!(s.x.abs() <= config.amplitude + 1e-6);
            assert!(s.z.abs() <= config.lateral_amplitude + 1e-6);
            assert_eq!(s.y, 0.0);
        }
    }

    #[test]
    fn test_periodic() {
        let config = BreathingConfig::default();
        let breathing = Breathing::new(&PeerId::from("a"));
        let a = breathing.sample(SceneTime::from_millis(1_000), &config);
        let b = breathing.sample(SceneTime::from_millis(5_000), &config);
        assert!((a.x - b.x).abs() < 1e-5);
    }

    #[test]
    fn test_peers_desync() {
        let config = BreathingConfig::default();
        let now = SceneTime::from_millis(2_500);
        let a = Breathing::new(&PeerId::from("alice")).sample(now, &config);
        let b = Breathing::new(&PeerId::from("bob")).sample(now, &config);
        assert_ne!(a, b);
    }

    #[test]
    fn test_stays_sane_after_long_sessions() {
        let config = BreathingConfig::default();
        let breathing = Breathing::new(&PeerId::from("a"));
        // Ten days in
        let s = breathing.sample(SceneTime::from_secs_f64(864_000.25), &config);
        assert!(s.x.is_finite() && s.x.abs() <= config.amplitude + 1e-6);
    }
}
