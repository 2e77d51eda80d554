//! Blink scheduling
//!
//! Each avatar blinks on its own random schedule: the next blink starts a
//! uniform 2 to 6 seconds after the previous one ended. A blink is a
//! symmetric close/open pulse, so the weight is continuous and exactly 0
//! between blinks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use studio_core::{triangle_pulse, PeerId, SceneTime};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlinkConfig {
    pub min_interval: f32,
    pub max_interval: f32,
    /// Full close-and-open time in seconds
    pub duration: f32,
}

impl Default for BlinkConfig {
    fn default() -> Self {
        Self {
            min_interval: 2.0,
            max_interval: 6.0,
            duration: 0.15,
        }
    }
}

const BLINK_SALT: u64 = 0xB11C;

#[derive(Debug, Clone)]
pub struct Blink {
    rng: StdRng,
    next_blink_at: SceneTime,
    started_at: Option<SceneTime>,
    phase: f32,
}

impl Blink {
    pub fn new(peer: &PeerId, now: SceneTime, config: &BlinkConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(u64::from(peer.stable_hash()) ^ BLINK_SALT);
        let first = Self::draw_interval(&mut rng, config);
        Self {
            rng,
            next_blink_at: now.add_secs(first),
            started_at: None,
            phase: 0.0,
        }
    }

    fn draw_interval(rng: &mut StdRng, config: &BlinkConfig) -> f32 {
        if config.max_interval > config.min_interval {
            rng.gen_range(config.min_interval..config.max_interval)
        } else {
            config.min_interval
        }
    }

    /// Advance to `now` and return the eyelid weight (0 open, 1 closed)
    pub fn update(&mut self, now: SceneTime, config: &BlinkConfig) -> f32 {
        if self.started_at.is_none() && now >= self.next_blink_at {
            self.started_at = Some(self.next_blink_at);
        }

        let Some(start) = self.started_at else {
            self.phase = 0.0;
            return 0.0;
        };

        let duration = config.duration.max(1e-3);
        let phase = now.secs_since(start) / duration;
        if phase >= 1.0 {
            let end = start.add_secs(duration);
            self.started_at = None;
            self.phase = 0.0;
            self.next_blink_at = end.add_secs(Self::draw_interval(&mut self.rng, config));
            return 0.0;
        }

        self.phase = phase;
        triangle_pulse(phase)
    }

    /// 0 when idle, otherwise progress through the current blink
    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn next_blink_at(&self) -> SceneTime {
        self.next_blink_at
    }

    pub fn is_blinking(&self) -> bool {
        self.started_at.is_some()
    }
}
