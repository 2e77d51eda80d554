//! Time primitives for the studio
//!
//! The engine runs on one clock: scene time, advanced only by the per-frame
//! tick with an explicit delta. Wall-clock time never leaks into state
//! machines, which keeps every subsystem reproducible under test.

use std::ops::{Add, Sub};
use std::time::Duration;

/// Scene time - microseconds since the director was created
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SceneTime(pub i64);

impl SceneTime {
    pub const ZERO: SceneTime = SceneTime(0);

    #[inline]
    pub fn from_micros(micros: i64) -> Self {
        SceneTime(micros)
    }

    #[inline]
    pub fn from_millis(millis: i64) -> Self {
        SceneTime(millis * 1000)
    }

    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        SceneTime((secs * 1_000_000.0) as i64)
    }

    #[inline]
    pub fn as_micros(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn as_millis(self) -> i64 {
        self.0 / 1000
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    #[inline]
    pub fn as_secs_f32(self) -> f32 {
        self.as_secs_f64() as f32
    }

    /// Seconds elapsed since `earlier` (zero if `earlier` is in the future)
    #[inline]
    pub fn secs_since(self, earlier: SceneTime) -> f32 {
        ((self.0 - earlier.0).max(0) as f64 / 1_000_000.0) as f32
    }

    #[inline]
    pub fn add_secs(self, secs: f32) -> Self {
        SceneTime(self.0.saturating_add((f64::from(secs) * 1_000_000.0) as i64))
    }
}

impl Add<Duration> for SceneTime {
    type Output = SceneTime;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        SceneTime(self.0 + rhs.as_micros() as i64)
    }
}

impl Sub<SceneTime> for SceneTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: SceneTime) -> Self::Output {
        let diff = self.0 - rhs.0;
        if diff >= 0 {
            Duration::from_micros(diff as u64)
        } else {
            Duration::ZERO
        }
    }
}

impl std::fmt::Debug for SceneTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t({:.3}s)", self.as_secs_f64())
    }
}

/// Scene clock - advanced by the tick, never by wall time
#[derive(Debug, Clone, Default)]
pub struct SceneClock {
    now: SceneTime,
    ticks: u64,
    /// Delta of the most recent tick, in seconds
    last_dt: f32,
}

impl SceneClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one tick. Large gaps (tab suspended, debugger) are clamped so
    /// state machines never integrate a multi-second step.
    pub fn advance(&mut self, dt: Duration, max_step: Duration) -> f32 {
        let step = dt.min(max_step);
        self.now = self.now + step;
        self.ticks += 1;
        self.last_dt = step.as_secs_f32();
        self.last_dt
    }

    #[inline]
    pub fn now(&self) -> SceneTime {
        self.now
    }

    #[inline]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    #[inline]
    pub fn last_dt(&self) -> f32 {
        self.last_dt
    }
}
