//! Spatial math for the studio
//!
//! Conventions: right-handed, Y up, the viewer stands on +Z looking toward
//! -Z. An avatar with yaw 0 faces +Z, i.e. faces the viewer. Yaw grows
//! counter-clockwise seen from above.

use std::f32::consts::{PI, TAU};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// 3D vector / position in world units (meters)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };
    pub const UP: Vec3 = Vec3 {
        x: 0.0,
        y: 1.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Linear interpolation
    pub fn lerp(&self, other: &Vec3, t: f32) -> Vec3 {
        Vec3 {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
            z: self.z + (other.z - self.z) * t,
        }
    }

    /// Distance to another position
    pub fn distance(&self, other: &Vec3) -> f32 {
        (*self - *other).length()
    }

    /// Distance ignoring height
    pub fn horizontal_distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn normalize(&self) -> Vec3 {
        let len = self.length();
        if len < 1e-6 {
            return Vec3::ZERO;
        }
        *self * (1.0 / len)
    }

    /// Same vector with y zeroed
    pub fn flat(&self) -> Vec3 {
        Vec3::new(self.x, 0.0, self.z)
    }

    pub fn with_y(&self, y: f32) -> Vec3 {
        Vec3::new(self.x, y, self.z)
    }

    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Exponential approach toward `target`
    pub fn damp(&self, target: &Vec3, rate: f32, dt: f32) -> Vec3 {
        self.lerp(target, damp_factor(rate, dt))
    }

    /// Unit direction on the ground plane for a yaw angle
    pub fn from_yaw(yaw: f32) -> Vec3 {
        Vec3::new(yaw.sin(), 0.0, yaw.cos())
    }

    /// Mean of a set of points
    pub fn centroid<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Option<Vec3> {
        let mut sum = Vec3::ZERO;
        let mut count = 0usize;
        for p in points {
            sum += *p;
            count += 1;
        }
        (count > 0).then(|| sum * (1.0 / count as f32))
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Vec3;

    fn mul(self, rhs: f32) -> Vec3 {
        Vec3::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;

    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// Additive bone rotation (radians, applied X → Y → Z)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Euler {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Euler {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn scale(&self, s: f32) -> Euler {
        Euler::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn add(&self, other: &Euler) -> Euler {
        Euler::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Clamp each component to ±limit
    pub fn clamp_abs(&self, limit: f32) -> Euler {
        Euler::new(
            self.x.clamp(-limit, limit),
            self.y.clamp(-limit, limit),
            self.z.clamp(-limit, limit),
        )
    }
}

/// Yaw that makes something at `from` face `to` (on the ground plane)
pub fn yaw_towards(from: &Vec3, to: &Vec3) -> f32 {
    (to.x - from.x).atan2(to.z - from.z)
}

/// Wrap an angle into (-π, π]
pub fn wrap_angle(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a <= -PI {
        a += TAU;
    } else if a > PI {
        a -= TAU;
    }
    a
}

/// Frame-rate independent smoothing factor for `1 - e^(-rate·dt)`
#[inline]
pub fn damp_factor(rate: f32, dt: f32) -> f32 {
    1.0 - (-rate * dt).exp()
}

/// Exponential approach of a scalar
#[inline]
pub fn damp(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    current + (target - current) * damp_factor(rate, dt)
}

/// Exponential approach of an angle along the shortest arc
pub fn damp_angle(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    let diff = wrap_angle(target - current);
    wrap_angle(current + diff * damp_factor(rate, dt))
}

/// Quintic ease-in-out on [0, 1]
pub fn ease_in_out_quintic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        16.0 * t * t * t * t * t
    } else {
        1.0 - (-2.0 * t + 2.0).powi(5) / 2.0
    }
}

/// Symmetric triangle pulse: 0 at t=0, 1 at t=0.5, 0 at t=1, 0 outside
pub fn triangle_pulse(t: f32) -> f32 {
    if !(0.0..=1.0).contains(&t) {
        return 0.0;
    }
    1.0 - (2.0 * t - 1.0).abs()
}
