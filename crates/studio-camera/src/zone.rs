//! Focus zone - the part of the set the camera cares about

use serde::Deserialize;
use studio_core::Vec3;

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct FocusZone {
    /// No center means the whole set is in focus
    pub center: Option<Vec3>,
    pub radius: f32,
}

impl Default for FocusZone {
    fn default() -> Self {
        Self {
            center: None,
            radius: 5.0,
        }
    }
}

impl FocusZone {
    pub fn around(center: Vec3, radius: f32) -> Self {
        Self {
            center: Some(center),
            radius,
        }
    }

    pub fn contains(&self, position: Vec3) -> bool {
        match self.center {
            Some(c) => c.horizontal_distance(&position) <= self.radius,
            None => true,
        }
    }

    /// Move the zone; keeps the current radius unless one is given
    pub fn set(&mut self, center: Option<Vec3>, radius: Option<f32>) {
        self.center = center;
        if let Some(r) = radius.filter(|r| *r > 0.0) {
            self.radius = r;
        }
    }
}
