//! Shot catalog
//!
//! Shot types, their wire keywords, and the concrete camera moves they
//! resolve to once framed.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use studio_core::{StudioError, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShotType {
    // Static
    TwoShot,
    MediumTwo,
    Wide,
    Closeup,
    Medium,
    OverShoulder,
    LowAngle,
    Dutch,

    // Motion
    DollyIn,
    SlowOrbit,
    PullBack,
}

impl ShotType {
    pub fn all() -> &'static [ShotType] {
        &[
            ShotType::TwoShot,
            ShotType::MediumTwo,
            ShotType::Wide,
            ShotType::Closeup,
            ShotType::Medium,
            ShotType::OverShoulder,
            ShotType::LowAngle,
            ShotType::Dutch,
            ShotType::DollyIn,
            ShotType::SlowOrbit,
            ShotType::PullBack,
        ]
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            ShotType::TwoShot => "two_shot",
            ShotType::MediumTwo => "medium_two",
            ShotType::Wide => "wide",
            ShotType::Closeup => "closeup",
            ShotType::Medium => "medium",
            ShotType::OverShoulder => "over_shoulder",
            ShotType::LowAngle => "low_angle",
            ShotType::Dutch => "dutch",
            ShotType::DollyIn => "dolly_in",
            ShotType::SlowOrbit => "slow_orbit",
            ShotType::PullBack => "pull_back",
        }
    }

    pub fn is_motion(&self) -> bool {
        matches!(
            self,
            ShotType::DollyIn | ShotType::SlowOrbit | ShotType::PullBack
        )
    }

    /// Subjects needed before the shot makes sense
    pub fn subjects_required(&self) -> usize {
        match self {
            ShotType::TwoShot
            | ShotType::MediumTwo
            | ShotType::OverShoulder
            | ShotType::PullBack => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for ShotType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

impl FromStr for ShotType {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        ShotType::all()
            .iter()
            .copied()
            .find(|t| t.keyword() == key)
            .ok_or_else(|| StudioError::UnknownShot(s.to_string()))
    }
}

/// What a `set_camera_shot` keyword asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotRequest {
    Shot(ShotType),
    /// Drop any manual hold and let the director pick again
    Auto,
}

impl FromStr for ShotRequest {
    type Err = StudioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(ShotRequest::Auto);
        }
        s.parse().map(ShotRequest::Shot)
    }
}

/// Camera position, aim and field of view
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub look_at: Vec3,
    /// Vertical field of view in degrees
    pub fov: f32,
}

impl CameraPose {
    pub fn new(position: Vec3, look_at: Vec3, fov: f32) -> Self {
        Self {
            position,
            look_at,
            fov,
        }
    }

    pub fn lerp(&self, other: &CameraPose, t: f32) -> CameraPose {
        CameraPose {
            position: self.position.lerp(&other.position, t),
            look_at: self.look_at.lerp(&other.look_at, t),
            fov: self.fov + (other.fov - self.fov) * t,
        }
    }
}

/// Arc around a fixed center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orbit {
    pub center: Vec3,
    pub radius: f32,
    /// Camera height above the center
    pub height: f32,
    /// Angle measured from +Z (toward the viewer), radians
    pub start_angle: f32,
    pub arc: f32,
    pub look_at: Vec3,
    pub fov: f32,
}

impl Orbit {
    pub fn pose_at(&self, t: f32) -> CameraPose {
        let angle = self.start_angle + self.arc * t;
        let position = self.center
            + Vec3::new(angle.sin() * self.radius, self.height, angle.cos() * self.radius);
        CameraPose::new(position, self.look_at, self.fov)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShotMotion {
    Static(CameraPose),
    Move {
        from: CameraPose,
        to: CameraPose,
        duration: f32,
    },
    Orbit {
        orbit: Orbit,
        duration: f32,
    },
}

impl ShotMotion {
    /// First pose of the move
    pub fn start_pose(&self) -> CameraPose {
        match self {
            ShotMotion::Static(pose) => *pose,
            ShotMotion::Move { from, .. } => *from,
            ShotMotion::Orbit { orbit, .. } => orbit.pose_at(0.0),
        }
    }

    /// Pose the move settles at
    pub fn end_pose(&self) -> CameraPose {
        match self {
            ShotMotion::Static(pose) => *pose,
            ShotMotion::Move { to, .. } => *to,
            ShotMotion::Orbit { orbit, .. } => orbit.pose_at(1.0),
        }
    }
}

/// A framed shot ready for the animator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shot {
    pub kind: ShotType,
    pub motion: ShotMotion,
    /// Camera roll in radians; nonzero only for dutch angles
    pub roll: f32,
    /// Static approach rate (1/s)
    pub lerp_speed: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_round_trip() {
        for t in ShotType::all() {
            assert_eq!(t.keyword().parse::<ShotType>().unwrap(), *t);
        }
        assert_eq!("Two_Shot".parse::<ShotType>().unwrap(), ShotType::TwoShot);
    }

    #[test]
    fn test_unknown_keyword_rejected() {
        let err = "bogus".parse::<ShotRequest>().unwrap_err();
        assert_eq!(err, StudioError::UnknownShot("bogus".into()));
        assert_eq!("auto".parse::<ShotRequest>().unwrap(), ShotRequest::Auto);
    }

    #[test]
    fn test_serde_matches_keyword() {
        let json = serde_json::to_string(&ShotType::OverShoulder).unwrap();
        assert_eq!(json, "\"over_shoulder\"");
    }

    #[test]
    fn test_orbit_endpoints() {
        let orbit = Orbit {
            center: Vec3::ZERO,
            radius: 4.0,
            height: 1.5,
            start_angle: -0.2,
            arc: 0.4,
            look_at: Vec3::ZERO,
            fov: 40.0,
        };
        let start = orbit.pose_at(0.0).position;
        let end = orbit.pose_at(1.0).position;
        assert!((start.x + end.x).abs() < 1e-5);
        assert!((start.horizontal_distance(&Vec3::ZERO) - 4.0).abs() < 1e-5);
        assert_eq!(start.y, 1.5);
    }
}
