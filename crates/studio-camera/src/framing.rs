//! Framing - shot type + subjects -> camera move
//!
//! The primary subject is the speaker when there is one, otherwise the
//! first subject. The secondary is whoever stands closest to the primary.
//! Camera placement assumes the audience side is +Z.

use serde::Deserialize;
use studio_core::{PeerId, Vec3};

use crate::{CameraPose, Orbit, Shot, ShotMotion, ShotType};

/// One avatar as the camera sees it
#[derive(Debug, Clone, PartialEq)]
pub struct Subject {
    pub peer: PeerId,
    /// Feet position
    pub position: Vec3,
    /// Eye-line point
    pub head: Vec3,
}

impl Subject {
    pub fn new(peer: PeerId, position: Vec3, head: Vec3) -> Self {
        Self {
            peer,
            position,
            head,
        }
    }

    fn chest(&self) -> Vec3 {
        self.head - Vec3::UP * 0.35
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    pub wide_fov: f32,
    pub two_shot_fov: f32,
    pub single_fov: f32,
    pub closeup_fov: f32,
    /// Roll of a dutch angle (radians)
    pub dutch_angle: f32,
    pub dolly_duration: f32,
    pub orbit_duration: f32,
    /// Total orbit arc (radians)
    pub orbit_arc: f32,
    pub pull_back_duration: f32,
    /// Static approach rates per family (1/s)
    pub wide_speed: f32,
    pub group_speed: f32,
    pub single_speed: f32,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            wide_fov: 50.0,
            two_shot_fov: 40.0,
            single_fov: 35.0,
            closeup_fov: 28.0,
            dutch_angle: 8f32.to_radians(),
            dolly_duration: 14.0,
            orbit_duration: 20.0,
            orbit_arc: 25f32.to_radians(),
            pull_back_duration: 10.0,
            wide_speed: 1.2,
            group_speed: 1.8,
            single_speed: 2.5,
        }
    }
}

/// Who is on set for this framing decision
#[derive(Debug, Clone, Default)]
pub struct FramingContext {
    /// Subjects inside the focus zone
    pub subjects: Vec<Subject>,
    pub speaker: Option<PeerId>,
}

impl FramingContext {
    pub fn new(subjects: Vec<Subject>, speaker: Option<PeerId>) -> Self {
        Self { subjects, speaker }
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }

    pub fn primary(&self) -> Option<&Subject> {
        self.speaker
            .as_ref()
            .and_then(|s| self.subjects.iter().find(|sub| sub.peer == *s))
            .or_else(|| self.subjects.first())
    }

    pub fn secondary(&self) -> Option<&Subject> {
        let primary = self.primary()?;
        self.subjects
            .iter()
            .filter(|s| s.peer != primary.peer)
            .min_by(|a, b| {
                a.position
                    .horizontal_distance(&primary.position)
                    .total_cmp(&b.position.horizontal_distance(&primary.position))
            })
    }
}

/// Pose used when there is nobody to frame
pub fn establishing_pose(config: &FramingConfig) -> CameraPose {
    CameraPose::new(
        Vec3::new(0.0, 1.7, 6.0),
        Vec3::new(0.0, 1.2, 0.0),
        config.wide_fov,
    )
}

pub fn establishing_shot(config: &FramingConfig) -> Shot {
    Shot {
        kind: ShotType::Wide,
        motion: ShotMotion::Static(establishing_pose(config)),
        roll: 0.0,
        lerp_speed: config.wide_speed,
    }
}

/// Frame `kind` for `ctx`. `None` when the scene lacks the subjects it needs.
pub fn frame(kind: ShotType, ctx: &FramingContext, config: &FramingConfig) -> Option<Shot> {
    if ctx.subjects.len() < kind.subjects_required() {
        return None;
    }
    let primary = ctx.primary()?;
    let secondary = ctx.secondary();

    let (motion, lerp_speed) = match kind {
        ShotType::Wide => (ShotMotion::Static(wide(ctx, config)), config.wide_speed),
        ShotType::TwoShot => (
            ShotMotion::Static(pair(primary, secondary?, 1.1, 1.6, 2.8, config.two_shot_fov)),
            config.group_speed,
        ),
        ShotType::MediumTwo => (
            ShotMotion::Static(pair(primary, secondary?, 0.9, 1.2, 2.0, config.single_fov)),
            config.group_speed,
        ),
        ShotType::Closeup => (
            ShotMotion::Static(closeup(primary, config)),
            config.single_speed,
        ),
        ShotType::Medium | ShotType::Dutch => (
            ShotMotion::Static(medium(primary, config)),
            config.single_speed,
        ),
        ShotType::OverShoulder => (
            ShotMotion::Static(over_shoulder(primary, secondary?, config)),
            config.single_speed,
        ),
        ShotType::LowAngle => (
            ShotMotion::Static(CameraPose::new(
                primary.position + Vec3::new(0.25, 0.6, 2.2),
                primary.head + Vec3::UP * 0.1,
                42.0,
            )),
            config.single_speed,
        ),
        ShotType::DollyIn => (
            ShotMotion::Move {
                from: wide(ctx, config),
                to: medium(primary, config),
                duration: config.dolly_duration,
            },
            config.wide_speed,
        ),
        ShotType::SlowOrbit => (
            ShotMotion::Orbit {
                orbit: orbit(ctx, config),
                duration: config.orbit_duration,
            },
            config.wide_speed,
        ),
        ShotType::PullBack => (
            ShotMotion::Move {
                from: closeup(primary, config),
                to: pair(primary, secondary?, 1.1, 1.6, 2.8, config.two_shot_fov),
                duration: config.pull_back_duration,
            },
            config.single_speed,
        ),
    };

    Some(Shot {
        kind,
        motion,
        roll: if kind == ShotType::Dutch {
            config.dutch_angle
        } else {
            0.0
        },
        lerp_speed,
    })
}

fn group_center(ctx: &FramingContext) -> Vec3 {
    Vec3::centroid(ctx.subjects.iter().map(|s| &s.position)).unwrap_or(Vec3::ZERO)
}

fn group_spread(ctx: &FramingContext, center: Vec3) -> f32 {
    ctx.subjects
        .iter()
        .map(|s| s.position.horizontal_distance(&center))
        .fold(0.0, f32::max)
}

fn wide(ctx: &FramingContext, config: &FramingConfig) -> CameraPose {
    let center = group_center(ctx);
    let distance = (group_spread(ctx, center) * 2.4 + 3.0).max(4.5);
    CameraPose::new(
        center + Vec3::new(0.0, 1.7, distance),
        center.with_y(1.2),
        config.wide_fov,
    )
}

fn pair(a: &Subject, b: &Subject, spread_k: f32, margin: f32, min_dist: f32, fov: f32) -> CameraPose {
    let mid = a.position.lerp(&b.position, 0.5);
    let separation = a.position.horizontal_distance(&b.position);
    let distance = (separation * spread_k + margin).max(min_dist);
    let eye = (a.head.y + b.head.y) * 0.5;
    CameraPose::new(
        mid + Vec3::new(0.0, eye, distance),
        mid.with_y(eye - 0.15),
        fov,
    )
}

fn closeup(subject: &Subject, config: &FramingConfig) -> CameraPose {
    CameraPose::new(
        subject.head + Vec3::new(0.15, 0.03, 1.0),
        subject.head,
        config.closeup_fov,
    )
}

fn medium(subject: &Subject, config: &FramingConfig) -> CameraPose {
    let chest = subject.chest();
    CameraPose::new(
        chest + Vec3::new(0.1, 0.25, 1.9),
        chest + Vec3::UP * 0.15,
        config.single_fov,
    )
}

fn over_shoulder(primary: &Subject, over: &Subject, config: &FramingConfig) -> CameraPose {
    let back = (over.position - primary.position).flat();
    let back = if back.length() > 1e-4 {
        back.normalize()
    } else {
        Vec3::new(0.0, 0.0, 1.0)
    };
    // Shift sideways so the near shoulder frames the edge instead of blocking
    let side = back.cross(&Vec3::UP).normalize();
    CameraPose::new(
        over.head + back * 0.8 + side * 0.35 + Vec3::UP * 0.1,
        primary.head,
        config.single_fov,
    )
}

fn orbit(ctx: &FramingContext, config: &FramingConfig) -> Orbit {
    let center = group_center(ctx);
    let radius = (group_spread(ctx, center) * 2.0 + 2.5).max(3.5);
    Orbit {
        center: center.with_y(0.0),
        radius,
        height: 1.6,
        start_angle: -config.orbit_arc * 0.5,
        arc: config.orbit_arc,
        look_at: center.with_y(1.3),
        fov: config.two_shot_fov,
    }
}
