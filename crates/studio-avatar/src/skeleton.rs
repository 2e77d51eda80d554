//! Skeleton - humanoid bones as loaded from an avatar model
//!
//! Positions are in model space (Y up, feet roughly at y=0, facing +Z) before
//! any normalization. The registry scales and anchors them; nothing here
//! mutates a loaded skeleton.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use studio_core::Vec3;

/// Humanoid bone identifier (VRM naming)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Bone {
    // Torso
    Hips,
    Spine,
    Chest,
    UpperChest,
    Neck,
    Head,

    // Left arm
    LeftShoulder,
    LeftUpperArm,
    LeftLowerArm,
    LeftHand,

    // Right arm
    RightShoulder,
    RightUpperArm,
    RightLowerArm,
    RightHand,

    // Left leg
    LeftUpperLeg,
    LeftLowerLeg,
    LeftFoot,
    LeftToes,

    // Right leg
    RightUpperLeg,
    RightLowerLeg,
    RightFoot,
    RightToes,
}

impl Bone {
    /// All bones in hierarchy order
    pub fn all() -> &'static [Bone] {
        &[
            Bone::Hips,
            Bone::Spine,
            Bone::Chest,
            Bone::UpperChest,
            Bone::Neck,
            Bone::Head,
            Bone::LeftShoulder,
            Bone::LeftUpperArm,
            Bone::LeftLowerArm,
            Bone::LeftHand,
            Bone::RightShoulder,
            Bone::RightUpperArm,
            Bone::RightLowerArm,
            Bone::RightHand,
            Bone::LeftUpperLeg,
            Bone::LeftLowerLeg,
            Bone::LeftFoot,
            Bone::LeftToes,
            Bone::RightUpperLeg,
            Bone::RightLowerLeg,
            Bone::RightFoot,
            Bone::RightToes,
        ]
    }

    /// Bones that touch the ground in a standing pose
    pub fn ground_contacts() -> &'static [Bone] {
        &[Bone::LeftFoot, Bone::RightFoot, Bone::LeftToes, Bone::RightToes]
    }

    pub fn is_root(&self) -> bool {
        *self == Bone::Hips
    }
}

/// Axis-aligned bounds of the model's mesh
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }
}

/// Rest-pose skeleton of a loaded model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Skeleton {
    pub bones: HashMap<Bone, Vec3>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bone(mut self, bone: Bone, position: Vec3) -> Self {
        self.bones.insert(bone, position);
        self
    }

    pub fn bone(&self, bone: Bone) -> Option<Vec3> {
        self.bones.get(&bone).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Lowest ground-contact bone height, if any feet/toes exist
    pub fn foot_level(&self) -> Option<f32> {
        Bone::ground_contacts()
            .iter()
            .filter_map(|b| self.bone(*b))
            .map(|p| p.y)
            .reduce(f32::min)
    }

    /// Lowest bone of any kind
    pub fn lowest_point(&self) -> Option<f32> {
        self.bones.values().map(|p| p.y).reduce(f32::min)
    }

    /// A plausible adult humanoid, 1.0 unit tall with the head bone at 0.9.
    /// Handy for tests and as a stand-in while a model streams in.
    pub fn reference() -> Self {
        Skeleton::new()
            .with_bone(Bone::Hips, Vec3::new(0.0, 0.53, 0.0))
            .with_bone(Bone::Spine, Vec3::new(0.0, 0.6, 0.0))
            .with_bone(Bone::Chest, Vec3::new(0.0, 0.68, 0.0))
            .with_bone(Bone::UpperChest, Vec3::new(0.0, 0.74, 0.0))
            .with_bone(Bone::Neck, Vec3::new(0.0, 0.83, 0.0))
            .with_bone(Bone::Head, Vec3::new(0.0, 0.9, 0.0))
            .with_bone(Bone::LeftShoulder, Vec3::new(0.05, 0.79, 0.0))
            .with_bone(Bone::LeftUpperArm, Vec3::new(0.11, 0.79, 0.0))
            .with_bone(Bone::LeftLowerArm, Vec3::new(0.27, 0.79, 0.0))
            .with_bone(Bone::LeftHand, Vec3::new(0.42, 0.79, 0.0))
            .with_bone(Bone::RightShoulder, Vec3::new(-0.05, 0.79, 0.0))
            .with_bone(Bone::RightUpperArm, Vec3::new(-0.11, 0.79, 0.0))
            .with_bone(Bone::RightLowerArm, Vec3::new(-0.27, 0.79, 0.0))
            .with_bone(Bone::RightHand, Vec3::new(-0.42, 0.79, 0.0))
            .with_bone(Bone::LeftUpperLeg, Vec3::new(0.05, 0.5, 0.0))
            .with_bone(Bone::LeftLowerLeg, Vec3::new(0.05, 0.27, 0.0))
            .with_bone(Bone::LeftFoot, Vec3::new(0.05, 0.04, 0.0))
            .with_bone(Bone::LeftToes, Vec3::new(0.05, 0.0, 0.06))
            .with_bone(Bone::RightUpperLeg, Vec3::new(-0.05, 0.5, 0.0))
            .with_bone(Bone::RightLowerLeg, Vec3::new(-0.05, 0.27, 0.0))
            .with_bone(Bone::RightFoot, Vec3::new(-0.05, 0.04, 0.0))
            .with_bone(Bone::RightToes, Vec3::new(-0.05, 0.0, 0.06))
    }
}

/// A model as delivered by the asset source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarModel {
    pub url: String,
    pub skeleton: Skeleton,
    #[serde(default)]
    pub bounds: Option<Bounds>,
}

/// How a model was measured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightSource {
    Skeleton,
    Bounds,
}

/// Result of normalizing a model to the configured height
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    /// Uniform scale applied to the model
    pub scale: f32,
    /// Vertical offset (after scaling) that puts the lowest point on y=0
    pub ground_offset: f32,
    pub measured_height: f32,
    pub source: HeightSource,
}

/// Measure a model's standing height in model units.
///
/// The head bone sits at the base of the skull, so `head_top_allowance`
/// (a fraction of the head-to-foot distance) is added to reach the crown.
/// Models without usable head/foot bones fall back to mesh bounds.
pub fn measure_height(model: &AvatarModel, head_top_allowance: f32) -> Option<(f32, HeightSource)> {
    let skeleton = &model.skeleton;
    if let (Some(head), Some(feet)) = (skeleton.bone(Bone::Head), skeleton.foot_level()) {
        let span = head.y - feet;
        if span > 1e-4 {
            return Some((span * (1.0 + head_top_allowance), HeightSource::Skeleton));
        }
    }

    model
        .bounds
        .filter(|b| b.height() > 1e-4)
        .map(|b| (b.height(), HeightSource::Bounds))
}

/// Compute scale and ground anchoring for a model
pub fn normalize(
    model: &AvatarModel,
    target_height: f32,
    head_top_allowance: f32,
) -> Option<Normalization> {
    let (measured, source) = measure_height(model, head_top_allowance)?;
    let scale = target_height / measured;

    let lowest = match source {
        HeightSource::Skeleton => model.skeleton.lowest_point(),
        HeightSource::Bounds => model.bounds.map(|b| b.min.y),
    }
    .unwrap_or(0.0);

    Some(Normalization {
        scale,
        ground_offset: -lowest * scale,
        measured_height: measured,
        source,
    })
}
