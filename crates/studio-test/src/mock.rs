//! Mock collaborators
//!
//! A scene graph that records what it was told, an asset source that
//! fabricates humanoids and clips on demand, and a backdrop that logs calls.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use studio_avatar::{AvatarModel, Bone, Bounds, Clip, Skeleton, Track, TrackChannel};
use studio_camera::{CameraState, LightRig};
use studio_core::{PeerId, StudioError, StudioResult, Vec3};
use studio_runtime::{AssetSource, AvatarPose, Backdrop, EnvironmentCall, SceneGraph};
use studio_wire::Payload;

// ============================================================================
// SCENE
// ============================================================================

/// Scene graph that keeps the latest frame and a history of add/remove calls
#[derive(Debug, Default)]
pub struct RecordingScene {
    /// Avatars currently in the scene, with their model URL
    pub live: BTreeMap<PeerId, String>,
    pub added: Vec<(PeerId, String)>,
    pub removed: Vec<PeerId>,
    /// `add_avatar` for a peer that was already live
    pub duplicate_adds: usize,
    /// `remove_avatar` for a peer that was not live
    pub orphan_removes: usize,
    pub poses: HashMap<PeerId, AvatarPose>,
    pub camera: Option<CameraState>,
    pub lights: Option<LightRig>,
    pub frames: u64,
}

impl RecordingScene {
    pub fn pose(&self, peer: &str) -> Option<&AvatarPose> {
        self.poses.get(&PeerId::new(peer))
    }
}

impl SceneGraph for RecordingScene {
    fn add_avatar(&mut self, peer: &PeerId, model: &AvatarModel, _scale: f32) {
        if self.live.insert(peer.clone(), model.url.clone()).is_some() {
            self.duplicate_adds += 1;
        }
        self.added.push((peer.clone(), model.url.clone()));
    }

    fn remove_avatar(&mut self, peer: &PeerId) {
        if self.live.remove(peer).is_none() {
            self.orphan_removes += 1;
        }
        self.poses.remove(peer);
        self.removed.push(peer.clone());
    }

    fn apply_pose(&mut self, pose: &AvatarPose) {
        self.poses.insert(pose.peer.clone(), pose.clone());
    }

    fn set_camera(&mut self, camera: &CameraState) {
        self.camera = Some(*camera);
        self.frames += 1;
    }

    fn set_lights(&mut self, rig: &LightRig) {
        self.lights = Some(*rig);
    }
}

// ============================================================================
// ASSETS
// ============================================================================

/// Reference humanoid scaled to `size` model units
pub fn humanoid(url: &str, size: f32) -> AvatarModel {
    let reference = Skeleton::reference();
    let bones = reference
        .bones
        .iter()
        .map(|(bone, position)| (*bone, *position * size))
        .collect();
    AvatarModel {
        url: url.to_string(),
        skeleton: Skeleton { bones },
        bounds: Some(Bounds::new(
            Vec3::new(-0.45 * size, 0.0, -0.15 * size),
            Vec3::new(0.45 * size, size, 0.15 * size),
        )),
    }
}

/// A model with no usable head or feet; only its bounds can be measured
pub fn bounds_only(url: &str, floor: f32, height: f32) -> AvatarModel {
    AvatarModel {
        url: url.to_string(),
        skeleton: Skeleton::new().with_bone(Bone::Hips, Vec3::new(0.0, floor + height * 0.5, 0.0)),
        bounds: Some(Bounds::new(
            Vec3::new(-0.3, floor, -0.2),
            Vec3::new(0.3, floor + height, 0.2),
        )),
    }
}

/// `count` humanoids of assorted sizes, reproducible from `seed`
pub fn random_cast(seed: u64, count: usize) -> Vec<AvatarModel> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|i| humanoid(&format!("avatars/cast-{}.vrm", i), rng.gen_range(0.4..120.0)))
        .collect()
}

/// A clip whose hips carry an absolute height, as raw motion capture does
pub fn mocap_clip(url: &str, duration: f32, skeleton: &Skeleton) -> Clip {
    let hips = skeleton.bone(Bone::Hips).unwrap_or(Vec3::ZERO);
    Clip::new(url, url, duration)
        .with_track(Track::new(
            Bone::Hips,
            TrackChannel::Position,
            &[(0.0, hips), (duration, hips + Vec3::UP * 0.02)],
        ))
        .with_track(Track::new(
            Bone::Spine,
            TrackChannel::Rotation,
            &[
                (0.0, Vec3::ZERO),
                (duration * 0.5, Vec3::new(0.05, 0.0, 0.0)),
                (duration, Vec3::ZERO),
            ],
        ))
}

/// Asset source serving registered models, or a reference humanoid for any
/// unknown URL
#[derive(Debug)]
pub struct MockAssets {
    models: Mutex<HashMap<String, AvatarModel>>,
    failing: Mutex<HashSet<String>>,
    avatar_requests: Mutex<Vec<String>>,
    clip_requests: Mutex<Vec<String>>,
    clip_duration: f32,
}

impl MockAssets {
    pub fn new() -> Self {
        Self {
            models: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            avatar_requests: Mutex::new(Vec::new()),
            clip_requests: Mutex::new(Vec::new()),
            clip_duration: 2.0,
        }
    }

    pub fn with_clip_duration(mut self, seconds: f32) -> Self {
        self.clip_duration = seconds;
        self
    }

    pub fn insert_model(&self, model: AvatarModel) {
        self.models.lock().insert(model.url.clone(), model);
    }

    /// Make every request for `url` fail
    pub fn fail(&self, url: &str) {
        self.failing.lock().insert(url.to_string());
    }

    pub fn avatar_requests(&self) -> Vec<String> {
        self.avatar_requests.lock().clone()
    }

    pub fn clip_requests(&self) -> Vec<String> {
        self.clip_requests.lock().clone()
    }

    /// How many times `url` was fetched as a clip
    pub fn clip_fetches(&self, url: &str) -> usize {
        self.clip_requests.lock().iter().filter(|u| *u == url).count()
    }

    fn check(&self, url: &str) -> StudioResult<()> {
        if self.failing.lock().contains(url) {
            return Err(StudioError::ClipLoad {
                url: url.to_string(),
                reason: "scripted failure".into(),
            });
        }
        Ok(())
    }
}

impl Default for MockAssets {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetSource for MockAssets {
    async fn load_avatar(&self, url: &str) -> StudioResult<AvatarModel> {
        self.avatar_requests.lock().push(url.to_string());
        self.check(url)?;
        let model = self.models.lock().get(url).cloned();
        Ok(model.unwrap_or_else(|| humanoid(url, 1.0)))
    }

    async fn fetch_clip(&self, url: &str, skeleton: &Skeleton) -> StudioResult<Clip> {
        self.clip_requests.lock().push(url.to_string());
        self.check(url)?;
        Ok(mocap_clip(url, self.clip_duration, skeleton))
    }
}

// ============================================================================
// BACKDROP
// ============================================================================

#[derive(Debug, Default)]
pub struct MockBackdrop {
    calls: Mutex<Vec<EnvironmentCall>>,
}

impl MockBackdrop {
    pub fn calls(&self) -> Vec<EnvironmentCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Backdrop for MockBackdrop {
    async fn set_background(&self, payload: &Payload) -> StudioResult<()> {
        self.calls
            .lock()
            .push(EnvironmentCall::Background(payload.clone()));
        Ok(())
    }

    async fn set_environment(&self, payload: &Payload) -> StudioResult<()> {
        self.calls
            .lock()
            .push(EnvironmentCall::Environment(payload.clone()));
        Ok(())
    }

    async fn set_post_processing(&self, payload: &Payload) -> StudioResult<()> {
        self.calls
            .lock()
            .push(EnvironmentCall::PostProcessing(payload.clone()));
        Ok(())
    }
}
