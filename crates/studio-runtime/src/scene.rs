//! Collaborator interfaces
//!
//! The engine never renders, downloads or decodes anything itself. These
//! traits are the seams to the renderer, the asset pipeline and the
//! environment backdrop.

use async_trait::async_trait;
use serde_json::Value;
use studio_avatar::{AvatarModel, Clip, Skeleton, TrackSample};
use studio_camera::{CameraState, LightRig};
use studio_core::{PeerId, StudioResult, Vec3};
use studio_life::Posture;
use studio_wire::Payload;

/// Everything the renderer needs to pose one avatar for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct AvatarPose {
    pub peer: PeerId,
    pub position: Vec3,
    pub yaw: f32,
    pub scale: f32,
    pub ground_offset: f32,
    /// Blended clip samples
    pub samples: Vec<TrackSample>,
    /// Additive procedural rotations
    pub posture: Posture,
    pub blink: f32,
    pub mouth: f32,
    pub emotion: Option<String>,
}

/// Renderer / scene graph
pub trait SceneGraph: Send {
    fn add_avatar(&mut self, peer: &PeerId, model: &AvatarModel, scale: f32);
    fn remove_avatar(&mut self, peer: &PeerId);
    fn apply_pose(&mut self, pose: &AvatarPose);
    fn set_camera(&mut self, camera: &CameraState);
    fn set_lights(&mut self, rig: &LightRig);
}

/// Model and clip loading
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn load_avatar(&self, url: &str) -> StudioResult<AvatarModel>;

    /// Fetch a clip already retargeted onto `skeleton`
    async fn fetch_clip(&self, url: &str, skeleton: &Skeleton) -> StudioResult<Clip>;
}

/// Background, environment map and post-processing
#[async_trait]
pub trait Backdrop: Send + Sync {
    async fn set_background(&self, payload: &Payload) -> StudioResult<()>;

    async fn set_environment(&self, payload: &Payload) -> StudioResult<()>;

    async fn set_post_processing(&self, payload: &Payload) -> StudioResult<()>;

    /// Swap the environment map; defaults to an environment update
    async fn set_hdri(&self, hdri: &str) -> StudioResult<()> {
        let mut payload = Payload::default();
        payload
            .fields
            .insert("hdri".to_string(), Value::String(hdri.to_string()));
        self.set_environment(&payload).await
    }
}
