//! Message kinds carried on the control channel

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use studio_core::{PeerId, Vec3};

/// Opaque payload for fire-and-forget collaborators (background, environment,
/// post-processing). The engine forwards it untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Payload {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

/// `avatar_load` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarLoad {
    #[serde(alias = "peer_id")]
    pub peer: PeerId,
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    /// `url` is a path under the local asset root rather than a remote URL
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub position: Option<Vec3>,
}

/// Directive from the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    Emotion {
        #[serde(alias = "peer_id")]
        peer: PeerId,
        emotion: String,
    },
    Gesture {
        #[serde(alias = "peer_id")]
        peer: PeerId,
        gesture: String,
        #[serde(default)]
        intensity: Option<f32>,
    },
    Mouth {
        #[serde(alias = "peer_id")]
        peer: PeerId,
        value: f32,
    },
    AvatarLoad(AvatarLoad),
    AvatarRemove {
        #[serde(alias = "peer_id")]
        peer: PeerId,
    },
    Speaking {
        #[serde(alias = "peer_id")]
        peer: PeerId,
        active: bool,
    },
    SetBackground(Payload),
    MoveTo {
        #[serde(alias = "peer_id")]
        peer: PeerId,
        #[serde(default)]
        target_peer: Option<PeerId>,
        #[serde(default)]
        position: Option<Vec3>,
    },
    GoHome {
        #[serde(alias = "peer_id")]
        peer: PeerId,
    },
    SetEnvironment(Payload),
    SetPostProcessing(Payload),
    SetCameraRoom {
        /// `null` clears the focus zone
        #[serde(default)]
        zone_center: Option<Vec3>,
        #[serde(default)]
        radius: Option<f32>,
        #[serde(default)]
        hdri: Option<String>,
    },
    SetCameraShot {
        shot: String,
        #[serde(default)]
        hold_seconds: Option<f32>,
        #[serde(default)]
        force: bool,
    },
    PlayAnimation {
        #[serde(alias = "peer_id")]
        peer: PeerId,
        url: String,
        #[serde(rename = "loop", default)]
        looping: Option<bool>,
    },
}

/// Discriminant of [`InboundMessage`], for logging and routing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Emotion,
    Gesture,
    Mouth,
    AvatarLoad,
    AvatarRemove,
    Speaking,
    SetBackground,
    MoveTo,
    GoHome,
    SetEnvironment,
    SetPostProcessing,
    SetCameraRoom,
    SetCameraShot,
    PlayAnimation,
}

impl MessageKind {
    pub fn all() -> &'static [MessageKind] {
        &[
            MessageKind::Emotion,
            MessageKind::Gesture,
            MessageKind::Mouth,
            MessageKind::AvatarLoad,
            MessageKind::AvatarRemove,
            MessageKind::Speaking,
            MessageKind::SetBackground,
            MessageKind::MoveTo,
            MessageKind::GoHome,
            MessageKind::SetEnvironment,
            MessageKind::SetPostProcessing,
            MessageKind::SetCameraRoom,
            MessageKind::SetCameraShot,
            MessageKind::PlayAnimation,
        ]
    }

    /// Wire name (`type` field value)
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Emotion => "emotion",
            MessageKind::Gesture => "gesture",
            MessageKind::Mouth => "mouth",
            MessageKind::AvatarLoad => "avatar_load",
            MessageKind::AvatarRemove => "avatar_remove",
            MessageKind::Speaking => "speaking",
            MessageKind::SetBackground => "set_background",
            MessageKind::MoveTo => "move_to",
            MessageKind::GoHome => "go_home",
            MessageKind::SetEnvironment => "set_environment",
            MessageKind::SetPostProcessing => "set_post_processing",
            MessageKind::SetCameraRoom => "set_camera_room",
            MessageKind::SetCameraShot => "set_camera_shot",
            MessageKind::PlayAnimation => "play_animation",
        }
    }

    pub fn from_wire(name: &str) -> Option<MessageKind> {
        Self::all().iter().copied().find(|k| k.as_str() == name)
    }
}

impl InboundMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            InboundMessage::Emotion { .. } => MessageKind::Emotion,
            InboundMessage::Gesture { .. } => MessageKind::Gesture,
            InboundMessage::Mouth { .. } => MessageKind::Mouth,
            InboundMessage::AvatarLoad(_) => MessageKind::AvatarLoad,
            InboundMessage::AvatarRemove { .. } => MessageKind::AvatarRemove,
            InboundMessage::Speaking { .. } => MessageKind::Speaking,
            InboundMessage::SetBackground(_) => MessageKind::SetBackground,
            InboundMessage::MoveTo { .. } => MessageKind::MoveTo,
            InboundMessage::GoHome { .. } => MessageKind::GoHome,
            InboundMessage::SetEnvironment(_) => MessageKind::SetEnvironment,
            InboundMessage::SetPostProcessing(_) => MessageKind::SetPostProcessing,
            InboundMessage::SetCameraRoom { .. } => MessageKind::SetCameraRoom,
            InboundMessage::SetCameraShot { .. } => MessageKind::SetCameraShot,
            InboundMessage::PlayAnimation { .. } => MessageKind::PlayAnimation,
        }
    }

    /// The peer this message addresses, if it is a per-peer command
    pub fn peer(&self) -> Option<&PeerId> {
        match self {
            InboundMessage::Emotion { peer, .. }
            | InboundMessage::Gesture { peer, .. }
            | InboundMessage::Mouth { peer, .. }
            | InboundMessage::AvatarRemove { peer }
            | InboundMessage::Speaking { peer, .. }
            | InboundMessage::MoveTo { peer, .. }
            | InboundMessage::GoHome { peer }
            | InboundMessage::PlayAnimation { peer, .. } => Some(peer),
            InboundMessage::AvatarLoad(load) => Some(&load.peer),
            InboundMessage::SetBackground(_)
            | InboundMessage::SetEnvironment(_)
            | InboundMessage::SetPostProcessing(_)
            | InboundMessage::SetCameraRoom { .. }
            | InboundMessage::SetCameraShot { .. } => None,
        }
    }
}

/// Message sent by the studio back to the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Hello { protocol_version: u32, client: String },
    Ready { peer_id: PeerId },
}

impl OutboundMessage {
    pub fn hello(client: impl Into<String>) -> Self {
        OutboundMessage::Hello {
            protocol_version: crate::PROTOCOL_VERSION,
            client: client.into(),
        }
    }
}
