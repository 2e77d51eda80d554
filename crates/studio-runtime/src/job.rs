//! Asynchronous work requested by the director
//!
//! The director never awaits. It queues [`Job`]s, the driver runs them on
//! tokio tasks, and each result comes back as a [`Completion`] applied at
//! the start of the next tick.

use std::sync::Arc;

use studio_avatar::{AvatarModel, Clip, LoadTicket, Skeleton};
use studio_core::StudioResult;
use studio_wire::Payload;
use tracing::warn;

use crate::{AssetSource, Backdrop};

#[derive(Debug, Clone, PartialEq)]
pub enum EnvironmentCall {
    Background(Payload),
    Environment(Payload),
    PostProcessing(Payload),
    Hdri(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    LoadAvatar { ticket: LoadTicket, url: String },
    FetchClip { url: String, skeleton: Skeleton },
    Environment(EnvironmentCall),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    AvatarLoaded {
        ticket: LoadTicket,
        result: StudioResult<AvatarModel>,
    },
    ClipFetched {
        url: String,
        result: StudioResult<Clip>,
    },
}

impl Job {
    /// Run the job. Environment calls are fire-and-forget and produce no
    /// completion; their failures are only logged.
    pub async fn run(
        self,
        assets: Arc<dyn AssetSource>,
        backdrop: Arc<dyn Backdrop>,
    ) -> Option<Completion> {
        match self {
            Job::LoadAvatar { ticket, url } => {
                let result = assets.load_avatar(&url).await;
                Some(Completion::AvatarLoaded { ticket, result })
            }
            Job::FetchClip { url, skeleton } => {
                let result = assets.fetch_clip(&url, &skeleton).await;
                Some(Completion::ClipFetched { url, result })
            }
            Job::Environment(call) => {
                let result = match &call {
                    EnvironmentCall::Background(p) => backdrop.set_background(p).await,
                    EnvironmentCall::Environment(p) => backdrop.set_environment(p).await,
                    EnvironmentCall::PostProcessing(p) => backdrop.set_post_processing(p).await,
                    EnvironmentCall::Hdri(h) => backdrop.set_hdri(h).await,
                };
                if let Err(e) = result {
                    warn!(?call, error = %e, "environment call failed");
                }
                None
            }
        }
    }
}
