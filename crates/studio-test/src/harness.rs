//! Scenario harness
//!
//! Drives a [`SceneDirector`] frame by frame at a fixed rate. Jobs the
//! director emits are run to completion on a private current-thread tokio
//! runtime against the mock collaborators, so scenarios are deterministic
//! and need no sockets. Tests can also hold jobs back and resolve them in
//! any order to stage races.

use std::sync::Arc;
use std::time::Duration;

use studio_camera::ShotType;
use studio_core::{PeerId, SceneTime, Vec3};
use studio_runtime::{AssetSource, Backdrop, Job, SceneDirector, StudioConfig};
use studio_transport::MessageDelegate;
use studio_wire::{parse_inbound, AvatarLoad, InboundMessage, OutboundMessage, WireError};
use tokio::runtime::Runtime;

use crate::{MockAssets, MockBackdrop, RecordingScene};

/// Harness frame rate
pub const FRAME_RATE: f32 = 60.0;

/// A cut observed between two frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutRecord {
    pub at: SceneTime,
    pub kind: ShotType,
    /// Whether someone was speaking when the cut happened
    pub speaking: bool,
}

pub struct StudioHarness {
    director: SceneDirector<RecordingScene>,
    assets: Arc<MockAssets>,
    backdrop: Arc<MockBackdrop>,
    runtime: Runtime,
    outbound: Vec<OutboundMessage>,
    cuts: Vec<CutRecord>,
    frame: Duration,
}

impl StudioHarness {
    pub fn new(config: StudioConfig) -> std::io::Result<Self> {
        Self::with_assets(config, MockAssets::new())
    }

    pub fn with_assets(config: StudioConfig, assets: MockAssets) -> std::io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        Ok(Self {
            director: SceneDirector::new(config, RecordingScene::default()),
            assets: Arc::new(assets),
            backdrop: Arc::new(MockBackdrop::default()),
            runtime,
            outbound: Vec::new(),
            cuts: Vec::new(),
            frame: Duration::from_secs_f32(1.0 / FRAME_RATE),
        })
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Deliver a directive the way the dispatcher would
    pub fn send(&mut self, message: InboundMessage) {
        let before = self.director.shots().last_cut_at();
        self.director.on_message(message);
        self.record_cut(before);
    }

    /// Parse and deliver a raw wire frame
    pub fn send_json(&mut self, text: &str) -> Result<(), WireError> {
        let message = parse_inbound(text)?;
        self.send(message);
        Ok(())
    }

    pub fn load(&mut self, peer: &str, url: &str) {
        self.load_at(peer, url, None);
    }

    pub fn load_at(&mut self, peer: &str, url: &str, position: Option<Vec3>) {
        self.send(InboundMessage::AvatarLoad(AvatarLoad {
            peer: PeerId::new(peer),
            url: url.to_string(),
            name: None,
            local: false,
            position,
        }));
    }

    pub fn remove(&mut self, peer: &str) {
        self.send(InboundMessage::AvatarRemove {
            peer: PeerId::new(peer),
        });
    }

    pub fn speaking(&mut self, peer: &str, active: bool) {
        self.send(InboundMessage::Speaking {
            peer: PeerId::new(peer),
            active,
        });
    }

    pub fn move_to(&mut self, peer: &str, position: Vec3) {
        self.send(InboundMessage::MoveTo {
            peer: PeerId::new(peer),
            target_peer: None,
            position: Some(position),
        });
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    /// Take the director's queued jobs without running them
    pub fn hold_jobs(&mut self) -> Vec<Job> {
        self.director.drain_jobs()
    }

    /// Run one job now and queue its completion on the director
    pub fn resolve(&mut self, job: Job) {
        let assets: Arc<dyn AssetSource> = self.assets.clone();
        let backdrop: Arc<dyn Backdrop> = self.backdrop.clone();
        if let Some(completion) = self.runtime.block_on(job.run(assets, backdrop)) {
            self.director.complete(completion);
        }
    }

    /// Run every queued job. Returns how many ran.
    pub fn run_jobs(&mut self) -> usize {
        let jobs = self.hold_jobs();
        let count = jobs.len();
        for job in jobs {
            self.resolve(job);
        }
        count
    }

    // ------------------------------------------------------------------
    // Time
    // ------------------------------------------------------------------

    /// One frame: run jobs, tick, record cuts and outbound messages
    pub fn step(&mut self) {
        self.run_jobs();
        let before = self.director.shots().last_cut_at();
        self.director.tick(self.frame);
        self.record_cut(before);
        self.outbound.extend(self.director.drain_outbound());
    }

    fn record_cut(&mut self, before: Option<SceneTime>) {
        let shots = self.director.shots();
        if shots.last_cut_at() == before {
            return;
        }
        if let (Some(at), Some(kind)) = (shots.last_cut_at(), shots.last_type()) {
            self.cuts.push(CutRecord {
                at,
                kind,
                speaking: self.director.speaker().is_some(),
            });
        }
    }

    /// Step for `seconds` of scene time
    pub fn advance(&mut self, seconds: f32) {
        let frames = (seconds * FRAME_RATE).ceil() as usize;
        for _ in 0..frames {
            self.step();
        }
    }

    /// Step until no job or completion is outstanding
    pub fn settle(&mut self) {
        for _ in 0..32 {
            self.step();
            let idle = self.director.pending_completions() == 0
                && self.director.pending_jobs() == 0;
            if idle {
                return;
            }
        }
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn director(&self) -> &SceneDirector<RecordingScene> {
        &self.director
    }

    pub fn director_mut(&mut self) -> &mut SceneDirector<RecordingScene> {
        &mut self.director
    }

    pub fn scene(&self) -> &RecordingScene {
        self.director.scene()
    }

    pub fn assets(&self) -> &MockAssets {
        &self.assets
    }

    pub fn backdrop(&self) -> &MockBackdrop {
        &self.backdrop
    }

    pub fn cuts(&self) -> &[CutRecord] {
        &self.cuts
    }

    pub fn outbound(&self) -> &[OutboundMessage] {
        &self.outbound
    }

    pub fn now(&self) -> SceneTime {
        self.director.now()
    }

    pub fn frame_secs(&self) -> f32 {
        self.frame.as_secs_f32()
    }
}
