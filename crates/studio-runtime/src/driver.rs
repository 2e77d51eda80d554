//! Studio Runtime - tokio loop around the scene director
//!
//! One task owns the [`SceneDirector`] (inside the dispatcher) and selects
//! over four sources: channel events, finished jobs, the frame interval and
//! shutdown. Jobs run on their own tasks and only ever talk back through the
//! completion queue, so the director is never shared and no lock is held
//! across an await.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use studio_core::StudioResult;
use studio_transport::{
    ChannelEvent, ChannelHandle, DispatchOutcome, Dispatcher, MessageChannel,
};
use studio_wire::OutboundMessage;
use tokio::sync::{mpsc, Notify};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::{AssetSource, Backdrop, Completion, Job, SceneDirector, SceneGraph, StudioConfig};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeStats {
    pub ticks: u64,
    pub jobs_spawned: u64,
    pub completions: u64,
    pub outbound_sent: u64,
    pub outbound_dropped: u64,
    pub frames_rejected: u64,
    pub connected: bool,
    pub disconnects: u64,
    pub scene_ready: bool,
    pub last_tick_duration: Duration,
}

/// Cloneable view onto a running runtime
#[derive(Clone, Default)]
pub struct RuntimeHandle {
    stats: Arc<RwLock<RuntimeStats>>,
    shutdown: Arc<Notify>,
}

impl RuntimeHandle {
    pub fn stats(&self) -> RuntimeStats {
        self.stats.read().clone()
    }

    /// Stop the loop after the current iteration
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

pub struct StudioRuntime<S: SceneGraph> {
    config: StudioConfig,
    assets: Arc<dyn AssetSource>,
    backdrop: Arc<dyn Backdrop>,
    dispatcher: Dispatcher<SceneDirector<S>>,
    handle: RuntimeHandle,
}

impl<S: SceneGraph> StudioRuntime<S> {
    pub fn new(
        config: StudioConfig,
        assets: Arc<dyn AssetSource>,
        backdrop: Arc<dyn Backdrop>,
    ) -> Self {
        Self {
            config,
            assets,
            backdrop,
            dispatcher: Dispatcher::new(),
            handle: RuntimeHandle::default(),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    /// Connect to the orchestrator and run until shutdown.
    ///
    /// `scene_ready` resolves once the renderer can take avatars; directives
    /// arriving before that go through the dispatcher's early queue.
    pub async fn run(self, scene_ready: impl Future<Output = S>) -> StudioResult<()> {
        self.config.validate()?;
        let (channel, events) = MessageChannel::spawn(self.config.channel.clone())?;
        self.run_with(channel, events, scene_ready).await
    }

    /// Run against an already established channel
    pub async fn run_with(
        mut self,
        channel: ChannelHandle,
        mut events: mpsc::Receiver<ChannelEvent>,
        scene_ready: impl Future<Output = S>,
    ) -> StudioResult<()> {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        let shutdown = Arc::clone(&self.handle.shutdown);

        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();

        tokio::pin!(scene_ready);
        let mut waiting_for_scene = true;

        info!(tick_ms = self.config.tick_interval_ms, "studio runtime started");

        loop {
            tokio::select! {
                scene = &mut scene_ready, if waiting_for_scene => {
                    waiting_for_scene = false;
                    let director = SceneDirector::new(self.config.clone(), scene);
                    let replayed = self.dispatcher.register(director);
                    self.handle.stats.write().scene_ready = true;
                    info!(replayed, "scene ready");
                    self.flush(&channel, &done_tx);
                }
                event = events.recv() => match event {
                    Some(event) => {
                        self.on_event(event);
                        self.flush(&channel, &done_tx);
                    }
                    None => {
                        warn!("channel event stream ended");
                        break;
                    }
                },
                Some(completion) = done_rx.recv() => {
                    if let Some(director) = self.dispatcher.delegate_mut() {
                        director.complete(completion);
                        self.handle.stats.write().completions += 1;
                    }
                }
                _ = interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick);
                    last_tick = now;
                    self.tick(dt, &channel, &done_tx);
                }
                _ = shutdown.notified() => {
                    info!("studio runtime shutting down");
                    break;
                }
            }
        }

        channel.shutdown();
        Ok(())
    }

    fn on_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                self.handle.stats.write().connected = true;
                info!("orchestrator connected");
            }
            ChannelEvent::Disconnected { reason } => {
                let mut stats = self.handle.stats.write();
                stats.connected = false;
                stats.disconnects += 1;
                info!(%reason, "orchestrator disconnected");
            }
            ChannelEvent::Message(message) => {
                let kind = message.kind();
                if self.dispatcher.dispatch(message) == DispatchOutcome::Queued {
                    debug!(kind = kind.as_str(), "directive queued until scene is ready");
                }
            }
            ChannelEvent::Rejected(_) => {
                self.handle.stats.write().frames_rejected += 1;
            }
        }
    }

    fn tick(
        &mut self,
        dt: Duration,
        channel: &ChannelHandle,
        done: &mpsc::UnboundedSender<Completion>,
    ) {
        let started = Instant::now();
        let Some(director) = self.dispatcher.delegate_mut() else {
            return;
        };
        director.tick(dt);
        self.flush(channel, done);

        let mut stats = self.handle.stats.write();
        stats.ticks += 1;
        stats.last_tick_duration = started.elapsed();
    }

    /// Start queued jobs and send queued outbound messages
    fn flush(&mut self, channel: &ChannelHandle, done: &mpsc::UnboundedSender<Completion>) {
        let Some(director) = self.dispatcher.delegate_mut() else {
            return;
        };
        let jobs = director.drain_jobs();
        let outbound = director.drain_outbound();

        for job in jobs {
            self.spawn_job(job, done);
        }
        for message in outbound {
            self.send(message, channel);
        }
    }

    fn spawn_job(&self, job: Job, done: &mpsc::UnboundedSender<Completion>) {
        let assets = Arc::clone(&self.assets);
        let backdrop = Arc::clone(&self.backdrop);
        let done = done.clone();
        tokio::spawn(async move {
            if let Some(completion) = job.run(assets, backdrop).await {
                // Runtime gone; nothing left to apply it to
                let _ = done.send(completion);
            }
        });
        self.handle.stats.write().jobs_spawned += 1;
    }

    fn send(&self, message: OutboundMessage, channel: &ChannelHandle) {
        match channel.try_send(message) {
            Ok(()) => self.handle.stats.write().outbound_sent += 1,
            Err(e) => {
                self.handle.stats.write().outbound_dropped += 1;
                warn!(error = %e, "outbound message dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use studio_avatar::{AvatarModel, Clip, Skeleton};
    use studio_camera::{CameraState, LightRig};
    use studio_core::{PeerId, StudioError};
    use studio_wire::{AvatarLoad, InboundMessage, Payload};
    use tokio::sync::oneshot;

    use crate::AvatarPose;

    struct Assets;

    #[async_trait]
    impl AssetSource for Assets {
        async fn load_avatar(&self, url: &str) -> StudioResult<AvatarModel> {
            Ok(AvatarModel {
                url: url.to_string(),
                skeleton: Skeleton::reference(),
                bounds: None,
            })
        }

        async fn fetch_clip(&self, url: &str, _skeleton: &Skeleton) -> StudioResult<Clip> {
            Err(StudioError::ClipLoad {
                url: url.to_string(),
                reason: "offline".into(),
            })
        }
    }

    struct Stage;

    #[async_trait]
    impl Backdrop for Stage {
        async fn set_background(&self, _payload: &Payload) -> StudioResult<()> {
            Ok(())
        }
        async fn set_environment(&self, _payload: &Payload) -> StudioResult<()> {
            Ok(())
        }
        async fn set_post_processing(&self, _payload: &Payload) -> StudioResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Scene;

    impl SceneGraph for Scene {
        fn add_avatar(&mut self, _peer: &PeerId, _model: &AvatarModel, _scale: f32) {}
        fn remove_avatar(&mut self, _peer: &PeerId) {}
        fn apply_pose(&mut self, _pose: &AvatarPose) {}
        fn set_camera(&mut self, _camera: &CameraState) {}
        fn set_lights(&mut self, _rig: &LightRig) {}
    }

    fn config() -> StudioConfig {
        StudioConfig {
            tick_interval_ms: 5,
            ..StudioConfig::default()
        }
    }

    #[tokio::test]
    async fn test_early_load_replayed_and_ready_sent() {
        let runtime: StudioRuntime<Scene> =
            StudioRuntime::new(config(), Arc::new(Assets), Arc::new(Stage));
        let handle = runtime.handle();
        let (channel, mut outbound) = ChannelHandle::detached(16);
        let (events_tx, events_rx) = mpsc::channel(16);
        let (scene_tx, scene_rx) = oneshot::channel::<Scene>();

        let task = tokio::spawn(async move {
            runtime
                .run_with(channel, events_rx, async move {
                    scene_rx.await.unwrap_or_default()
                })
                .await
        });

        events_tx.send(ChannelEvent::Connected).await.unwrap();
        events_tx
            .send(ChannelEvent::Message(InboundMessage::AvatarLoad(AvatarLoad {
                peer: PeerId::new("a"),
                url: "avatars/a.vrm".into(),
                name: None,
                local: false,
                position: None,
            })))
            .await
            .unwrap();

        // Nothing can load before the scene exists
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(outbound.try_recv().is_err());
        assert!(!handle.stats().scene_ready);

        scene_tx.send(Scene).ok();
        let ready = tokio::time::timeout(Duration::from_secs(2), outbound.recv())
            .await
            .expect("no ready message")
            .expect("outbound closed");
        assert_eq!(
            ready,
            OutboundMessage::Ready {
                peer_id: PeerId::new("a")
            }
        );

        let stats = handle.stats();
        assert!(stats.connected);
        assert!(stats.scene_ready);
        assert!(stats.jobs_spawned >= 1);

        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_closed_event_stream_stops_runtime() {
        let runtime: StudioRuntime<Scene> =
            StudioRuntime::new(config(), Arc::new(Assets), Arc::new(Stage));
        let (channel, _outbound) = ChannelHandle::detached(4);
        let (events_tx, events_rx) = mpsc::channel(4);
        drop(events_tx);

        let result = tokio::time::timeout(
            Duration::from_secs(2),
            runtime.run_with(channel, events_rx, async { Scene }),
        )
        .await
        .expect("runtime did not stop");
        assert!(result.is_ok());
    }
}
