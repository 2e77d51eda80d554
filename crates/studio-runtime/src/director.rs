//! Scene Director - the single owner of all per-peer state
//!
//! Directives arrive through [`MessageDelegate::on_message`]; time moves
//! through [`SceneDirector::tick`]. Neither ever awaits: loads, clip fetches
//! and backdrop calls are queued as [`Job`]s and come back as
//! [`Completion`]s applied at the start of the next tick.
//!
//! Cancellation is implicit. Removing a peer drops its map entries and bumps
//! its load generation, so whatever was in flight for it lands as a no-op.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use studio_avatar::{
    AvatarModel, AvatarRegistry, Clip, ClipCache, ClipCacheStats, ClipRequest, GazeController,
    LoadOutcome, LoadTicket, MixerEvent, MoveStart, MovementController, IDLE_RETURN_FADE,
    REACTIVE_FADE,
};
use studio_camera::{
    CameraAnimator, CameraState, DirectiveOutcome, FocusZone, FramingContext, Gaffer, LightRig,
    ShotDirector, Subject,
};
use studio_core::{PeerId, SceneClock, SceneTime, StudioError, StudioResult, Vec3};
use studio_life::{LifeSystems, Role};
use studio_transport::MessageDelegate;
use studio_wire::{AvatarLoad, InboundMessage, OutboundMessage};
use tracing::{debug, info, warn};

use crate::{AvatarPose, Completion, EnvironmentCall, Job, SceneGraph, StudioConfig};

/// Gesture weight never drops below this, so a faint gesture stays visible
const MIN_GESTURE_INTENSITY: f32 = 0.2;

/// What a requested clip is for once it arrives
#[derive(Debug, Clone, Copy, PartialEq)]
enum ClipUse {
    Walk,
    Loop { fade: f32 },
    OneShot { intensity: f32 },
}

/// A peer waiting on a clip fetch
#[derive(Debug, Clone)]
struct ClipWaiter {
    peer: PeerId,
    /// Only the peer's newest request may touch its mixer
    seq: u64,
    usage: ClipUse,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SceneStats {
    pub ticks: u64,
    pub messages: u64,
    pub rejected: u64,
    pub jobs: u64,
    pub completions: u64,
    pub cuts: u64,
}

pub struct SceneDirector<S: SceneGraph> {
    config: StudioConfig,
    clock: SceneClock,
    registry: AvatarRegistry,
    movement: MovementController,
    gaze: GazeController,
    life: LifeSystems,
    clips: ClipCache<ClipWaiter>,
    clip_seq: HashMap<PeerId, u64>,
    zone: FocusZone,
    shots: ShotDirector,
    animator: CameraAnimator,
    gaffer: Gaffer,
    speaker: Option<PeerId>,
    scene: S,
    jobs: Vec<Job>,
    completions: VecDeque<Completion>,
    outbound: Vec<OutboundMessage>,
    stats: SceneStats,
}

impl<S: SceneGraph> SceneDirector<S> {
    pub fn new(config: StudioConfig, scene: S) -> Self {
        Self {
            clock: SceneClock::new(),
            registry: AvatarRegistry::new(config.registry.clone()),
            movement: MovementController::new(config.movement.clone()),
            gaze: GazeController::new(config.gaze.clone()),
            life: LifeSystems::new(config.life.clone()),
            clips: ClipCache::new(),
            clip_seq: HashMap::new(),
            zone: config.zone,
            shots: ShotDirector::new(config.director.clone()),
            animator: CameraAnimator::new(config.animator.clone()),
            gaffer: Gaffer::new(config.gaffer.clone()),
            speaker: None,
            scene,
            jobs: Vec::new(),
            completions: VecDeque::new(),
            outbound: Vec::new(),
            stats: SceneStats::default(),
            config,
        }
    }

    // ------------------------------------------------------------------
    // Directives
    // ------------------------------------------------------------------

    /// Apply one directive. Errors only concern this directive; nothing
    /// else in the scene is touched.
    pub fn handle(&mut self, message: InboundMessage) -> StudioResult<()> {
        match message {
            InboundMessage::Emotion { peer, emotion } => self.set_emotion(&peer, &emotion),
            InboundMessage::Gesture {
                peer,
                gesture,
                intensity,
            } => self.play_gesture(&peer, &gesture, intensity),
            InboundMessage::Mouth { peer, value } => {
                let now = self.clock.now();
                if self.life.set_mouth(&peer, value.clamp(0.0, 1.0), now) {
                    Ok(())
                } else {
                    Err(StudioError::PeerNotFound(peer))
                }
            }
            InboundMessage::AvatarLoad(load) => {
                self.load_avatar(load);
                Ok(())
            }
            InboundMessage::AvatarRemove { peer } => {
                self.remove_avatar(&peer);
                Ok(())
            }
            InboundMessage::Speaking { peer, active } => {
                self.set_speaking(peer, active);
                Ok(())
            }
            InboundMessage::MoveTo {
                peer,
                target_peer,
                position,
            } => self.move_to(&peer, target_peer.as_ref(), position),
            InboundMessage::GoHome { peer } => {
                let home = self
                    .registry
                    .get(&peer)
                    .map(|a| a.home)
                    .ok_or_else(|| StudioError::PeerNotFound(peer.clone()))?;
                self.start_movement(&peer, home)
            }
            InboundMessage::SetCameraRoom {
                zone_center,
                radius,
                hdri,
            } => {
                self.zone.set(zone_center, radius);
                info!(center = ?self.zone.center, radius = self.zone.radius, "focus zone set");
                if let Some(hdri) = hdri {
                    self.push_job(Job::Environment(EnvironmentCall::Hdri(hdri)));
                }
                Ok(())
            }
            InboundMessage::SetCameraShot {
                shot,
                hold_seconds,
                force,
            } => self.direct_shot(&shot, hold_seconds, force),
            InboundMessage::PlayAnimation { peer, url, looping } => {
                self.play_animation(&peer, &url, looping.unwrap_or(true))
            }
            InboundMessage::SetBackground(payload) => {
                self.push_job(Job::Environment(EnvironmentCall::Background(payload)));
                Ok(())
            }
            InboundMessage::SetEnvironment(payload) => {
                self.push_job(Job::Environment(EnvironmentCall::Environment(payload)));
                Ok(())
            }
            InboundMessage::SetPostProcessing(payload) => {
                self.push_job(Job::Environment(EnvironmentCall::PostProcessing(payload)));
                Ok(())
            }
        }
    }

    fn load_avatar(&mut self, load: AvatarLoad) {
        let url = self.config.resolve_avatar_url(&load.url, load.local);
        let ticket = self
            .registry
            .begin_load(load.peer.clone(), load.name, load.position);
        info!(peer = %load.peer, %url, generation = ticket.generation, "avatar load started");
        self.push_job(Job::LoadAvatar { ticket, url });
    }

    /// Dispose the avatar and purge every per-peer entry
    fn remove_avatar(&mut self, peer: &PeerId) {
        let removed = self.registry.remove(peer);
        self.movement.cancel(peer);
        self.life.remove(peer);
        self.clip_seq.remove(peer);
        self.clips.retain_waiters(|w| w.peer != *peer);

        if self.speaker.as_ref() == Some(peer) {
            self.speaker = None;
        }
        self.gaze.clear(peer);
        self.rebuild_gaze();

        if removed.is_some() {
            self.scene.remove_avatar(peer);
            info!(%peer, "avatar removed");
        } else {
            debug!(%peer, "remove for peer without avatar");
        }
    }

    fn set_speaking(&mut self, peer: PeerId, active: bool) {
        let next = match (&self.speaker, active) {
            (_, true) => Some(peer),
            (Some(current), false) if *current == peer => None,
            (current, false) => current.clone(),
        };
        if next == self.speaker {
            return;
        }

        info!(speaker = ?next, previous = ?self.speaker, "active speaker changed");
        self.speaker = next;
        self.rebuild_gaze();
        if self.speaker.is_some() {
            self.shots.speaker_changed();
        }
    }

    fn rebuild_gaze(&mut self) {
        let positions = self.registry.positions();
        let radius = self.registry.config().colocate_radius;
        self.gaze
            .rebuild_for_speaker(self.speaker.as_ref(), &positions, radius);
    }

    fn set_emotion(&mut self, peer: &PeerId, emotion: &str) -> StudioResult<()> {
        let position = {
            let avatar = self
                .registry
                .get_mut(peer)
                .ok_or_else(|| StudioError::PeerNotFound(peer.clone()))?;
            avatar.emotion = Some(emotion.to_string());
            avatar.position
        };

        let cause = self.config.library.emotion_clip(emotion).map(str::to_string);
        match cause {
            Some(url) => {
                self.request_if_idle(peer, &url, ClipUse::Loop { fade: REACTIVE_FADE })
            }
            None => {
                debug!(%peer, emotion, "no clip for emotion, returning to idle");
                self.return_to_idle(peer);
            }
        }

        let Some(reaction) = self.config.library.reaction_clip(emotion).map(str::to_string)
        else {
            return Ok(());
        };
        let audience: Vec<PeerId> = if self.zone.contains(position) {
            self.registry
                .iter()
                .filter(|a| a.peer != *peer && self.zone.contains(a.position))
                .map(|a| a.peer.clone())
                .collect()
        } else {
            self.registry
                .colocated(position, peer)
                .into_iter()
                .map(|a| a.peer.clone())
                .collect()
        };
        debug!(%peer, emotion, reactions = audience.len(), "emotion expressed");
        for other in audience {
            self.request_if_idle(&other, &reaction, ClipUse::Loop { fade: REACTIVE_FADE });
        }
        Ok(())
    }

    fn play_gesture(
        &mut self,
        peer: &PeerId,
        gesture: &str,
        intensity: Option<f32>,
    ) -> StudioResult<()> {
        if !self.registry.contains(peer) {
            return Err(StudioError::PeerNotFound(peer.clone()));
        }
        let url = self
            .config
            .library
            .gesture_clip(gesture)
            .map(str::to_string)
            .ok_or_else(|| StudioError::InvalidDirective(format!("unknown gesture {}", gesture)))?;
        let intensity = intensity.unwrap_or(1.0).clamp(MIN_GESTURE_INTENSITY, 1.0);
        self.request_if_idle(peer, &url, ClipUse::OneShot { intensity });
        Ok(())
    }

    fn play_animation(&mut self, peer: &PeerId, url: &str, looping: bool) -> StudioResult<()> {
        if !self.registry.contains(peer) {
            return Err(StudioError::PeerNotFound(peer.clone()));
        }
        if url.is_empty() {
            return Err(StudioError::InvalidDirective("play_animation without url".into()));
        }
        let usage = if looping {
            ClipUse::Loop { fade: REACTIVE_FADE }
        } else {
            ClipUse::OneShot { intensity: 1.0 }
        };
        self.request_if_idle(peer, url, usage);
        Ok(())
    }

    fn move_to(
        &mut self,
        peer: &PeerId,
        target_peer: Option<&PeerId>,
        position: Option<Vec3>,
    ) -> StudioResult<()> {
        let from = self
            .registry
            .get(peer)
            .map(|a| a.position)
            .ok_or_else(|| StudioError::PeerNotFound(peer.clone()))?;

        let target = match (target_peer, position) {
            (Some(other), _) => {
                if other == peer {
                    return Err(StudioError::InvalidDirective(
                        "move_to target_peer is the moving peer".into(),
                    ));
                }
                let toward = self
                    .registry
                    .get(other)
                    .map(|a| a.position)
                    .ok_or_else(|| StudioError::PeerNotFound(other.clone()))?;
                self.movement.standoff_target(from, toward)
            }
            (None, Some(position)) => position.with_y(0.0),
            (None, None) => {
                return Err(StudioError::InvalidDirective(
                    "move_to needs target_peer or position".into(),
                ))
            }
        };
        self.start_movement(peer, target)
    }

    fn start_movement(&mut self, peer: &PeerId, target: Vec3) -> StudioResult<()> {
        let avatar = self
            .registry
            .get_mut(peer)
            .ok_or_else(|| StudioError::PeerNotFound(peer.clone()))?;
        // Only a loop is worth resuming on arrival; otherwise fall back to idle
        let previous = avatar
            .mixer
            .active()
            .filter(|a| a.looping)
            .map(|a| a.url().to_string());

        match self
            .movement
            .start(peer.clone(), avatar.position, target, previous)
        {
            MoveStart::AlreadyThere => {
                debug!(%peer, "already at movement target");
            }
            MoveStart::Started { heading, replaced } => {
                avatar.yaw = heading;
                info!(%peer, ?target, replaced, "movement started");
                let walk = self.config.library.walk.clone();
                self.request_clip(peer, &walk, ClipUse::Walk);
            }
        }
        Ok(())
    }

    fn direct_shot(&mut self, keyword: &str, hold: Option<f32>, force: bool) -> StudioResult<()> {
        let ctx = self.framing_context();
        let now = self.clock.now();
        match self.shots.direct(keyword, hold, force, now, &ctx)? {
            DirectiveOutcome::Cut(cut) => {
                info!(shot = %cut.shot.kind, context = ?cut.context, "directed cut");
                self.animator.apply(&cut.shot);
                self.stats.cuts += 1;
            }
            DirectiveOutcome::Deferred(kind) => {
                debug!(shot = %kind, "directed cut deferred");
            }
            DirectiveOutcome::Auto => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Clips
    // ------------------------------------------------------------------

    /// Clip changes wait for a walk to end; the walk owns the mixer
    fn request_if_idle(&mut self, peer: &PeerId, url: &str, usage: ClipUse) {
        if self.movement.is_moving(peer) {
            debug!(%peer, url, "avatar walking, clip change skipped");
            return;
        }
        self.request_clip(peer, url, usage);
    }

    fn return_to_idle(&mut self, peer: &PeerId) {
        let Some(idle) = self.registry.get(peer).map(|a| a.idle_clip.clone()) else {
            return;
        };
        let idle = if idle.is_empty() {
            self.config.library.generic_idle.clone()
        } else {
            idle
        };
        self.request_clip(peer, &idle, ClipUse::Loop { fade: IDLE_RETURN_FADE });
    }

    fn request_clip(&mut self, peer: &PeerId, url: &str, usage: ClipUse) {
        if url.is_empty() {
            return;
        }
        let Some(skeleton) = self.registry.get(peer).map(|a| a.skeleton.clone()) else {
            return;
        };

        let seq = self.clip_seq.entry(peer.clone()).or_insert(0);
        *seq += 1;
        let waiter = ClipWaiter {
            peer: peer.clone(),
            seq: *seq,
            usage,
        };

        match self.clips.request(url, waiter.clone()) {
            ClipRequest::Ready(clip) => self.apply_clip(&waiter, clip),
            ClipRequest::Fetch => {
                debug!(%peer, url, "fetching clip");
                self.push_job(Job::FetchClip {
                    url: url.to_string(),
                    skeleton,
                });
            }
            ClipRequest::Waiting => {}
        }
    }

    fn apply_clip(&mut self, waiter: &ClipWaiter, clip: Arc<Clip>) {
        if self.clip_seq.get(&waiter.peer) != Some(&waiter.seq) {
            debug!(peer = %waiter.peer, url = %clip.url, "superseded clip request");
            return;
        }
        let moving = self.movement.is_moving(&waiter.peer);
        let Some(avatar) = self.registry.get_mut(&waiter.peer) else {
            return;
        };

        match waiter.usage {
            ClipUse::Walk => {
                if moving {
                    avatar.mixer.crossfade_to(clip, REACTIVE_FADE);
                }
            }
            ClipUse::Loop { fade } => {
                avatar.mixer.crossfade_to(clip, fade);
            }
            ClipUse::OneShot { intensity } => {
                avatar.mixer.play(clip, REACTIVE_FADE, false, intensity);
            }
        }
    }

    // ------------------------------------------------------------------
    // Completions
    // ------------------------------------------------------------------

    /// Queue a finished job's result for the next tick
    pub fn complete(&mut self, completion: Completion) {
        self.completions.push_back(completion);
    }

    fn apply_completion(&mut self, completion: Completion) {
        self.stats.completions += 1;
        match completion {
            Completion::AvatarLoaded { ticket, result } => self.apply_avatar(ticket, result),
            Completion::ClipFetched { url, result } => match result {
                Ok(clip) => {
                    let (clip, waiters) = self.clips.complete(&url, clip);
                    for waiter in waiters {
                        if self.registry.contains(&waiter.peer) {
                            self.apply_clip(&waiter, Arc::clone(&clip));
                        }
                    }
                }
                Err(e) => {
                    let waiters = self.clips.fail(&url);
                    warn!(%url, error = %e, waiting = waiters.len(), "clip unavailable");
                }
            },
        }
    }

    fn apply_avatar(&mut self, ticket: LoadTicket, result: StudioResult<AvatarModel>) {
        let peer = ticket.peer.clone();
        let model = match result {
            Ok(model) => model,
            Err(e) => {
                if self.registry.fail_load(&ticket) {
                    warn!(%peer, error = %e, "avatar load failed");
                } else {
                    debug!(%peer, error = %e, "stale avatar load failed");
                }
                return;
            }
        };

        let pool = self.config.library.idle_pool();
        match self.registry.complete_load(&ticket, model.clone(), &pool) {
            Ok(LoadOutcome::Loaded { replaced }) => {
                if let Some(previous) = replaced {
                    debug!(%peer, %previous, "disposing replaced avatar");
                    self.scene.remove_avatar(&peer);
                }
                let scale = self.registry.get(&peer).map(|a| a.scale).unwrap_or(1.0);
                self.scene.add_avatar(&peer, &model, scale);

                self.movement.cancel(&peer);
                self.life.remove(&peer);
                self.life.insert(peer.clone(), self.clock.now());
                self.return_to_idle(&peer);
                self.rebuild_gaze();
                self.outbound.push(OutboundMessage::Ready {
                    peer_id: peer.clone(),
                });
            }
            Ok(LoadOutcome::Stale) => {}
            Err(e) => warn!(%peer, error = %e, "avatar rejected, keeping previous"),
        }
    }

    // ------------------------------------------------------------------
    // Frame tick
    // ------------------------------------------------------------------

    /// Advance the whole scene by `dt`
    pub fn tick(&mut self, dt: Duration) {
        self.stats.ticks += 1;

        // Stage 1: Advance the scene clock
        let max_step = self.config.max_step();
        let dt = self.clock.advance(dt, max_step);
        let now = self.clock.now();

        // Stage 2: Apply async results
        while let Some(completion) = self.completions.pop_front() {
            self.apply_completion(completion);
        }

        // Stage 3: Walks
        self.update_movement(dt);

        // Stage 4: Gaze for everyone standing still
        self.update_gaze(dt);

        // Stage 5: Life systems and mixers
        let poses = self.update_avatars(now, dt);

        // Stage 6: Camera
        let camera = self.update_camera(now, dt);

        // Stage 7: Lights
        let rig = self.update_lights(now, dt);

        // Stage 8: Push the frame to the scene
        for pose in &poses {
            self.scene.apply_pose(pose);
        }
        self.scene.set_camera(&camera);
        self.scene.set_lights(&rig);
    }

    fn update_movement(&mut self, dt: f32) {
        let default_yaw = self.gaze.config().default_yaw;
        let mut arrivals = Vec::new();

        for step in self.movement.update(dt) {
            let Some(avatar) = self.registry.get_mut(&step.peer) else {
                continue;
            };
            avatar.position = step.position;
            avatar.yaw = step.heading;
            if let Some(arrival) = step.arrived {
                avatar.position = arrival.position;
                avatar.home = arrival.position;
                avatar.yaw = default_yaw;
                info!(peer = %step.peer, position = ?arrival.position, "movement arrived");
                arrivals.push((step.peer, arrival.previous_clip));
            }
        }

        let walk = self.config.library.walk.clone();
        for (peer, previous) in arrivals {
            match previous.filter(|clip| *clip != walk) {
                Some(clip) => self.request_clip(&peer, &clip, ClipUse::Loop { fade: IDLE_RETURN_FADE }),
                None => self.return_to_idle(&peer),
            }
        }
    }

    fn update_gaze(&mut self, dt: f32) {
        let positions: HashMap<PeerId, Vec3> = self.registry.positions().into_iter().collect();
        for avatar in self.registry.iter_mut() {
            if self.movement.is_moving(&avatar.peer) {
                continue;
            }
            let target = self
                .gaze
                .target(&avatar.peer)
                .and_then(|t| positions.get(t))
                .copied();
            let desired = self.gaze.desired_yaw(avatar.position, target);
            avatar.yaw = self.gaze.step_yaw(avatar.yaw, desired, dt);
        }
    }

    fn update_avatars(&mut self, now: SceneTime, dt: f32) -> Vec<AvatarPose> {
        let mut poses = Vec::with_capacity(self.registry.len());
        let mut finished = Vec::new();

        for avatar in self.registry.iter_mut() {
            let role = match &self.speaker {
                Some(s) if *s == avatar.peer => Role::Speaking,
                Some(_) => Role::Listening,
                None => Role::Idle,
            };
            let walking = self.movement.is_moving(&avatar.peer);
            let frame = self.life.update(&avatar.peer, role, walking, now, dt);

            for event in avatar.mixer.update(dt) {
                let MixerEvent::Finished { url } = event;
                if avatar.mixer.active_url() == Some(url.as_str()) {
                    finished.push(avatar.peer.clone());
                }
            }

            let (posture, blink, mouth) = frame
                .map(|f| (f.posture, f.blink, f.mouth))
                .unwrap_or_default();
            poses.push(AvatarPose {
                peer: avatar.peer.clone(),
                position: avatar.position,
                yaw: avatar.yaw,
                scale: avatar.scale,
                ground_offset: avatar.ground_offset,
                samples: avatar.mixer.sample(),
                posture,
                blink,
                mouth,
                emotion: avatar.emotion.clone(),
            });
        }

        for peer in finished {
            if !self.movement.is_moving(&peer) {
                self.return_to_idle(&peer);
            }
        }
        poses
    }

    fn update_camera(&mut self, now: SceneTime, dt: f32) -> CameraState {
        let ctx = self.framing_context();
        if let Some(cut) = self.shots.tick(now, &ctx) {
            info!(
                shot = %cut.shot.kind,
                context = ?cut.context,
                reason = ?cut.reason,
                "camera cut"
            );
            self.animator.apply(&cut.shot);
            self.stats.cuts += 1;
        }
        self.animator.update(dt)
    }

    fn update_lights(&mut self, now: SceneTime, dt: f32) -> LightRig {
        let in_focus: Vec<Vec3> = self
            .registry
            .iter()
            .map(|a| a.position)
            .filter(|p| self.zone.contains(*p))
            .collect();
        let center = Vec3::centroid(in_focus.iter())
            .or(self.zone.center)
            .unwrap_or(Vec3::ZERO);
        let speaker = self
            .speaker
            .as_ref()
            .and_then(|s| self.registry.get(s))
            .map(|a| a.position);
        self.gaffer.update(now, dt, center, speaker)
    }

    /// Avatars inside the focus zone, as the camera sees them
    pub fn framing_context(&self) -> FramingContext {
        let fallback = self.registry.config().target_height;
        let subjects = self
            .registry
            .iter()
            .filter(|a| self.zone.contains(a.position))
            .map(|a| Subject::new(a.peer.clone(), a.position, a.head_position(fallback)))
            .collect();
        FramingContext::new(subjects, self.speaker.clone())
    }

    // ------------------------------------------------------------------
    // Queues and accessors
    // ------------------------------------------------------------------

    fn push_job(&mut self, job: Job) {
        self.stats.jobs += 1;
        self.jobs.push(job);
    }

    pub fn drain_jobs(&mut self) -> Vec<Job> {
        std::mem::take(&mut self.jobs)
    }

    pub fn drain_outbound(&mut self) -> Vec<OutboundMessage> {
        std::mem::take(&mut self.outbound)
    }

    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    pub fn pending_completions(&self) -> usize {
        self.completions.len()
    }

    pub fn now(&self) -> SceneTime {
        self.clock.now()
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn registry(&self) -> &AvatarRegistry {
        &self.registry
    }

    pub fn movement(&self) -> &MovementController {
        &self.movement
    }

    pub fn gaze(&self) -> &GazeController {
        &self.gaze
    }

    pub fn life(&self) -> &LifeSystems {
        &self.life
    }

    pub fn shots(&self) -> &ShotDirector {
        &self.shots
    }

    pub fn animator(&self) -> &CameraAnimator {
        &self.animator
    }

    pub fn gaffer(&self) -> &Gaffer {
        &self.gaffer
    }

    pub fn zone(&self) -> &FocusZone {
        &self.zone
    }

    pub fn speaker(&self) -> Option<&PeerId> {
        self.speaker.as_ref()
    }

    pub fn clip_stats(&self) -> ClipCacheStats {
        self.clips.stats()
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }

    pub fn stats(&self) -> SceneStats {
        self.stats
    }
}

impl<S: SceneGraph> MessageDelegate for SceneDirector<S> {
    fn on_message(&mut self, message: InboundMessage) {
        self.stats.messages += 1;
        let kind = message.kind();
        if let Err(e) = self.handle(message) {
            self.stats.rejected += 1;
            warn!(kind = kind.as_str(), error = %e, "directive rejected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_avatar::{Bone, Skeleton, Track, TrackChannel};
    use studio_wire::Payload;

    #[derive(Default)]
    struct NullScene {
        added: Vec<PeerId>,
        removed: Vec<PeerId>,
        poses: usize,
    }

    impl SceneGraph for NullScene {
        fn add_avatar(&mut self, peer: &PeerId, _model: &AvatarModel, _scale: f32) {
            self.added.push(peer.clone());
        }
        fn remove_avatar(&mut self, peer: &PeerId) {
            self.removed.push(peer.clone());
        }
        fn apply_pose(&mut self, _pose: &AvatarPose) {
            self.poses += 1;
        }
        fn set_camera(&mut self, _camera: &CameraState) {}
        fn set_lights(&mut self, _rig: &LightRig) {}
    }

    fn director() -> SceneDirector<NullScene> {
        SceneDirector::new(StudioConfig::default(), NullScene::default())
    }

    fn model(url: &str) -> AvatarModel {
        AvatarModel {
            url: url.to_string(),
            skeleton: Skeleton::reference(),
            bounds: None,
        }
    }

    fn clip(url: &str, duration: f32) -> Clip {
        Clip::new(url, url, duration).with_track(Track::new(
            Bone::Spine,
            TrackChannel::Rotation,
            &[(0.0, Vec3::ZERO), (duration, Vec3::new(0.1, 0.0, 0.0))],
        ))
    }

    /// Run queued jobs synchronously against canned assets
    fn pump(d: &mut SceneDirector<NullScene>) {
        for job in d.drain_jobs() {
            match job {
                Job::LoadAvatar { ticket, url } => d.complete(Completion::AvatarLoaded {
                    ticket,
                    result: Ok(model(&url)),
                }),
                Job::FetchClip { url, .. } => d.complete(Completion::ClipFetched {
                    result: Ok(clip(&url, 1.0)),
                    url,
                }),
                Job::Environment(_) => {}
            }
        }
        d.tick(Duration::from_millis(16));
    }

    fn load(d: &mut SceneDirector<NullScene>, peer: &str) {
        d.handle(InboundMessage::AvatarLoad(AvatarLoad {
            peer: PeerId::new(peer),
            url: format!("avatars/{}.vrm", peer),
            name: None,
            local: false,
            position: None,
        }))
        .unwrap();
        pump(d);
        pump(d);
    }

    #[test]
    fn test_load_emits_ready_and_idle() {
        let mut d = director();
        load(&mut d, "a");

        let peer = PeerId::new("a");
        let avatar = d.registry().get(&peer).unwrap();
        assert!(avatar.mixer.active_url().is_some());
        assert!(d.life().contains(&peer));
        assert_eq!(d.scene().added, vec![peer.clone()]);
        assert!(d.scene().poses > 0);
        assert_eq!(
            d.drain_outbound(),
            vec![OutboundMessage::Ready { peer_id: peer }]
        );
    }

    #[test]
    fn test_removed_peer_load_is_noop() {
        let mut d = director();
        let peer = PeerId::new("a");
        d.handle(InboundMessage::AvatarLoad(AvatarLoad {
            peer: peer.clone(),
            url: "a.vrm".into(),
            name: None,
            local: false,
            position: None,
        }))
        .unwrap();
        let jobs = d.drain_jobs();
        d.handle(InboundMessage::AvatarRemove { peer: peer.clone() })
            .unwrap();

        for job in jobs {
            if let Job::LoadAvatar { ticket, url } = job {
                d.complete(Completion::AvatarLoaded {
                    ticket,
                    result: Ok(model(&url)),
                });
            }
        }
        d.tick(Duration::from_millis(16));

        assert!(!d.registry().contains(&peer));
        assert!(d.scene().added.is_empty());
        assert!(d.drain_outbound().is_empty());
    }

    #[test]
    fn test_unknown_peer_directives_rejected() {
        let mut d = director();
        let ghost = PeerId::new("ghost");
        d.on_message(InboundMessage::Emotion {
            peer: ghost.clone(),
            emotion: "happy".into(),
        });
        d.on_message(InboundMessage::GoHome { peer: ghost.clone() });
        d.on_message(InboundMessage::Mouth {
            peer: ghost,
            value: 0.5,
        });
        assert_eq!(d.stats().rejected, 3);
        assert_eq!(d.stats().messages, 3);
    }

    #[test]
    fn test_move_to_requires_a_target() {
        let mut d = director();
        load(&mut d, "a");
        let err = d
            .handle(InboundMessage::MoveTo {
                peer: PeerId::new("a"),
                target_peer: None,
                position: None,
            })
            .unwrap_err();
        assert!(matches!(err, StudioError::InvalidDirective(_)));
    }

    #[test]
    fn test_walk_restores_previous_clip() {
        let mut d = director();
        load(&mut d, "a");
        let peer = PeerId::new("a");
        let idle = d.registry().get(&peer).unwrap().idle_clip.clone();

        d.handle(InboundMessage::MoveTo {
            peer: peer.clone(),
            target_peer: None,
            position: Some(Vec3::new(0.5, 0.0, 1.0)),
        })
        .unwrap();
        pump(&mut d);
        pump(&mut d);
        assert_eq!(
            d.registry().get(&peer).unwrap().mixer.active_url(),
            Some(d.config().library.walk.as_str())
        );

        for _ in 0..300 {
            d.tick(Duration::from_millis(16));
        }
        let avatar = d.registry().get(&peer).unwrap();
        assert!(!d.movement().is_moving(&peer));
        assert_eq!(avatar.position, Vec3::new(0.5, 0.0, 1.0));
        assert_eq!(avatar.home, Vec3::new(0.5, 0.0, 1.0));
        assert_eq!(avatar.mixer.active_url(), Some(idle.as_str()));
    }

    #[test]
    fn test_move_to_self_rejected() {
        let mut d = director();
        load(&mut d, "a");
        let peer = PeerId::new("a");
        let err = d
            .handle(InboundMessage::MoveTo {
                peer: peer.clone(),
                target_peer: Some(peer.clone()),
                position: None,
            })
            .unwrap_err();
        assert!(matches!(err, StudioError::InvalidDirective(_)));
        assert!(!d.movement().is_moving(&peer));
    }

    #[test]
    fn test_walk_after_one_shot_returns_to_idle() {
        let mut d = director();
        load(&mut d, "a");
        let peer = PeerId::new("a");
        let idle = d.registry().get(&peer).unwrap().idle_clip.clone();

        d.handle(InboundMessage::PlayAnimation {
            peer: peer.clone(),
            url: "animations/custom/bow.fbx".into(),
            looping: Some(false),
        })
        .unwrap();
        pump(&mut d);
        assert_eq!(
            d.registry().get(&peer).unwrap().mixer.active_url(),
            Some("animations/custom/bow.fbx")
        );

        d.handle(InboundMessage::MoveTo {
            peer: peer.clone(),
            target_peer: None,
            position: Some(Vec3::new(0.5, 0.0, 1.0)),
        })
        .unwrap();
        pump(&mut d);
        pump(&mut d);

        for _ in 0..300 {
            d.tick(Duration::from_millis(16));
        }
        assert!(!d.movement().is_moving(&peer));
        assert_eq!(
            d.registry().get(&peer).unwrap().mixer.active_url(),
            Some(idle.as_str())
        );
    }

    #[test]
    fn test_one_shot_returns_to_idle() {
        let mut d = director();
        load(&mut d, "a");
        let peer = PeerId::new("a");
        let idle = d.registry().get(&peer).unwrap().idle_clip.clone();

        d.handle(InboundMessage::PlayAnimation {
            peer: peer.clone(),
            url: "animations/custom/bow.fbx".into(),
            looping: Some(false),
        })
        .unwrap();
        pump(&mut d);
        assert_eq!(
            d.registry().get(&peer).unwrap().mixer.active_url(),
            Some("animations/custom/bow.fbx")
        );

        // Clip lasts one second
        for _ in 0..70 {
            d.tick(Duration::from_millis(16));
        }
        assert_eq!(
            d.registry().get(&peer).unwrap().mixer.active_url(),
            Some(idle.as_str())
        );
    }

    #[test]
    fn test_backdrop_directives_become_jobs() {
        let mut d = director();
        d.handle(InboundMessage::SetBackground(Payload::default()))
            .unwrap();
        d.handle(InboundMessage::SetCameraRoom {
            zone_center: Some(Vec3::new(4.0, 0.0, 0.0)),
            radius: Some(3.0),
            hdri: Some("studio_small.hdr".into()),
        })
        .unwrap();

        let jobs = d.drain_jobs();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.contains(&Job::Environment(EnvironmentCall::Hdri(
            "studio_small.hdr".into()
        ))));
        assert_eq!(d.zone().center, Some(Vec3::new(4.0, 0.0, 0.0)));
        assert_eq!(d.zone().radius, 3.0);
    }

    fn directive(op: u8, peer: u8) -> InboundMessage {
        let peer = PeerId::new(format!("p{}", peer));
        match op {
            0 | 1 => InboundMessage::AvatarLoad(AvatarLoad {
                url: format!("avatars/{}-{}.vrm", peer, op),
                peer,
                name: None,
                local: false,
                position: None,
            }),
            2 => InboundMessage::AvatarRemove { peer },
            3 => InboundMessage::Speaking { peer, active: true },
            4 => InboundMessage::MoveTo {
                peer,
                target_peer: Some(PeerId::new("p0")),
                position: None,
            },
            _ => InboundMessage::Emotion {
                peer,
                emotion: "happy".into(),
            },
        }
    }

    proptest::proptest! {
        #[test]
        fn test_random_directives_leave_no_orphans(
            script in proptest::collection::vec((0u8..6, 0u8..3), 1..40)
        ) {
            let mut d = director();
            for (op, peer) in script {
                d.on_message(directive(op, peer));
                pump(&mut d);
            }
            pump(&mut d);

            proptest::prop_assert_eq!(d.life().len(), d.registry().len());
            for peer in ["p0", "p1", "p2"].map(PeerId::new) {
                if !d.registry().contains(&peer) {
                    proptest::prop_assert!(!d.movement().is_moving(&peer));
                    proptest::prop_assert!(d.gaze().target(&peer).is_none());
                    proptest::prop_assert!(!d.life().contains(&peer));
                }
            }
            let added = d.scene().added.len();
            let removed = d.scene().removed.len();
            proptest::prop_assert_eq!(added - removed, d.registry().len());
        }
    }

    #[test]
    fn test_speaker_removed_clears_gaze() {
        let mut d = director();
        load(&mut d, "a");
        load(&mut d, "b");
        d.handle(InboundMessage::Speaking {
            peer: PeerId::new("a"),
            active: true,
        })
        .unwrap();
        assert_eq!(d.gaze().target_count(), 2);

        d.handle(InboundMessage::AvatarRemove {
            peer: PeerId::new("a"),
        })
        .unwrap();
        assert_eq!(d.speaker(), None);
        assert_eq!(d.gaze().target_count(), 0);
    }
}
