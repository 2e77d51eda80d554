//! Shot Director
//!
//! Decides when to cut and to what. Automatic cuts walk one of two rotations
//! (speaking / idle) round-robin, skipping the type just shown and any type
//! the scene cannot frame. A minimum hold per context keeps cuts from
//! stacking up; after each cut the next automatic deadline is pushed out by
//! that minimum plus random jitter.
//!
//! Explicit directives either cut immediately (`force`) or wait for the same
//! minimum hold. A waiting directive is not dropped: it replaces the next
//! automatic pick.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use studio_core::{SceneTime, StudioError, StudioResult};
use tracing::{debug, info, warn};

use crate::{establishing_shot, frame, FramingConfig, FramingContext, Shot, ShotRequest, ShotType};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    /// Minimum time between cuts while someone is speaking
    pub speaking_min_interval: f32,
    /// Minimum time between cuts in an idle scene
    pub idle_min_interval: f32,
    /// Upper bound of the random delay added after each cut
    pub jitter: f32,
    pub speaking_rotation: Vec<ShotType>,
    pub idle_rotation: Vec<ShotType>,
    pub seed: u64,
    pub framing: FramingConfig,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            speaking_min_interval: 4.0,
            idle_min_interval: 8.0,
            jitter: 2.5,
            speaking_rotation: vec![
                ShotType::Closeup,
                ShotType::OverShoulder,
                ShotType::Medium,
                ShotType::TwoShot,
                ShotType::DollyIn,
                ShotType::LowAngle,
                ShotType::MediumTwo,
                ShotType::PullBack,
            ],
            idle_rotation: vec![
                ShotType::Wide,
                ShotType::TwoShot,
                ShotType::SlowOrbit,
                ShotType::MediumTwo,
                ShotType::Dutch,
            ],
            seed: 0x5eed,
            framing: FramingConfig::default(),
        }
    }
}

impl DirectorConfig {
    /// Calm pacing for long conversations
    pub fn documentary() -> Self {
        Self {
            speaking_min_interval: 6.0,
            idle_min_interval: 12.0,
            jitter: 4.0,
            idle_rotation: vec![ShotType::Wide, ShotType::SlowOrbit, ShotType::TwoShot],
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutContext {
    Speaking,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CutReason {
    Automatic,
    /// Requested by the channel, immediately or after a wait
    Directive,
    /// The active speaker changed
    SpeakerChange,
    /// Nobody on set
    Establishing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cut {
    pub shot: Shot,
    pub context: CutContext,
    pub reason: CutReason,
    pub at: SceneTime,
}

/// Result of an accepted directive
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectiveOutcome {
    Cut(Cut),
    /// Held until the minimum interval passes
    Deferred(ShotType),
    /// Manual hold cleared
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingDirective {
    kind: ShotType,
    hold: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DirectorStats {
    pub cuts: u64,
    pub automatic: u64,
    pub directives: u64,
    pub deferred: u64,
    pub rejected: u64,
}

pub struct ShotDirector {
    config: DirectorConfig,
    rng: StdRng,
    speaking_cursor: usize,
    idle_cursor: usize,
    last_type: Option<ShotType>,
    last_cut_at: Option<SceneTime>,
    next_auto_at: SceneTime,
    hold_until: Option<SceneTime>,
    deferred: Option<PendingDirective>,
    speaker_cut_requested: bool,
    establishing: bool,
    current: Option<Shot>,
    stats: DirectorStats,
}

impl ShotDirector {
    pub fn new(config: DirectorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            speaking_cursor: 0,
            idle_cursor: 0,
            last_type: None,
            last_cut_at: None,
            next_auto_at: SceneTime::ZERO,
            hold_until: None,
            deferred: None,
            speaker_cut_requested: false,
            establishing: false,
            current: None,
            stats: DirectorStats::default(),
        }
    }

    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    pub fn current(&self) -> Option<&Shot> {
        self.current.as_ref()
    }

    pub fn last_type(&self) -> Option<ShotType> {
        self.last_type
    }

    pub fn last_cut_at(&self) -> Option<SceneTime> {
        self.last_cut_at
    }

    pub fn next_auto_at(&self) -> SceneTime {
        self.next_auto_at
    }

    pub fn stats(&self) -> DirectorStats {
        self.stats
    }

    pub fn min_interval(&self, context: CutContext) -> f32 {
        match context {
            CutContext::Speaking => self.config.speaking_min_interval,
            CutContext::Idle => self.config.idle_min_interval,
        }
    }

    fn context_of(ctx: &FramingContext) -> CutContext {
        if ctx.speaker.is_some() {
            CutContext::Speaking
        } else {
            CutContext::Idle
        }
    }

    fn interval_elapsed(&self, context: CutContext, now: SceneTime) -> bool {
        match self.last_cut_at {
            Some(at) => now.secs_since(at) >= self.min_interval(context),
            None => true,
        }
    }

    /// Ask for a speaking-context cut as soon as the hold allows
    pub fn speaker_changed(&mut self) {
        self.speaker_cut_requested = true;
    }

    /// Handle an explicit `set_camera_shot`
    pub fn direct(
        &mut self,
        keyword: &str,
        hold_seconds: Option<f32>,
        force: bool,
        now: SceneTime,
        ctx: &FramingContext,
    ) -> StudioResult<DirectiveOutcome> {
        let request = match keyword.parse::<ShotRequest>() {
            Ok(r) => r,
            Err(e) => {
                self.stats.rejected += 1;
                warn!(keyword, "rejected unknown shot");
                return Err(e);
            }
        };

        let kind = match request {
            ShotRequest::Auto => {
                self.hold_until = None;
                self.deferred = None;
                info!("camera back on automatic");
                return Ok(DirectiveOutcome::Auto);
            }
            ShotRequest::Shot(kind) => kind,
        };

        if ctx.subjects.len() < kind.subjects_required() {
            self.stats.rejected += 1;
            return Err(StudioError::InvalidDirective(format!(
                "{} needs {} subjects, {} in focus",
                kind,
                kind.subjects_required(),
                ctx.subjects.len()
            )));
        }

        let context = Self::context_of(ctx);
        if force || self.interval_elapsed(context, now) {
            return match self.cut_to(kind, CutReason::Directive, now, ctx) {
                Some(cut) => {
                    self.stats.directives += 1;
                    self.apply_hold(hold_seconds, now);
                    Ok(DirectiveOutcome::Cut(cut))
                }
                None => {
                    self.stats.rejected += 1;
                    Err(StudioError::InvalidDirective(format!("{} cannot be framed", kind)))
                }
            };
        }

        debug!(shot = %kind, "directive deferred until hold expires");
        self.stats.deferred += 1;
        self.deferred = Some(PendingDirective {
            kind,
            hold: hold_seconds,
        });
        Ok(DirectiveOutcome::Deferred(kind))
    }

    /// Per-tick decision. Returns the cut to apply, if any.
    pub fn tick(&mut self, now: SceneTime, ctx: &FramingContext) -> Option<Cut> {
        if ctx.is_empty() {
            self.speaker_cut_requested = false;
            if self.establishing {
                return None;
            }
            let shot = establishing_shot(&self.config.framing);
            self.establishing = true;
            return Some(self.commit(shot, CutContext::Idle, CutReason::Establishing, now));
        }

        // Leaving an establishing shot does not wait out the interval
        let context = Self::context_of(ctx);
        if !self.establishing && !self.interval_elapsed(context, now) {
            return None;
        }

        if let Some(pending) = self.deferred.take() {
            if let Some(cut) = self.cut_to(pending.kind, CutReason::Directive, now, ctx) {
                self.stats.directives += 1;
                self.apply_hold(pending.hold, now);
                return Some(cut);
            }
        }

        if self.hold_until.map(|h| now < h).unwrap_or(false) {
            return None;
        }

        let reason = if self.speaker_cut_requested && context == CutContext::Speaking {
            CutReason::SpeakerChange
        } else if now >= self.next_auto_at || self.establishing {
            CutReason::Automatic
        } else {
            return None;
        };
        self.speaker_cut_requested = false;

        let kind = self.pick(context, ctx)?;
        let cut = self.cut_to(kind, reason, now, ctx)?;
        self.stats.automatic += 1;
        Some(cut)
    }

    /// Next type from the context's rotation that differs from the last
    /// shot and can be framed
    fn pick(&mut self, context: CutContext, ctx: &FramingContext) -> Option<ShotType> {
        let (rotation, cursor) = match context {
            CutContext::Speaking => (&self.config.speaking_rotation, &mut self.speaking_cursor),
            CutContext::Idle => (&self.config.idle_rotation, &mut self.idle_cursor),
        };
        if rotation.is_empty() {
            return None;
        }

        let len = rotation.len();
        let usable = |t: &ShotType| ctx.subjects.len() >= t.subjects_required();
        let alternatives = rotation
            .iter()
            .filter(|t| usable(t) && Some(**t) != self.last_type)
            .count();

        for step in 0..len {
            let index = (*cursor + step) % len;
            let kind = rotation[index];
            if !usable(&kind) {
                continue;
            }
            if alternatives > 0 && Some(kind) == self.last_type {
                continue;
            }
            *cursor = (index + 1) % len;
            return Some(kind);
        }
        None
    }

    fn cut_to(
        &mut self,
        kind: ShotType,
        reason: CutReason,
        now: SceneTime,
        ctx: &FramingContext,
    ) -> Option<Cut> {
        let shot = frame(kind, ctx, &self.config.framing)?;
        Some(self.commit(shot, Self::context_of(ctx), reason, now))
    }

    fn commit(&mut self, shot: Shot, context: CutContext, reason: CutReason, now: SceneTime) -> Cut {
        let jitter = if self.config.jitter > 0.0 {
            self.rng.gen_range(0.0..self.config.jitter)
        } else {
            0.0
        };
        self.next_auto_at = now.add_secs(self.min_interval(context) + jitter);
        self.last_cut_at = Some(now);
        if reason != CutReason::Establishing {
            self.last_type = Some(shot.kind);
            self.establishing = false;
        }
        self.current = Some(shot);
        self.stats.cuts += 1;

        info!(shot = %shot.kind, ?context, ?reason, "cut");
        Cut {
            shot,
            context,
            reason,
            at: now,
        }
    }

    fn apply_hold(&mut self, hold_seconds: Option<f32>, now: SceneTime) {
        self.hold_until = hold_seconds
            .filter(|h| *h > 0.0)
            .map(|h| now.add_secs(h));
    }
}

impl Default for ShotDirector {
    fn default() -> Self {
        Self::new(DirectorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Subject;
    use studio_core::{PeerId, Vec3};

    fn ctx(n: usize, speaker: Option<&str>) -> FramingContext {
        let subjects = (0..n)
            .map(|i| {
                let x = i as f32 * 1.6 - 0.8;
                Subject::new(
                    PeerId::from(format!("p{}", i)),
                    Vec3::new(x, 0.0, 0.0),
                    Vec3::new(x, 1.55, 0.0),
                )
            })
            .collect();
        FramingContext::new(subjects, speaker.map(PeerId::from))
    }

    fn secs(s: f32) -> SceneTime {
        SceneTime::ZERO.add_secs(s)
    }

    fn run(director: &mut ShotDirector, ctx: &FramingContext, from: f32, to: f32) -> Vec<Cut> {
        let mut cuts = Vec::new();
        let mut t = from;
        while t < to {
            if let Some(cut) = director.tick(secs(t), ctx) {
                cuts.push(cut);
            }
            t += 0.1;
        }
        cuts
    }

    #[test]
    fn test_first_tick_cuts() {
        let mut director = ShotDirector::default();
        let cut = director.tick(SceneTime::ZERO, &ctx(2, None)).unwrap();
        assert_eq!(cut.reason, CutReason::Automatic);
        assert_eq!(cut.context, CutContext::Idle);
    }

    #[test]
    fn test_automatic_cuts_respect_minimum_and_vary() {
        for (speaker, min) in [(None, 8.0), (Some("p0"), 4.0)] {
            let mut director = ShotDirector::default();
            let cuts = run(&mut director, &ctx(2, speaker), 0.0, 120.0);
            assert!(cuts.len() >= 5);
            for pair in cuts.windows(2) {
                assert_ne!(pair[0].shot.kind, pair[1].shot.kind);
                assert!(pair[1].at.secs_since(pair[0].at) >= min - 1e-3);
            }
        }
    }

    #[test]
    fn test_single_subject_skips_pair_shots() {
        let mut director = ShotDirector::default();
        let cuts = run(&mut director, &ctx(1, Some("p0")), 0.0, 60.0);
        assert!(!cuts.is_empty());
        for cut in cuts {
            assert_eq!(cut.shot.kind.subjects_required(), 1);
        }
    }

    #[test]
    fn test_empty_scene_establishes_once() {
        let mut director = ShotDirector::default();
        let cuts = run(&mut director, &ctx(0, None), 0.0, 30.0);
        assert_eq!(cuts.len(), 1);
        assert_eq!(cuts[0].reason, CutReason::Establishing);

        let cut = director.tick(secs(30.0), &ctx(1, None)).unwrap();
        assert_eq!(cut.reason, CutReason::Automatic);
    }

    #[test]
    fn test_first_subject_after_establishing_cuts_immediately() {
        let mut director = ShotDirector::default();
        let cut = director.tick(SceneTime::ZERO, &ctx(0, None)).unwrap();
        assert_eq!(cut.reason, CutReason::Establishing);

        // Well inside the idle minimum interval
        let cut = director.tick(secs(0.5), &ctx(1, None)).unwrap();
        assert_eq!(cut.reason, CutReason::Automatic);
        assert!(director.tick(secs(1.0), &ctx(1, None)).is_none());
    }

    #[test]
    fn test_unknown_keyword_rejected_without_change() {
        let mut director = ShotDirector::default();
        let scene = ctx(2, None);
        director.tick(SceneTime::ZERO, &scene);
        let before = director.current().copied();

        let err = director
            .direct("bogus", None, true, secs(1.0), &scene)
            .unwrap_err();
        assert_eq!(err, StudioError::UnknownShot("bogus".into()));
        assert_eq!(director.current().copied(), before);
        assert_eq!(director.stats().rejected, 1);
    }

    #[test]
    fn test_forced_directive_cuts_immediately() {
        let mut director = ShotDirector::default();
        let scene = ctx(2, None);
        director.tick(SceneTime::ZERO, &scene);

        let outcome = director
            .direct("closeup", None, true, secs(0.5), &scene)
            .unwrap();
        match outcome {
            DirectiveOutcome::Cut(cut) => assert_eq!(cut.shot.kind, ShotType::Closeup),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_throttled_directive_is_deferred_then_taken() {
        let mut director = ShotDirector::default();
        let scene = ctx(2, None);
        director.tick(SceneTime::ZERO, &scene);

        let outcome = director
            .direct("low_angle", None, false, secs(1.0), &scene)
            .unwrap();
        assert_eq!(outcome, DirectiveOutcome::Deferred(ShotType::LowAngle));

        let cuts = run(&mut director, &scene, 1.0, 9.0);
        assert_eq!(cuts.len(), 1);
        assert_eq!(cuts[0].shot.kind, ShotType::LowAngle);
        assert_eq!(cuts[0].reason, CutReason::Directive);
        assert!(cuts[0].at.secs_since(SceneTime::ZERO) >= 8.0 - 1e-3);
    }

    #[test]
    fn test_hold_suppresses_automatic_cuts() {
        let mut director = ShotDirector::default();
        let scene = ctx(2, None);
        director
            .direct("wide", Some(30.0), true, SceneTime::ZERO, &scene)
            .unwrap();

        assert!(run(&mut director, &scene, 0.1, 29.9).is_empty());
        assert!(!run(&mut director, &scene, 30.0, 40.0).is_empty());
    }

    #[test]
    fn test_auto_clears_hold() {
        let mut director = ShotDirector::default();
        let scene = ctx(2, None);
        director
            .direct("wide", Some(60.0), true, SceneTime::ZERO, &scene)
            .unwrap();
        assert_eq!(
            director.direct("auto", None, false, secs(1.0), &scene).unwrap(),
            DirectiveOutcome::Auto
        );
        assert!(!run(&mut director, &scene, 1.0, 12.0).is_empty());
    }

    #[test]
    fn test_speaker_change_cuts_within_minimum() {
        let mut director = ShotDirector::default();
        let idle = ctx(2, None);
        director.tick(SceneTime::ZERO, &idle);
        run(&mut director, &idle, 0.1, 2.0);

        director.speaker_changed();
        let speaking = ctx(2, Some("p0"));
        let cuts = run(&mut director, &speaking, 2.0, 6.5);
        assert_eq!(cuts.len(), 1);
        assert_eq!(cuts[0].reason, CutReason::SpeakerChange);
        assert_eq!(cuts[0].context, CutContext::Speaking);
        assert!(cuts[0].at.secs_since(secs(2.0)) <= 4.0);
    }

    #[test]
    fn test_pair_directive_rejected_when_alone() {
        let mut director = ShotDirector::default();
        let err = director
            .direct("two_shot", None, true, SceneTime::ZERO, &ctx(1, None))
            .unwrap_err();
        assert!(matches!(err, StudioError::InvalidDirective(_)));
    }
}
