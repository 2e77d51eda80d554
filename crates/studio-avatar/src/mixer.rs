//! Per-avatar animation mixer
//!
//! Holds the actions currently contributing to an avatar's pose. A cross-fade
//! ramps the incoming action from 0 to full weight while every other action
//! ramps to 0 and is discarded once silent, so at steady state the mixer holds
//! exactly one action.

use std::collections::HashMap;
use std::sync::Arc;

use studio_core::Vec3;

use crate::{Bone, Clip, TrackChannel, TrackSample};

/// Fade used for reactive switches (walk, emotion, gesture)
pub const REACTIVE_FADE: f32 = 0.3;

/// Fade used when returning to idle
pub const IDLE_RETURN_FADE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Fade {
    from: f32,
    to: f32,
    elapsed: f32,
    duration: f32,
}

impl Fade {
    fn weight(&self) -> f32 {
        if self.duration <= 0.0 {
            return self.to;
        }
        let t = (self.elapsed / self.duration).clamp(0.0, 1.0);
        self.from + (self.to - self.from) * t
    }

    fn done(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// A clip being played
#[derive(Debug, Clone)]
pub struct Action {
    pub clip: Arc<Clip>,
    pub time: f32,
    pub looping: bool,
    /// Peak weight (gesture intensity)
    pub intensity: f32,
    weight: f32,
    fade: Option<Fade>,
    finished: bool,
}

impl Action {
    fn new(clip: Arc<Clip>, looping: bool, intensity: f32) -> Self {
        Action {
            clip,
            time: 0.0,
            looping,
            intensity,
            weight: 0.0,
            fade: None,
            finished: false,
        }
    }

    /// Effective blend weight
    pub fn weight(&self) -> f32 {
        self.weight * self.intensity
    }

    pub fn url(&self) -> &str {
        &self.clip.url
    }

    fn fading_out(&self) -> bool {
        self.fade.map(|f| f.to == 0.0).unwrap_or(false)
    }
}

/// Something the mixer wants its owner to know after an update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MixerEvent {
    /// A non-looping action reached its end
    Finished { url: String },
}

/// Cross-fading mixer for one avatar
#[derive(Debug, Clone, Default)]
pub struct Mixer {
    actions: Vec<Action>,
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// URL of the action currently fading in or fully playing
    pub fn active_url(&self) -> Option<&str> {
        self.active().map(|a| a.url())
    }

    pub fn active(&self) -> Option<&Action> {
        self.actions.iter().rev().find(|a| !a.fading_out())
    }

    /// Cross-fade to `clip`, looping. No-op if it is already the active
    /// clip. Returns whether anything changed.
    pub fn crossfade_to(&mut self, clip: Arc<Clip>, duration: f32) -> bool {
        self.play(clip, duration, true, 1.0)
    }

    /// Cross-fade to `clip` with explicit looping and peak weight
    pub fn play(&mut self, clip: Arc<Clip>, duration: f32, looping: bool, intensity: f32) -> bool {
        if self.active_url() == Some(clip.url.as_str()) {
            return false;
        }

        for action in &mut self.actions {
            action.fade = Some(Fade {
                from: action.weight,
                to: 0.0,
                elapsed: 0.0,
                duration,
            });
        }

        let mut action = Action::new(clip, looping, intensity.clamp(0.0, 1.0));
        if self.actions.is_empty() || duration <= 0.0 {
            // First clip on a fresh mixer starts at full weight
            action.weight = 1.0;
            self.actions.clear();
        } else {
            action.fade = Some(Fade {
                from: 0.0,
                to: 1.0,
                elapsed: 0.0,
                duration,
            });
        }
        self.actions.push(action);
        true
    }

    /// Advance playback and fades
    pub fn update(&mut self, dt: f32) -> Vec<MixerEvent> {
        let mut events = Vec::new();

        for action in &mut self.actions {
            if let Some(fade) = action.fade.as_mut() {
                fade.elapsed += dt;
                action.weight = fade.weight();
                if fade.done() {
                    action.fade = None;
                }
            }

            if action.finished {
                continue;
            }
            action.time += dt;
            let duration = action.clip.duration;
            if duration > 0.0 && action.time >= duration {
                if action.looping {
                    action.time %= duration;
                } else {
                    action.time = duration;
                    action.finished = true;
                    events.push(MixerEvent::Finished {
                        url: action.clip.url.clone(),
                    });
                }
            }
        }

        self.actions
            .retain(|a| !(a.weight <= 0.0 && a.fade.is_none()));
        events
    }

    /// Blend every action's sample by weight.
    ///
    /// Fade weights are normalized per channel, so a half-faded pair
    /// contributes half of each pose rather than a dimmed sum. Intensity is
    /// not normalized away: it scales an action's pose toward rest.
    pub fn sample(&self) -> Vec<TrackSample> {
        let mut acc: HashMap<(Bone, TrackChannel), (Vec3, f32)> = HashMap::new();
        for action in &self.actions {
            if action.weight <= 0.0 {
                continue;
            }
            for s in action.clip.sample(action.time) {
                let entry = acc.entry((s.bone, s.channel)).or_insert((Vec3::ZERO, 0.0));
                entry.0 += s.value * action.weight();
                entry.1 += action.weight;
            }
        }

        let mut samples: Vec<TrackSample> = acc
            .into_iter()
            .map(|((bone, channel), (sum, w))| TrackSample {
                bone,
                channel,
                value: sum * (1.0 / w),
            })
            .collect();
        samples.sort_by_key(|s| (s.bone, s.channel as u8));
        samples
    }

    /// Stop everything immediately (used on dispose)
    pub fn stop_all(&mut self) {
        self.actions.clear();
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }
}
