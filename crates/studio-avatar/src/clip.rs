//! Animation clips
//!
//! A clip is a set of keyframed tracks, each driving one channel of one bone.
//! Clips arrive already retargeted to the humanoid skeleton; the only thing
//! done to them here is removing root-height keys (see
//! [`Clip::strip_root_height`]).

use serde::{Deserialize, Serialize};
use studio_core::Vec3;

use crate::Bone;

/// Which property a track animates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackChannel {
    Position,
    /// Euler rotation in radians
    Rotation,
}

/// One keyframed track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub bone: Bone,
    pub channel: TrackChannel,
    /// Strictly increasing key times in seconds
    pub times: Vec<f32>,
    pub values: Vec<Vec3>,
}

impl Track {
    pub fn new(bone: Bone, channel: TrackChannel, keys: &[(f32, Vec3)]) -> Self {
        Track {
            bone,
            channel,
            times: keys.iter().map(|(t, _)| *t).collect(),
            values: keys.iter().map(|(_, v)| *v).collect(),
        }
    }

    /// Value at `time`, linear between keys and held past the ends
    pub fn sample(&self, time: f32) -> Option<Vec3> {
        let n = self.times.len().min(self.values.len());
        if n == 0 {
            return None;
        }
        if time <= self.times[0] {
            return Some(self.values[0]);
        }
        if time >= self.times[n - 1] {
            return Some(self.values[n - 1]);
        }

        let next = self.times[..n].partition_point(|t| *t <= time);
        let prev = next - 1;
        let span = self.times[next] - self.times[prev];
        let t = if span > 0.0 {
            (time - self.times[prev]) / span
        } else {
            0.0
        };
        Some(self.values[prev].lerp(&self.values[next], t))
    }
}

/// One sampled channel value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSample {
    pub bone: Bone,
    pub channel: TrackChannel,
    pub value: Vec3,
}

/// A named, time-keyed set of bone transforms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub name: String,
    /// Source URL; also the cache key
    pub url: String,
    pub duration: f32,
    pub tracks: Vec<Track>,
}

impl Clip {
    pub fn new(name: impl Into<String>, url: impl Into<String>, duration: f32) -> Self {
        Clip {
            name: name.into(),
            url: url.into(),
            duration,
            tracks: Vec::new(),
        }
    }

    pub fn with_track(mut self, track: Track) -> Self {
        self.tracks.push(track);
        self
    }

    /// Remove position keys on the root bone.
    ///
    /// Motion capture stores the hips at an absolute height. On a rescaled
    /// skeleton that height no longer matches the legs and the avatar floats
    /// or sinks, so root translation is dropped and the registry's ground
    /// anchor stays authoritative. Returns the number of tracks removed.
    pub fn strip_root_height(&mut self) -> usize {
        let before = self.tracks.len();
        self.tracks
            .retain(|t| !(t.bone.is_root() && t.channel == TrackChannel::Position));
        before - self.tracks.len()
    }

    pub fn has_root_motion(&self) -> bool {
        self.tracks
            .iter()
            .any(|t| t.bone.is_root() && t.channel == TrackChannel::Position)
    }

    /// Sample all tracks at `time`
    pub fn sample(&self, time: f32) -> Vec<TrackSample> {
        self.tracks
            .iter()
            .filter_map(|track| {
                track.sample(time).map(|value| TrackSample {
                    bone: track.bone,
                    channel: track.channel,
                    value,
                })
            })
            .collect()
    }
}
