//! Gaze Controller
//!
//! Avatars face the viewer by default. With a gaze target they turn toward
//! it, but never further than `max_deviation` from the default facing, so a
//! conversation partner standing behind someone does not make them show the
//! camera their back.

use std::collections::BTreeMap;

use serde::Deserialize;
use studio_core::{damp_angle, wrap_angle, yaw_towards, PeerId, Vec3};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GazeConfig {
    /// Maximum turn away from the default facing (radians)
    pub max_deviation: f32,
    /// Exponential turn rate (1/s)
    pub turn_rate: f32,
    /// Default facing; 0 faces the viewer on +Z
    pub default_yaw: f32,
}

impl Default for GazeConfig {
    fn default() -> Self {
        Self {
            max_deviation: 35f32.to_radians(),
            turn_rate: 4.0,
            default_yaw: 0.0,
        }
    }
}

#[derive(Debug, Default)]
pub struct GazeController {
    config: GazeConfig,
    targets: BTreeMap<PeerId, PeerId>,
}

impl GazeController {
    pub fn new(config: GazeConfig) -> Self {
        Self {
            config,
            targets: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &GazeConfig {
        &self.config
    }

    pub fn set_target(&mut self, peer: PeerId, target: PeerId) {
        if peer != target {
            self.targets.insert(peer, target);
        }
    }

    pub fn target(&self, peer: &PeerId) -> Option<&PeerId> {
        self.targets.get(peer)
    }

    /// Forget `peer` both as a looker and as a target
    pub fn clear(&mut self, peer: &PeerId) {
        self.targets.remove(peer);
        self.targets.retain(|_, target| target != peer);
    }

    pub fn clear_all(&mut self) {
        self.targets.clear();
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    /// Rebuild all targets around the active speaker.
    ///
    /// Everyone else looks at the speaker; the speaker looks at the nearest
    /// peer within `colocate_radius`. No speaker clears every target.
    pub fn rebuild_for_speaker(
        &mut self,
        speaker: Option<&PeerId>,
        positions: &[(PeerId, Vec3)],
        colocate_radius: f32,
    ) {
        self.targets.clear();
        let Some(speaker) = speaker else {
            return;
        };
        let Some(speaker_pos) = positions
            .iter()
            .find(|(p, _)| p == speaker)
            .map(|(_, pos)| *pos)
        else {
            return;
        };

        for (peer, _) in positions.iter().filter(|(p, _)| p != speaker) {
            self.targets.insert(peer.clone(), speaker.clone());
        }

        let nearest = positions
            .iter()
            .filter(|(p, _)| p != speaker)
            .map(|(p, pos)| (p, pos.horizontal_distance(&speaker_pos)))
            .filter(|(_, d)| *d <= colocate_radius)
            .min_by(|a, b| a.1.total_cmp(&b.1));
        if let Some((peer, _)) = nearest {
            self.targets.insert(speaker.clone(), peer.clone());
        }
    }

    /// Yaw `position` should settle at, given where its target (if any) is
    pub fn desired_yaw(&self, position: Vec3, target: Option<Vec3>) -> f32 {
        let base = self.config.default_yaw;
        match target {
            Some(t) if t.horizontal_distance(&position) > 1e-4 => {
                let deviation = wrap_angle(yaw_towards(&position, &t) - base);
                let limit = self.config.max_deviation;
                wrap_angle(base + deviation.clamp(-limit, limit))
            }
            _ => base,
        }
    }

    /// One smoothing step from `current` toward `desired`
    pub fn step_yaw(&self, current: f32, desired: f32, dt: f32) -> f32 {
        damp_angle(current, desired, self.config.turn_rate, dt)
    }
}
