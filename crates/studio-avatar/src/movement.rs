//! Movement Controller - walk an avatar to a point and settle it there
//!
//! Each avatar is either idle (no entry) or moving (one entry). Starting a
//! new movement replaces the old entry; removing the entry is cancellation.

use std::collections::BTreeMap;

use serde::Deserialize;
use studio_core::{yaw_towards, PeerId, Vec3};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Walking speed in meters per second
    pub speed: f32,
    /// Targets closer than this are treated as already reached
    pub arrive_epsilon: f32,
    /// Distance kept from a peer when walking toward it
    pub standoff: f32,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self {
            speed: 1.2,
            arrive_epsilon: 0.05,
            standoff: 1.1,
        }
    }
}

/// One active walk
#[derive(Debug, Clone, PartialEq)]
pub struct Movement {
    pub start: Vec3,
    pub target: Vec3,
    /// 0..=1, never decreases
    pub progress: f32,
    pub speed: f32,
    distance: f32,
    /// Clip to restore on arrival
    pub previous_clip: Option<String>,
}

impl Movement {
    pub fn heading(&self) -> f32 {
        yaw_towards(&self.start, &self.target)
    }

    pub fn position(&self) -> Vec3 {
        self.start.lerp(&self.target, self.progress)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveStart {
    /// Within epsilon of the target; nothing to do
    AlreadyThere,
    /// Walking; face `heading` and start the walk clip
    Started { heading: f32, replaced: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arrival {
    pub position: Vec3,
    pub previous_clip: Option<String>,
}

/// Per-peer result of one update
#[derive(Debug, Clone, PartialEq)]
pub struct MovementStep {
    pub peer: PeerId,
    pub position: Vec3,
    pub heading: f32,
    pub progress: f32,
    pub arrived: Option<Arrival>,
}

#[derive(Debug, Default)]
pub struct MovementController {
    config: MovementConfig,
    active: BTreeMap<PeerId, Movement>,
}

impl MovementController {
    pub fn new(config: MovementConfig) -> Self {
        Self {
            config,
            active: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &MovementConfig {
        &self.config
    }

    /// Start walking `peer` from `from` to `target`.
    ///
    /// `previous_clip` is what to return to on arrival. When a walk replaces
    /// another one the original pre-walk clip is kept, never the walk itself.
    pub fn start(
        &mut self,
        peer: PeerId,
        from: Vec3,
        target: Vec3,
        previous_clip: Option<String>,
    ) -> MoveStart {
        let distance = from.distance(&target);
        if distance <= self.config.arrive_epsilon {
            return MoveStart::AlreadyThere;
        }

        let replaced = self.active.remove(&peer);
        let previous_clip = match &replaced {
            Some(old) => old.previous_clip.clone(),
            None => previous_clip,
        };

        let movement = Movement {
            start: from,
            target,
            progress: 0.0,
            speed: self.config.speed,
            distance,
            previous_clip,
        };
        let heading = movement.heading();
        self.active.insert(peer, movement);

        MoveStart::Started {
            heading,
            replaced: replaced.is_some(),
        }
    }

    /// Advance every active walk
    pub fn update(&mut self, dt: f32) -> Vec<MovementStep> {
        let mut steps = Vec::with_capacity(self.active.len());
        let mut arrived = Vec::new();

        for (peer, movement) in self.active.iter_mut() {
            let delta = movement.speed * dt / movement.distance;
            movement.progress = (movement.progress + delta.max(0.0)).min(1.0);

            let done = movement.progress >= 1.0;
            let position = if done {
                movement.target
            } else {
                movement.position()
            };

            steps.push(MovementStep {
                peer: peer.clone(),
                position,
                heading: movement.heading(),
                progress: movement.progress,
                arrived: done.then(|| Arrival {
                    position: movement.target,
                    previous_clip: movement.previous_clip.clone(),
                }),
            });
            if done {
                arrived.push(peer.clone());
            }
        }

        for peer in arrived {
            self.active.remove(&peer);
        }
        steps
    }

    pub fn cancel(&mut self, peer: &PeerId) -> Option<Movement> {
        self.active.remove(peer)
    }

    pub fn is_moving(&self, peer: &PeerId) -> bool {
        self.active.contains_key(peer)
    }

    pub fn get(&self, peer: &PeerId) -> Option<&Movement> {
        self.active.get(peer)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Point `standoff` short of `toward`, on the side facing `from`
    pub fn standoff_target(&self, from: Vec3, toward: Vec3) -> Vec3 {
        let offset = (from - toward).flat();
        let direction = if offset.length() > 1e-4 {
            offset.normalize()
        } else {
            // Same spot: step out toward the viewer
            Vec3::new(0.0, 0.0, 1.0)
        };
        toward + direction * self.config.standoff
    }
}
