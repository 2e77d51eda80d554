//! Per-peer life state and the combined per-tick output

use std::collections::BTreeMap;

use serde::Deserialize;
use studio_core::{PeerId, SceneTime};

use crate::{
    Blink, BlinkConfig, Breathing, BreathingConfig, IntentFrame, Intentionality,
    IntentionalityConfig, Posture, Role,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LifeConfig {
    pub blink: BlinkConfig,
    pub breathing: BreathingConfig,
    pub intentionality: IntentionalityConfig,
}

#[derive(Debug, Clone)]
struct PeerLife {
    blink: Blink,
    breathing: Breathing,
    intent: Intentionality,
}

/// What the life systems contribute to one avatar for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LifeFrame {
    /// Eyelid weight, 0 open .. 1 closed
    pub blink: f32,
    /// Additive bone rotations (breathing folded into the spine)
    pub posture: Posture,
    pub mouth: f32,
    pub speaking_weight: f32,
    pub listening_weight: f32,
}

/// Life state for every avatar in the scene
#[derive(Debug, Default)]
pub struct LifeSystems {
    config: LifeConfig,
    peers: BTreeMap<PeerId, PeerLife>,
}

impl LifeSystems {
    pub fn new(config: LifeConfig) -> Self {
        Self {
            config,
            peers: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &LifeConfig {
        &self.config
    }

    /// Start (or restart) life state for `peer`, seeded from its id
    pub fn insert(&mut self, peer: PeerId, now: SceneTime) {
        let life = PeerLife {
            blink: Blink::new(&peer, now, &self.config.blink),
            breathing: Breathing::new(&peer),
            intent: Intentionality::new(&peer, now, &self.config.intentionality),
        };
        self.peers.insert(peer, life);
    }

    pub fn remove(&mut self, peer: &PeerId) -> bool {
        self.peers.remove(peer).is_some()
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.peers.contains_key(peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Explicit mouth value from the channel
    pub fn set_mouth(&mut self, peer: &PeerId, value: f32, now: SceneTime) -> bool {
        match self.peers.get_mut(peer) {
            Some(life) => {
                life.intent
                    .set_mouth(value, now, &self.config.intentionality);
                true
            }
            None => false,
        }
    }

    /// Advance one peer
    pub fn update(
        &mut self,
        peer: &PeerId,
        role: Role,
        walking: bool,
        now: SceneTime,
        dt: f32,
    ) -> Option<LifeFrame> {
        let life = self.peers.get_mut(peer)?;
        let blink = life.blink.update(now, &self.config.blink);
        let breath = life.breathing.sample(now, &self.config.breathing);
        let IntentFrame {
            mut posture,
            mouth,
            speaking_weight,
            listening_weight,
        } = life
            .intent
            .update(role, walking, now, dt, &self.config.intentionality);

        posture.spine = posture.spine.add(&breath);
        Some(LifeFrame {
            blink,
            posture,
            mouth,
            speaking_weight,
            listening_weight,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_update_remove() {
        let mut life = LifeSystems::default();
        let peer = PeerId::from("a");
        life.insert(peer.clone(), SceneTime::ZERO);

        let frame = life
            .update(&peer, Role::Idle, false, SceneTime::from_millis(16), 0.016)
            .unwrap();
        assert_eq!(frame.blink, 0.0);
        assert_ne!(frame.posture.spine, Default::default());

        assert!(life.remove(&peer));
        assert!(life.update(&peer, Role::Idle, false, SceneTime::from_millis(32), 0.016).is_none());
        assert!(!life.set_mouth(&peer, 0.5, SceneTime::ZERO));
    }

    #[test]
    fn test_reinsert_restarts_deterministically() {
        let mut a = LifeSystems::default();
        let mut b = LifeSystems::default();
        let peer = PeerId::from("p");
        a.insert(peer.clone(), SceneTime::ZERO);
        b.insert(peer.clone(), SceneTime::ZERO);

        let mut now = SceneTime::ZERO;
        for _ in 0..300 {
            now = now.add_secs(1.0 / 60.0);
            let fa = a.update(&peer, Role::Listening, false, now, 1.0 / 60.0);
            let fb = b.update(&peer, Role::Listening, false, now, 1.0 / 60.0);
            assert_eq!(fa, fb);
        }
    }
}
