//! Avatar Registry
//!
//! Owns every loaded avatar and the in-flight loads. Loading is split in two:
//! [`AvatarRegistry::begin_load`] hands out a [`LoadTicket`] and
//! [`AvatarRegistry::complete_load`] applies the fetched model only if that
//! ticket is still the newest one for the peer. Removing a peer or starting
//! another load bumps the generation, which turns any older completion into
//! a no-op. Whichever operation arrived last wins.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Deserialize;
use studio_core::{PeerId, StudioError, StudioResult, Vec3};
use tracing::{debug, info};

use crate::{normalize, AvatarModel, Bone, Mixer, Skeleton};

/// Registry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Standing height every avatar is scaled to (meters)
    pub target_height: f32,
    /// Fraction of head-to-foot span added above the head bone
    pub head_top_allowance: f32,
    /// Home positions handed out round-robin
    pub layout: Vec<Vec3>,
    /// Avatars closer than this share a space (idle variety, gaze, reactions)
    pub colocate_radius: f32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            target_height: 1.7,
            head_top_allowance: 0.1,
            layout: vec![
                Vec3::new(-0.9, 0.0, 0.0),
                Vec3::new(0.9, 0.0, 0.0),
                Vec3::new(-2.2, 0.0, -0.4),
                Vec3::new(2.2, 0.0, -0.4),
                Vec3::new(0.0, 0.0, -1.2),
                Vec3::new(-3.4, 0.0, -1.0),
                Vec3::new(3.4, 0.0, -1.0),
            ],
            colocate_radius: 4.0,
        }
    }
}

impl RegistryConfig {
    /// Tight two-seat interview layout
    pub fn interview() -> Self {
        Self {
            layout: vec![Vec3::new(-0.7, 0.0, 0.0), Vec3::new(0.7, 0.0, 0.0)],
            colocate_radius: 2.5,
            ..Default::default()
        }
    }
}

/// Identifies one in-flight load
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LoadTicket {
    pub peer: PeerId,
    pub generation: u64,
}

#[derive(Debug, Clone)]
struct PendingLoad {
    ticket: LoadTicket,
    name: Option<String>,
    position: Option<Vec3>,
}

/// A loaded avatar
#[derive(Debug, Clone)]
pub struct AvatarRecord {
    pub peer: PeerId,
    pub name: Option<String>,
    pub url: String,
    pub skeleton: Skeleton,
    pub scale: f32,
    /// Fixed once computed
    pub ground_offset: f32,
    pub position: Vec3,
    pub yaw: f32,
    pub home: Vec3,
    pub emotion: Option<String>,
    pub idle_clip: String,
    pub mixer: Mixer,
}

impl AvatarRecord {
    /// World position of a bone in the rest pose
    pub fn world_bone(&self, bone: Bone) -> Option<Vec3> {
        self.skeleton.bone(bone).map(|local| self.to_world(local))
    }

    /// Lowest rest-pose point in world space
    pub fn lowest_world_point(&self) -> Option<f32> {
        self.skeleton
            .bones
            .values()
            .map(|p| self.to_world(*p).y)
            .reduce(f32::min)
    }

    /// Rough eye-line point for framing; falls back to the scaled height
    pub fn head_position(&self, fallback_height: f32) -> Vec3 {
        self.world_bone(Bone::Head)
            .unwrap_or_else(|| self.position + Vec3::UP * fallback_height)
    }

    fn to_world(&self, local: Vec3) -> Vec3 {
        let (sin, cos) = self.yaw.sin_cos();
        let scaled = local * self.scale;
        let rotated = Vec3::new(
            scaled.x * cos + scaled.z * sin,
            scaled.y,
            -scaled.x * sin + scaled.z * cos,
        );
        self.position + rotated + Vec3::UP * self.ground_offset
    }
}

/// How a completion was applied
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The avatar is live; `replaced` is the previous avatar's URL, if any
    Loaded { replaced: Option<String> },
    /// A newer load or a remove superseded this ticket
    Stale,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub loads_started: u64,
    pub loads_completed: u64,
    pub loads_stale: u64,
    pub loads_failed: u64,
    pub removed: u64,
}

/// All avatars in the scene, keyed by peer
pub struct AvatarRegistry {
    config: RegistryConfig,
    avatars: BTreeMap<PeerId, AvatarRecord>,
    generations: HashMap<PeerId, u64>,
    pending: HashMap<PeerId, PendingLoad>,
    next_home: usize,
    idle_cursor: usize,
    stats: RegistryStats,
}

impl AvatarRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            config,
            avatars: BTreeMap::new(),
            generations: HashMap::new(),
            pending: HashMap::new(),
            next_home: 0,
            idle_cursor: 0,
            stats: RegistryStats::default(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Start loading `peer`. Any earlier in-flight load for the peer is
    /// superseded; the current avatar (if any) stays until completion.
    pub fn begin_load(
        &mut self,
        peer: PeerId,
        name: Option<String>,
        position: Option<Vec3>,
    ) -> LoadTicket {
        let generation = self.bump_generation(&peer);
        let ticket = LoadTicket { peer: peer.clone(), generation };
        if self.pending.contains_key(&peer) {
            debug!(%peer, generation, "superseding in-flight load");
        }
        self.pending.insert(
            peer,
            PendingLoad {
                ticket: ticket.clone(),
                name,
                position,
            },
        );
        self.stats.loads_started += 1;
        ticket
    }

    /// Whether `ticket` is still the newest load for its peer
    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        self.pending
            .get(&ticket.peer)
            .map(|p| p.ticket == *ticket)
            .unwrap_or(false)
    }

    /// Apply a fetched model.
    ///
    /// The previous avatar is disposed only once the new one is known to be
    /// usable; an unmeasurable model fails the load and keeps the old one.
    pub fn complete_load(
        &mut self,
        ticket: &LoadTicket,
        model: AvatarModel,
        idle_pool: &[&str],
    ) -> StudioResult<LoadOutcome> {
        if !self.is_current(ticket) {
            self.stats.loads_stale += 1;
            debug!(peer = %ticket.peer, generation = ticket.generation, "discarding stale load");
            return Ok(LoadOutcome::Stale);
        }

        let Some(norm) = normalize(
            &model,
            self.config.target_height,
            self.config.head_top_allowance,
        ) else {
            self.pending.remove(&ticket.peer);
            self.stats.loads_failed += 1;
            return Err(StudioError::AvatarLoad {
                peer: ticket.peer.clone(),
                reason: format!("{} has no measurable height", model.url),
            });
        };

        let Some(pending) = self.pending.remove(&ticket.peer) else {
            return Ok(LoadOutcome::Stale);
        };
        let peer = ticket.peer.clone();

        let previous = self.avatars.remove(&peer);
        let home = match (pending.position, &previous) {
            (Some(position), _) => position,
            (None, Some(prev)) => prev.home,
            (None, None) => self.next_layout_home(),
        };
        let idle_clip = self.pick_idle(&peer, home, idle_pool);
        let name = pending
            .name
            .or_else(|| previous.as_ref().and_then(|p| p.name.clone()));

        let replaced = previous.map(|mut prev| {
            prev.mixer.stop_all();
            prev.url
        });

        info!(
            %peer,
            url = %model.url,
            scale = norm.scale,
            measured = norm.measured_height,
            source = ?norm.source,
            "avatar loaded"
        );

        self.avatars.insert(
            peer.clone(),
            AvatarRecord {
                peer,
                name,
                url: model.url,
                skeleton: model.skeleton,
                scale: norm.scale,
                ground_offset: norm.ground_offset,
                position: home,
                yaw: 0.0,
                home,
                emotion: None,
                idle_clip,
                mixer: Mixer::new(),
            },
        );
        self.stats.loads_completed += 1;
        Ok(LoadOutcome::Loaded { replaced })
    }

    /// Drop a failed load. Returns whether the ticket was still current.
    pub fn fail_load(&mut self, ticket: &LoadTicket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.pending.remove(&ticket.peer);
        self.stats.loads_failed += 1;
        true
    }

    /// Remove a peer: disposes the avatar and cancels any in-flight load
    pub fn remove(&mut self, peer: &PeerId) -> Option<AvatarRecord> {
        self.bump_generation(peer);
        let cancelled = self.pending.remove(peer).is_some();
        let removed = self.avatars.remove(peer).map(|mut record| {
            record.mixer.stop_all();
            record
        });
        if removed.is_some() || cancelled {
            self.stats.removed += 1;
            debug!(%peer, cancelled_load = cancelled, "avatar removed");
        }
        removed
    }

    pub fn get(&self, peer: &PeerId) -> Option<&AvatarRecord> {
        self.avatars.get(peer)
    }

    pub fn get_mut(&mut self, peer: &PeerId) -> Option<&mut AvatarRecord> {
        self.avatars.get_mut(peer)
    }

    pub fn contains(&self, peer: &PeerId) -> bool {
        self.avatars.contains_key(peer)
    }

    pub fn is_loading(&self, peer: &PeerId) -> bool {
        self.pending.contains_key(peer)
    }

    /// Avatars in peer-id order
    pub fn iter(&self) -> impl Iterator<Item = &AvatarRecord> {
        self.avatars.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AvatarRecord> {
        self.avatars.values_mut()
    }

    pub fn peers(&self) -> Vec<PeerId> {
        self.avatars.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.avatars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.avatars.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn stats(&self) -> RegistryStats {
        self.stats
    }

    /// Peers within the co-location radius of `position`, excluding `except`
    pub fn colocated(&self, position: Vec3, except: &PeerId) -> Vec<&AvatarRecord> {
        self.avatars
            .values()
            .filter(|a| a.peer != *except)
            .filter(|a| a.position.horizontal_distance(&position) <= self.config.colocate_radius)
            .collect()
    }

    /// Positions of every avatar, in peer-id order
    pub fn positions(&self) -> Vec<(PeerId, Vec3)> {
        self.avatars
            .values()
            .map(|a| (a.peer.clone(), a.position))
            .collect()
    }

    fn bump_generation(&mut self, peer: &PeerId) -> u64 {
        let generation = self.generations.entry(peer.clone()).or_insert(0);
        *generation += 1;
        *generation
    }

    fn next_layout_home(&mut self) -> Vec3 {
        if self.config.layout.is_empty() {
            return Vec3::ZERO;
        }
        let home = self.config.layout[self.next_home % self.config.layout.len()];
        self.next_home += 1;
        home
    }

    /// Next idle from the rotating pool, skipping idles already used nearby
    fn pick_idle(&mut self, peer: &PeerId, home: Vec3, pool: &[&str]) -> String {
        if pool.is_empty() {
            return String::new();
        }

        let taken: HashSet<&str> = self
            .colocated(home, peer)
            .into_iter()
            .map(|a| a.idle_clip.as_str())
            .collect();

        let start = self.idle_cursor % pool.len();
        let offset = (0..pool.len())
            .find(|i| !taken.contains(pool[(start + i) % pool.len()]))
            .unwrap_or(0);
        let index = (start + offset) % pool.len();
        self.idle_cursor = index + 1;
        pool[index].to_string()
    }
}

impl Default for AvatarRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Bounds;

    const IDLES: &[&str] = &["idle/a.fbx", "idle/b.fbx", "idle/c.fbx"];

    fn model(url: &str) -> AvatarModel {
        AvatarModel {
            url: url.into(),
            skeleton: Skeleton::reference(),
            bounds: None,
        }
    }

    fn load(registry: &mut AvatarRegistry, peer: &str, url: &str) -> LoadOutcome {
        let ticket = registry.begin_load(PeerId::from(peer), None, None);
        registry.complete_load(&ticket, model(url), IDLES).unwrap()
    }

    #[test]
    fn test_load_normalizes_height_and_ground() {
        let mut registry = AvatarRegistry::default();
        load(&mut registry, "alice", "alice.vrm");

        let avatar = registry.get(&PeerId::from("alice")).unwrap();
        let lowest = avatar.lowest_world_point().unwrap();
        assert!(lowest.abs() < 1e-4, "feet at {}", lowest);

        let head = avatar.world_bone(Bone::Head).unwrap().y;
        let feet = avatar
            .skeleton
            .foot_level()
            .map(|f| f * avatar.scale + avatar.ground_offset)
            .unwrap();
        let measured = (head - feet) * 1.1;
        assert!((measured - 1.7).abs() < 1e-3, "height {}", measured);
    }

    #[test]
    fn test_homes_round_robin() {
        let mut registry = AvatarRegistry::default();
        load(&mut registry, "a", "a.vrm");
        load(&mut registry, "b", "b.vrm");

        let a = registry.get(&PeerId::from("a")).unwrap().home;
        let b = registry.get(&PeerId::from("b")).unwrap().home;
        assert_eq!(a, registry.config().layout[0]);
        assert_eq!(b, registry.config().layout[1]);
    }

    #[test]
    fn test_explicit_position_wins() {
        let mut registry = AvatarRegistry::default();
        let ticket = registry.begin_load(
            PeerId::from("a"),
            Some("Ada".into()),
            Some(Vec3::new(5.0, 0.0, 1.0)),
        );
        registry.complete_load(&ticket, model("a.vrm"), IDLES).unwrap();

        let avatar = registry.get(&PeerId::from("a")).unwrap();
        assert_eq!(avatar.home, Vec3::new(5.0, 0.0, 1.0));
        assert_eq!(avatar.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn test_colocated_avatars_get_distinct_idles() {
        let mut registry = AvatarRegistry::default();
        load(&mut registry, "a", "a.vrm");
        load(&mut registry, "b", "b.vrm");
        load(&mut registry, "c", "c.vrm");

        let idles: HashSet<String> = registry.iter().map(|a| a.idle_clip.clone()).collect();
        assert_eq!(idles.len(), 3);
    }

    #[test]
    fn test_second_load_supersedes_first() {
        let mut registry = AvatarRegistry::default();
        let peer = PeerId::from("p");
        let first = registry.begin_load(peer.clone(), None, None);
        let second = registry.begin_load(peer.clone(), None, None);

        let outcome = registry.complete_load(&second, model("second.vrm"), IDLES).unwrap();
        assert_eq!(outcome, LoadOutcome::Loaded { replaced: None });

        let late = registry.complete_load(&first, model("first.vrm"), IDLES).unwrap();
        assert_eq!(late, LoadOutcome::Stale);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&peer).unwrap().url, "second.vrm");
    }

    #[test]
    fn test_reload_replaces_and_keeps_home() {
        let mut registry = AvatarRegistry::default();
        load(&mut registry, "p", "one.vrm");
        let home = registry.get(&PeerId::from("p")).unwrap().home;

        let outcome = load(&mut registry, "p", "two.vrm");
        assert_eq!(
            outcome,
            LoadOutcome::Loaded {
                replaced: Some("one.vrm".into())
            }
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&PeerId::from("p")).unwrap().home, home);
    }

    #[test]
    fn test_remove_mid_load_makes_completion_stale() {
        let mut registry = AvatarRegistry::default();
        let peer = PeerId::from("p");
        let ticket = registry.begin_load(peer.clone(), None, None);

        registry.remove(&peer);
        assert!(!registry.is_loading(&peer));

        let outcome = registry.complete_load(&ticket, model("p.vrm"), IDLES).unwrap();
        assert_eq!(outcome, LoadOutcome::Stale);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failed_reload_keeps_previous() {
        let mut registry = AvatarRegistry::default();
        load(&mut registry, "p", "good.vrm");

        let peer = PeerId::from("p");
        let ticket = registry.begin_load(peer.clone(), None, None);
        let broken = AvatarModel {
            url: "broken.vrm".into(),
            skeleton: Skeleton::new(),
            bounds: Some(Bounds::new(Vec3::ZERO, Vec3::ZERO)),
        };
        let err = registry.complete_load(&ticket, broken, IDLES).unwrap_err();
        assert!(matches!(err, StudioError::AvatarLoad { .. }));

        assert_eq!(registry.get(&peer).unwrap().url, "good.vrm");
        assert!(!registry.is_loading(&peer));
    }

    #[test]
    fn test_fail_load_only_for_current_ticket() {
        let mut registry = AvatarRegistry::default();
        let peer = PeerId::from("p");
        let old = registry.begin_load(peer.clone(), None, None);
        let new = registry.begin_load(peer.clone(), None, None);

        assert!(!registry.fail_load(&old));
        assert!(registry.is_loading(&peer));
        assert!(registry.fail_load(&new));
        assert!(!registry.is_loading(&peer));
    }
}
