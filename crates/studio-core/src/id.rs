//! Identity types for the studio
//!
//! Peers are named by the orchestrator with free-form strings. Everything that
//! needs per-peer determinism (phase offsets, random sequences) derives it from
//! a stable hash of that string.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Peer identity - one networked avatar in the shared scene
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        PeerId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Stable 32-bit FNV-1a hash of the id.
    ///
    /// Used as the seed for per-peer generators and phase offsets, so two runs
    /// with the same peer names produce the same motion.
    pub fn stable_hash(&self) -> u32 {
        let mut hash: u32 = 0x811c_9dc5;
        for byte in self.0.as_bytes() {
            hash ^= u32::from(*byte);
            hash = hash.wrapping_mul(0x0100_0193);
        }
        hash
    }

    /// Phase offset in [0, 2π) derived from the id hash
    pub fn phase_offset(&self) -> f32 {
        (self.stable_hash() % 10_000) as f32 / 10_000.0 * std::f32::consts::TAU
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        PeerId::new(s)
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        PeerId(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stable_hash_is_deterministic() {
        let a = PeerId::new("alice");
        assert_eq!(a.stable_hash(), PeerId::new("alice").stable_hash());
        assert_ne!(a.stable_hash(), PeerId::new("bob").stable_hash());
    }

    #[test]
    fn test_fnv_reference_value() {
        // FNV-1a("a") = 0xe40c292c
        assert_eq!(PeerId::new("a").stable_hash(), 0xe40c_292c);
    }

    #[test]
    fn test_phase_offset_range() {
        for name in ["a", "bob", "carol-2", ""] {
            let phase = PeerId::new(name).phase_offset();
            assert!((0.0..std::f32::consts::TAU).contains(&phase));
        }
    }

    #[test]
    fn test_serde_transparent() {
        let id: PeerId = serde_json::from_str("\"peer-7\"").unwrap();
        assert_eq!(id.as_str(), "peer-7");
    }
}
