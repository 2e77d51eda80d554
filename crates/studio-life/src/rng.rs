//! Per-peer linear-congruential generator
//!
//! Cheap, deterministic and trivially seedable from a peer id. Only the high
//! bits are used for floats since the low bits of an LCG cycle quickly.

use studio_core::PeerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerRng {
    state: u32,
}

impl PeerRng {
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Seed from the peer id hash, salted so separate systems on the same
    /// peer do not draw the same sequence
    pub fn for_peer(peer: &PeerId, salt: u32) -> Self {
        Self::new(peer.stable_hash() ^ salt)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1103515245).wrapping_add(12345);
        self.state
    }

    /// Uniform in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Uniform in [lo, hi)
    pub fn range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_f32()
    }

    /// Uniform in [-amplitude, amplitude)
    pub fn signed(&mut self, amplitude: f32) -> f32 {
        self.range(-amplitude, amplitude)
    }
}
