//! Reconnect guard
//!
//! A single flag that serializes reconnect attempts. Whoever wins
//! [`ReconnectGuard::try_begin`] holds a permit until it is dropped; every
//! other attempt in the meantime is turned away.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct ReconnectGuard {
    in_flight: AtomicBool,
    attempts: AtomicU64,
    rejected: AtomicU64,
}

impl ReconnectGuard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim the right to run a connect attempt
    pub fn try_begin(self: &Arc<Self>) -> Option<ReconnectPermit> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            Some(ReconnectPermit {
                guard: Arc::clone(self),
            })
        } else {
            self.rejected.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Total attempts started
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Attempts turned away because another was in flight
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Held for the duration of one connect attempt
#[derive(Debug)]
pub struct ReconnectPermit {
    guard: Arc<ReconnectGuard>,
}

impl Drop for ReconnectPermit {
    fn drop(&mut self) {
        self.guard.in_flight.store(false, Ordering::Release);
    }
}
