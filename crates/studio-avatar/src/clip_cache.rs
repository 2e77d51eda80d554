//! Clip cache keyed by source URL
//!
//! A URL is fetched at most once while a fetch is outstanding: the first
//! request starts it, later requests for the same URL just add themselves to
//! the waiter list. Completion hands every waiter back to the caller, which
//! decides whether the waiter still matters (its peer may be gone by now).

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::Clip;

enum Entry<W> {
    Pending(Vec<W>),
    Ready(Arc<Clip>),
}

/// Answer to a clip request
#[derive(Debug)]
pub enum ClipRequest {
    /// Cached; use it now
    Ready(Arc<Clip>),
    /// First request for this URL; the caller must start a fetch
    Fetch,
    /// A fetch is already outstanding; the waiter was queued
    Waiting,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipCacheStats {
    pub hits: u64,
    pub fetches: u64,
    pub coalesced: u64,
    pub failures: u64,
}

/// Memoizing clip cache; `W` is whatever the caller needs to resume work
pub struct ClipCache<W> {
    entries: HashMap<String, Entry<W>>,
    stats: ClipCacheStats,
}

impl<W> ClipCache<W> {
    pub fn new() -> Self {
        ClipCache {
            entries: HashMap::new(),
            stats: ClipCacheStats::default(),
        }
    }

    /// Look up `url`, registering `waiter` if the clip is not ready yet
    pub fn request(&mut self, url: &str, waiter: W) -> ClipRequest {
        match self.entries.get_mut(url) {
            Some(Entry::Ready(clip)) => {
                self.stats.hits += 1;
                ClipRequest::Ready(Arc::clone(clip))
            }
            Some(Entry::Pending(waiters)) => {
                waiters.push(waiter);
                self.stats.coalesced += 1;
                ClipRequest::Waiting
            }
            None => {
                self.entries
                    .insert(url.to_string(), Entry::Pending(vec![waiter]));
                self.stats.fetches += 1;
                ClipRequest::Fetch
            }
        }
    }

    pub fn get(&self, url: &str) -> Option<Arc<Clip>> {
        match self.entries.get(url) {
            Some(Entry::Ready(clip)) => Some(Arc::clone(clip)),
            _ => None,
        }
    }

    pub fn is_pending(&self, url: &str) -> bool {
        matches!(self.entries.get(url), Some(Entry::Pending(_)))
    }

    /// Store a fetched clip (root height stripped) and return its waiters
    pub fn complete(&mut self, url: &str, mut clip: Clip) -> (Arc<Clip>, Vec<W>) {
        let stripped = clip.strip_root_height();
        if stripped > 0 {
            debug!(url, stripped, "stripped root height tracks");
        }
        let clip = Arc::new(clip);

        let waiters = match self
            .entries
            .insert(url.to_string(), Entry::Ready(Arc::clone(&clip)))
        {
            Some(Entry::Pending(waiters)) => waiters,
            _ => Vec::new(),
        };
        (clip, waiters)
    }

    /// Evict a failed fetch so a later request can retry; returns the waiters
    pub fn fail(&mut self, url: &str) -> Vec<W> {
        self.stats.failures += 1;
        match self.entries.remove(url) {
            Some(Entry::Pending(waiters)) => {
                warn!(url, waiting = waiters.len(), "clip fetch failed");
                waiters
            }
            Some(ready @ Entry::Ready(_)) => {
                // A late failure must not evict a clip that did load
                self.entries.insert(url.to_string(), ready);
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Drop waiters that no longer matter (e.g. their peer was removed)
    pub fn retain_waiters(&mut self, mut keep: impl FnMut(&W) -> bool) {
        for entry in self.entries.values_mut() {
            if let Entry::Pending(waiters) = entry {
                waiters.retain(|w| keep(w));
            }
        }
    }

    pub fn ready_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e, Entry::Ready(_)))
            .count()
    }

    pub fn stats(&self) -> ClipCacheStats {
        self.stats
    }
}

impl<W> Default for ClipCache<W> {
    fn default() -> Self {
        Self::new()
    }
}
