//! Message dispatch
//!
//! The channel may deliver directives before the scene is ready to take them.
//! `avatar_load`s that arrive early are kept in arrival order and replayed as
//! soon as a delegate registers; other early kinds have nothing to act on yet
//! and are dropped.

use std::collections::VecDeque;

use studio_wire::{InboundMessage, MessageKind};
use tracing::{debug, warn};

/// Receiver of decoded directives
pub trait MessageDelegate {
    fn on_message(&mut self, message: InboundMessage);
}

/// What happened to a dispatched message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Queued,
    Dropped,
}

#[derive(Debug, Clone, Default)]
pub struct DispatchStats {
    pub delivered: u64,
    pub queued: u64,
    pub replayed: u64,
    pub dropped: u64,
}

/// Routes messages to the registered delegate
pub struct Dispatcher<D> {
    delegate: Option<D>,
    early: VecDeque<InboundMessage>,
    max_early: usize,
    stats: DispatchStats,
}

impl<D: MessageDelegate> Dispatcher<D> {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    /// Create a dispatcher that holds at most `max_early` queued loads
    pub fn with_capacity(max_early: usize) -> Self {
        Dispatcher {
            delegate: None,
            early: VecDeque::new(),
            max_early,
            stats: DispatchStats::default(),
        }
    }

    pub fn dispatch(&mut self, message: InboundMessage) -> DispatchOutcome {
        if let Some(delegate) = self.delegate.as_mut() {
            delegate.on_message(message);
            self.stats.delivered += 1;
            return DispatchOutcome::Delivered;
        }

        if message.kind() != MessageKind::AvatarLoad {
            debug!(kind = message.kind().as_str(), "no delegate yet, dropping message");
            self.stats.dropped += 1;
            return DispatchOutcome::Dropped;
        }

        if self.early.len() >= self.max_early {
            warn!(
                capacity = self.max_early,
                "early avatar_load queue full, dropping oldest"
            );
            self.early.pop_front();
            self.stats.dropped += 1;
        }
        self.early.push_back(message);
        self.stats.queued += 1;
        DispatchOutcome::Queued
    }

    /// Install the delegate and replay queued loads in arrival order.
    /// Returns the number of replayed messages.
    pub fn register(&mut self, delegate: D) -> usize {
        let delegate = self.delegate.insert(delegate);
        let mut replayed = 0;
        while let Some(message) = self.early.pop_front() {
            delegate.on_message(message);
            replayed += 1;
        }
        self.stats.replayed += replayed as u64;
        if replayed > 0 {
            debug!(replayed, "replayed early avatar loads");
        }
        replayed
    }

    pub fn unregister(&mut self) -> Option<D> {
        self.delegate.take()
    }

    pub fn delegate(&self) -> Option<&D> {
        self.delegate.as_ref()
    }

    pub fn delegate_mut(&mut self) -> Option<&mut D> {
        self.delegate.as_mut()
    }

    pub fn pending_early(&self) -> usize {
        self.early.len()
    }

    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }
}

impl<D: MessageDelegate> Default for Dispatcher<D> {
    fn default() -> Self {
        Self::new()
    }
}
