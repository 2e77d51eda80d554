//! Studio Transport Layer
//!
//! Connection management for the orchestrator control channel:
//! - WebSocket client with fixed-delay, unbounded reconnect
//! - Reconnect guard (at most one attempt in flight)
//! - Dispatcher that queues early `avatar_load`s until a delegate exists

pub mod channel;
pub mod dispatch;
pub mod guard;

pub use channel::*;
pub use dispatch::*;
pub use guard::*;
