//! Studio Wire Protocol
//!
//! One JSON object per message, discriminated by its `type` field:
//! - Inbound: directives from the orchestrator (load, emotion, speaking, ...)
//! - Outbound: `hello` on connect, `ready` after an avatar finished loading
//!
//! Parsing is total: every input either yields a message or a [`WireError`],
//! never a panic. Unknown `type`s are reported separately from malformed
//! payloads so newer orchestrators can talk to older studios.

pub mod envelope;
pub mod error;
pub mod message;

pub use envelope::*;
pub use error::*;
pub use message::*;

/// Protocol version announced in the `hello` envelope
pub const PROTOCOL_VERSION: u32 = 2;
