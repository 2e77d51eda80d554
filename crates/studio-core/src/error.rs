//! Error types for the studio engine
//!
//! Nothing in the engine is fatal. Every variant here is logged by the caller
//! and the affected operation is abandoned while the rest of the scene keeps
//! running.

use thiserror::Error;

use crate::PeerId;

/// Core studio errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StudioError {
    // Protocol errors
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    // Load errors
    #[error("Avatar load failed for {peer}: {reason}")]
    AvatarLoad { peer: PeerId, reason: String },

    #[error("Clip load failed for {url}: {reason}")]
    ClipLoad { url: String, reason: String },

    // Connection errors
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed")]
    ConnectionClosed,

    // Directive errors
    #[error("Unknown shot keyword: {0}")]
    UnknownShot(String),

    #[error("Peer not found: {0}")]
    PeerNotFound(PeerId),

    #[error("Invalid directive: {0}")]
    InvalidDirective(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Broad error class, used for logging and for deciding how to degrade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed/unknown message: dropped, connection stays open
    Protocol,
    /// Avatar or clip fetch/parse failure: prior state preserved
    Load,
    /// Socket closed or errored: reconnect loop takes over
    Connection,
    /// Unknown shot keyword, missing target peer: ignored
    DirectiveRejected,
    /// Bad configuration at startup
    Config,
}

impl StudioError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StudioError::Malformed(_) | StudioError::UnknownMessageType(_) => ErrorKind::Protocol,
            StudioError::AvatarLoad { .. } | StudioError::ClipLoad { .. } => ErrorKind::Load,
            StudioError::ConnectionFailed(_) | StudioError::ConnectionClosed => {
                ErrorKind::Connection
            }
            StudioError::UnknownShot(_)
            | StudioError::PeerNotFound(_)
            | StudioError::InvalidDirective(_) => ErrorKind::DirectiveRejected,
            StudioError::Config(_) => ErrorKind::Config,
        }
    }
}

/// Result type for studio operations
pub type StudioResult<T> = Result<T, StudioError>;
