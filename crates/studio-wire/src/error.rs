//! Wire errors

use studio_core::StudioError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum WireError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Envelope is not a JSON object")]
    NotAnObject,

    #[error("Envelope has no string `type` field")]
    MissingType,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Invalid `{kind}` payload: {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("Encode failed: {0}")]
    Encode(String),
}

impl From<WireError> for StudioError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::UnknownType(kind) => StudioError::UnknownMessageType(kind),
            other => StudioError::Malformed(other.to_string()),
        }
    }
}
