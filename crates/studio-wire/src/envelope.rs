//! Envelope parsing and encoding
//!
//! Parsing happens in two steps: first the raw object and its `type` are
//! inspected, then the typed body is decoded. This is what lets an unknown
//! `type` be told apart from a known one with a bad body.

use serde_json::Value;

use crate::{InboundMessage, MessageKind, OutboundMessage, WireError};

/// Maximum accepted envelope size in bytes
pub const MAX_ENVELOPE_SIZE: usize = 64 * 1024;

/// Parse one inbound text frame
pub fn parse_inbound(text: &str) -> Result<InboundMessage, WireError> {
    if text.len() > MAX_ENVELOPE_SIZE {
        return Err(WireError::InvalidJson(format!(
            "envelope too large: {} > {}",
            text.len(),
            MAX_ENVELOPE_SIZE
        )));
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| WireError::InvalidJson(e.to_string()))?;
    parse_value(value)
}

/// Parse an already-decoded JSON value
pub fn parse_value(value: Value) -> Result<InboundMessage, WireError> {
    let object = value.as_object().ok_or(WireError::NotAnObject)?;
    let type_name = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(WireError::MissingType)?
        .to_string();

    let kind = MessageKind::from_wire(&type_name).ok_or(WireError::UnknownType(type_name))?;

    serde_json::from_value(value).map_err(|e| WireError::InvalidPayload {
        kind: kind.as_str().to_string(),
        reason: e.to_string(),
    })
}

/// Encode an outbound message as a text frame
pub fn encode_outbound(message: &OutboundMessage) -> Result<String, WireError> {
    serde_json::to_string(message).map_err(|e| WireError::Encode(e.to_string()))
}

/// Encode an inbound message (used by orchestrator-side tooling and tests)
pub fn encode_inbound(message: &InboundMessage) -> Result<String, WireError> {
    serde_json::to_string(message).map_err(|e| WireError::Encode(e.to_string()))
}
