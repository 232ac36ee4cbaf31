//! Wire messages exchanged with drawing and rendering clients.
//!
//! ARCHITECTURE
//! ============
//! Every websocket frame is one UTF-8 JSON object with a `type` field.
//! Clients send `hello`, `stroke` and `fill`; the server sends `fill` and
//! `stroke`. Outbound frames have the same shape whether they are live
//! broadcasts or catch-up replay.
//!
//! DESIGN
//! ======
//! Inbound text is parsed in two steps: JSON first, then the shape that
//! belongs to the `type`. Unknown types parse to `Ok(None)` so the dispatcher
//! can drop them quietly, while broken JSON and broken shapes are errors the
//! dispatcher logs. Optional fields follow the client's loose conventions:
//! an empty string, zero, or `null` means "not provided". Stroke fields are
//! otherwise forwarded untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canvas::{Point, Stroke, StrokeInput};

// =============================================================================
// TYPES
// =============================================================================

/// Role a connection declares in its `hello`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Unknown,
    Browser,
    Device,
}

impl Role {
    /// Parse a role announced by a client. `unknown` cannot be announced.
    #[must_use]
    pub fn from_announced(raw: &str) -> Option<Self> {
        match raw {
            "browser" => Some(Self::Browser),
            "device" => Some(Self::Device),
            _ => None,
        }
    }
}

/// A recognized inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Hello { role: Role },
    Stroke(StrokeInput),
    Fill { color: Option<String> },
}

/// Outbound message. Serializes as `{"type":"fill",...}` / `{"type":"stroke",...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Fill { color: String },
    Stroke(Stroke),
}

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("invalid json: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("invalid {kind} message: {source}")]
    InvalidShape {
        kind: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

// =============================================================================
// PARSING
// =============================================================================

/// Parse one inbound text frame.
///
/// Returns `Ok(None)` for messages the server does not act on: unknown or
/// missing `type`, or a `hello` without a supported role.
///
/// # Errors
///
/// Returns `InvalidJson` if the text is not JSON and `InvalidShape` if a
/// `stroke` lacks usable `from`/`to` points.
pub fn parse_client_message(text: &str) -> Result<Option<ClientMessage>, MessageError> {
    let value: Value = serde_json::from_str(text).map_err(MessageError::InvalidJson)?;
    let kind = value.get("type").and_then(Value::as_str).map(str::to_owned);

    match kind.as_deref() {
        Some("hello") => Ok(value
            .get("role")
            .and_then(Value::as_str)
            .and_then(Role::from_announced)
            .map(|role| ClientMessage::Hello { role })),
        Some("stroke") => parse_stroke_fields(value)
            .map(|input| Some(ClientMessage::Stroke(input)))
            .map_err(|source| MessageError::InvalidShape { kind: "stroke", source }),
        Some("fill") => Ok(Some(ClientMessage::Fill { color: present_string(value.get("color")) })),
        _ => Ok(None),
    }
}

#[derive(Deserialize)]
struct StrokeFields {
    from: Point,
    to: Point,
    #[serde(default)]
    color: Value,
    #[serde(default)]
    width: Value,
}

/// Read a stroke object leniently: `from`/`to` must be objects, `color` and
/// `width` may be anything and default to `null`. Also used for strokes read
/// back from durable storage.
///
/// # Errors
///
/// Returns the serde error when `from` or `to` is missing or not an object.
pub fn parse_stroke_fields(value: Value) -> Result<StrokeInput, serde_json::Error> {
    let StrokeFields { from, to, color, width } = serde_json::from_value(value)?;
    Ok(StrokeInput { from, to, color, width })
}

/// A non-empty string value, or `None` for anything else.
fn present_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

#[cfg(test)]
#[path = "message_test.rs"]
mod tests;
