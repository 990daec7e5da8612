//! Wire format for events placed on a topic.
//!
//! ```json
//! {"type":"new_post","data":{"id":"post-1"},"timestamp":"2025-01-10T00:00:00.000000000Z"}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::domain::foundation::Timestamp;

use super::event_types;

/// Sent when a relayed frame cannot be serialized at all.
pub const FALLBACK_FRAME: &str = r#"{"type":"message","data":null}"#;

/// An event as published to the broker and relayed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: JsonValue,
    pub timestamp: Timestamp,
}

impl EventEnvelope {
    /// Creates an envelope stamped with the current time.
    pub fn new(event_type: impl Into<String>, data: JsonValue) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp: Timestamp::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a broker payload, accepting only well-formed envelopes.
    ///
    /// A well-formed envelope is an object with a non-empty `type`, a
    /// `data` member (which may be `null`) and an RFC3339 `timestamp`.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str::<EventEnvelope>(raw)
            .ok()
            .filter(|envelope| !envelope.event_type.is_empty())
    }
}

/// Produces the text frame a connection writes for one broker payload.
///
/// Envelopes pass through untouched. Anything else is wrapped as a generic
/// `message` event with the original payload under `data.payload`.
pub fn relay_frame(raw: &str) -> String {
    if EventEnvelope::parse(raw).is_some() {
        return raw.to_string();
    }

    let payload = serde_json::from_str::<JsonValue>(raw)
        .unwrap_or_else(|_| JsonValue::String(raw.to_string()));

    EventEnvelope::new(event_types::MESSAGE, json!({ "payload": payload }))
        .to_json()
        .unwrap_or_else(|_| FALLBACK_FRAME.to_string())
}
