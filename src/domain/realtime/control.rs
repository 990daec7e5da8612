//! Client → server control messages.
//!
//! ```json
//! {"type":"subscribe","data":{"section_ids":["s1","s2"]}}
//! {"type":"unsubscribe","data":{"sectionIds":["s2"]}}
//! ```
//!
//! Parsing is deliberately forgiving in one direction only: anything that is
//! not a recognizable control message yields `None` and the caller drops it.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value as JsonValue;

/// What the client asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Replace the dynamic topic set with the listed sections.
    Subscribe,
    /// Drop the listed sections from the dynamic topic set.
    Unsubscribe,
}

impl ControlAction {
    fn from_type(kind: &str) -> Option<Self> {
        match kind {
            "subscribe" => Some(ControlAction::Subscribe),
            "unsubscribe" => Some(ControlAction::Unsubscribe),
            _ => None,
        }
    }
}

/// A parsed, normalized control message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlMessage {
    pub action: ControlAction,
    /// Trimmed, non-empty, de-duplicated section ids in first-seen order.
    pub section_ids: Vec<String>,
}

#[derive(Deserialize)]
struct RawControl {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: JsonValue,
}

#[derive(Deserialize)]
struct SectionIds {
    #[serde(alias = "sectionIds", alias = "topic_ids", alias = "topicIds")]
    section_ids: Vec<String>,
}

impl ControlMessage {
    /// Parses one inbound text frame.
    pub fn parse(text: &str) -> Option<Self> {
        let raw: RawControl = serde_json::from_str(text).ok()?;
        let action = ControlAction::from_type(&raw.kind)?;
        let payload: SectionIds = serde_json::from_value(raw.data).ok()?;

        Some(Self {
            action,
            section_ids: normalize_ids(payload.section_ids),
        })
    }
}

fn normalize_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
