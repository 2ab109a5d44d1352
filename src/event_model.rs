//! Inbound event message types
//!
//! Deserialized from the `{main_topic}/events` JSON payload published by
//! the camera NVR. Unknown fields are ignored so schema additions upstream
//! do not break parsing.

use serde::{Deserialize, Serialize};

/// Message kind within an event lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    New,
    Update,
    /// Terminal message; the event id will not be seen again
    End,
    #[serde(other)]
    Unknown,
}

impl MessageKind {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MessageKind::End)
    }
}

/// One attribute attached to a detection (e.g. a scored license plate box)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventAttribute {
    pub label: String,

    #[serde(default)]
    pub score: Option<f64>,

    /// Normalized [x, y, w, h] within the frame
    #[serde(rename = "box", default)]
    pub bounding_box: Option<[f64; 4]>,
}

/// The `before` snapshot of an event; only the score trajectory matters here
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeforeData {
    #[serde(default)]
    pub top_score: Option<f64>,
}

/// The `after` snapshot of an event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub id: String,
    pub camera: String,

    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub current_zones: Vec<String>,

    #[serde(default)]
    pub current_attributes: Vec<EventAttribute>,

    #[serde(default)]
    pub has_snapshot: bool,

    /// Unix timestamp of the event start
    #[serde(default)]
    pub start_time: f64,

    #[serde(default)]
    pub top_score: Option<f64>,
}

/// Full inbound event message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    #[serde(default)]
    pub before: BeforeData,

    pub after: EventData,

    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl EventMessage {
    pub fn parse(payload: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update_message() {
        let payload = r#"{
            "before": {"top_score": 0.7},
            "after": {
                "id": "1700000000.123-abcd",
                "camera": "front",
                "label": "car",
                "current_zones": ["driveway"],
                "current_attributes": [
                    {"label": "license_plate", "score": 0.85, "box": [0.1, 0.2, 0.05, 0.03]}
                ],
                "has_snapshot": true,
                "start_time": 1700000000.1,
                "top_score": 0.8
            },
            "type": "update"
        }"#;

        let message = EventMessage::parse(payload.as_bytes()).unwrap();
        assert_eq!(message.kind, MessageKind::Update);
        assert!(!message.kind.is_terminal());
        assert_eq!(message.after.id, "1700000000.123-abcd");
        assert_eq!(message.after.camera, "front");
        assert_eq!(message.before.top_score, Some(0.7));
        assert_eq!(message.after.current_attributes.len(), 1);
        assert_eq!(
            message.after.current_attributes[0].bounding_box,
            Some([0.1, 0.2, 0.05, 0.03])
        );
    }

    #[test]
    fn test_parse_end_message_with_sparse_fields() {
        let payload = r#"{
            "after": {"id": "evt-9", "camera": "rear"},
            "type": "end"
        }"#;

        let message = EventMessage::parse(payload.as_bytes()).unwrap();
        assert!(message.kind.is_terminal());
        assert!(message.after.current_zones.is_empty());
        assert!(!message.after.has_snapshot);
        assert_eq!(message.before.top_score, None);
    }

    #[test]
    fn test_unknown_kind_is_tolerated() {
        let payload = r#"{"after": {"id": "e", "camera": "c"}, "type": "renamed"}"#;
        let message = EventMessage::parse(payload.as_bytes()).unwrap();
        assert_eq!(message.kind, MessageKind::Unknown);
        assert!(!message.kind.is_terminal());
    }

    #[test]
    fn test_missing_after_id_is_an_error() {
        let payload = r#"{"after": {"camera": "front"}, "type": "update"}"#;
        assert!(EventMessage::parse(payload.as_bytes()).is_err());
    }
}
