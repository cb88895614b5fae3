//! Wire and domain data model for the ticker table.
//!
//! Row updates arrive keyed by instrument; each carries a map of named
//! fields. Field values are a tagged type so downstream consumers match
//! exhaustively instead of relying on truthiness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Key / FieldName
// =============================================================================

/// Opaque instrument identifier (e.g. "BTCUSDT")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Key(pub String);

impl Key {
    pub fn new(s: impl Into<String>) -> Self {
        Key(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key(s.to_string())
    }
}

/// Name of a row field (column)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldName(pub String);

impl FieldName {
    pub fn new(s: impl Into<String>) -> Self {
        FieldName(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldName {
    fn from(s: &str) -> Self {
        FieldName(s.to_string())
    }
}

// =============================================================================
// RawValue
// =============================================================================

/// A single field value as received from the stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    /// Numeric value (prices, volumes, percentages)
    Number(f64),
    /// Text value (names, status strings, preformatted timestamps)
    Text(String),
    /// Explicit null / missing field (matches JSON null)
    Absent,
}

impl RawValue {
    /// Numeric view of this value, if it has one.
    ///
    /// Text values get a best-effort parse so feeds that quote their
    /// numbers still compare and sort numerically.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) => Some(*n),
            RawValue::Text(s) => s.trim().parse::<f64>().ok(),
            RawValue::Absent => None,
        }
    }

    /// Text view of this value; numbers render with their shortest form
    pub fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Number(n) => Some(n.to_string()),
            RawValue::Text(s) => Some(s.clone()),
            RawValue::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, RawValue::Absent)
    }
}

// =============================================================================
// RowUpdate
// =============================================================================

/// One keyed row update from the stream. Immutable once received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowUpdate {
    /// Instrument key
    pub key: Key,
    /// Field deltas carried by this update
    pub fields: HashMap<FieldName, RawValue>,
    /// Event timestamp assigned by the producer
    pub timestamp: DateTime<Utc>,
}

impl RowUpdate {
    pub fn new(key: impl Into<Key>, timestamp: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            fields: HashMap::new(),
            timestamp,
        }
    }

    /// Builder-style field insertion, mostly for tests
    pub fn with_field(mut self, name: impl Into<FieldName>, value: RawValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key(s)
    }
}

// =============================================================================
// StreamMessage
// =============================================================================

/// Side-channel alert event; noted and logged, never rendered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    /// Alert severity / category
    pub level: String,
    /// Human-readable alert text
    pub message: String,
}

/// Inbound stream message, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamMessage {
    /// Full replacement of the visible key set
    Snapshot {
        payload: Vec<RowUpdate>,
        timestamp: DateTime<Utc>,
    },
    /// Incremental batch of per-key field deltas
    Update {
        payload: Vec<RowUpdate>,
        timestamp: DateTime<Utc>,
    },
    /// Side-channel event outside the rendering path
    Alert {
        payload: AlertEvent,
        timestamp: DateTime<Utc>,
    },
}

impl StreamMessage {
    /// Parse a raw JSON frame; a missing payload or unknown type is an error
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_value_numeric_views() {
        assert_eq!(RawValue::Number(42.5).as_number(), Some(42.5));
        assert_eq!(RawValue::Text("17.25".into()).as_number(), Some(17.25));
        assert_eq!(RawValue::Text("n/a".into()).as_number(), None);
        assert_eq!(RawValue::Absent.as_number(), None);
    }

    #[test]
    fn update_message_round_trips() {
        let raw = r#"{
            "type": "update",
            "payload": [
                {
                    "key": "BTCUSDT",
                    "fields": {"price": 64250.5, "name": "Bitcoin"},
                    "timestamp": "2024-05-01T12:00:00Z"
                }
            ],
            "timestamp": "2024-05-01T12:00:00Z"
        }"#;

        let msg = StreamMessage::parse(raw).unwrap();
        match msg {
            StreamMessage::Update { payload, .. } => {
                assert_eq!(payload.len(), 1);
                assert_eq!(payload[0].key.as_str(), "BTCUSDT");
                assert_eq!(
                    payload[0].fields.get(&FieldName::from("price")),
                    Some(&RawValue::Number(64250.5))
                );
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn snapshot_and_alert_discriminators() {
        let snap = r#"{"type":"snapshot","payload":[],"timestamp":"2024-05-01T12:00:00Z"}"#;
        assert!(matches!(
            StreamMessage::parse(snap).unwrap(),
            StreamMessage::Snapshot { .. }
        ));

        let alert = r#"{
            "type": "alert",
            "payload": {"level": "warn", "message": "price dislocation"},
            "timestamp": "2024-05-01T12:00:00Z"
        }"#;
        assert!(matches!(
            StreamMessage::parse(alert).unwrap(),
            StreamMessage::Alert { .. }
        ));
    }

    #[test]
    fn malformed_message_is_a_parse_error() {
        // Missing payload entirely
        let missing = r#"{"type":"update","timestamp":"2024-05-01T12:00:00Z"}"#;
        assert!(StreamMessage::parse(missing).is_err());

        // Unknown discriminator
        let unknown = r#"{"type":"gossip","payload":[],"timestamp":"2024-05-01T12:00:00Z"}"#;
        assert!(StreamMessage::parse(unknown).is_err());

        assert!(StreamMessage::parse("not json at all").is_err());
    }
}
