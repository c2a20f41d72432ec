//! Client to server frames.
//!
//! An [`OutboundEnvelope`] is built fresh for every send and consumed when
//! stamped. Stamping attaches the client's send time and fixes the reserved
//! `kind` and `timestamp` keys, which the payload cannot override.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::ProtocolError;

/// Kind of the handshake frame sent right after a connection opens.
pub const SUBSCRIBE_ANALYTICS: &str = "subscribe_analytics";

/// Kind of the liveness probe. The server answers with `pong`.
pub const PING: &str = "ping";

const RESERVED_KEYS: [&str; 2] = ["kind", "timestamp"];

/// An unstamped client frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEnvelope {
    kind: String,
    payload: Map<String, Value>,
}

impl OutboundEnvelope {
    /// Create an envelope with an empty payload.
    pub fn new(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), payload: Map::new() }
    }

    /// Handshake asking the server to start pushing analytics events.
    pub fn subscribe_analytics() -> Self {
        Self::new(SUBSCRIBE_ANALYTICS)
    }

    /// Liveness probe.
    pub fn ping() -> Self {
        Self::new(PING)
    }

    /// Create an envelope from an arbitrary JSON payload.
    ///
    /// Object payloads are spread into the frame; any other value is placed
    /// under `data`.
    pub fn with_payload(kind: impl Into<String>, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => Map::from_iter([("data".to_string(), other)]),
        };
        Self { kind: kind.into(), payload }
    }

    /// Add one payload field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    /// Frame kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Payload fields.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Attach the send time, producing the frame that goes on the wire.
    pub fn stamp(mut self, at: DateTime<Utc>) -> StampedEnvelope {
        for key in RESERVED_KEYS {
            self.payload.remove(key);
        }
        StampedEnvelope { kind: self.kind, payload: self.payload, timestamp: at }
    }
}

/// A client frame ready for serialization.
///
/// Serializes as `{"kind": .., ...payload, "timestamp": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StampedEnvelope {
    kind: String,
    #[serde(flatten)]
    payload: Map<String, Value>,
    #[serde(serialize_with = "crate::timestamp::serialize")]
    timestamp: DateTime<Utc>,
}

impl StampedEnvelope {
    /// Frame kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Client send time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Serialize to a text frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidKind` if the kind is empty
    /// - `ProtocolError::Encode` if a payload value cannot be serialized
    pub fn encode(&self) -> crate::Result<String> {
        if self.kind.is_empty() {
            return Err(ProtocolError::InvalidKind(self.kind.clone()));
        }
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn sent_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).single().unwrap()
    }

    #[test]
    fn handshake_wire_format() {
        let frame = OutboundEnvelope::subscribe_analytics().stamp(sent_at()).encode().unwrap();

        insta::assert_snapshot!(
            frame,
            @r#"{"kind":"subscribe_analytics","timestamp":"2026-10-16T09:30:00.000Z"}"#
        );
    }

    #[test]
    fn payload_is_spread_between_kind_and_timestamp() {
        let frame = OutboundEnvelope::new("track_view")
            .with_field("tool_id", 12)
            .with_field("source", "sidebar")
            .stamp(sent_at())
            .encode()
            .unwrap();

        insta::assert_snapshot!(
            frame,
            @r#"{"kind":"track_view","source":"sidebar","tool_id":12,"timestamp":"2026-10-16T09:30:00.000Z"}"#
        );
    }

    #[test]
    fn payload_cannot_override_reserved_keys() {
        let stamped = OutboundEnvelope::with_payload(
            "track_view",
            json!({"kind": "spoofed", "timestamp": "1970-01-01T00:00:00Z", "page": 2}),
        )
        .stamp(sent_at());

        let value: Value = serde_json::from_str(&stamped.encode().unwrap()).unwrap();
        assert_eq!(value["kind"], "track_view");
        assert_eq!(value["timestamp"], "2026-10-16T09:30:00.000Z");
        assert_eq!(value["page"], 2);
    }

    #[test]
    fn scalar_payload_goes_under_data() {
        let envelope = OutboundEnvelope::with_payload("note", json!("hello"));
        assert_eq!(envelope.payload().get("data"), Some(&json!("hello")));
    }

    #[test]
    fn empty_kind_is_rejected() {
        let result = OutboundEnvelope::new("").stamp(sent_at()).encode();
        assert!(matches!(result, Err(ProtocolError::InvalidKind(_))));
    }
}
