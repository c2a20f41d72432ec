//! Server to client frames.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{MessageKind, ProtocolError, timestamp};

/// Identifier of the user whose action produced an event.
///
/// Opaque to the client. Servers send either a string or a number; both
/// are normalized to their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a user identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(id) => Some(Self(id.clone())),
            Value::Number(id) => Some(Self(id.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value)
            .ok_or_else(|| serde::de::Error::custom("user id must be a string or a number"))
    }
}

fn lenient_user_id<'de, D>(deserializer: D) -> Result<Option<UserId>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(UserId::from_value(&Value::deserialize(deserializer)?))
}

/// A parsed server frame.
///
/// Immutable once decoded: fields are only reachable through accessors. Only
/// `kind` is mandatory on the wire; a missing `data` decodes as `null`. An
/// absent or unreadable `timestamp` or user id decodes as `None` rather than
/// failing the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    kind: MessageKind,
    #[serde(default)]
    data: Value,
    #[serde(
        default,
        alias = "userId",
        deserialize_with = "lenient_user_id",
        skip_serializing_if = "Option::is_none"
    )]
    user_id: Option<UserId>,
    #[serde(
        default,
        deserialize_with = "timestamp::deserialize_lenient",
        skip_serializing_if = "Option::is_none"
    )]
    timestamp: Option<DateTime<Utc>>,
}

impl InboundMessage {
    /// Build a message locally (simulated servers and tests).
    pub fn new(kind: MessageKind, data: Value) -> Self {
        Self { kind, data, user_id: None, timestamp: None }
    }

    /// Attach the originating user.
    #[must_use]
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Attach the server timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Parse a text frame.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::Decode` if the text is not a JSON object with a
    ///   string `kind`
    /// - `ProtocolError::InvalidKind` if `kind` is empty
    pub fn decode(text: &str) -> crate::Result<Self> {
        let message: Self = serde_json::from_str(text).map_err(ProtocolError::Decode)?;
        if message.kind.as_str().is_empty() {
            return Err(ProtocolError::InvalidKind(String::new()));
        }
        Ok(message)
    }

    /// Serialize back to a text frame.
    pub fn encode(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Routing tag.
    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    /// Opaque payload.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Originating user, if the server named one.
    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    /// Server-side timestamp, if present.
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }
}
