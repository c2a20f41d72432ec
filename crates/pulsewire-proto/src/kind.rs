//! Inbound message kinds.
//!
//! The set of kinds the server may push is open: kinds this client does not
//! know are kept verbatim in [`MessageKind::Other`] so they can still be
//! surfaced to listeners.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Discriminant of a server to client frame.
///
/// # Invariants
///
/// - `MessageKind::from(kind.as_str())` returns `kind` for every value, so
///   parsing never reclassifies a recognized tag as `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageKind {
    /// A tool finished executing.
    ToolExecuted,
    /// A tool page was viewed.
    ToolViewed,
    /// A new user registered.
    UserRegistered,
    /// Dashboard aggregates were recomputed.
    DashboardMetrics,
    /// Server confirmed the upgrade.
    ConnectionEstablished,
    /// Liveness reply to a client ping.
    Pong,
    /// Server accepted the analytics subscription.
    AnalyticsSubscribed,
    /// Any tag this client does not recognize.
    Other(String),
}

impl MessageKind {
    /// Wire tag for this kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::ToolExecuted => "tool_executed",
            Self::ToolViewed => "tool_viewed",
            Self::UserRegistered => "user_registered",
            Self::DashboardMetrics => "dashboard_metrics",
            Self::ConnectionEstablished => "connection_established",
            Self::Pong => "pong",
            Self::AnalyticsSubscribed => "analytics_subscribed",
            Self::Other(tag) => tag,
        }
    }

    /// Whether the tag is one this client knows how to handle.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl From<&str> for MessageKind {
    fn from(tag: &str) -> Self {
        match tag {
            "tool_executed" => Self::ToolExecuted,
            "tool_viewed" => Self::ToolViewed,
            "user_registered" => Self::UserRegistered,
            "dashboard_metrics" => Self::DashboardMetrics,
            "connection_established" => Self::ConnectionEstablished,
            "pong" => Self::Pong,
            "analytics_subscribed" => Self::AnalyticsSubscribed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for MessageKind {
    fn from(tag: String) -> Self {
        match Self::from(tag.as_str()) {
            Self::Other(_) => Self::Other(tag),
            known => known,
        }
    }
}

impl From<MessageKind> for String {
    fn from(kind: MessageKind) -> Self {
        match kind {
            MessageKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
