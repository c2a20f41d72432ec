//! Inbound frame routing.
//!
//! Parses text frames and maps each message kind to the cached query keys
//! that become stale when such a message arrives.

use std::fmt;

use pulsewire_proto::{InboundMessage, MessageKind, ProtocolError};

/// Cached query that an inbound message can make stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKey {
    /// Dashboard aggregates.
    Dashboard,
    /// Engagement metrics.
    Engagement,
    /// Analytics views.
    Analytics,
    /// Tool execution history.
    ToolExecutions,
    /// User listings.
    Users,
}

impl QueryKey {
    /// Every key, in declaration order.
    pub const ALL: [Self; 5] =
        [Self::Dashboard, Self::Engagement, Self::Analytics, Self::ToolExecutions, Self::Users];

    /// Cache key string as used by the query cache.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dashboard => "dashboard",
            Self::Engagement => "engagement",
            Self::Analytics => "analytics",
            Self::ToolExecutions => "tool-executions",
            Self::Users => "users",
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keys invalidated by a message of `kind`.
pub fn affected_keys(kind: &MessageKind) -> &'static [QueryKey] {
    use QueryKey::{Analytics, Dashboard, Engagement, ToolExecutions, Users};

    match kind {
        MessageKind::ToolExecuted => &[Dashboard, Analytics, ToolExecutions],
        MessageKind::ToolViewed => &[Analytics, Engagement],
        MessageKind::UserRegistered => &[Dashboard, Users],
        MessageKind::DashboardMetrics => &[Dashboard, Engagement],
        MessageKind::ConnectionEstablished
        | MessageKind::Pong
        | MessageKind::AnalyticsSubscribed
        | MessageKind::Other(_) => &[],
    }
}

/// A decoded frame and the keys it invalidates.
#[derive(Debug, Clone, PartialEq)]
pub struct Routed {
    /// The decoded message.
    pub message: InboundMessage,
    /// Keys to invalidate, possibly empty.
    pub keys: &'static [QueryKey],
}

/// Decodes inbound frames and counts the ones it had to drop.
#[derive(Debug, Clone, Default)]
pub struct MessageRouter {
    routed: u64,
    dropped: u64,
}

impl MessageRouter {
    /// Create a router with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `text` and look up its invalidation keys.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` if the frame is not a valid message; the frame is
    ///   counted as dropped
    pub fn route(&mut self, text: &str) -> Result<Routed, ProtocolError> {
        match InboundMessage::decode(text) {
            Ok(message) => {
                self.routed += 1;
                let keys = affected_keys(message.kind());
                Ok(Routed { message, keys })
            },
            Err(err) => {
                self.dropped += 1;
                Err(err)
            },
        }
    }

    /// Frames decoded successfully.
    pub fn routed(&self) -> u64 {
        self.routed
    }

    /// Frames discarded as malformed.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalidation_table() {
        let cases: [(&str, &[QueryKey]); 8] = [
            (
                "tool_executed",
                &[QueryKey::Dashboard, QueryKey::Analytics, QueryKey::ToolExecutions],
            ),
            ("tool_viewed", &[QueryKey::Analytics, QueryKey::Engagement]),
            ("user_registered", &[QueryKey::Dashboard, QueryKey::Users]),
            ("dashboard_metrics", &[QueryKey::Dashboard, QueryKey::Engagement]),
            ("connection_established", &[]),
            ("pong", &[]),
            ("analytics_subscribed", &[]),
            ("quota_changed", &[]),
        ];

        for (tag, expected) in cases {
            assert_eq!(affected_keys(&MessageKind::from(tag)), expected, "kind {tag}");
        }
    }

    #[test]
    fn key_strings() {
        let names: Vec<&str> = QueryKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, ["dashboard", "engagement", "analytics", "tool-executions", "users"]);
    }

    #[test]
    fn route_dashboard_metrics() {
        let mut router = MessageRouter::new();
        let text = r#"{"kind":"dashboard_metrics","data":{"active":3},
            "timestamp":"2026-10-16T09:30:00Z"}"#;
        let routed = router.route(text).unwrap();

        assert_eq!(routed.message.kind(), &MessageKind::DashboardMetrics);
        assert_eq!(routed.keys, &[QueryKey::Dashboard, QueryKey::Engagement]);
        assert_eq!(router.routed(), 1);
        assert_eq!(router.dropped(), 0);
    }

    #[test]
    fn unknown_kind_is_routed_without_keys() {
        let mut router = MessageRouter::new();
        let routed = router.route(r#"{"kind":"maintenance_window"}"#).unwrap();
        assert!(routed.keys.is_empty());
        assert!(!routed.message.kind().is_recognized());
    }

    #[test]
    fn malformed_frames_are_counted() {
        let mut router = MessageRouter::new();
        assert!(router.route("not json").is_err());
        assert!(router.route(r#"{"data":{}}"#).is_err());
        assert!(router.route(r#"{"kind":""}"#).is_err());
        assert_eq!(router.dropped(), 3);
        assert_eq!(router.routed(), 0);
    }
}
