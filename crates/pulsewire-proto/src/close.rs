//! WebSocket close codes.
//!
//! Only the distinction between a normal closure (1000) and everything else
//! matters to the channel. Transports that lose a connection without a close
//! frame report [`CloseCode::ABNORMAL`].

use std::fmt;

/// Close status code of a finished connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CloseCode(u16);

impl CloseCode {
    /// Intentional closure. Never retried.
    pub const NORMAL: Self = Self(1000);

    /// Endpoint is going away (server restart, page navigation).
    pub const GOING_AWAY: Self = Self(1001);

    /// Connection dropped without a close frame, or never opened.
    pub const ABNORMAL: Self = Self(1006);

    /// Wrap a raw status code.
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Raw status code.
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Whether this code marks a deliberate, non-retriable closure.
    pub const fn is_normal(self) -> bool {
        self.0 == Self::NORMAL.0
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        code.0
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
