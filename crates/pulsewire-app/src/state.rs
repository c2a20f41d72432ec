//! Observable channel state.
//!
//! [`ChannelSnapshot`] is what every [`ChannelHandle`](crate::ChannelHandle)
//! clone sees. The runtime publishes a new one after each processed input.

use pulsewire_core::{Channel, ChannelPhase, Environment};
use pulsewire_proto::InboundMessage;

/// Point-in-time view of the channel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelSnapshot {
    /// Lifecycle phase.
    pub phase: ChannelPhase,
    /// Whether a socket is open.
    pub connected: bool,
    /// Retries scheduled since the last successful open.
    pub attempts: u32,
    /// Whether a retry timer is armed.
    pub retry_pending: bool,
    /// Most recent inbound message.
    pub last_message: Option<InboundMessage>,
}

impl ChannelSnapshot {
    /// Capture the observable state of `channel`.
    pub fn capture<E: Environment>(channel: &Channel<E>) -> Self {
        Self {
            phase: channel.phase(),
            connected: channel.is_connected(),
            attempts: channel.attempts(),
            retry_pending: channel.pending_retry().is_some(),
            last_message: channel.last_message().cloned(),
        }
    }
}
