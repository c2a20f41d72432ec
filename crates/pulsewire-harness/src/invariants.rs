//! Invariants that hold after any sequence of commands and network events.

use std::fmt;

use pulsewire_app::ChannelSnapshot;

use crate::SimNetwork;

/// A broken invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Name of the invariant.
    pub invariant: &'static str,
    /// What was observed.
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.detail)
    }
}

impl std::error::Error for Violation {}

/// Check the network against the channel's published state.
///
/// - at most one socket is live on the network
/// - a connected channel has exactly one live socket
/// - the attempt count never exceeds `max_attempts`
pub fn check_network(
    network: &SimNetwork,
    snapshot: &ChannelSnapshot,
    max_attempts: u32,
) -> Result<(), Violation> {
    let live = network.live_sockets();
    if live.len() > 1 {
        return Err(Violation {
            invariant: "single-live-socket",
            detail: format!("live sockets {live:?}"),
        });
    }

    if snapshot.connected && live.len() != 1 {
        return Err(Violation {
            invariant: "connected-has-socket",
            detail: format!("connected with live sockets {live:?}"),
        });
    }

    if snapshot.attempts > max_attempts {
        return Err(Violation {
            invariant: "attempt-bound",
            detail: format!("{} attempts, bound {max_attempts}", snapshot.attempts),
        });
    }

    Ok(())
}
