//! Reconnect scheduling.
//!
//! The scheduler owns the single retry decision point. It never sleeps: it
//! answers "should a retry happen, and after how long" and emits timer
//! actions that the runtime executes.

use std::{fmt, time::Duration};

use pulsewire_proto::CloseCode;

use crate::{config::ChannelConfig, event::ChannelAction, registry::ReconnectState};

/// Upper bound for any retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_millis(30_000);

/// Delay before retry number `attempt` (0-based).
///
/// `min(base * 2^attempt, 30s)`, saturating instead of overflowing.
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_RETRY_DELAY)
}

/// Handle of one armed retry timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Wrap a raw id.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// Why no retry was scheduled after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressReason {
    /// The application closed the channel on purpose.
    ManualClose,
    /// The server closed with 1000.
    NormalClosure,
    /// Automatic reconnection is switched off.
    Disabled,
    /// The attempt bound was reached.
    Exhausted {
        /// Attempts made so far
        attempts: u32,
        /// Configured bound
        max: u32,
    },
}

/// Outcome of the retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Arm a timer and reconnect when it fires.
    Schedule {
        /// 1-based number of the retry being scheduled
        attempt: u32,
        /// How long to wait
        delay: Duration,
    },
    /// Stay disconnected.
    Suppressed(SuppressReason),
}

/// Exponential backoff with an attempt bound.
#[derive(Debug, Clone)]
pub struct ReconnectScheduler {
    enabled: bool,
    base_interval: Duration,
    max_attempts: u32,
    next_timer: u64,
}

impl ReconnectScheduler {
    /// Create a scheduler.
    pub fn new(enabled: bool, base_interval: Duration, max_attempts: u32) -> Self {
        Self { enabled, base_interval, max_attempts, next_timer: 1 }
    }

    /// Create a scheduler from the retry settings of a channel config.
    pub fn from_config(config: &ChannelConfig) -> Self {
        Self::new(config.reconnect, config.reconnect_interval, config.max_attempts)
    }

    /// Configured attempt bound.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decide whether a close with `code` leads to a retry.
    ///
    /// Checks run in a fixed order: manual close, normal closure, disabled,
    /// exhausted. Does not modify `state`.
    pub fn decide(&self, state: &ReconnectState, code: CloseCode) -> RetryDecision {
        if state.manual_close {
            return RetryDecision::Suppressed(SuppressReason::ManualClose);
        }
        if code.is_normal() {
            return RetryDecision::Suppressed(SuppressReason::NormalClosure);
        }
        if !self.enabled {
            return RetryDecision::Suppressed(SuppressReason::Disabled);
        }
        if state.attempts >= self.max_attempts {
            return RetryDecision::Suppressed(SuppressReason::Exhausted {
                attempts: state.attempts,
                max: self.max_attempts,
            });
        }

        RetryDecision::Schedule {
            attempt: state.attempts + 1,
            delay: backoff_delay(self.base_interval, state.attempts),
        }
    }

    /// Arm the retry timer for the next attempt.
    ///
    /// Supersedes any pending timer and increments the attempt count.
    pub fn arm(&mut self, state: &mut ReconnectState) -> Vec<ChannelAction> {
        let mut actions = self.cancel(state);

        let delay = backoff_delay(self.base_interval, state.attempts);
        let timer = TimerId::new(self.next_timer);
        self.next_timer += 1;

        state.pending = Some(timer);
        state.attempts += 1;

        actions.push(ChannelAction::ArmTimer { timer, delay });
        actions
    }

    /// Drop the pending timer, if any.
    pub fn cancel(&self, state: &mut ReconnectState) -> Vec<ChannelAction> {
        state.pending.take().map(|timer| ChannelAction::CancelTimer { timer }).into_iter().collect()
    }
}
