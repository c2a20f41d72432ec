//! Property-based tests for the channel state machine.

use std::{collections::BTreeSet, time::Duration};

use proptest::prelude::*;
use pulsewire_core::{
    Channel, ChannelAction, ChannelConfig, ChannelEvent, ConnectionId, MAX_RETRY_DELAY, TimerId,
    backoff_delay,
};
use pulsewire_harness::SimEnv;
use pulsewire_proto::CloseCode;

#[derive(Debug, Clone)]
enum Op {
    Connect,
    Disconnect,
    Reconnect,
    AcceptLatest,
    ServerClose(u16),
    DropLatest,
    FirePending,
    FireStale(u64),
    Frame(bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Connect),
        1 => Just(Op::Disconnect),
        1 => Just(Op::Reconnect),
        3 => Just(Op::AcceptLatest),
        2 => prop_oneof![Just(1000u16), Just(1001), Just(1006), Just(1011)]
            .prop_map(Op::ServerClose),
        2 => Just(Op::DropLatest),
        3 => Just(Op::FirePending),
        1 => (0u64..20).prop_map(Op::FireStale),
        2 => any::<bool>().prop_map(Op::Frame),
    ]
}

/// What the network would look like if it executed the actions faithfully.
#[derive(Default)]
struct Network {
    live: BTreeSet<ConnectionId>,
    latest: Option<ConnectionId>,
    armed: BTreeSet<TimerId>,
}

impl Network {
    fn apply(&mut self, actions: &[ChannelAction]) {
        for action in actions {
            match action {
                ChannelAction::Open { connection, .. } => {
                    self.live.insert(*connection);
                    self.latest = Some(*connection);
                },
                ChannelAction::Close { connection, .. } => {
                    self.live.remove(connection);
                },
                ChannelAction::ArmTimer { timer, .. } => {
                    self.armed.insert(*timer);
                },
                ChannelAction::CancelTimer { timer } => {
                    self.armed.remove(timer);
                },
                _ => {},
            }
        }
    }
}

proptest! {
    #[test]
    fn backoff_matches_formula(base_ms in 1u64..20_000, attempt in 0u32..64) {
        let expected = (u128::from(base_ms) << attempt).min(MAX_RETRY_DELAY.as_millis());
        let actual = backoff_delay(Duration::from_millis(base_ms), attempt).as_millis();
        prop_assert_eq!(actual, expected);
    }

    #[test]
    fn backoff_is_monotonic(base_ms in 1u64..20_000, attempt in 0u32..40) {
        let base = Duration::from_millis(base_ms);
        prop_assert!(backoff_delay(base, attempt) <= backoff_delay(base, attempt + 1));
    }

    #[test]
    fn lifecycle_invariants_hold(
        ops in prop::collection::vec(op(), 1..60),
        max_attempts in 0u32..6
    ) {
        let config = ChannelConfig::default().with_max_attempts(max_attempts);
        let mut channel = Channel::new(config, SimEnv::new());
        let mut network = Network::default();

        for op in ops {
            let attempts_before = channel.attempts();
            let mut retry_fired = false;

            let actions = match op {
                Op::Connect => channel.connect(),
                Op::Disconnect => channel.disconnect(),
                Op::Reconnect => channel.reconnect(),
                Op::AcceptLatest => match network.latest {
                    Some(connection) => channel.handle(ChannelEvent::Opened { connection }),
                    None => Vec::new(),
                },
                Op::ServerClose(code) => match network.latest.filter(|c| network.live.contains(c)) {
                    Some(connection) => {
                        network.live.remove(&connection);
                        channel.handle(ChannelEvent::Closed {
                            connection,
                            code: CloseCode::new(code),
                            reason: String::new(),
                        })
                    },
                    None => Vec::new(),
                },
                Op::DropLatest => match network.latest.filter(|c| network.live.contains(c)) {
                    Some(connection) => {
                        network.live.remove(&connection);
                        channel.handle(ChannelEvent::Closed {
                            connection,
                            code: CloseCode::ABNORMAL,
                            reason: String::new(),
                        })
                    },
                    None => Vec::new(),
                },
                Op::FirePending => match channel.pending_retry() {
                    Some(timer) => {
                        network.armed.remove(&timer);
                        retry_fired = true;
                        channel.handle(ChannelEvent::RetryTimerFired { timer })
                    },
                    None => Vec::new(),
                },
                Op::FireStale(raw) => {
                    let timer = TimerId::new(raw);
                    if channel.pending_retry() == Some(timer) {
                        Vec::new()
                    } else {
                        let actions = channel.handle(ChannelEvent::RetryTimerFired { timer });
                        prop_assert!(actions.is_empty(), "stale timer produced {:?}", actions);
                        actions
                    }
                },
                Op::Frame(valid) => match network.latest {
                    Some(connection) => {
                        let text = if valid { r#"{"kind":"tool_executed"}"# } else { "][" };
                        let text = text.to_string();
                        channel.handle(ChannelEvent::FrameReceived { connection, text })
                    },
                    None => Vec::new(),
                },
            };
            network.apply(&actions);

            prop_assert!(network.live.len() <= 1, "live sockets {:?}", network.live);
            prop_assert!(network.armed.len() <= 1, "armed timers {:?}", network.armed);
            prop_assert!(channel.attempts() <= max_attempts);
            if channel.attempts() > attempts_before {
                prop_assert_eq!(channel.attempts(), attempts_before + 1);
            }
            if retry_fired {
                prop_assert!(channel.pending_retry().is_none());
                prop_assert!(channel.current_connection().is_some());
            }
            if let Some(current) = channel.current_connection() {
                prop_assert!(network.live.contains(&current));
            }
        }
    }
}
