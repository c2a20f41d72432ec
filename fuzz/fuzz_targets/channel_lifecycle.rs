//! Fuzz target for the channel lifecycle.
//!
//! Applies arbitrary interleavings of application commands, socket events
//! and timer expiries to a `Channel`, tracking the sockets and timers its
//! actions would create.
//!
//! # Invariants
//!
//! - At most one socket is live
//! - At most one retry timer is armed
//! - The attempt count never exceeds the bound and grows by at most 1 per
//!   input
//! - Events for sockets or timers the channel no longer tracks produce no
//!   actions

#![no_main]

use std::{collections::BTreeSet, time::Duration};

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use pulsewire_app::SystemEnv;
use pulsewire_core::{Channel, ChannelAction, ChannelConfig, ChannelEvent, ConnectionId, TimerId};
use pulsewire_proto::{CloseCode, OutboundEnvelope};

#[derive(Debug, Arbitrary)]
enum Input {
    Connect,
    Disconnect,
    Reconnect,
    Send,
    Opened(u8),
    Frame { connection: u8, text: String },
    Closing(u8),
    Closed { connection: u8, code: u16 },
    OpenFailed(u8),
    TimerFired(u8),
}

#[derive(Debug, Arbitrary)]
struct Scenario {
    max_attempts: u8,
    reconnect: bool,
    inputs: Vec<Input>,
}

fuzz_target!(|scenario: Scenario| {
    let max_attempts = u32::from(scenario.max_attempts % 8);
    let config = ChannelConfig::default()
        .with_max_attempts(max_attempts)
        .with_reconnect(scenario.reconnect)
        .with_reconnect_interval(Duration::from_millis(100));
    let mut channel = Channel::new(config, SystemEnv::new());

    let mut live: BTreeSet<ConnectionId> = BTreeSet::new();
    let mut armed: BTreeSet<TimerId> = BTreeSet::new();

    for input in scenario.inputs {
        let before = channel.attempts();
        let conn = |raw: u8| ConnectionId::new(u64::from(raw % 16));

        let (actions, stale) = match input {
            Input::Connect => (channel.connect(), false),
            Input::Disconnect => (channel.disconnect(), false),
            Input::Reconnect => (channel.reconnect(), false),
            Input::Send => (channel.send(OutboundEnvelope::new("fuzz")), false),
            Input::Opened(raw) => {
                let connection = conn(raw);
                (channel.handle(ChannelEvent::Opened { connection }), !live.contains(&connection))
            },
            Input::Frame { connection, text } => {
                let connection = conn(connection);
                let stale = !live.contains(&connection);
                (channel.handle(ChannelEvent::FrameReceived { connection, text }), stale)
            },
            Input::Closing(raw) => {
                let connection = conn(raw);
                (channel.handle(ChannelEvent::Closing { connection }), !live.contains(&connection))
            },
            Input::Closed { connection, code } => {
                let connection = conn(connection);
                let stale = !live.remove(&connection);
                let code = CloseCode::new(code);
                let event = ChannelEvent::Closed { connection, code, reason: String::new() };
                (channel.handle(event), stale)
            },
            Input::OpenFailed(raw) => {
                let connection = conn(raw);
                let stale = !live.remove(&connection);
                let event = ChannelEvent::OpenFailed { connection, reason: String::new() };
                (channel.handle(event), stale)
            },
            Input::TimerFired(raw) => {
                let timer = TimerId::new(u64::from(raw % 16));
                let stale = !armed.remove(&timer);
                (channel.handle(ChannelEvent::RetryTimerFired { timer }), stale)
            },
        };

        if stale {
            assert!(actions.is_empty(), "stale input produced {actions:?}");
        }

        for action in &actions {
            match action {
                ChannelAction::Open { connection, .. } => {
                    live.insert(*connection);
                },
                ChannelAction::Close { connection, .. } => {
                    live.remove(connection);
                },
                ChannelAction::ArmTimer { timer, .. } => {
                    armed.insert(*timer);
                },
                ChannelAction::CancelTimer { timer } => {
                    armed.remove(timer);
                },
                _ => {},
            }
        }

        assert!(live.len() <= 1, "live sockets {live:?}");
        assert!(armed.len() <= 1, "armed timers {armed:?}");
        assert!(channel.attempts() <= max_attempts);
        assert!(channel.attempts() <= before + 1);
    }
});
