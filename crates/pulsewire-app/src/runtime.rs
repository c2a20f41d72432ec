//! Async runtime for the channel.
//!
//! The Runtime is one tokio task that owns the [`Channel`] state machine and
//! executes its actions, coordinating between:
//! - [`ChannelHandle`]: commands from the application
//! - [`Transport`]: socket I/O and socket events
//! - [`QueryCache`]: invalidation of stale queries
//! - retry timers spawned on the [`Environment`]
//!
//! Inputs are processed one at a time, so the channel never sees two events
//! interleave and the connection slot needs no lock.

use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};

use pulsewire_core::{
    Channel, ChannelAction, ChannelConfig, ChannelEvent, ConnectionId, Environment, Notification,
    TimerId, endpoint,
};
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::{AbortHandle, JoinHandle},
    time::{Interval, MissedTickBehavior},
};
use url::Url;

use crate::{
    cache::QueryCache,
    error::RuntimeError,
    facade::{ChannelHandle, Command},
    state::ChannelSnapshot,
    transport::{EventSink, OpenRequest, Transport},
};

/// Capacity of the notification broadcast. Slow subscribers lag instead of
/// blocking the runtime.
const NOTIFICATION_CAPACITY: usize = 64;

/// Generic runtime that drives a [`Channel`] over a [`Transport`].
///
/// # Type Parameters
///
/// - `T`: socket transport
/// - `C`: query cache receiving invalidations
/// - `E`: environment for time
pub struct Runtime<T, C, E>
where
    T: Transport,
    C: QueryCache,
    E: Environment,
{
    channel: Channel<E>,
    env: E,
    transport: T,
    cache: C,
    commands: mpsc::UnboundedReceiver<Command>,
    events_tx: EventSink,
    events_rx: mpsc::UnboundedReceiver<ChannelEvent>,
    timers: HashMap<TimerId, AbortHandle>,
    state: watch::Sender<ChannelSnapshot>,
    notifications: broadcast::Sender<Notification>,
}

impl<T, C, E> Runtime<T, C, E>
where
    T: Transport,
    C: QueryCache,
    E: Environment,
{
    /// Create a runtime and the first handle to it.
    ///
    /// Nothing happens until [`run`](Self::run) is polled.
    pub fn new(config: ChannelConfig, env: E, transport: T, cache: C) -> (Self, ChannelHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state, state_rx) = watch::channel(ChannelSnapshot::default());
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        let handle = ChannelHandle::new(commands_tx, state_rx, notifications.clone());
        let runtime = Self {
            channel: Channel::new(config, env.clone()),
            env,
            transport,
            cache,
            commands,
            events_tx,
            events_rx,
            timers: HashMap::new(),
            state,
            notifications,
        };
        (runtime, handle)
    }

    /// Create a runtime and spawn it on the current tokio runtime.
    pub fn spawn(
        config: ChannelConfig,
        env: E,
        transport: T,
        cache: C,
    ) -> (ChannelHandle, JoinHandle<()>) {
        let (runtime, handle) = Self::new(config, env, transport, cache);
        (handle, tokio::spawn(runtime.run()))
    }

    /// Check that `config` yields an endpoint `transport` can open.
    ///
    /// The channel tolerates a bad origin or credential (every attempt fails
    /// and is retried up to the bound); callers that prefer to fail fast
    /// check first.
    pub fn check_config(config: &ChannelConfig, transport: &T) -> Result<Url, RuntimeError> {
        let url = endpoint::derive(&config.origin, &config.path)?;
        transport.check(&OpenRequest {
            connection: ConnectionId::new(0),
            url: url.clone(),
            credential: config.credential.clone(),
        })?;
        Ok(url)
    }

    /// Run the event loop until every handle is dropped.
    ///
    /// Dropping the last handle counts as a manual disconnect.
    pub async fn run(mut self) {
        let mut heartbeat = self
            .channel
            .config()
            .heartbeat_interval
            .filter(|period| !period.is_zero())
            .map(heartbeat_interval);

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("all handles dropped, shutting down");
                        let actions = self.channel.disconnect();
                        self.execute(actions);
                        break;
                    };
                    let actions = self.apply(command);
                    self.execute(actions);
                },
                Some(event) = self.events_rx.recv() => {
                    if let ChannelEvent::RetryTimerFired { timer } = &event {
                        self.timers.remove(timer);
                    }
                    let actions = self.channel.handle(event);
                    self.execute(actions);
                },
                () = next_tick(&mut heartbeat) => {
                    let actions = self.channel.tick(self.env.now());
                    self.execute(actions);
                },
            }
            self.publish();
        }

        self.publish();
        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
    }

    fn apply(&mut self, command: Command) -> Vec<ChannelAction> {
        match command {
            Command::Connect => self.channel.connect(),
            Command::Disconnect => self.channel.disconnect(),
            Command::Reconnect => self.channel.reconnect(),
            Command::Send(envelope) => self.channel.send(envelope),
        }
    }

    /// Execute actions, feeding synchronous failures back into the channel.
    fn execute(&mut self, actions: Vec<ChannelAction>) {
        let mut pending: VecDeque<ChannelAction> = actions.into();

        while let Some(action) = pending.pop_front() {
            match action {
                ChannelAction::Open { connection, url } => {
                    let request = OpenRequest {
                        connection,
                        url,
                        credential: self.channel.config().credential.clone(),
                    };
                    if let Err(err) = self.transport.open(request, self.events_tx.clone()) {
                        let follow_up = self.channel.handle(ChannelEvent::OpenFailed {
                            connection,
                            reason: err.to_string(),
                        });
                        pending.extend(follow_up);
                    }
                },
                ChannelAction::SendText { connection, text } => {
                    if let Err(err) = self.transport.send(connection, text) {
                        tracing::warn!(%connection, %err, "send failed");
                    }
                },
                ChannelAction::Close { connection, code } => {
                    if let Err(err) = self.transport.close(connection, code) {
                        tracing::debug!(%connection, %err, "close failed");
                    }
                },
                ChannelAction::ArmTimer { timer, delay } => self.arm_timer(timer, delay),
                ChannelAction::CancelTimer { timer } => {
                    if let Some(handle) = self.timers.remove(&timer) {
                        handle.abort();
                    }
                },
                ChannelAction::Invalidate(key) => self.cache.invalidate(key),
                ChannelAction::Notify(notification) => {
                    // Err means nobody is subscribed
                    let _ = self.notifications.send(notification);
                },
            }
        }
    }

    fn arm_timer(&mut self, timer: TimerId, delay: Duration) {
        let env = self.env.clone();
        let events = self.events_tx.clone();
        let task = tokio::spawn(async move {
            env.sleep(delay).await;
            let _ = events.send(ChannelEvent::RetryTimerFired { timer });
        });
        if let Some(previous) = self.timers.insert(timer, task.abort_handle()) {
            previous.abort();
        }
    }

    fn publish(&self) {
        let next = ChannelSnapshot::capture(&self.channel);
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

fn heartbeat_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        },
        None => std::future::pending().await,
    }
}
