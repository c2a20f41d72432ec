//! pulsewire command-line client.
//!
//! Connects to a push endpoint, logs every notification and the cache
//! invalidations it causes, and keeps reconnecting with backoff until
//! interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Local development server
//! pulsewire --origin http://localhost:3000
//!
//! # Production, with a credential and a heartbeat
//! PULSEWIRE_TOKEN=... pulsewire --origin https://app.example.com --heartbeat-secs 30
//! ```

use std::time::Duration;

use clap::Parser;
use pulsewire_app::{
    ChannelConfig, GenerationCache, Notification, Runtime, RuntimeError, SystemEnv,
    ws::WsTransport,
};
use pulsewire_core::{affected_keys, config};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// pulsewire update channel client
#[derive(Parser, Debug)]
#[command(name = "pulsewire")]
#[command(about = "Real-time update channel client")]
#[command(version)]
struct Args {
    /// Origin the endpoint is derived from (http, https, ws or wss)
    #[arg(short, long, env = "PULSEWIRE_ORIGIN", default_value = config::DEFAULT_ORIGIN)]
    origin: String,

    /// Upgrade path on the origin
    #[arg(short, long, default_value = config::DEFAULT_PATH)]
    path: String,

    /// Credential sent as a bearer token on upgrade
    #[arg(long, env = "PULSEWIRE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Maximum automatic reconnect attempts
    #[arg(long, default_value_t = config::DEFAULT_MAX_ATTEMPTS)]
    max_attempts: u32,

    /// Base reconnect delay in milliseconds, doubled per attempt
    #[arg(long, default_value = "3000")]
    reconnect_interval_ms: u64,

    /// Disable automatic reconnection
    #[arg(long)]
    no_reconnect: bool,

    /// Send a ping this often while connected
    #[arg(long)]
    heartbeat_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn channel_config(&self) -> ChannelConfig {
        let mut config = ChannelConfig::new(&self.origin)
            .with_path(&self.path)
            .with_reconnect(!self.no_reconnect)
            .with_reconnect_interval(Duration::from_millis(self.reconnect_interval_ms))
            .with_max_attempts(self.max_attempts);
        if let Some(token) = &self.token {
            config = config.with_credential(token);
        }
        if let Some(secs) = self.heartbeat_secs.filter(|secs| *secs > 0) {
            config = config.with_heartbeat(Duration::from_secs(secs));
        }
        config
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        tracing::debug!("rustls crypto provider already installed");
    }

    let config = args.channel_config();
    let transport = WsTransport::new();
    let url = Runtime::<_, GenerationCache, SystemEnv>::check_config(&config, &transport)?;
    tracing::info!(%url, ?config, "pulsewire starting");

    let cache = GenerationCache::new();
    let (handle, task) = Runtime::spawn(config, SystemEnv::new(), transport, cache.clone());
    let mut notifications = handle.subscribe();
    handle.connect();

    loop {
        tokio::select! {
            notification = notifications.recv() => match notification {
                Ok(notification) => log_notification(&notification, &cache),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification log fell behind");
                },
                Err(RecvError::Closed) => break,
            },
            result = tokio::signal::ctrl_c() => {
                result?;
                tracing::info!("interrupted, disconnecting");
                handle.disconnect();
                break;
            },
        }
    }

    // Dropping the last handle stops the runtime once the close is sent
    drop(handle);
    task.await.map_err(|e| RuntimeError::Task(e.to_string()))?;
    tracing::info!("pulsewire stopped");
    Ok(())
}

fn log_notification(notification: &Notification, cache: &GenerationCache) {
    match notification {
        Notification::Connected => tracing::info!("connected"),
        Notification::Disconnected { code } => tracing::warn!(%code, "disconnected"),
        Notification::Message(message) => {
            let invalidated: Vec<String> = affected_keys(message.kind())
                .iter()
                .map(|key| format!("{key}@{}", cache.generation(*key)))
                .collect();
            tracing::info!(
                kind = %message.kind(),
                user = message.user_id().map(tracing::field::display),
                ?invalidated,
                data = %message.data(),
                "message"
            );
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_channel_defaults() {
        let args = Args::try_parse_from(["pulsewire"]).unwrap();
        let config = args.channel_config();
        let defaults = ChannelConfig::default();

        assert_eq!(config.origin, defaults.origin);
        assert_eq!(config.path, defaults.path);
        assert_eq!(config.reconnect_interval, defaults.reconnect_interval);
        assert_eq!(config.max_attempts, defaults.max_attempts);
        assert!(config.reconnect);
        assert_eq!(config.heartbeat_interval, None);
    }

    #[test]
    fn flags_map_onto_config() {
        let args = Args::try_parse_from([
            "pulsewire",
            "--origin",
            "https://app.example.com",
            "--path",
            "/live",
            "--token",
            "abc",
            "--max-attempts",
            "2",
            "--reconnect-interval-ms",
            "500",
            "--no-reconnect",
            "--heartbeat-secs",
            "15",
        ])
        .unwrap();
        let config = args.channel_config();

        assert_eq!(config.origin, "https://app.example.com");
        assert_eq!(config.path, "/live");
        assert_eq!(config.credential.as_deref(), Some("abc"));
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.reconnect_interval, Duration::from_millis(500));
        assert!(!config.reconnect);
        assert_eq!(config.heartbeat_interval, Some(Duration::from_secs(15)));
    }

    #[test]
    fn zero_heartbeat_disables_pings() {
        let args = Args::try_parse_from(["pulsewire", "--heartbeat-secs", "0"]).unwrap();
        assert_eq!(args.channel_config().heartbeat_interval, None);
    }
}
