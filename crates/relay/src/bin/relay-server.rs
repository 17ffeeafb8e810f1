//! relay-server: two-plane relay plus the topic discovery service.
//!
//! Binds the data plane (producers → consumers), the command plane
//! (consumers → producers) and the discovery REP endpoint, then forwards
//! until SIGINT/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! # Default layout: tcp://0.0.0.0:6000-6004
//! relay-server
//!
//! # Different port block, metrics over HTTP
//! relay-server --base-port 7000 --metrics-port 9090
//!
//! # From a config file
//! relay-server --config relay.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use stupid_relay::relay::{DEFAULT_BASE_PORT, MAX_BASE_PORT};
use stupid_relay::{DiscoveryService, FabricConfig, RelayEngine, TopicRegistry};
use tokio::sync::watch;

/// Pub/sub relay with a topic discovery service.
#[derive(Parser, Debug)]
#[command(name = "relay-server", version, about)]
struct Cli {
    /// TOML config file. When set, --host and --base-port are ignored.
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind all endpoints on.
    #[arg(long, env = "RELAY_HOST", default_value = "0.0.0.0")]
    host: String,

    /// First of five consecutive ports: data-ingress, data-egress,
    /// command-ingress, command-egress, discovery.
    #[arg(
        long,
        env = "RELAY_BASE_PORT",
        default_value_t = DEFAULT_BASE_PORT,
        value_parser = clap::value_parser!(u16).range(..=i64::from(MAX_BASE_PORT))
    )]
    base_port: u16,

    /// HTTP port for the `/metrics` JSON endpoint (0 = disabled).
    #[arg(long, env = "RELAY_METRICS_PORT", default_value_t = 0)]
    metrics_port: u16,

    /// Interval in seconds between metrics log lines (0 = disabled).
    #[arg(long, env = "RELAY_METRICS_INTERVAL", default_value_t = 30)]
    metrics_interval: u64,
}

impl Cli {
    fn fabric_config(&self) -> anyhow::Result<FabricConfig> {
        let mut config = match &self.config {
            Some(path) => FabricConfig::from_file(path)?,
            None => {
                let mut config = FabricConfig::tcp(&self.host, self.base_port)?;
                config.apply_env_overrides();
                config.validate()?;
                config
            }
        };
        if self.metrics_port > 0 {
            config.relay.metrics_port = Some(self.metrics_port);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!(?cli, "starting relay-server");

    let config = cli.fabric_config()?;
    let relay = Arc::new(RelayEngine::new(config.relay_config()?));
    let discovery = Arc::new(DiscoveryService::new(
        config.discovery_transport()?,
        Arc::new(TopicRegistry::new()),
    ));
    // Stops the periodic metrics log; the relay serves /metrics itself.
    let (stop_tx, stop_rx) = watch::channel(false);

    {
        let relay = relay.clone();
        let discovery = discovery.clone();
        let stop_tx = stop_tx.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            tracing::info!("shutdown signal received");
            relay.shutdown();
            discovery.shutdown();
            stop_tx.send_replace(true);
        });
    }

    if cli.metrics_interval > 0 {
        let metrics = relay.metrics().clone();
        let mut stop = stop_rx.clone();
        let period = Duration::from_secs(cli.metrics_interval);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = stop.changed() => break,
                    _ = interval.tick() => {}
                }
                let snap = metrics.snapshot();
                tracing::info!(
                    data_messages = snap.data.messages,
                    data_bytes = snap.data.bytes,
                    command_messages = snap.command.messages,
                    command_bytes = snap.command.bytes,
                    send_errors = snap.data.send_errors + snap.command.send_errors,
                    "relay metrics"
                );
            }
        });
    }

    let mut relay_task = tokio::spawn({
        let relay = relay.clone();
        async move { relay.run().await }
    });
    let mut discovery_task = tokio::spawn({
        let discovery = discovery.clone();
        async move { discovery.run().await }
    });

    // Either task ending (bind failure or shutdown) brings the other down.
    let (relay_result, discovery_result) = tokio::select! {
        res = &mut relay_task => {
            discovery.shutdown();
            (res, discovery_task.await)
        }
        res = &mut discovery_task => {
            relay.shutdown();
            (relay_task.await, res)
        }
    };
    stop_tx.send_replace(true);

    relay_result??;
    discovery_result??;

    let snap = relay.metrics().snapshot();
    tracing::info!(
        data_messages = snap.data.messages,
        command_messages = snap.command.messages,
        "relay-server exited cleanly"
    );
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = sigterm.recv() => {},
                }
                return;
            }
            Err(e) => tracing::warn!(error = %e, "SIGTERM handler unavailable"),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
