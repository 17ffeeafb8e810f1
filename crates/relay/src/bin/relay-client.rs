//! relay-client: consumer that lists the registered signals and prints
//! what it receives.
//!
//! # Usage
//!
//! ```bash
//! # clientA receiving everything
//! relay-client
//!
//! # Only engine topics, sending commands on "cmd/actorB"
//! relay-client clientB star engine cmd/actorB
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use stupid_relay::participant::{DEFAULT_CLIENT_ID, DEFAULT_COMMAND_TOPIC};
use stupid_relay::relay::{DEFAULT_BASE_PORT, MAX_BASE_PORT};
use stupid_relay::{Client, ClientConfig, FabricConfig, ParticipantEndpoints, Topic};

/// Signal consumer for the relay fabric.
#[derive(Parser, Debug)]
#[command(name = "relay-client", version, about)]
struct Cli {
    /// Identity embedded in every command.
    #[arg(default_value = DEFAULT_CLIENT_ID)]
    id: String,

    /// `star` to also send commands; anything else receives only.
    #[arg(default_value = "plain")]
    mode: String,

    /// Comma-separated subscription prefixes; empty receives everything.
    #[arg(default_value = "")]
    subscriptions: String,

    /// Topic of the commands sent in star mode.
    #[arg(default_value = DEFAULT_COMMAND_TOPIC)]
    command_topic: String,

    /// TOML config file providing the endpoints.
    #[arg(long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,

    /// Relay host to connect to.
    #[arg(long, env = "RELAY_PARTICIPANTS_CONNECT_HOST", default_value = "127.0.0.1")]
    host: String,

    /// First port of the relay's five-port block.
    #[arg(
        long,
        env = "RELAY_BASE_PORT",
        default_value_t = DEFAULT_BASE_PORT,
        value_parser = clap::value_parser!(u16).range(..=i64::from(MAX_BASE_PORT))
    )]
    base_port: u16,
}

impl Cli {
    fn endpoints(&self) -> anyhow::Result<ParticipantEndpoints> {
        Ok(match &self.config {
            Some(path) => FabricConfig::from_file(path)?.participant_endpoints()?,
            None => ParticipantEndpoints::tcp(&self.host, self.base_port)?,
        })
    }

    fn client_config(&self) -> anyhow::Result<ClientConfig> {
        Ok(ClientConfig {
            id: self.id.clone(),
            star: self.mode == "star",
            subscriptions: Topic::parse_list(&self.subscriptions),
            command_topic: Topic::new(self.command_topic.as_str())?,
            ..ClientConfig::default()
        })
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
    tracing::info!(?cli, "starting relay-client");

    let client = Arc::new(Client::new(cli.client_config()?, cli.endpoints()?));

    let client_for_signal = client.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!("shutdown signal received");
        client_for_signal.shutdown();
    });

    client.run().await?;
    Ok(())
}
