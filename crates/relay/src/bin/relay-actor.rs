//! relay-actor: producer that registers its topics and publishes signals.
//!
//! # Usage
//!
//! ```bash
//! # actorA publishing the default engine/oil/brake signals
//! relay-actor
//!
//! # Star mode: also listen for commands on "cmd" and "cmd/actorB"
//! relay-actor actorB star engine/temperature,oil/level cmd,cmd/actorB
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use stupid_relay::participant::{DEFAULT_ACTOR_ID, DEFAULT_COMMAND_TOPIC, DEFAULT_SIGNALS};
use stupid_relay::relay::{DEFAULT_BASE_PORT, MAX_BASE_PORT};
use stupid_relay::{Actor, ActorConfig, FabricConfig, ParticipantEndpoints, Topic};

/// Signal producer for the relay fabric.
#[derive(Parser, Debug)]
#[command(name = "relay-actor", version, about)]
struct Cli {
    /// Identity embedded in every signal.
    #[arg(default_value = DEFAULT_ACTOR_ID)]
    id: String,

    /// `star` to also receive commands; anything else publishes only.
    #[arg(default_value = "plain")]
    mode: String,

    /// Comma-separated signal topics.
    #[arg(default_value = DEFAULT_SIGNALS)]
    signals: String,

    /// Comma-separated command topics to subscribe to in star mode.
    #[arg(default_value = DEFAULT_COMMAND_TOPIC)]
    commands: String,

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

    fn actor_config(&self) -> ActorConfig {
        ActorConfig {
            id: self.id.clone(),
            star: self.mode == "star",
            signals: Topic::parse_list(&self.signals),
            commands: Topic::parse_list(&self.commands),
            ..ActorConfig::default()
        }
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
    tracing::info!(?cli, "starting relay-actor");

    let actor = Arc::new(Actor::new(cli.actor_config(), cli.endpoints()?));

    let actor_for_signal = actor.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!("shutdown signal received");
        actor_for_signal.shutdown();
    });

    actor.run().await?;
    Ok(())
}
