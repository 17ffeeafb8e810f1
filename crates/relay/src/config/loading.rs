use std::path::Path;

use crate::error::RelayError;
use crate::participant::ParticipantEndpoints;
use crate::relay::{port_block, RelayConfig};
use crate::transport::Transport;

use super::types::{DiscoverySection, FabricConfig, ParticipantSection, RelaySection};

impl FabricConfig {
    /// Parse config from a TOML string, apply `RELAY_*` overrides and validate.
    pub fn from_toml(toml_str: &str) -> Result<Self, RelayError> {
        let mut config: Self = toml::from_str(toml_str)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load config from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Relay on `host` ports `base_port..=base_port + 3`, discovery on
    /// `base_port + 4`. A block running past port 65535 is a config error.
    pub fn tcp(host: &str, base_port: u16) -> Result<Self, RelayError> {
        let [data_in, data_out, command_in, command_out, discovery] =
            port_block(base_port)?.map(|port| format!("tcp://{host}:{port}"));
        Ok(Self {
            relay: RelaySection {
                data_ingress: data_in,
                data_egress: data_out,
                command_ingress: command_in,
                command_egress: command_out,
                metrics_port: None,
            },
            discovery: DiscoverySection { endpoint: discovery },
            participants: ParticipantSection::default(),
        })
    }

    /// Endpoints for [`RelayEngine`](crate::relay::RelayEngine).
    pub fn relay_config(&self) -> Result<RelayConfig, RelayError> {
        Ok(RelayConfig {
            data_ingress: Transport::parse(&self.relay.data_ingress)?,
            data_egress: Transport::parse(&self.relay.data_egress)?,
            command_ingress: Transport::parse(&self.relay.command_ingress)?,
            command_egress: Transport::parse(&self.relay.command_egress)?,
            metrics_port: self.relay.metrics_port,
        })
    }

    pub fn discovery_transport(&self) -> Result<Transport, RelayError> {
        Transport::parse(&self.discovery.endpoint)
    }

    /// Connect-side endpoints, with every TCP host replaced by
    /// `participants.connect_host`.
    pub fn participant_endpoints(&self) -> Result<ParticipantEndpoints, RelayError> {
        let endpoints =
            ParticipantEndpoints::from_relay(&self.relay_config()?, &self.discovery_transport()?);
        Ok(endpoints.with_host(&self.participants.connect_host))
    }

    /// Apply environment variable overrides.
    ///
    /// - `RELAY_DATA_INGRESS` → `relay.data_ingress`
    /// - `RELAY_DATA_EGRESS` → `relay.data_egress`
    /// - `RELAY_COMMAND_INGRESS` → `relay.command_ingress`
    /// - `RELAY_COMMAND_EGRESS` → `relay.command_egress`
    /// - `RELAY_METRICS_PORT` → `relay.metrics_port`
    /// - `RELAY_DISCOVERY_ENDPOINT` → `discovery.endpoint`
    /// - `RELAY_PARTICIPANTS_CONNECT_HOST` → `participants.connect_host`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub(crate) fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("RELAY_DATA_INGRESS") {
            self.relay.data_ingress = v;
        }
        if let Some(v) = lookup("RELAY_DATA_EGRESS") {
            self.relay.data_egress = v;
        }
        if let Some(v) = lookup("RELAY_COMMAND_INGRESS") {
            self.relay.command_ingress = v;
        }
        if let Some(v) = lookup("RELAY_COMMAND_EGRESS") {
            self.relay.command_egress = v;
        }
        if let Some(v) = lookup("RELAY_METRICS_PORT") {
            match v.parse::<u16>() {
                Ok(port) => self.relay.metrics_port = Some(port),
                Err(_) => tracing::warn!(value = %v, "ignoring invalid RELAY_METRICS_PORT"),
            }
        }
        if let Some(v) = lookup("RELAY_DISCOVERY_ENDPOINT") {
            self.discovery.endpoint = v;
        }
        if let Some(v) = lookup("RELAY_PARTICIPANTS_CONNECT_HOST") {
            self.participants.connect_host = v;
        }
    }
}
