use serde::{Deserialize, Serialize};

/// Full configuration of a relay deployment.
///
/// Parsed from `relay.toml`; every section and key is optional and falls
/// back to the standard single-host layout on ports 6000-6004.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FabricConfig {
    /// Endpoints the relay binds.
    #[serde(default)]
    pub relay: RelaySection,

    /// Endpoint the discovery service binds.
    #[serde(default)]
    pub discovery: DiscoverySection,

    /// How participants reach the fabric.
    #[serde(default)]
    pub participants: ParticipantSection,
}

/// `[relay]`: the four forwarding endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelaySection {
    /// Producers publish here.
    #[serde(default = "default_data_ingress")]
    pub data_ingress: String,

    /// Consumers subscribe here.
    #[serde(default = "default_data_egress")]
    pub data_egress: String,

    /// Star-mode consumers publish commands here.
    #[serde(default = "default_command_ingress")]
    pub command_ingress: String,

    /// Star-mode producers subscribe to commands here.
    #[serde(default = "default_command_egress")]
    pub command_egress: String,

    /// Optional HTTP port serving `GET /metrics`.
    pub metrics_port: Option<u16>,
}

fn default_data_ingress() -> String {
    "tcp://0.0.0.0:6000".into()
}

fn default_data_egress() -> String {
    "tcp://0.0.0.0:6001".into()
}

fn default_command_ingress() -> String {
    "tcp://0.0.0.0:6002".into()
}

fn default_command_egress() -> String {
    "tcp://0.0.0.0:6003".into()
}

impl Default for RelaySection {
    fn default() -> Self {
        Self {
            data_ingress: default_data_ingress(),
            data_egress: default_data_egress(),
            command_ingress: default_command_ingress(),
            command_egress: default_command_egress(),
            metrics_port: None,
        }
    }
}

/// `[discovery]`: the registry's REP endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySection {
    #[serde(default = "default_discovery_endpoint")]
    pub endpoint: String,
}

fn default_discovery_endpoint() -> String {
    "tcp://0.0.0.0:6004".into()
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            endpoint: default_discovery_endpoint(),
        }
    }
}

/// `[participants]`: connect-side settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSection {
    /// Host that replaces the bind host of every TCP endpoint when connecting.
    #[serde(default = "default_connect_host")]
    pub connect_host: String,
}

fn default_connect_host() -> String {
    "127.0.0.1".into()
}

impl Default for ParticipantSection {
    fn default() -> Self {
        Self {
            connect_host: default_connect_host(),
        }
    }
}
