use std::collections::HashMap;

use super::types::FabricConfig;
use crate::error::RelayError;
use crate::transport::Transport;

fn overrides(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn empty_toml_uses_defaults() {
    let cfg: FabricConfig = toml::from_str("").unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.relay.data_ingress, "tcp://0.0.0.0:6000");
    assert_eq!(cfg.relay.command_egress, "tcp://0.0.0.0:6003");
    assert_eq!(cfg.discovery.endpoint, "tcp://0.0.0.0:6004");
    assert_eq!(cfg.participants.connect_host, "127.0.0.1");
    assert_eq!(cfg.relay.metrics_port, None);
}

#[test]
fn parse_full_toml() {
    let toml = r#"
[relay]
data_ingress = "tcp://10.0.0.1:7000"
data_egress = "tcp://10.0.0.1:7001"
command_ingress = "ipc:///tmp/stupid-relay/cmd-in.sock"
command_egress = "ipc:///tmp/stupid-relay/cmd-out.sock"
metrics_port = 9090

[discovery]
endpoint = "tcp://10.0.0.1:7004"

[participants]
connect_host = "10.0.0.1"
"#;
    let cfg: FabricConfig = toml::from_str(toml).unwrap();
    cfg.validate().unwrap();

    let relay = cfg.relay_config().unwrap();
    assert_eq!(relay.data_ingress, Transport::tcp("10.0.0.1", 7000));
    assert_eq!(relay.command_ingress, Transport::ipc("cmd-in"));
    assert_eq!(relay.metrics_port, Some(9090));
    assert_eq!(cfg.discovery_transport().unwrap(), Transport::tcp("10.0.0.1", 7004));
}

#[test]
fn partial_section_keeps_other_defaults() {
    let toml = r#"
[relay]
data_ingress = "tcp://0.0.0.0:7100"
"#;
    let cfg: FabricConfig = toml::from_str(toml).unwrap();
    assert_eq!(cfg.relay.data_ingress, "tcp://0.0.0.0:7100");
    assert_eq!(cfg.relay.data_egress, "tcp://0.0.0.0:6001");
}

#[test]
fn participant_endpoints_use_connect_host() {
    let mut cfg = FabricConfig::tcp("0.0.0.0", 6000).unwrap();
    cfg.participants.connect_host = "relay.local".into();
    let endpoints = cfg.participant_endpoints().unwrap();
    assert_eq!(endpoints.data_ingress, Transport::tcp("relay.local", 6000));
    assert_eq!(endpoints.command_egress, Transport::tcp("relay.local", 6003));
    assert_eq!(endpoints.discovery, Transport::tcp("relay.local", 6004));
}

#[test]
fn tcp_base_port_too_high_is_config_error() {
    let err = FabricConfig::tcp("0.0.0.0", 65534).unwrap_err();
    assert!(matches!(err, RelayError::Config(ref msg) if msg.contains("base port 65534")));

    let last = FabricConfig::tcp("0.0.0.0", 65531).unwrap();
    assert_eq!(last.relay.data_ingress, "tcp://0.0.0.0:65531");
    assert_eq!(last.discovery.endpoint, "tcp://0.0.0.0:65535");
}

#[test]
fn tcp_constructor_matches_defaults() {
    let cfg = FabricConfig::tcp("0.0.0.0", 6000).unwrap();
    let defaults = FabricConfig::default();
    assert_eq!(cfg.relay.data_ingress, defaults.relay.data_ingress);
    assert_eq!(cfg.relay.command_ingress, defaults.relay.command_ingress);
    assert_eq!(cfg.discovery.endpoint, defaults.discovery.endpoint);
}

#[test]
fn reject_duplicate_endpoints() {
    let mut cfg = FabricConfig::default();
    cfg.discovery.endpoint = cfg.relay.data_egress.clone();
    let err = cfg.validate().unwrap_err().to_string();
    assert!(err.contains("discovery.endpoint"), "{err}");
    assert!(err.contains("relay.data_egress"), "{err}");
}

#[test]
fn reject_unknown_scheme() {
    let mut cfg = FabricConfig::default();
    cfg.relay.command_egress = "udp://0.0.0.0:6003".into();
    let err = cfg.validate().unwrap_err().to_string();
    assert!(err.contains("relay.command_egress"), "{err}");
    assert!(err.contains("'ipc://' or 'tcp://'"), "{err}");
}

#[test]
fn reject_empty_endpoint() {
    let mut cfg = FabricConfig::default();
    cfg.relay.data_ingress = String::new();
    assert!(cfg.validate().is_err());
}

#[test]
fn reject_blank_connect_host() {
    let mut cfg = FabricConfig::default();
    cfg.participants.connect_host = "  ".into();
    assert!(cfg.validate().is_err());
}

#[test]
fn overrides_replace_values() {
    let mut cfg = FabricConfig::default();
    cfg.apply_overrides(overrides(&[
        ("RELAY_DATA_INGRESS", "tcp://0.0.0.0:8000"),
        ("RELAY_METRICS_PORT", "9100"),
        ("RELAY_DISCOVERY_ENDPOINT", "tcp://0.0.0.0:8004"),
        ("RELAY_PARTICIPANTS_CONNECT_HOST", "10.1.2.3"),
    ]));
    assert_eq!(cfg.relay.data_ingress, "tcp://0.0.0.0:8000");
    assert_eq!(cfg.relay.data_egress, "tcp://0.0.0.0:6001");
    assert_eq!(cfg.relay.metrics_port, Some(9100));
    assert_eq!(cfg.discovery.endpoint, "tcp://0.0.0.0:8004");
    assert_eq!(cfg.participants.connect_host, "10.1.2.3");
}

#[test]
fn invalid_metrics_port_override_is_ignored() {
    let mut cfg = FabricConfig::default();
    cfg.relay.metrics_port = Some(9090);
    cfg.apply_overrides(overrides(&[("RELAY_METRICS_PORT", "not-a-port")]));
    assert_eq!(cfg.relay.metrics_port, Some(9090));
}

#[test]
fn bad_toml_is_a_parse_error() {
    let err = FabricConfig::from_toml("[relay\n").unwrap_err();
    assert!(matches!(err, RelayError::ConfigParse(_)));
}
