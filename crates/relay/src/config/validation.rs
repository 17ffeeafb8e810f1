use std::collections::HashMap;

use crate::error::RelayError;
use crate::transport::Transport;

use super::types::FabricConfig;

impl FabricConfig {
    /// Check every endpoint parses and that no two bind the same address.
    pub fn validate(&self) -> Result<(), RelayError> {
        self.validate_endpoints_distinct()?;
        self.validate_connect_host()?;
        Ok(())
    }

    fn bind_endpoints(&self) -> [(&'static str, &str); 5] {
        [
            ("relay.data_ingress", &self.relay.data_ingress),
            ("relay.data_egress", &self.relay.data_egress),
            ("relay.command_ingress", &self.relay.command_ingress),
            ("relay.command_egress", &self.relay.command_egress),
            ("discovery.endpoint", &self.discovery.endpoint),
        ]
    }

    fn validate_endpoints_distinct(&self) -> Result<(), RelayError> {
        let mut seen: HashMap<Transport, &str> = HashMap::new();
        for (key, endpoint) in self.bind_endpoints() {
            let transport = Transport::parse(endpoint).map_err(|e| match e {
                RelayError::Config(msg) => RelayError::Config(format!("{key}: {msg}")),
                other => other,
            })?;
            if let Some(other) = seen.insert(transport, key) {
                return Err(RelayError::Config(format!(
                    "{key} and {other} both use endpoint '{endpoint}'"
                )));
            }
        }
        Ok(())
    }

    fn validate_connect_host(&self) -> Result<(), RelayError> {
        let host = &self.participants.connect_host;
        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(RelayError::Config(format!(
                "invalid participants.connect_host '{host}'"
            )));
        }
        Ok(())
    }
}
