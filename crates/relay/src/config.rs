//! TOML configuration for the relay, the discovery service and participants.

mod loading;
mod types;
mod validation;

#[cfg(test)]
mod tests;

pub use types::{DiscoverySection, FabricConfig, ParticipantSection, RelaySection};
