//! Producer ("actor") and consumer ("client") roles.
//!
//! Both roles follow the same lifecycle: register or query topics with the
//! discovery service, connect their relay sockets, then run until stopped.
//! Any connect failure before `Running` is returned as an error.

mod actor;
mod client;

pub use actor::{Actor, ActorConfig, DEFAULT_ACTOR_ID, DEFAULT_COMMAND_TOPIC, DEFAULT_SIGNALS};
pub use client::{Client, ClientConfig, DEFAULT_CLIENT_ID};

use std::time::Duration;

use tokio::sync::watch;

use crate::discovery::DEFAULT_DISCOVERY_PORT;
use crate::error::RelayError;
use crate::relay::{port_block, RelayConfig, DEFAULT_BASE_PORT};
use crate::transport::Transport;

const _: () = assert!(DEFAULT_BASE_PORT + 4 == DEFAULT_DISCOVERY_PORT);

/// Bound on each receive poll inside the participant loops.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lifecycle phase of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantState {
    /// Created, `run` not yet called.
    Idle,
    /// Talking to the discovery service and connecting sockets.
    Registering,
    /// Main loop active.
    Running,
    /// Loop left after a stop signal, or setup failed.
    Stopped,
}

/// Endpoints a participant connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantEndpoints {
    pub discovery: Transport,
    pub data_ingress: Transport,
    pub data_egress: Transport,
    pub command_ingress: Transport,
    pub command_egress: Transport,
}

impl ParticipantEndpoints {
    /// Relay ports `base_port..=base_port + 3` and discovery on `base_port + 4`.
    pub fn tcp(host: &str, base_port: u16) -> Result<Self, RelayError> {
        let [data_in, data_out, command_in, command_out, discovery] = port_block(base_port)?;
        Ok(Self::from_relay(
            &RelayConfig::on_ports(host, [data_in, data_out, command_in, command_out]),
            &Transport::tcp(host, discovery),
        ))
    }

    /// Connect-side view of a relay and discovery service bound elsewhere.
    pub fn from_relay(relay: &RelayConfig, discovery: &Transport) -> Self {
        Self {
            discovery: discovery.clone(),
            data_ingress: relay.data_ingress.clone(),
            data_egress: relay.data_egress.clone(),
            command_ingress: relay.command_ingress.clone(),
            command_egress: relay.command_egress.clone(),
        }
    }

    /// Rewrite every TCP endpoint to go through `host`.
    pub fn with_host(&self, host: &str) -> Self {
        Self {
            discovery: self.discovery.with_host(host),
            data_ingress: self.data_ingress.with_host(host),
            data_egress: self.data_egress.with_host(host),
            command_ingress: self.command_ingress.with_host(host),
            command_egress: self.command_egress.with_host(host),
        }
    }
}

impl Default for ParticipantEndpoints {
    fn default() -> Self {
        let base = DEFAULT_BASE_PORT;
        Self::from_relay(
            &RelayConfig::on_ports("127.0.0.1", [base, base + 1, base + 2, base + 3]),
            &Transport::tcp("127.0.0.1", DEFAULT_DISCOVERY_PORT),
        )
    }
}

/// State and stop signal shared by both roles.
#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: watch::Sender<ParticipantState>,
    shutdown: watch::Sender<bool>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            state: watch::Sender::new(ParticipantState::Idle),
            shutdown: watch::Sender::new(false),
        }
    }

    pub(crate) fn state(&self) -> ParticipantState {
        *self.state.borrow()
    }

    pub(crate) fn enter(&self, state: ParticipantState) {
        tracing::debug!(?state, "participant state");
        self.state.send_replace(state);
    }

    pub(crate) fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    pub(crate) fn stop_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    /// Wait until the participant is running, or has stopped without ever
    /// getting there. Returns whether it is running.
    pub(crate) async fn wait_running(&self) -> bool {
        let mut rx = self.state.subscribe();
        let reached = rx
            .wait_for(|s| matches!(s, ParticipantState::Running | ParticipantState::Stopped))
            .await;
        matches!(reached.as_deref(), Ok(ParticipantState::Running))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints_match_relay_layout() {
        let endpoints = ParticipantEndpoints::default();
        assert_eq!(endpoints.data_ingress.endpoint(), "tcp://127.0.0.1:6000");
        assert_eq!(endpoints.data_egress.endpoint(), "tcp://127.0.0.1:6001");
        assert_eq!(endpoints.command_ingress.endpoint(), "tcp://127.0.0.1:6002");
        assert_eq!(endpoints.command_egress.endpoint(), "tcp://127.0.0.1:6003");
        assert_eq!(endpoints.discovery.endpoint(), "tcp://127.0.0.1:6004");
    }

    #[test]
    fn with_host_rewrites_all_tcp_endpoints() {
        let endpoints = ParticipantEndpoints::tcp("0.0.0.0", 7000)
            .unwrap()
            .with_host("10.0.0.5");
        assert_eq!(endpoints.discovery, Transport::tcp("10.0.0.5", 7004));
        assert_eq!(endpoints.command_egress, Transport::tcp("10.0.0.5", 7003));
    }

    #[test]
    fn tcp_endpoints_reject_overflowing_base_port() {
        assert!(ParticipantEndpoints::tcp("127.0.0.1", 65533).is_err());
        let last = ParticipantEndpoints::tcp("127.0.0.1", 65531).unwrap();
        assert_eq!(last.discovery, Transport::tcp("127.0.0.1", 65535));
    }

    #[tokio::test]
    async fn lifecycle_reports_running() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), ParticipantState::Idle);
        lifecycle.enter(ParticipantState::Registering);
        lifecycle.enter(ParticipantState::Running);
        assert!(lifecycle.wait_running().await);
    }

    #[tokio::test]
    async fn lifecycle_wait_ends_on_stop_without_running() {
        let lifecycle = Lifecycle::new();
        lifecycle.enter(ParticipantState::Stopped);
        assert!(!lifecycle.wait_running().await);
    }
}
