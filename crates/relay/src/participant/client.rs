use std::sync::OnceLock;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::actor::DEFAULT_COMMAND_TOPIC;
use super::{Lifecycle, ParticipantEndpoints, ParticipantState, POLL_INTERVAL};
use crate::discovery::DiscoveryClient;
use crate::error::RelayError;
use crate::message::RelayMessage;
use crate::protocol::Category;
use crate::pubsub::{ZmqPublisher, ZmqSubscriber};
use crate::shutdown::stopped;
use crate::topic::{subscription_prefixes, Topic};
use crate::traits::{EventPublisher, EventSubscriber};

pub const DEFAULT_CLIENT_ID: &str = "clientA";

/// Consumer settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Identity embedded in every command sent.
    pub id: String,
    /// Send commands on the command plane.
    pub star: bool,
    /// Prefix filters; empty subscribes to everything.
    pub subscriptions: Vec<Topic>,
    /// Topic of the commands sent in star mode.
    pub command_topic: Topic,
    /// Bound on each data poll.
    pub poll_interval: Duration,
    /// Minimum spacing between two commands.
    pub command_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_CLIENT_ID.to_string(),
            star: false,
            subscriptions: Vec::new(),
            command_topic: Topic::from_static(DEFAULT_COMMAND_TOPIC),
            poll_interval: POLL_INTERVAL,
            command_interval: Duration::from_millis(20),
        }
    }
}

/// Snapshots the registered signals, then receives data until stopped.
///
/// In star mode it also sends a command whenever `command_interval` has
/// passed since the previous one.
pub struct Client {
    config: ClientConfig,
    endpoints: ParticipantEndpoints,
    lifecycle: Lifecycle,
    data_sink: Option<mpsc::UnboundedSender<RelayMessage>>,
    signals: OnceLock<Vec<Topic>>,
}

impl Client {
    pub fn new(config: ClientConfig, endpoints: ParticipantEndpoints) -> Self {
        Self {
            config,
            endpoints,
            lifecycle: Lifecycle::new(),
            data_sink: None,
            signals: OnceLock::new(),
        }
    }

    /// Forward every received data message to `sink` in addition to logging it.
    pub fn with_data_sink(mut self, sink: mpsc::UnboundedSender<RelayMessage>) -> Self {
        self.data_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ParticipantState {
        self.lifecycle.state()
    }

    /// Signal topics returned by the startup query; `None` before it completes.
    pub fn signals_snapshot(&self) -> Option<&[Topic]> {
        self.signals.get().map(Vec::as_slice)
    }

    /// Resolves once the client is receiving. `false` if it stopped first.
    pub async fn wait_running(&self) -> bool {
        self.lifecycle.wait_running().await
    }

    /// Stop the receive loop. Safe to call before `run`.
    pub fn shutdown(&self) {
        self.lifecycle.shutdown();
    }

    #[instrument(skip_all, fields(client = %self.config.id))]
    pub async fn run(&self) -> Result<(), RelayError> {
        self.lifecycle.enter(ParticipantState::Registering);
        let result = self.query_and_receive().await;
        self.lifecycle.enter(ParticipantState::Stopped);
        result
    }

    async fn query_and_receive(&self) -> Result<(), RelayError> {
        let mut discovery = DiscoveryClient::connect(&self.endpoints.discovery).await?;
        let signals = discovery.query(Category::Signal).await?;
        let listing: Vec<&str> = signals.iter().map(Topic::as_str).collect();
        info!(count = signals.len(), signals = %listing.join(" "), "available signals");
        let _ = self.signals.set(signals);

        let subscriber = ZmqSubscriber::connect(&self.endpoints.data_egress).await?;
        for prefix in subscription_prefixes(&self.config.subscriptions) {
            subscriber.subscribe(prefix).await?;
        }

        let commands = if self.config.star {
            Some(ZmqPublisher::connect(&self.endpoints.command_ingress).await?)
        } else {
            None
        };

        self.lifecycle.enter(ParticipantState::Running);
        info!(
            subscriptions = self.config.subscriptions.len(),
            star = self.config.star,
            "client receiving"
        );

        let mut stop = self.lifecycle.stop_signal();
        let mut counter: u64 = 0;
        let mut last_command = Instant::now();
        loop {
            tokio::select! {
                biased;

                _ = stopped(&mut stop) => break,

                received = tokio::time::timeout(self.config.poll_interval, subscriber.recv()) => {
                    match received {
                        Ok(Ok(message)) => self.handle_data(message),
                        Ok(Err(e)) => warn!(error = %e, "data recv error"),
                        Err(_) => {}
                    }
                }
            }

            if let Some(publisher) = &commands {
                if last_command.elapsed() >= self.config.command_interval {
                    let message =
                        RelayMessage::command(&self.config.command_topic, &self.config.id, counter);
                    if let Err(e) = publisher.publish(message).await {
                        warn!(error = %e, "command publish failed");
                    }
                    counter += 1;
                    last_command = Instant::now();
                }
            }
        }

        info!(commands_sent = counter, "client stopped");
        Ok(())
    }

    fn handle_data(&self, message: RelayMessage) {
        if !message.matches(&self.config.subscriptions) {
            debug!(message = %message.as_text(), "dropping message outside subscriptions");
            return;
        }
        info!(message = %message.as_text(), "data received");
        if let Some(sink) = &self.data_sink {
            let _ = sink.send(message);
        }
    }
}
