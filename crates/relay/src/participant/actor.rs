use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use super::{Lifecycle, ParticipantEndpoints, ParticipantState, POLL_INTERVAL};
use crate::discovery::DiscoveryClient;
use crate::error::RelayError;
use crate::message::RelayMessage;
use crate::protocol::Category;
use crate::pubsub::{ZmqPublisher, ZmqSubscriber};
use crate::shutdown::stopped;
use crate::topic::Topic;
use crate::traits::{EventPublisher, EventSubscriber};

pub const DEFAULT_ACTOR_ID: &str = "actorA";
pub const DEFAULT_SIGNALS: &str = "engine/temperature,engine/pressure,oil/level,brake/status";
pub const DEFAULT_COMMAND_TOPIC: &str = "cmd";

/// Producer settings.
#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Identity embedded in every published signal.
    pub id: String,
    /// Subscribe to commands on the command plane.
    pub star: bool,
    /// Signal topics registered and published each round, in order.
    pub signals: Vec<Topic>,
    /// Command topics registered and subscribed in star mode.
    pub commands: Vec<Topic>,
    /// Pause after each published signal.
    pub publish_delay: Duration,
    /// Bound on the command poll at the start of each round.
    pub poll_interval: Duration,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            id: DEFAULT_ACTOR_ID.to_string(),
            star: false,
            signals: Topic::parse_list(DEFAULT_SIGNALS),
            commands: Topic::parse_list(DEFAULT_COMMAND_TOPIC),
            publish_delay: Duration::from_millis(1),
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Registers its topics, then publishes one round of signals after another.
///
/// In star mode each round starts by polling the command plane and handling
/// whatever commands have arrived.
pub struct Actor {
    config: ActorConfig,
    endpoints: ParticipantEndpoints,
    lifecycle: Lifecycle,
    command_sink: Option<mpsc::UnboundedSender<RelayMessage>>,
}

impl Actor {
    pub fn new(config: ActorConfig, endpoints: ParticipantEndpoints) -> Self {
        Self {
            config,
            endpoints,
            lifecycle: Lifecycle::new(),
            command_sink: None,
        }
    }

    /// Forward every received command to `sink` in addition to logging it.
    pub fn with_command_sink(mut self, sink: mpsc::UnboundedSender<RelayMessage>) -> Self {
        self.command_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &ActorConfig {
        &self.config
    }

    pub fn state(&self) -> ParticipantState {
        self.lifecycle.state()
    }

    /// Resolves once the actor is publishing. `false` if it stopped first.
    pub async fn wait_running(&self) -> bool {
        self.lifecycle.wait_running().await
    }

    /// Stop the publish loop. Safe to call before `run`.
    pub fn shutdown(&self) {
        self.lifecycle.shutdown();
    }

    #[instrument(skip_all, fields(actor = %self.config.id))]
    pub async fn run(&self) -> Result<(), RelayError> {
        self.lifecycle.enter(ParticipantState::Registering);
        let result = self.register_and_publish().await;
        self.lifecycle.enter(ParticipantState::Stopped);
        result
    }

    async fn register_and_publish(&self) -> Result<(), RelayError> {
        self.register().await?;

        let publisher = ZmqPublisher::connect(&self.endpoints.data_ingress).await?;
        let commands = if self.config.star {
            let subscriber = ZmqSubscriber::connect(&self.endpoints.command_egress).await?;
            for topic in &self.config.commands {
                subscriber.subscribe(topic.as_str()).await?;
            }
            Some(subscriber)
        } else {
            None
        };

        self.lifecycle.enter(ParticipantState::Running);
        info!(
            signals = self.config.signals.len(),
            star = self.config.star,
            "actor publishing"
        );

        let mut stop = self.lifecycle.stop_signal();
        let mut counter: u64 = 0;
        loop {
            if *stop.borrow() {
                break;
            }

            if let Some(subscriber) = &commands {
                tokio::select! {
                    biased;

                    _ = stopped(&mut stop) => break,

                    first = tokio::time::timeout(self.config.poll_interval, subscriber.recv()) => {
                        if let Ok(first) = first {
                            self.handle_command(first);
                            while let Some(next) = subscriber.recv().now_or_never() {
                                self.handle_command(next);
                            }
                        }
                    }
                }
            }

            for topic in &self.config.signals {
                let message = RelayMessage::signal(topic, &self.config.id, counter);
                if let Err(e) = publisher.publish(message).await {
                    warn!(topic = %topic, error = %e, "signal publish failed");
                }
                tokio::time::sleep(self.config.publish_delay).await;
            }

            if self.config.signals.is_empty() && commands.is_none() {
                tokio::select! {
                    _ = stopped(&mut stop) => break,
                    _ = tokio::time::sleep(self.config.poll_interval) => {}
                }
            }

            counter += 1;
        }

        info!(rounds = counter, "actor stopped");
        Ok(())
    }

    async fn register(&self) -> Result<(), RelayError> {
        let mut discovery = DiscoveryClient::connect(&self.endpoints.discovery).await?;
        for topic in &self.config.signals {
            let reply = discovery.register(Category::Signal, topic).await?;
            info!(reply = %reply, "signal registered");
        }
        if self.config.star {
            for topic in &self.config.commands {
                let reply = discovery.register(Category::Command, topic).await?;
                info!(reply = %reply, "command registered");
            }
        }
        Ok(())
    }

    fn handle_command(&self, received: Result<RelayMessage, RelayError>) {
        match received {
            Ok(message) => {
                let content = message.content().unwrap_or_default();
                info!(
                    topic = %String::from_utf8_lossy(message.topic_token()),
                    content = %String::from_utf8_lossy(content),
                    "command received"
                );
                if let Some(sink) = &self.command_sink {
                    let _ = sink.send(message);
                }
            }
            Err(e) => warn!(error = %e, "command recv error"),
        }
    }
}
