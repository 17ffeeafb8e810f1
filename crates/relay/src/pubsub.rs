use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeromq::prelude::*;
use zeromq::{PubSocket, SubSocket, ZmqMessage};

use crate::error::RelayError;
use crate::message::RelayMessage;
use crate::traits::{EventPublisher, EventSubscriber};
use crate::transport::Transport;

/// ZeroMQ PUB socket used by participants.
///
/// Every message goes out as a single frame holding the raw payload, so the
/// SUB-side prefix filter sees the conventional `<topic> ` lead bytes.
pub struct ZmqPublisher {
    socket: Mutex<PubSocket>,
}

impl ZmqPublisher {
    /// Connect to a relay ingress endpoint.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, RelayError> {
        let mut socket = PubSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "connecting PUB socket");
        socket.connect(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }

    /// Bind directly, for PUB/SUB without a relay in between.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn bind(transport: &Transport) -> Result<Self, RelayError> {
        transport.prepare_bind()?;
        let mut socket = PubSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "binding PUB socket");
        socket.bind(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventPublisher for ZmqPublisher {
    async fn publish(&self, message: RelayMessage) -> Result<(), RelayError> {
        let len = message.len();
        let frame = ZmqMessage::from(message.into_bytes());

        let mut socket = self.socket.lock().await;
        socket.send(frame).await?;

        debug!(bytes = len, "published message");
        Ok(())
    }
}

/// ZeroMQ SUB socket used by participants.
pub struct ZmqSubscriber {
    socket: Mutex<SubSocket>,
}

impl ZmqSubscriber {
    /// Connect to a relay egress endpoint. Nothing is received until at
    /// least one prefix is subscribed.
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, RelayError> {
        let mut socket = SubSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "connecting SUB socket");
        socket.connect(&endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
        })
    }
}

#[async_trait]
impl EventSubscriber for ZmqSubscriber {
    async fn subscribe(&self, prefix: &str) -> Result<(), RelayError> {
        let mut socket = self.socket.lock().await;
        socket.subscribe(prefix).await?;
        info!(prefix = %prefix, "subscribed to prefix");
        Ok(())
    }

    async fn recv(&self) -> Result<RelayMessage, RelayError> {
        let mut socket = self.socket.lock().await;
        let frames = socket.recv().await?;
        let message = RelayMessage::from_frames(frames.into_vec());
        debug!(bytes = message.len(), "received message");
        Ok(message)
    }
}
