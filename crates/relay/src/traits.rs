use std::sync::Arc;

use async_trait::async_trait;
use zeromq::prelude::*;
use zeromq::{PubSocket, SubSocket, ZmqMessage};

use crate::error::RelayError;
use crate::message::RelayMessage;

/// Publishes messages onto a relay plane.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish a message. Subscribers filter on its leading bytes.
    async fn publish(&self, message: RelayMessage) -> Result<(), RelayError>;
}

/// Blanket implementation so `Arc<dyn EventPublisher>` can be used directly.
#[async_trait]
impl<T: EventPublisher + ?Sized> EventPublisher for Arc<T> {
    async fn publish(&self, message: RelayMessage) -> Result<(), RelayError> {
        (**self).publish(message).await
    }
}

/// Receives messages from a relay plane through prefix filters.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Add a prefix filter. The empty prefix matches everything.
    async fn subscribe(&self, prefix: &str) -> Result<(), RelayError>;

    /// Wait for the next matching message.
    async fn recv(&self) -> Result<RelayMessage, RelayError>;
}

/// Receiving end of a forwarding plane, as seen by the relay loop.
///
/// `recv_frames` must be safe to cancel: the relay drops the pending future
/// whenever another branch wins the wake.
#[async_trait]
pub trait Ingress: Send {
    async fn recv_frames(&mut self) -> Result<ZmqMessage, RelayError>;
}

/// Sending end of a forwarding plane, as seen by the relay loop.
#[async_trait]
pub trait Egress: Send {
    async fn send_frames(&mut self, frames: ZmqMessage) -> Result<(), RelayError>;
}

#[async_trait]
impl Ingress for SubSocket {
    async fn recv_frames(&mut self) -> Result<ZmqMessage, RelayError> {
        Ok(self.recv().await?)
    }
}

#[async_trait]
impl Egress for PubSocket {
    async fn send_frames(&mut self, frames: ZmqMessage) -> Result<(), RelayError> {
        Ok(self.send(frames).await?)
    }
}
