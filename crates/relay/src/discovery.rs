//! Discovery service and client over ZeroMQ REP/REQ sockets.
//!
//! The service answers one request at a time: receive, apply to the
//! [`TopicRegistry`], reply, repeat. Bad input is answered with an error line
//! and never ends the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};
use zeromq::prelude::*;
use zeromq::{RepSocket, ReqSocket, ZmqMessage};

use crate::error::RelayError;
use crate::protocol::{Category, Request, Response};
use crate::registry::TopicRegistry;
use crate::shutdown::stopped;
use crate::topic::Topic;
use crate::transport::Transport;

/// Default port of the discovery endpoint.
pub const DEFAULT_DISCOVERY_PORT: u16 = 6004;

/// REP-socket server in front of a [`TopicRegistry`].
pub struct DiscoveryService {
    endpoint: Transport,
    registry: Arc<TopicRegistry>,
    shutdown: watch::Sender<bool>,
}

impl DiscoveryService {
    pub fn new(endpoint: Transport, registry: Arc<TopicRegistry>) -> Self {
        Self {
            endpoint,
            registry,
            shutdown: watch::Sender::new(false),
        }
    }

    pub fn registry(&self) -> &Arc<TopicRegistry> {
        &self.registry
    }

    /// Stop the request loop. Safe to call before `run`.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Compute the reply for one raw request.
    pub fn respond(&self, raw: &[u8]) -> String {
        match Request::parse_bytes(raw) {
            Ok(Request::Register { category, topic }) => {
                self.registry.register(category, topic.clone());
                Response::Registered { category, topic }.to_string()
            }
            Ok(Request::Query { category }) => {
                Response::Topics(self.registry.query(category)).to_string()
            }
            Err(e) => {
                debug!(request = %String::from_utf8_lossy(raw), error = %e, "rejected discovery request");
                e.to_string()
            }
        }
    }

    /// Bind the REP socket and serve until [`shutdown`](Self::shutdown).
    ///
    /// A bind failure is returned immediately.
    #[instrument(skip_all, fields(endpoint = %self.endpoint))]
    pub async fn run(&self) -> Result<(), RelayError> {
        self.endpoint.prepare_bind()?;
        let mut socket = RepSocket::new();
        socket.bind(&self.endpoint.endpoint()).await?;
        info!("discovery service bound");

        let mut stop = self.shutdown.subscribe();
        loop {
            tokio::select! {
                biased;

                _ = stopped(&mut stop) => break,

                request = socket.recv() => {
                    let request = match request {
                        Ok(request) => request,
                        Err(e) => {
                            warn!(error = %e, "discovery recv error");
                            continue;
                        }
                    };
                    let raw = request.get(0).map(|frame| frame.to_vec()).unwrap_or_default();
                    let reply = self.respond(&raw);
                    debug!(request = %String::from_utf8_lossy(&raw), reply = %reply, "discovery request");
                    if let Err(e) = socket.send(ZmqMessage::from(reply)).await {
                        warn!(error = %e, "discovery reply error");
                    }
                }
            }
        }

        info!(
            signals = self.registry.len(Category::Signal),
            commands = self.registry.len(Category::Command),
            "discovery service stopped"
        );
        Ok(())
    }
}

/// REQ-socket client for the discovery service.
///
/// Strict request/reply: one call in flight at a time, enforced by `&mut self`.
pub struct DiscoveryClient {
    socket: ReqSocket,
    timeout: Option<Duration>,
}

impl DiscoveryClient {
    #[instrument(skip_all, fields(endpoint = %transport))]
    pub async fn connect(transport: &Transport) -> Result<Self, RelayError> {
        let mut socket = ReqSocket::new();
        let endpoint = transport.endpoint();
        info!(endpoint = %endpoint, "connecting REQ socket to discovery");
        socket.connect(&endpoint).await?;
        Ok(Self {
            socket,
            timeout: None,
        })
    }

    /// Fail calls that get no reply within `timeout` instead of waiting forever.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Send one request and return the raw reply text.
    pub async fn call(&mut self, request: &Request) -> Result<String, RelayError> {
        self.socket
            .send(ZmqMessage::from(request.to_string()))
            .await?;
        let reply = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.socket.recv())
                .await
                .map_err(|_| RelayError::Timeout(limit))??,
            None => self.socket.recv().await?,
        };
        let text = reply
            .get(0)
            .map(|frame| String::from_utf8_lossy(frame).into_owned())
            .unwrap_or_default();
        debug!(request = %request, reply = %text, "discovery reply");
        Ok(text)
    }

    /// `REGISTER <category> <topic>`; returns the confirmation text.
    pub async fn register(&mut self, category: Category, topic: &Topic) -> Result<String, RelayError> {
        self.call(&Request::register(category, topic.clone())).await
    }

    /// `QUERY <category>`; returns the raw listing.
    pub async fn query_raw(&mut self, category: Category) -> Result<String, RelayError> {
        self.call(&Request::query(category)).await
    }

    /// `QUERY <category>`; returns the listed topics.
    pub async fn query(&mut self, category: Category) -> Result<Vec<Topic>, RelayError> {
        let listing = self.query_raw(category).await?;
        Ok(Response::parse_topics(&listing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> DiscoveryService {
        DiscoveryService::new(Transport::tcp("127.0.0.1", 0), Arc::new(TopicRegistry::new()))
    }

    #[test]
    fn respond_register_and_query() {
        let svc = service();
        assert_eq!(
            svc.respond(b"REGISTER SIGNAL engine/temperature"),
            "Registered SIGNAL: engine/temperature"
        );
        assert_eq!(svc.respond(b"REGISTER SIGNAL brake/status"), "Registered SIGNAL: brake/status");
        assert_eq!(
            svc.respond(b"REGISTER SIGNAL engine/temperature"),
            "Registered SIGNAL: engine/temperature"
        );
        assert_eq!(
            svc.respond(b"QUERY SIGNALS"),
            "brake/status engine/temperature "
        );
        assert_eq!(svc.respond(b"QUERY COMMANDS"), "");
    }

    #[test]
    fn respond_errors_do_not_touch_registry() {
        let svc = service();
        assert_eq!(svc.respond(b"REGISTER TOPIC x"), "Unknown registration type");
        assert_eq!(svc.respond(b"QUERY TOPICS"), "Unknown query type");
        assert_eq!(svc.respond(b"HELLO"), "Unknown command");
        assert_eq!(svc.respond(b"REGISTER COMMAND"), "Malformed request: missing topic");
        assert_eq!(svc.respond(b""), "Malformed request: empty request");
        assert!(svc.registry().is_empty());
    }

    #[test]
    fn respond_rejects_invalid_utf8() {
        let svc = service();
        assert_eq!(svc.respond(&[0xff, 0xfe, b' ', b'x']), "Malformed request: not UTF-8");
        assert_eq!(
            svc.respond(b"REGISTER SIGNAL eng\xffine"),
            "Malformed request: not UTF-8"
        );
        assert!(svc.registry().is_empty());

        assert_eq!(svc.respond(b"REGISTER SIGNAL engine"), "Registered SIGNAL: engine");
    }
}
