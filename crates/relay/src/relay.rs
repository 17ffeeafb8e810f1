use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::watch;
use zeromq::prelude::*;
use zeromq::{PubSocket, SubSocket, ZmqMessage};

use crate::error::RelayError;
use crate::metrics::RelayMetrics;
use crate::shutdown::stopped;
use crate::traits::{Egress, Ingress};
use crate::transport::Transport;

/// Default first port of the relay's TCP endpoint block.
pub const DEFAULT_BASE_PORT: u16 = 6000;

/// Highest base port whose five-port block (four relay ports plus
/// discovery) still fits below 65536.
pub const MAX_BASE_PORT: u16 = u16::MAX - 4;

const _: () = assert!(DEFAULT_BASE_PORT <= MAX_BASE_PORT);

/// Ports `base_port..=base_port + 4`: data-ingress, data-egress,
/// command-ingress, command-egress, discovery.
pub fn port_block(base_port: u16) -> Result<[u16; 5], RelayError> {
    if base_port > MAX_BASE_PORT {
        return Err(RelayError::Config(format!(
            "base port {base_port} too high: the five-port block must start at or below {MAX_BASE_PORT}"
        )));
    }
    Ok([0, 1, 2, 3, 4].map(|offset| base_port + offset))
}

/// One of the two independent forwarding paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Plane {
    /// Producers to consumers.
    Data,
    /// Consumers to producers (star mode).
    Command,
}

impl fmt::Display for Plane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Data => f.write_str("data"),
            Self::Command => f.write_str("command"),
        }
    }
}

/// Endpoints the relay binds.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Producers publish here (relay binds SUB).
    pub data_ingress: Transport,
    /// Consumers subscribe here (relay binds PUB).
    pub data_egress: Transport,
    /// Star-mode consumers publish commands here (relay binds SUB).
    pub command_ingress: Transport,
    /// Star-mode producers subscribe to commands here (relay binds PUB).
    pub command_egress: Transport,
    /// Optional HTTP port for the `/metrics` JSON endpoint.
    pub metrics_port: Option<u16>,
}

impl RelayConfig {
    /// Single-host configuration over IPC sockets.
    pub fn local() -> Self {
        Self {
            data_ingress: Transport::ipc("data-ingress"),
            data_egress: Transport::ipc("data-egress"),
            command_ingress: Transport::ipc("command-ingress"),
            command_egress: Transport::ipc("command-egress"),
            metrics_port: None,
        }
    }

    /// TCP configuration on four consecutive ports starting at `base_port`:
    /// data-ingress, data-egress, command-ingress, command-egress.
    ///
    /// Fails when the block would run past port 65535.
    pub fn tcp(host: &str, base_port: u16) -> Result<Self, RelayError> {
        let [data_in, data_out, command_in, command_out, _] = port_block(base_port)?;
        Ok(Self::on_ports(host, [data_in, data_out, command_in, command_out]))
    }

    pub(crate) fn on_ports(host: &str, ports: [u16; 4]) -> Self {
        Self {
            data_ingress: Transport::tcp(host, ports[0]),
            data_egress: Transport::tcp(host, ports[1]),
            command_ingress: Transport::tcp(host, ports[2]),
            command_egress: Transport::tcp(host, ports[3]),
            metrics_port: None,
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        let base = DEFAULT_BASE_PORT;
        Self::on_ports("0.0.0.0", [base, base + 1, base + 2, base + 3])
    }
}

/// Blind two-plane relay.
///
/// Each plane is a SUB ingress subscribed to everything and a PUB egress.
/// Every message received on an ingress is sent unmodified, frame for frame,
/// to the same plane's egress. The relay applies no topic filtering of its
/// own: consumers filter with the prefixes they subscribe on the egress
/// socket.
///
/// When idle the loop waits without a timeout. On each wake the data plane is
/// serviced before the command plane, and a wake triggered by data also takes
/// one ready command message, so a flooded data plane delays commands but
/// never starves them.
pub struct RelayEngine {
    config: RelayConfig,
    metrics: Arc<RelayMetrics>,
    shutdown: watch::Sender<bool>,
}

impl RelayEngine {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(RelayMetrics::new()),
            shutdown: watch::Sender::new(false),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<RelayMetrics> {
        &self.metrics
    }

    /// Stop the forwarding loop. Safe to call before `run`.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Bind all four endpoints and forward until [`shutdown`](Self::shutdown).
    ///
    /// A bind failure is returned immediately; nothing after startup fails.
    pub async fn run(&self) -> Result<(), RelayError> {
        let data = Lane {
            plane: Plane::Data,
            ingress: bind_ingress(&self.config.data_ingress).await?,
            egress: bind_egress(&self.config.data_egress).await?,
        };
        tracing::info!(
            ingress = %self.config.data_ingress,
            egress = %self.config.data_egress,
            "data plane bound, producers publish to ingress"
        );

        let command = Lane {
            plane: Plane::Command,
            ingress: bind_ingress(&self.config.command_ingress).await?,
            egress: bind_egress(&self.config.command_egress).await?,
        };
        tracing::info!(
            ingress = %self.config.command_ingress,
            egress = %self.config.command_egress,
            "command plane bound, consumers publish to ingress"
        );

        let _http_handle = self.config.metrics_port.map(|port| {
            crate::metrics::spawn_metrics_server(
                port,
                self.metrics.clone(),
                self.shutdown.subscribe(),
            )
        });

        tracing::info!("relay loop started");
        forward_loop(data, command, &self.metrics, self.shutdown.subscribe()).await;

        tracing::info!(
            data = self.metrics.plane(Plane::Data).messages(),
            command = self.metrics.plane(Plane::Command).messages(),
            "relay stopped"
        );
        Ok(())
    }
}

async fn bind_ingress(transport: &Transport) -> Result<SubSocket, RelayError> {
    transport.prepare_bind()?;
    let mut socket = SubSocket::new();
    socket.bind(&transport.endpoint()).await?;
    socket.subscribe("").await?;
    Ok(socket)
}

async fn bind_egress(transport: &Transport) -> Result<PubSocket, RelayError> {
    transport.prepare_bind()?;
    let mut socket = PubSocket::new();
    socket.bind(&transport.endpoint()).await?;
    Ok(socket)
}

/// An ingress/egress pair belonging to one plane.
pub(crate) struct Lane<I, E> {
    pub(crate) plane: Plane,
    pub(crate) ingress: I,
    pub(crate) egress: E,
}

impl<I: Ingress, E: Egress> Lane<I, E> {
    async fn forward(&mut self, received: Result<ZmqMessage, RelayError>, metrics: &RelayMetrics) {
        let counters = metrics.plane(self.plane);
        let msg = match received {
            Ok(msg) => msg,
            Err(e) => {
                counters.record_recv_error();
                tracing::warn!(plane = %self.plane, error = %e, "ingress recv error");
                return;
            }
        };

        let bytes: u64 = msg.iter().map(|frame| frame.len() as u64).sum();
        if tracing::enabled!(tracing::Level::DEBUG) {
            let topic = leading_token(&msg);
            tracing::debug!(plane = %self.plane, topic = %topic, bytes, "forwarding message");
        }

        match self.egress.send_frames(msg).await {
            Ok(()) => counters.record_forward(bytes),
            Err(e) => {
                counters.record_send_error();
                tracing::warn!(plane = %self.plane, error = %e, "egress send error");
            }
        }
    }
}

/// Relay both planes until `stop` turns true.
///
/// Per wake the branches are checked in a fixed order: stop signal, data
/// ingress, command ingress.
pub(crate) async fn forward_loop<I, E>(
    mut data: Lane<I, E>,
    mut command: Lane<I, E>,
    metrics: &RelayMetrics,
    mut stop: watch::Receiver<bool>,
) where
    I: Ingress,
    E: Egress,
{
    loop {
        tokio::select! {
            biased;

            _ = stopped(&mut stop) => break,

            received = data.ingress.recv_frames() => {
                data.forward(received, metrics).await;
                if let Some(received) = command.ingress.recv_frames().now_or_never() {
                    command.forward(received, metrics).await;
                }
            }

            received = command.ingress.recv_frames() => {
                command.forward(received, metrics).await;
            }
        }
    }
}

/// First frame up to the first space, for logging only.
fn leading_token(msg: &ZmqMessage) -> String {
    msg.get(0)
        .map(|frame| {
            let end = frame.iter().position(|b| *b == b' ').unwrap_or(frame.len());
            String::from_utf8_lossy(&frame[..end]).into_owned()
        })
        .unwrap_or_else(|| "<empty>".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;

    /// In-memory ingress fed by a channel.
    struct ChannelIngress(mpsc::UnboundedReceiver<ZmqMessage>);

    #[async_trait]
    impl Ingress for ChannelIngress {
        async fn recv_frames(&mut self) -> Result<ZmqMessage, RelayError> {
            self.0
                .recv()
                .await
                .ok_or_else(|| RelayError::Transport("closed".into()))
        }
    }

    /// Egress that appends `<plane>:<payload>` to a shared log.
    struct LogEgress {
        plane: Plane,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Egress for LogEgress {
        async fn send_frames(&mut self, frames: ZmqMessage) -> Result<(), RelayError> {
            let text = frames
                .get(0)
                .map(|frame| String::from_utf8_lossy(frame).into_owned())
                .unwrap_or_default();
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.plane, text));
            Ok(())
        }
    }

    struct Harness {
        data_tx: mpsc::UnboundedSender<ZmqMessage>,
        command_tx: mpsc::UnboundedSender<ZmqMessage>,
        lanes: (
            Lane<ChannelIngress, LogEgress>,
            Lane<ChannelIngress, LogEgress>,
        ),
        log: Arc<Mutex<Vec<String>>>,
    }

    fn harness() -> Harness {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (data_tx, data_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let lane = |plane, rx| Lane {
            plane,
            ingress: ChannelIngress(rx),
            egress: LogEgress {
                plane,
                log: log.clone(),
            },
        };
        let lanes = (lane(Plane::Data, data_rx), lane(Plane::Command, command_rx));
        Harness {
            data_tx,
            command_tx,
            lanes,
            log,
        }
    }

    #[test]
    fn config_tcp_ports_are_consecutive() {
        let cfg = RelayConfig::tcp("0.0.0.0", 6000).unwrap();
        assert_eq!(cfg.data_ingress.endpoint(), "tcp://0.0.0.0:6000");
        assert_eq!(cfg.data_egress.endpoint(), "tcp://0.0.0.0:6001");
        assert_eq!(cfg.command_ingress.endpoint(), "tcp://0.0.0.0:6002");
        assert_eq!(cfg.command_egress.endpoint(), "tcp://0.0.0.0:6003");
    }

    #[test]
    fn config_tcp_rejects_block_past_last_port() {
        assert_eq!(port_block(MAX_BASE_PORT).unwrap()[4], u16::MAX);
        let err = RelayConfig::tcp("0.0.0.0", 65534).unwrap_err();
        assert!(matches!(err, RelayError::Config(ref msg) if msg.contains("65534")));
        assert!(RelayConfig::tcp("0.0.0.0", u16::MAX).is_err());
    }

    #[test]
    fn default_config_is_default_block() {
        let cfg = RelayConfig::default();
        assert_eq!(cfg.data_ingress.endpoint(), "tcp://0.0.0.0:6000");
        assert_eq!(cfg.command_egress.endpoint(), "tcp://0.0.0.0:6003");
    }

    #[test]
    fn config_local_endpoints() {
        let cfg = RelayConfig::local();
        assert!(cfg.data_ingress.endpoint().contains("data-ingress"));
        assert!(cfg.command_egress.endpoint().contains("command-egress"));
    }

    #[test]
    fn leading_token_from_frame() {
        let msg: ZmqMessage = "engine/temperature actorA value #1".into();
        assert_eq!(leading_token(&msg), "engine/temperature");
        let bare: ZmqMessage = "heartbeat".into();
        assert_eq!(leading_token(&bare), "heartbeat");
    }

    #[tokio::test]
    async fn data_is_serviced_before_command_on_each_wake() {
        let h = harness();
        for i in 0..3 {
            h.data_tx.send(format!("d{i}").into()).unwrap();
        }
        h.command_tx.send("c0".into()).unwrap();

        let metrics = RelayMetrics::new();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (data, command) = h.lanes;
        let log = h.log.clone();

        let run = forward_loop(data, command, &metrics, stop_rx);
        let stopper = async {
            while log.lock().unwrap().len() < 4 {
                tokio::task::yield_now().await;
            }
            stop_tx.send_replace(true);
        };
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            tokio::join!(run, stopper);
        })
        .await
        .expect("relay loop did not stop");

        assert_eq!(
            *h.log.lock().unwrap(),
            vec!["data:d0", "command:c0", "data:d1", "data:d2"]
        );
        assert_eq!(metrics.plane(Plane::Data).messages(), 3);
        assert_eq!(metrics.plane(Plane::Command).messages(), 1);
    }

    #[tokio::test]
    async fn both_ready_drains_one_of_each_per_wake() {
        let h = harness();
        for i in 0..3 {
            h.data_tx.send(format!("d{i}").into()).unwrap();
            h.command_tx.send(format!("c{i}").into()).unwrap();
        }

        let metrics = RelayMetrics::new();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (data, command) = h.lanes;
        let log = h.log.clone();

        let run = forward_loop(data, command, &metrics, stop_rx);
        let stopper = async {
            while log.lock().unwrap().len() < 6 {
                tokio::task::yield_now().await;
            }
            stop_tx.send_replace(true);
        };
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            tokio::join!(run, stopper);
        })
        .await
        .expect("relay loop did not stop");

        assert_eq!(
            *h.log.lock().unwrap(),
            vec!["data:d0", "command:c0", "data:d1", "command:c1", "data:d2", "command:c2"]
        );
    }

    #[tokio::test]
    async fn command_only_traffic_is_forwarded() {
        let h = harness();
        h.command_tx.send("cmd clientA command #0".into()).unwrap();

        let metrics = RelayMetrics::new();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (data, command) = h.lanes;
        let log = h.log.clone();

        let run = forward_loop(data, command, &metrics, stop_rx);
        let stopper = async {
            while log.lock().unwrap().is_empty() {
                tokio::task::yield_now().await;
            }
            stop_tx.send_replace(true);
        };
        tokio::time::timeout(std::time::Duration::from_secs(2), async {
            tokio::join!(run, stopper);
        })
        .await
        .expect("relay loop did not stop");

        assert_eq!(*h.log.lock().unwrap(), vec!["command:cmd clientA command #0"]);
        assert_eq!(metrics.plane(Plane::Data).messages(), 0);
    }

    #[tokio::test]
    async fn stop_before_traffic_returns_immediately() {
        let h = harness();
        let metrics = RelayMetrics::new();
        let (stop_tx, stop_rx) = watch::channel(false);
        stop_tx.send_replace(true);
        let (data, command) = h.lanes;

        tokio::time::timeout(
            std::time::Duration::from_secs(1),
            forward_loop(data, command, &metrics, stop_rx),
        )
        .await
        .expect("relay loop ignored stop signal");

        // Senders outlive the loop so the ingress never reports closed.
        drop(h.data_tx);
        drop(h.command_tx);
        assert!(h.log.lock().unwrap().is_empty());
    }
}
