//! Relay counters and their HTTP exposure.
//!
//! Counters are plain atomics bumped from the relay loop; the optional
//! `GET /metrics` endpoint serves a JSON snapshot of them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::relay::Plane;

/// Counters for one forwarding plane.
#[derive(Debug, Default)]
pub struct PlaneCounters {
    messages: AtomicU64,
    bytes: AtomicU64,
    recv_errors: AtomicU64,
    send_errors: AtomicU64,
}

impl PlaneCounters {
    pub(crate) fn record_forward(&self, bytes: u64) {
        self.messages.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn record_recv_error(&self) {
        self.recv_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Messages handed to the egress socket.
    pub fn messages(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PlaneSnapshot {
        PlaneSnapshot {
            messages: self.messages.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            recv_errors: self.recv_errors.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
        }
    }
}

/// JSON-serializable counters for one plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlaneSnapshot {
    pub messages: u64,
    pub bytes: u64,
    pub recv_errors: u64,
    pub send_errors: u64,
}

/// Complete JSON response from `GET /metrics`.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub data: PlaneSnapshot,
    pub command: PlaneSnapshot,
    pub uptime_secs: f64,
}

/// Per-plane counters collected by the relay engine.
#[derive(Debug)]
pub struct RelayMetrics {
    data: PlaneCounters,
    command: PlaneCounters,
    start: Instant,
}

impl RelayMetrics {
    pub fn new() -> Self {
        Self {
            data: PlaneCounters::default(),
            command: PlaneCounters::default(),
            start: Instant::now(),
        }
    }

    pub fn plane(&self, plane: Plane) -> &PlaneCounters {
        match plane {
            Plane::Data => &self.data,
            Plane::Command => &self.command,
        }
    }

    /// Messages forwarded across both planes.
    pub fn total(&self) -> u64 {
        self.data.messages() + self.command.messages()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            data: self.data.snapshot(),
            command: self.command.snapshot(),
            uptime_secs: self.start.elapsed().as_secs_f64(),
        }
    }
}

impl Default for RelayMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ── HTTP server ──────────────────────────────────────────────────────

/// Spawn the metrics HTTP server on the given port.
///
/// Returns a `JoinHandle` that resolves when the server shuts down.
pub fn spawn_metrics_server(
    port: u16,
    metrics: Arc<RelayMetrics>,
    shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = axum::Router::new()
            .route("/metrics", axum::routing::get(metrics_handler))
            .with_state(metrics);

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(port, error = %e, "failed to bind metrics HTTP server");
                return;
            }
        };

        tracing::info!(port, "metrics HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut rx = shutdown;
                let _ = rx.wait_for(|stopped| *stopped).await;
            })
            .await
            .ok();

        tracing::info!("metrics HTTP server stopped");
    })
}

async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<Arc<RelayMetrics>>,
) -> axum::Json<MetricsSnapshot> {
    axum::Json(metrics.snapshot())
}
