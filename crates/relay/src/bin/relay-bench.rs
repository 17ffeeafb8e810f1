//! relay-bench: latency and throughput probe for the data plane.
//!
//! `emit` publishes timestamped 70-byte probe frames into data-ingress;
//! `measure` subscribes to everything on data-egress and reports throughput
//! and latency. Run both on the same host so the clocks agree.
//!
//! # Usage
//!
//! ```bash
//! relay-bench measure --report-every 10000
//! relay-bench emit --rate 5000 --count 100000
//! ```

use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use stupid_relay::probe::unix_seconds;
use stupid_relay::{
    EventPublisher, EventSubscriber, LatencyStats, ProbeFrame, RelayMessage, Throughput,
    Transport, ZmqPublisher, ZmqSubscriber,
};
use tokio::time::MissedTickBehavior;

/// Relay data-plane benchmark.
#[derive(Parser, Debug)]
#[command(name = "relay-bench", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Publish probe frames at a fixed rate.
    Emit {
        /// Messages per second.
        #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u32).range(1..))]
        rate: u32,

        /// Frames to send; 0 sends until interrupted.
        #[arg(long, default_value_t = 0)]
        count: u64,

        /// Data-ingress endpoint to publish to.
        #[arg(long, env = "RELAY_BENCH_EMIT_ENDPOINT", default_value = "tcp://127.0.0.1:6000")]
        endpoint: String,
    },

    /// Receive probe frames and report latency.
    Measure {
        /// Data-egress endpoint to subscribe to.
        #[arg(long, env = "RELAY_BENCH_MEASURE_ENDPOINT", default_value = "tcp://127.0.0.1:6001")]
        endpoint: String,

        /// Log a report line every N frames.
        #[arg(long, default_value_t = 10_000, value_parser = clap::value_parser!(u64).range(1..))]
        report_every: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!(?cli, "starting relay-bench");

    match cli.command {
        Command::Emit {
            rate,
            count,
            endpoint,
        } => emit(rate, count, &Transport::parse(&endpoint)?).await,
        Command::Measure {
            endpoint,
            report_every,
        } => measure(&Transport::parse(&endpoint)?, report_every).await,
    }
}

async fn emit(rate: u32, count: u64, endpoint: &Transport) -> anyhow::Result<()> {
    let publisher = ZmqPublisher::connect(endpoint).await?;
    let mut ticker = tokio::time::interval(Duration::from_micros(1_000_000 / u64::from(rate)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut sent: u64 = 0;
    let interrupted = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    tokio::pin!(interrupted);

    while count == 0 || sent < count {
        tokio::select! {
            _ = &mut interrupted => break,
            _ = ticker.tick() => {}
        }
        let frame = ProbeFrame::now().encode();
        if let Err(e) = publisher.publish(RelayMessage::new(frame)).await {
            tracing::warn!(error = %e, "probe publish failed");
            continue;
        }
        sent += 1;
    }

    tracing::info!(sent, "emit finished");
    Ok(())
}

async fn measure(endpoint: &Transport, report_every: u64) -> anyhow::Result<()> {
    let subscriber = ZmqSubscriber::connect(endpoint).await?;
    subscriber.subscribe("").await?;

    let mut latency = LatencyStats::new();
    let mut throughput = Throughput::new();
    let mut discarded: u64 = 0;

    let interrupted = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    tokio::pin!(interrupted);

    loop {
        let received = tokio::select! {
            _ = &mut interrupted => break,
            received = subscriber.recv() => received,
        };
        let message = match received {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(error = %e, "probe recv error");
                continue;
            }
        };
        let Some(frame) = ProbeFrame::decode(message.as_bytes()) else {
            discarded += 1;
            continue;
        };

        latency.record(frame.latency_secs(unix_seconds()));
        throughput.record();

        if latency.count() % report_every == 0 {
            report(&latency, &throughput, Instant::now());
        }
    }

    report(&latency, &throughput, Instant::now());
    tracing::info!(discarded, "measure finished");
    Ok(())
}

fn report(latency: &LatencyStats, throughput: &Throughput, now: Instant) {
    let ms = |secs: Option<f64>| secs.map_or(0.0, |s| s * 1000.0);
    tracing::info!(
        messages = latency.count(),
        throughput_msgs_per_sec = throughput.rate_at(now),
        avg_latency_ms = ms(latency.average()),
        min_latency_ms = ms(latency.min()),
        max_latency_ms = ms(latency.max()),
        "probe report"
    );
}
