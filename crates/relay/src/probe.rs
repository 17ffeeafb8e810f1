//! Latency probe frames and the statistics the bench tool reports.
//!
//! A probe frame is 70 bytes: the sender's wall-clock time as a native-endian
//! `f64` of UNIX seconds, then 62 filler bytes. The receiver subtracts that
//! timestamp from its own clock, so latency figures are only meaningful when
//! both ends share a clock.

use std::time::{Duration, Instant};

use bytes::{BufMut, Bytes, BytesMut};
use chrono::Utc;

/// Total size of an encoded probe frame.
pub const FRAME_LEN: usize = 70;

const STAMP_LEN: usize = std::mem::size_of::<f64>();
const FILLER: u8 = b'A';

/// Current wall-clock time as fractional UNIX seconds.
pub fn unix_seconds() -> f64 {
    let now = Utc::now();
    now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) / 1e9
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeFrame {
    /// Send time in UNIX seconds.
    pub sent_at: f64,
}

impl ProbeFrame {
    pub fn now() -> Self {
        Self {
            sent_at: unix_seconds(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAME_LEN);
        buf.put_slice(&self.sent_at.to_ne_bytes());
        buf.put_bytes(FILLER, FRAME_LEN - STAMP_LEN);
        buf.freeze()
    }

    /// Read the timestamp from the first 8 bytes. Frames too short to hold
    /// one yield `None`; anything after the timestamp is ignored.
    pub fn decode(frame: &[u8]) -> Option<Self> {
        let stamp: [u8; STAMP_LEN] = frame.get(..STAMP_LEN)?.try_into().ok()?;
        Some(Self {
            sent_at: f64::from_ne_bytes(stamp),
        })
    }

    /// Seconds between sending and `received_at`.
    pub fn latency_secs(&self, received_at: f64) -> f64 {
        received_at - self.sent_at
    }
}

/// Running latency aggregate, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencyStats {
    count: u64,
    total: f64,
    min: f64,
    max: f64,
}

impl LatencyStats {
    pub fn new() -> Self {
        Self {
            count: 0,
            total: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn record(&mut self, latency_secs: f64) {
        self.count += 1;
        self.total += latency_secs;
        self.min = self.min.min(latency_secs);
        self.max = self.max.max(latency_secs);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.total / self.count as f64)
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Message counter over a resettable time window.
#[derive(Debug, Clone)]
pub struct Throughput {
    count: u64,
    window_start: Instant,
}

impl Throughput {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            count: 0,
            window_start: start,
        }
    }

    pub fn record(&mut self) {
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.window_start)
    }

    /// Messages per second since the window started. Zero for an empty window.
    pub fn rate_at(&self, now: Instant) -> f64 {
        let elapsed = self.elapsed_at(now).as_secs_f64();
        if elapsed > 0.0 {
            self.count as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn rate(&self) -> f64 {
        self.rate_at(Instant::now())
    }

    /// Close the window at `now`, returning its rate, and start a new one.
    pub fn roll(&mut self, now: Instant) -> f64 {
        let rate = self.rate_at(now);
        self.count = 0;
        self.window_start = now;
        rate
    }
}

impl Default for Throughput {
    fn default() -> Self {
        Self::new()
    }
}
