//! Runtime statistics and data structures.
//!
//! [StatsAggregator] folds the [Sample]s of one session and emits the final
//! [HostResult]. [HostResult] is serde-serialisable so the formatting layer
//! can dump it directly.

use crate::{
    error::{PingError, Result},
    probe::Sample,
    target::Target,
};
use serde::{Serialize, Serializer};
use std::net::IpAddr;
use std::time::Duration;

/// How a host's session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Every request resolved by reply or per-packet timeout.
    Completed,
    /// The run deadline (or a cancellation) cut the session short.
    Interrupted,
    /// The host name did not resolve; no request was sent.
    Unresolvable,
    /// The echo socket could not be opened; no request was sent.
    TransportUnavailable,
}

/// Roll-up of an entire probing session.
///
/// RTT fields are zero when `received == 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostResult {
    pub host: String,
    pub addr: Option<IpAddr>,
    pub received: u32,
    pub sent: u32,
    #[serde(rename = "min_ms", serialize_with = "as_millis")]
    pub min: Duration,
    #[serde(rename = "max_ms", serialize_with = "as_millis")]
    pub max: Duration,
    #[serde(rename = "mean_ms", serialize_with = "as_millis")]
    pub mean: Duration,
    #[serde(rename = "stddev_ms", serialize_with = "as_millis")]
    pub stddev: Duration,
    pub status: SessionStatus,
}

fn as_millis<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_f64(millis(*d))
}

/// Duration in fractional milliseconds.
pub fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1_000.0
}

impl HostResult {
    /// All-zero result for a host whose session never started.
    pub fn failed(host: impl Into<String>, status: SessionStatus) -> Self {
        Self {
            host: host.into(),
            addr: None,
            received: 0,
            sent: 0,
            min: Duration::ZERO,
            max: Duration::ZERO,
            mean: Duration::ZERO,
            stddev: Duration::ZERO,
            status,
        }
    }

    pub fn lost(&self) -> u32 {
        self.sent - self.received
    }

    /// Whether the RTT fields carry measurements rather than the sentinel.
    pub fn has_rtt(&self) -> bool {
        self.received > 0
    }
}

/// Mutable accumulator used during a session.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    host: String,
    addr: IpAddr,
    sent: u32,
    received: u32,
    lost: u32,
    min_ns: f64,
    max_ns: f64,
    sum_ns: f64,
    sum_sq_ns: f64,
    status: SessionStatus,
}

impl StatsAggregator {
    /// Create a new accumulator.
    pub fn new(target: &Target) -> Self {
        Self {
            host: target.host.clone(),
            addr: target.addr,
            sent: 0,
            received: 0,
            lost: 0,
            min_ns: f64::MAX,
            max_ns: 0.0,
            sum_ns: 0.0,
            sum_sq_ns: 0.0,
            status: SessionStatus::Completed,
        }
    }

    /// Count one issued request.
    pub fn record_sent(&mut self) {
        self.sent += 1;
    }

    /// Fold the resolution of one request.
    pub fn record(&mut self, sample: Sample) {
        match sample {
            Sample::Success(rtt) => {
                let ns = rtt.as_nanos() as f64;
                self.received += 1;
                self.min_ns = self.min_ns.min(ns);
                self.max_ns = self.max_ns.max(ns);
                self.sum_ns += ns;
                self.sum_sq_ns += ns * ns;
            }
            Sample::Loss => self.lost += 1,
        }
    }

    /// Requests issued but not yet resolved.
    pub fn outstanding(&self) -> u32 {
        self.sent - self.received - self.lost
    }

    pub fn is_complete(&self) -> bool {
        self.outstanding() == 0
    }

    /// Resolve every outstanding request as lost and flag the session as
    /// cut short.
    pub fn interrupt(&mut self) {
        self.lost += self.outstanding();
        self.status = SessionStatus::Interrupted;
    }

    /// Advisory view of the samples folded so far.
    pub fn snapshot(&self) -> HostResult {
        let (min, max, mean, stddev) = if self.received > 0 {
            let n = f64::from(self.received);
            let mean = self.sum_ns / n;
            // Population variance; rounding can push it slightly below zero.
            let variance = (self.sum_sq_ns / n - mean * mean).max(0.0);
            (
                from_nanos(self.min_ns),
                from_nanos(self.max_ns),
                from_nanos(mean),
                from_nanos(variance.sqrt()),
            )
        } else {
            Default::default()
        };

        HostResult {
            host: self.host.clone(),
            addr: Some(self.addr),
            received: self.received,
            sent: self.sent,
            min,
            max,
            mean,
            stddev,
            status: self.status,
        }
    }

    /// Produce the final [HostResult]; fails while requests are outstanding.
    pub fn finalize(&self) -> Result<HostResult> {
        if !self.is_complete() {
            return Err(PingError::Other(anyhow::anyhow!(
                "{}: {} of {} requests still outstanding",
                self.host,
                self.outstanding(),
                self.sent
            )));
        }
        Ok(self.snapshot())
    }
}

fn from_nanos(ns: f64) -> Duration {
    Duration::from_nanos(ns.round() as u64)
}
