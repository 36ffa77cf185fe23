//! Per-probe records exchanged between the transport, the session and the
//! statistics layer.
//!
//! All timestamps come from [`tokio::time::Instant`], so a round-trip time
//! is always the difference of two readings of the same monotonic clock.

use std::net::IpAddr;
use tokio::time::{Duration, Instant};

/// One echo request in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeRequest {
    pub seq: u16,
    pub token: u64,
    pub dest: IpAddr,
    pub sent_at: Instant,
}

/// An inbound echo reply as decoded by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReply {
    pub seq: u16,
    pub token: u64,
    pub from: IpAddr,
    pub received_at: Instant,
}

/// Resolution of exactly one [`ProbeRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    Success(Duration),
    Loss,
}

impl Sample {
    /// Resolve `request` with a matching `reply`.
    pub fn from_reply(request: &ProbeRequest, reply: &ProbeReply) -> Self {
        Sample::Success(reply.received_at.saturating_duration_since(request.sent_at))
    }

    pub fn rtt(&self) -> Option<Duration> {
        match self {
            Sample::Success(rtt) => Some(*rtt),
            Sample::Loss => None,
        }
    }
}
