//! Run configuration handed to the engine.
//!
//! [`ProbeConfig`] is built once from the command line (or directly by
//! library callers) and passed by value into the coordinator; nothing in
//! the engine reads process-wide state.

use crate::{
    cli::Args,
    error::{PingError, Result},
};
use std::time::Duration;

/// Default number of echo requests per host.
pub const DEFAULT_COUNT: u16 = 30;

/// Default delay between two requests to the same host.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Default time to wait for a single reply.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Extra time granted on top of the last request's timeout window.
pub const GLOBAL_SLACK: Duration = Duration::from_secs(1);

/// Probing parameters shared by every session of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub count: u16,
    pub interval: Duration,
    pub per_packet_timeout: Duration,
    /// Raw ICMP sockets instead of unprivileged datagram ICMP.
    pub privileged: bool,
    global_timeout: Option<Duration>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            interval: DEFAULT_INTERVAL,
            per_packet_timeout: DEFAULT_TIMEOUT,
            privileged: false,
            global_timeout: None,
        }
    }
}

impl ProbeConfig {
    pub fn new(count: u16) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_packet_timeout = timeout;
        self
    }

    pub fn with_privileged(mut self, privileged: bool) -> Self {
        self.privileged = privileged;
        self
    }

    /// Replace the derived run deadline.
    pub fn with_global_timeout(mut self, timeout: Duration) -> Self {
        self.global_timeout = Some(timeout);
        self
    }

    /// Wall-clock bound for the whole run.
    ///
    /// The last request leaves `interval * (count - 1)` after the first one
    /// and may take `per_packet_timeout` to resolve, so a well-behaved
    /// session always finishes inside this window.
    pub fn global_timeout(&self) -> Duration {
        self.global_timeout.unwrap_or_else(|| {
            let sends = self.interval * u32::from(self.count.saturating_sub(1));
            sends + self.per_packet_timeout + GLOBAL_SLACK
        })
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(PingError::Config("count must be >= 1".into()));
        }
        if self.interval.is_zero() {
            return Err(PingError::Config("interval must be > 0".into()));
        }
        if self.per_packet_timeout.is_zero() {
            return Err(PingError::Config("timeout must be > 0".into()));
        }
        Ok(())
    }
}

impl TryFrom<&Args> for ProbeConfig {
    type Error = PingError;

    fn try_from(args: &Args) -> Result<Self> {
        let config = ProbeConfig::new(args.count)
            .with_interval(Duration::from_millis(args.interval_ms))
            .with_timeout(Duration::from_millis(args.timeout_ms))
            .with_privileged(args.icmp);
        config.validate()?;
        Ok(config)
    }
}
