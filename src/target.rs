//! Probe targets and host name resolution.

use crate::error::{PingError, Result};
use std::fmt;
use std::io;
use std::net::IpAddr;

/// A host as given on the command line plus the address probes go to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub addr: IpAddr,
}

impl Target {
    pub fn new(host: impl Into<String>, addr: IpAddr) -> Self {
        Self {
            host: host.into(),
            addr,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host == self.addr.to_string() {
            write!(f, "{}", self.host)
        } else {
            write!(f, "{} ({})", self.host, self.addr)
        }
    }
}

/// Turn `host` into a [`Target`], taking the first address the system
/// resolver returns. Literal addresses skip the lookup.
pub async fn resolve(host: &str) -> Result<Target> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(Target::new(host, ip));
    }

    let unresolvable = |source| PingError::TargetUnresolvable {
        host: host.to_string(),
        source,
    };

    let mut addrs = tokio::net::lookup_host((host, 0))
        .await
        .map_err(unresolvable)?;
    addrs
        .next()
        .map(|addr| Target::new(host, addr.ip()))
        .ok_or_else(|| unresolvable(io::Error::new(io::ErrorKind::NotFound, "no addresses found")))
}
