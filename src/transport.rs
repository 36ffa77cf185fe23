//! Echo transports.
//!
//! A [`Network`] turns host names into [`Target`]s and opens one
//! [`Transport`] per target. [`SystemNetwork`] does this with real ICMP
//! sockets; the raw/unprivileged choice is made by the caller.

use crate::{
    error::{PingError, Result},
    icmp,
    probe::{ProbeReply, ProbeRequest},
    target::{self, Target},
};
use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::{
    io,
    net::{IpAddr, SocketAddr},
};
use tokio::{net::UdpSocket, time::Instant};
use tracing::trace;

/// Largest datagram we expect back (IP header plus our echo).
const RECV_BUF_LEN: usize = 512;

/// Sends echo requests and yields decoded echo replies.
///
/// Both methods take `&self` so a session can wait for replies while it
/// sends on the same handle. `recv` must be cancel-safe.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ProbeRequest) -> io::Result<()>;

    /// Wait for the next echo reply that carries one of our payloads.
    async fn recv(&self) -> io::Result<ProbeReply>;
}

/// Source of targets and transports for a run.
#[async_trait]
pub trait Network: Send + Sync + 'static {
    async fn resolve(&self, host: &str) -> Result<Target>;

    async fn open(&self, target: &Target) -> Result<Box<dyn Transport>>;
}

/// Real sockets and the system resolver.
#[derive(Debug, Clone, Copy)]
pub struct SystemNetwork {
    privileged: bool,
}

impl SystemNetwork {
    pub fn new(privileged: bool) -> Self {
        Self { privileged }
    }
}

#[async_trait]
impl Network for SystemNetwork {
    async fn resolve(&self, host: &str) -> Result<Target> {
        target::resolve(host).await
    }

    async fn open(&self, target: &Target) -> Result<Box<dyn Transport>> {
        let transport = IcmpTransport::open(target.addr, self.privileged)?;
        Ok(Box::new(transport))
    }
}

/// ICMP echo over a raw (privileged) or datagram (unprivileged) socket.
#[derive(Debug)]
pub struct IcmpTransport {
    socket: UdpSocket,
    v6: bool,
    raw: bool,
    ident: u16,
}

impl IcmpTransport {
    /// Open a socket for the address family of `dest`.
    pub fn open(dest: IpAddr, privileged: bool) -> Result<Self> {
        let v6 = dest.is_ipv6();
        let (domain, protocol) = if v6 {
            (Domain::IPV6, Protocol::ICMPV6)
        } else {
            (Domain::IPV4, Protocol::ICMPV4)
        };
        let (ty, kind) = if privileged {
            (Type::RAW, "raw ICMP")
        } else {
            (Type::DGRAM, "datagram ICMP")
        };

        let unavailable = |source| PingError::TransportUnavailable { kind, source };
        let socket = Socket::new(domain, ty, Some(protocol)).map_err(unavailable)?;
        socket.set_nonblocking(true).map_err(unavailable)?;
        let socket = UdpSocket::from_std(socket.into()).map_err(unavailable)?;

        Ok(Self {
            socket,
            v6,
            raw: privileged,
            ident: rand::random(),
        })
    }
}

#[async_trait]
impl Transport for IcmpTransport {
    async fn send(&self, request: &ProbeRequest) -> io::Result<()> {
        let packet = icmp::encode_request(self.v6, self.ident, request.seq, request.token);
        self.socket
            .send_to(&packet, SocketAddr::new(request.dest, 0))
            .await?;
        Ok(())
    }

    async fn recv(&self) -> io::Result<ProbeReply> {
        let mut buf = [0u8; RECV_BUF_LEN];
        loop {
            let (len, from) = self.socket.recv_from(&mut buf).await?;
            let received_at = Instant::now();
            // Raw IPv6 sockets never include the IP header.
            let ip_header = self.raw && !self.v6;
            match icmp::decode_reply(&buf[..len], self.v6, ip_header) {
                Some(echo) => {
                    return Ok(ProbeReply {
                        seq: echo.seq,
                        token: echo.token,
                        from: from.ip(),
                        received_at,
                    });
                }
                None => trace!(%from, len, "ignoring non-echo packet"),
            }
        }
    }
}
