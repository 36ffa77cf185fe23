//! Probing of a single target.
//!
//! A [`ProbeSession`] runs as one task that owns its outstanding-request
//! table. Sending on the fixed cadence, receiving replies and expiring
//! timed-out requests are multiplexed with `select!` inside that task, so
//! every insert and removal on the table happens in one place and in a
//! well-defined order.

use crate::{
    config::ProbeConfig,
    probe::{ProbeReply, ProbeRequest, Sample},
    stats::{HostResult, StatsAggregator},
    target::Target,
    transport::Transport,
};
use std::collections::HashMap;
use tokio::{
    sync::watch,
    time::{self, Duration, Instant, MissedTickBehavior},
};
use tracing::{debug, trace, warn};

/// Consecutive receive errors after which the socket is considered broken.
const MAX_RECV_ERRORS: u32 = 5;

/// Requests awaiting a reply, keyed by `(token, sequence)`.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: HashMap<(u64, u16), ProbeRequest>,
}

impl PendingTable {
    pub fn insert(&mut self, request: ProbeRequest) {
        self.entries.insert((request.token, request.seq), request);
    }

    /// Remove and return the request `reply` answers, if it is still pending.
    pub fn take_match(&mut self, reply: &ProbeReply) -> Option<ProbeRequest> {
        let key = (reply.token, reply.seq);
        match self.entries.get(&key) {
            Some(request) if request.dest == reply.from => self.entries.remove(&key),
            _ => None,
        }
    }

    /// Remove every request sent at or before `cutoff`.
    pub fn take_expired(&mut self, cutoff: Instant) -> Vec<ProbeRequest> {
        let expired: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, r)| r.sent_at <= cutoff)
            .map(|(k, _)| *k)
            .collect();
        expired
            .into_iter()
            .filter_map(|k| self.entries.remove(&k))
            .collect()
    }

    /// Send time of the oldest pending request.
    pub fn oldest(&self) -> Option<Instant> {
        self.entries.values().map(|r| r.sent_at).min()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Drives one target through `count` echo/reply cycles.
pub struct ProbeSession {
    target: Target,
    token: u64,
    count: u16,
    interval: Duration,
    timeout: Duration,
    transport: Box<dyn Transport>,
    pending: PendingTable,
    stats: StatsAggregator,
    next_seq: u32,
    recv_errors: u32,
}

impl ProbeSession {
    pub fn new(
        target: Target,
        token: u64,
        config: &ProbeConfig,
        transport: Box<dyn Transport>,
    ) -> Self {
        let stats = StatsAggregator::new(&target);
        Self {
            target,
            token,
            count: config.count,
            interval: config.interval,
            timeout: config.per_packet_timeout,
            transport,
            pending: PendingTable::default(),
            stats,
            next_seq: 0,
            recv_errors: 0,
        }
    }

    /// Probe until every request has resolved or `cancel` flips to `true`.
    ///
    /// On cancellation the requests still pending are counted as lost. The
    /// transport is dropped when this returns.
    pub async fn run(mut self, mut cancel: watch::Receiver<bool>) -> HostResult {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(host = %self.target, token = self.token, count = self.count, "session started");

        while !self.done() {
            if *cancel.borrow_and_update() {
                break;
            }
            let expiry = self.pending.oldest().map(|sent| sent + self.timeout);

            tokio::select! {
                changed = cancel.changed() => {
                    // A dropped sender can never cancel us again.
                    if changed.is_err() {
                        warn!(host = %self.target, "cancellation channel closed");
                        break;
                    }
                }
                reply = self.transport.recv() => match reply {
                    Ok(reply) => {
                        self.recv_errors = 0;
                        self.on_reply(reply);
                    }
                    Err(e) => {
                        self.recv_errors += 1;
                        debug!(host = %self.target, error = %e, "receive failed");
                        if self.recv_errors >= MAX_RECV_ERRORS {
                            warn!(host = %self.target, error = %e, "socket keeps failing, ending session");
                            break;
                        }
                    }
                },
                _ = ticker.tick(), if self.next_seq < u32::from(self.count) => {
                    self.send_next().await;
                }
                _ = time::sleep_until(expiry.unwrap_or_else(Instant::now)), if expiry.is_some() => {
                    self.expire(Instant::now());
                }
            }
        }

        self.finish()
    }

    fn done(&self) -> bool {
        self.next_seq == u32::from(self.count) && self.pending.is_empty()
    }

    async fn send_next(&mut self) {
        let request = ProbeRequest {
            seq: self.next_seq as u16,
            token: self.token,
            dest: self.target.addr,
            sent_at: Instant::now(),
        };
        self.next_seq += 1;
        self.stats.record_sent();

        match self.transport.send(&request).await {
            Ok(()) => {
                trace!(host = %self.target, seq = request.seq, "echo request sent");
                self.pending.insert(request);
            }
            Err(e) => {
                warn!(host = %self.target, seq = request.seq, error = %e, "send failed");
                self.stats.record(Sample::Loss);
            }
        }
    }

    /// Resolve the request `reply` answers. Late, duplicate and foreign
    /// replies match nothing and are dropped.
    pub fn on_reply(&mut self, reply: ProbeReply) {
        match self.pending.take_match(&reply) {
            Some(request) => {
                let sample = Sample::from_reply(&request, &reply);
                debug!(host = %self.target, seq = reply.seq, rtt = ?sample.rtt(), "echo reply");
                self.stats.record(sample);
            }
            None => trace!(
                host = %self.target,
                seq = reply.seq,
                token = reply.token,
                from = %reply.from,
                "unmatched reply dropped"
            ),
        }
    }

    fn expire(&mut self, now: Instant) {
        let cutoff = now.checked_sub(self.timeout).unwrap_or(now);
        for request in self.pending.take_expired(cutoff) {
            debug!(host = %self.target, seq = request.seq, "echo request timed out");
            self.stats.record(Sample::Loss);
        }
    }

    fn finish(mut self) -> HostResult {
        if !self.done() {
            warn!(
                host = %self.target,
                sent = self.next_seq,
                pending = self.pending.len(),
                "session interrupted"
            );
            self.stats.interrupt();
        }
        match self.stats.finalize() {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "reporting partial statistics");
                self.stats.snapshot()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::SessionStatus;
    use async_trait::async_trait;
    use std::io;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    const ADDR: IpAddr = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1));

    /// Answers request `seq` after `rtts[seq]`, or never when that is `None`.
    struct Scripted {
        rtts: Vec<Option<Duration>>,
        tx: mpsc::UnboundedSender<ProbeReply>,
        rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<ProbeReply>>,
        sent: Arc<Mutex<Vec<u16>>>,
    }

    impl Scripted {
        fn new(rtts: Vec<Option<Duration>>) -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                rtts,
                tx,
                rx: tokio::sync::Mutex::new(rx),
                sent: Arc::default(),
            }
        }
    }

    #[async_trait]
    impl Transport for Scripted {
        async fn send(&self, request: &ProbeRequest) -> io::Result<()> {
            self.sent.lock().unwrap().push(request.seq);
            if let Some(Some(rtt)) = self.rtts.get(usize::from(request.seq)) {
                let (tx, rtt, request) = (self.tx.clone(), *rtt, *request);
                tokio::spawn(async move {
                    time::sleep(rtt).await;
                    let _ = tx.send(ProbeReply {
                        seq: request.seq,
                        token: request.token,
                        from: request.dest,
                        received_at: Instant::now(),
                    });
                });
            }
            Ok(())
        }

        async fn recv(&self) -> io::Result<ProbeReply> {
            let mut rx = self.rx.lock().await;
            rx.recv()
                .await
                .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn config(count: u16) -> ProbeConfig {
        ProbeConfig::new(count)
            .with_interval(Duration::from_millis(100))
            .with_timeout(Duration::from_millis(250))
    }

    fn session(count: u16, transport: Scripted) -> ProbeSession {
        ProbeSession::new(Target::new("a", ADDR), 7, &config(count), Box::new(transport))
    }

    fn ms(v: u64) -> Option<Duration> {
        Some(Duration::from_millis(v))
    }

    #[tokio::test(start_paused = true)]
    async fn every_request_resolves_exactly_once() {
        let transport = Scripted::new(vec![ms(10), None, ms(30), None, ms(400)]);
        let sent = Arc::clone(&transport.sent);
        let (_tx, rx) = watch::channel(false);

        let result = session(5, transport).run(rx).await;

        assert_eq!(*sent.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        // The 400 ms reply arrives after its 250 ms timeout and is lost.
        assert_eq!((result.sent, result.received, result.lost()), (5, 2, 3));
        assert_eq!(result.min, Duration::from_millis(10));
        assert_eq!(result.max, Duration::from_millis(30));
        assert_eq!(result.status, SessionStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_replies_do_not_delay_the_cadence() {
        let transport = Scripted::new(vec![ms(200), ms(200), ms(200)]);
        let (_tx, rx) = watch::channel(false);
        let start = Instant::now();

        let result = session(3, transport).run(rx).await;

        assert_eq!(result.received, 3);
        // Last send at 200 ms, its reply at 400 ms.
        assert_eq!(start.elapsed(), Duration::from_millis(400));
    }

    #[test]
    fn unknown_and_duplicate_replies_are_ignored() {
        let mut s = session(2, Scripted::new(vec![]));
        let now = Instant::now();
        s.stats.record_sent();
        s.pending.insert(ProbeRequest {
            seq: 0,
            token: 7,
            dest: ADDR,
            sent_at: now,
        });
        let reply = |seq, token, from| ProbeReply {
            seq,
            token,
            from,
            received_at: now + Duration::from_millis(3),
        };

        s.on_reply(reply(5, 7, ADDR));
        s.on_reply(reply(0, 8, ADDR));
        s.on_reply(reply(0, 7, IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert_eq!(s.pending.len(), 1);

        s.on_reply(reply(0, 7, ADDR));
        s.on_reply(reply(0, 7, ADDR));
        let r = s.stats.finalize().unwrap();
        assert_eq!((r.sent, r.received), (1, 1));
        assert_eq!(r.mean, Duration::from_millis(3));
    }

    /// Accepts every request but fails every receive.
    struct BrokenSocket;

    #[async_trait]
    impl Transport for BrokenSocket {
        async fn send(&self, _request: &ProbeRequest) -> io::Result<()> {
            Ok(())
        }

        async fn recv(&self) -> io::Result<ProbeReply> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failing_socket_ends_the_session() {
        let s = ProbeSession::new(Target::new("a", ADDR), 7, &config(30), Box::new(BrokenSocket));
        let (_tx, rx) = watch::channel(false);
        let start = Instant::now();

        let result = s.run(rx).await;

        // Ends without waiting for the cadence, the timeouts or a cancel.
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(result.status, SessionStatus::Interrupted);
        assert_eq!(result.received, 0);
        assert_eq!(result.received + result.lost(), result.sent);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_counts_pending_as_lost() {
        let transport = Scripted::new(vec![ms(10), None, None, None]);
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(150)).await;
            let _ = tx.send(true);
        });

        let result = session(4, transport).run(rx).await;

        // Two requests left by the time of cancellation, one still pending.
        assert_eq!((result.sent, result.received, result.lost()), (2, 1, 1));
        assert_eq!(result.status, SessionStatus::Interrupted);
    }

    #[test]
    fn expired_requests_leave_the_table() {
        let mut table = PendingTable::default();
        let base = Instant::now();
        for seq in 0..3u16 {
            table.insert(ProbeRequest {
                seq,
                token: 1,
                dest: ADDR,
                sent_at: base + Duration::from_millis(u64::from(seq) * 100),
            });
        }
        assert_eq!(table.oldest(), Some(base));

        let mut expired: Vec<_> = table
            .take_expired(base + Duration::from_millis(100))
            .into_iter()
            .map(|r| r.seq)
            .collect();
        expired.sort_unstable();
        assert_eq!(expired, vec![0, 1]);
        assert_eq!(table.len(), 1);
    }
}
