//! Concurrent fan-out of probe sessions under one run deadline.

use crate::{
    config::ProbeConfig,
    error::PingError,
    session::ProbeSession,
    stats::{HostResult, SessionStatus},
    transport::Network,
};
use std::{future::Future, sync::Arc};
use tokio::{sync::watch, task::JoinSet, time};
use tracing::{info, warn};

/// Runs one [`ProbeSession`] per host and returns the results in input
/// order.
pub struct Coordinator<N> {
    network: Arc<N>,
    config: ProbeConfig,
    token_base: u64,
}

impl<N: Network> Coordinator<N> {
    pub fn new(network: N, config: ProbeConfig) -> Self {
        Self {
            network: Arc::new(network),
            config,
            token_base: rand::random(),
        }
    }

    /// Fix the first tracking token instead of drawing a random one.
    pub fn with_token_base(mut self, base: u64) -> Self {
        self.token_base = base;
        self
    }

    /// Probe every host until all sessions complete or the run deadline
    /// passes.
    pub async fn run(&self, hosts: &[String]) -> Vec<HostResult> {
        self.run_until(hosts, std::future::pending()).await
    }

    /// Like [`run`](Self::run), but `shutdown` completing also cancels the
    /// sessions still in flight.
    ///
    /// Cancelled sessions report what they resolved so far. Every session
    /// task has finished, and released its socket, when this returns.
    pub async fn run_until<F>(&self, hosts: &[String], shutdown: F) -> Vec<HostResult>
    where
        F: Future<Output = ()>,
    {
        let deadline = self.config.global_timeout();
        info!(hosts = hosts.len(), count = self.config.count, ?deadline, "probing");

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();
        for (idx, host) in hosts.iter().enumerate() {
            let network = Arc::clone(&self.network);
            let config = self.config.clone();
            let cancel = cancel_rx.clone();
            let host = host.clone();
            // Distinct per index, so concurrent sessions never share a token.
            let token = self.token_base.wrapping_add(idx as u64);
            tasks.spawn(async move {
                let result = probe_host(network.as_ref(), host, token, &config, cancel).await;
                (idx, result)
            });
        }

        // Filled by input index; completion order never shows in the output.
        let mut slots: Vec<Option<HostResult>> = vec![None; hosts.len()];
        let timer = time::sleep(deadline);
        tokio::pin!(timer);
        tokio::pin!(shutdown);
        let mut cancelled = false;

        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok((idx, result))) => slots[idx] = Some(result),
                    Some(Err(e)) => warn!(error = %PingError::from(e), "session task failed"),
                    None => break,
                },
                _ = &mut timer, if !cancelled => {
                    warn!(?deadline, pending = tasks.len(), "global timeout exceeded, finalizing sessions");
                    cancel_tx.send_replace(true);
                    cancelled = true;
                }
                _ = &mut shutdown, if !cancelled => {
                    info!(pending = tasks.len(), "shutdown requested, finalizing sessions");
                    cancel_tx.send_replace(true);
                    cancelled = true;
                }
            }
        }

        slots
            .into_iter()
            .zip(hosts)
            .map(|(slot, host)| {
                slot.unwrap_or_else(|| HostResult::failed(host.as_str(), SessionStatus::Interrupted))
            })
            .collect()
    }
}

/// Resolve, open and probe one host. Failures become an all-zero result.
async fn probe_host<N: Network>(
    network: &N,
    host: String,
    token: u64,
    config: &ProbeConfig,
    cancel: watch::Receiver<bool>,
) -> HostResult {
    // Resolution and socket setup are bounded by the run deadline too.
    let opened = tokio::select! {
        opened = async {
            let target = network.resolve(&host).await?;
            let transport = network.open(&target).await?;
            Ok::<_, PingError>((target, transport))
        } => opened,
        _ = cancelled(cancel.clone()) => {
            warn!("{host} error: cancelled before probing started");
            return HostResult::failed(host.as_str(), SessionStatus::Interrupted);
        }
    };
    let (target, transport) = match opened {
        Ok(opened) => opened,
        Err(e) => return failed(host, e),
    };
    ProbeSession::new(target, token, config, transport)
        .run(cancel)
        .await
}

/// Completes once the run is cancelled.
async fn cancelled(mut cancel: watch::Receiver<bool>) {
    if cancel.wait_for(|c| *c).await.is_err() {
        // Sender gone without cancelling: nothing can cancel us any more.
        std::future::pending::<()>().await;
    }
}

fn failed(host: String, error: PingError) -> HostResult {
    match error.hint() {
        Some(hint) => warn!("{host} error: {error} ({hint})"),
        None => warn!("{host} error: {error}"),
    }
    let status = match error {
        PingError::TransportUnavailable { .. } => SessionStatus::TransportUnavailable,
        _ => SessionStatus::Unresolvable,
    };
    HostResult::failed(host, status)
}
