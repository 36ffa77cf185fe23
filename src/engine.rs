//! High-level orchestrator: configure → probe all hosts → output.

use crate::{
    cli::Args,
    config::ProbeConfig,
    coordinator::Coordinator,
    error::Result,
    formatter,
    stats::HostResult,
    transport::SystemNetwork,
};
use std::io::{self, Write};
use tokio::signal;
use tracing::info;

pub fn run(args: Args) -> Result<i32> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_async(args))
}

async fn run_async(args: Args) -> Result<i32> {
    let config = ProbeConfig::try_from(&args)?;
    let coordinator = Coordinator::new(SystemNetwork::new(config.privileged), config);

    /* Ctrl-C finalizes the run early, like the deadline does */
    let sigint = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    let results = coordinator.run_until(&args.hosts, sigint).await;
    info!(hosts = results.len(), "run finished");

    let fmt = formatter::from_mode(args.output());
    let mut stdout = io::stdout().lock();
    fmt.render(&results, &mut stdout)?;
    stdout.flush()?;

    Ok(exit_code(&results))
}

/// 0 when every host answered at least once, 1 otherwise.
pub fn exit_code(results: &[HostResult]) -> i32 {
    if !results.is_empty() && results.iter().all(HostResult::has_rtt) {
        0
    } else {
        1
    }
}
