//! Binary entry point for **multiping**.
//!
//! * Parses CLI arguments.
//! * Installs the stderr log subscriber.
//! * Runs the probing engine and prints the per-host summary.

use clap::Parser;
use multiping::{cli::Args, engine, error::Result, logging};
use std::process::ExitCode;

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    logging::init(&args.log_level)?;

    let exit_code = engine::run(args)?;
    Ok(if exit_code == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
