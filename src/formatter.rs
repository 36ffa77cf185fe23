//! Pluggable output layer.

use crate::{
    cli::OutputMode,
    error::Result,
    stats::{HostResult, millis},
};
use std::io::Write;
use std::time::Duration;

/// Render behaviour contract.
pub trait Formatter {
    /// Write every result, in the given order, including any header.
    fn render(&self, results: &[HostResult], out: &mut dyn Write) -> Result<()>;
}

/* ---------- Human-readable table ---------- */

pub struct Table;

impl Table {
    fn rtt(result: &HostResult, d: Duration) -> String {
        if result.has_rtt() {
            format!("{:.3}ms", millis(d))
        } else {
            "n/a".into()
        }
    }
}

impl Formatter for Table {
    fn render(&self, results: &[HostResult], out: &mut dyn Write) -> Result<()> {
        let w = results
            .iter()
            .map(|r| r.host.len())
            .max()
            .unwrap_or(0)
            .max("Host".len());

        let header = [
            format!("{:<w$}  Packets   Round trip times", ""),
            format!(
                "{:<w$}  Received  {:<12} {:<12} {:<12} {:<12}",
                "Host", "Minimum", "Maximum", "Mean", "Std. Dev."
            ),
        ];
        for line in header {
            writeln!(out, "{}", line.trim_end())?;
        }

        for r in results {
            let line = format!(
                "{:<w$}  {:>3}/{:<3}   {:<12} {:<12} {:<12} {:<12}",
                r.host,
                r.received,
                r.sent,
                Self::rtt(r, r.min),
                Self::rtt(r, r.max),
                Self::rtt(r, r.mean),
                Self::rtt(r, r.stddev),
            );
            writeln!(out, "{}", line.trim_end())?;
        }
        Ok(())
    }
}

/* ---------- CSV ---------- */

pub struct Csv;

impl Formatter for Csv {
    fn render(&self, results: &[HostResult], out: &mut dyn Write) -> Result<()> {
        let mut w = csv::Writer::from_writer(out);
        w.write_record([
            "host",
            "received",
            "sent",
            "min_ms",
            "max_ms",
            "mean_ms",
            "stddev_ms",
        ])?;
        for r in results {
            w.write_record([
                r.host.clone(),
                r.received.to_string(),
                r.sent.to_string(),
                format!("{:.6}", millis(r.min)),
                format!("{:.6}", millis(r.max)),
                format!("{:.6}", millis(r.mean)),
                format!("{:.6}", millis(r.stddev)),
            ])?;
        }
        w.flush()?;
        Ok(())
    }
}

/* ---------- JSON ---------- */

pub struct Json;

impl Formatter for Json {
    fn render(&self, results: &[HostResult], out: &mut dyn Write) -> Result<()> {
        serde_json::to_writer_pretty(&mut *out, results)?;
        writeln!(out)?;
        Ok(())
    }
}

/* ---------- Factory ---------- */

pub fn from_mode(mode: OutputMode) -> Box<dyn Formatter> {
    match mode {
        OutputMode::Table => Box::new(Table),
        OutputMode::Csv => Box::new(Csv),
        OutputMode::Json => Box::new(Json),
    }
}
