//! Argument parsing layer (clap).

use clap::{Parser, ValueEnum};

/// Global CLI arguments.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Args {
    /// Hosts to probe (names or addresses), reported in this order
    #[arg(required = true)]
    pub hosts: Vec<String>,

    /// Echo requests per host (`-c`)
    #[arg(short, long, default_value_t = 30, value_parser = clap::value_parser!(u16).range(1..))]
    pub count: u16,

    /// Use raw ICMP sockets (`-i`, requires privileges)
    #[arg(short, long)]
    pub icmp: bool,

    /// Output format (`-o`)
    #[arg(
        short = 'o',
        long,
        value_enum,
        default_value_t = OutputMode::Table,
        help = "table | csv | json"
    )]
    pub output_mode: OutputMode,

    /// Shorthand for `-o csv`
    #[arg(long = "output-csv", visible_alias = "csv")]
    pub output_csv: bool,

    /// Delay between two requests to the same host (ms)
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: u64,

    /// Time to wait for each reply (ms)
    #[arg(long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_ms: u64,

    /// Log filter used when `RUST_LOG` is unset
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Args {
    /// Output mode after applying the `--csv` shorthand.
    pub fn output(&self) -> OutputMode {
        if self.output_csv {
            OutputMode::Csv
        } else {
            self.output_mode
        }
    }
}

/// Supported output modes.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Csv,
    Json,
}
