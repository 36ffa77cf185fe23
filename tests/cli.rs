//! Basic flag parsing tests.

use clap::{Parser, error::ErrorKind};
use multiping::cli::{Args, OutputMode};

#[test]
fn parse_basic() {
    let a = Args::parse_from(["multiping", "10.0.0.1", "example.com", "-c", "5"]);
    assert_eq!(a.hosts, vec!["10.0.0.1", "example.com"]);
    assert_eq!(a.count, 5);
    assert!(!a.icmp);
    assert_eq!(a.output(), OutputMode::Table);
}

#[test]
fn defaults() {
    let a = Args::parse_from(["multiping", "localhost"]);
    assert_eq!(a.count, 30);
    assert_eq!(a.interval_ms, 1000);
    assert_eq!(a.log_level, "warn");
}

#[test]
fn icmp_flag() {
    let a = Args::parse_from(["multiping", "-i", "localhost"]);
    assert!(a.icmp);
}

#[test]
fn csv_shorthands() {
    for flag in ["--csv", "--output-csv"] {
        let a = Args::parse_from(["multiping", flag, "localhost"]);
        assert_eq!(a.output(), OutputMode::Csv);
    }
}

#[test]
fn output_mode_json() {
    let a = Args::parse_from(["multiping", "localhost", "-o", "json"]);
    assert_eq!(a.output(), OutputMode::Json);
}

#[test]
fn require_a_host() {
    let err = Args::try_parse_from(["multiping"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
}

#[test]
fn reject_zero_count() {
    let err = Args::try_parse_from(["multiping", "localhost", "-c", "0"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValueValidation);
}

#[test]
fn reject_zero_timeout() {
    let err = Args::try_parse_from(["multiping", "localhost", "--timeout-ms", "0"]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValueValidation);
}
