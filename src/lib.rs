//! Library facade - re-export internal modules so integration
//! tests or external code can use `multiping::...`.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod icmp;
pub mod logging;
pub mod probe;
pub mod session;
pub mod stats;
pub mod target;
pub mod transport;
