//! Common error wrapper.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PingError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tokio join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// The host could not be turned into a network endpoint.
    #[error("cannot resolve: {source}")]
    TargetUnresolvable {
        host: String,
        #[source]
        source: std::io::Error,
    },

    /// The echo socket could not be opened, usually for lack of privileges.
    #[error("cannot open {kind} socket: {source}")]
    TransportUnavailable {
        kind: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PingError {
    /// Hint shown next to a failure so the user knows what to change.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            PingError::TransportUnavailable { source, .. }
                if source.kind() == std::io::ErrorKind::PermissionDenied =>
            {
                Some(
                    "raw ICMP needs CAP_NET_RAW (or root); unprivileged mode needs \
                     net.ipv4.ping_group_range to include your group",
                )
            }
            _ => None,
        }
    }
}

/// Handy alias.
pub type Result<T> = std::result::Result<T, PingError>;
