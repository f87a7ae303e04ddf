#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Unable to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    #[error("Address {addr} did not resolve to any endpoint")]
    Resolve { addr: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {reason}")]
    Protocol { reason: String },

    #[error("Protocol error: {0}")]
    ParseInt(#[from] std::num::ParseIntError),

    #[error("Server replied with an error: {line}")]
    Server { line: String },

    #[error("Value for {key} was not stored")]
    NotStored { key: String },

    #[error("Invalid key {key:?}")]
    InvalidKey { key: String },

    #[error("No replica registered for {addr}")]
    NotFound { addr: String },

    #[error("Unable to close connection to {addr}: {source}")]
    Close {
        addr: String,
        source: std::io::Error,
    },

    #[error("Connection to {addr} is already closed")]
    Closed { addr: String },

    /// A fan-out write did not reach every target. `failed` holds the address
    /// of each target which reported an error.
    #[error("Replication incomplete, failed on: {}", .failed.join(", "))]
    Replication { failed: Vec<String> },
}

impl CacheError {
    pub(crate) fn protocol<S: Into<String>>(reason: S) -> Self {
        CacheError::Protocol {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CacheError>;
