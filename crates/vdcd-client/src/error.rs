use thiserror::Error;

/// Errors surfaced by the protocol client
#[derive(Debug, Error)]
pub enum ClientError {
    /// The controller could not be reached within the retry budget.
    /// The client is useless without a connection, callers should exit.
    #[error("failed to connect to vdcd at {address} after {attempts} attempts")]
    DialExhausted { address: String, attempts: u32 },

    #[error("not connected to vdcd")]
    NotConnected,

    #[error("read from vdcd failed: {0}")]
    ReadFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
