use thiserror::Error;

/// Failure reported by a collaborator adapter.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    Decode(String),

    #[error("exec failed: {0}")]
    Exec(String),

    #[error("cancelled")]
    Cancelled,
}
