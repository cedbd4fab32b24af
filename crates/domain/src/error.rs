/// Shared error type used across all chatrelay crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Unknown session id.
    #[error("session not found: {0}")]
    NotFound(String),

    /// The operation requires a paired session.
    #[error("session not authenticated: {0}")]
    NotAuthenticated(String),

    /// Malformed request body or unparseable recipient address.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The protocol engine failed to open or maintain a connection.
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("timeout: {0}")]
    Timeout(String),

    /// Webhook sink unreachable. Logged at the relay boundary, never
    /// surfaced to a caller.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
