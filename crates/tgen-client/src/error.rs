use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The channel to the controller went away without an HTTP-level error,
    /// e.g. a non-HTTP controller implementation lost its session.
    #[error("controller connection lost: {0}")]
    Disconnected(String),
    #[error("controller rejected request (HTTP {status}): {}", .errors.join("; "))]
    Api {
        status: u16,
        kind: Option<String>,
        errors: Vec<String>,
    },
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid controller location {0:?}")]
    Location(String),
}
