//! Error types for reconciliation runs.
//!
//! Every error is fatal for the current resource: the run aborts, nothing is
//! retried, and remote mutations already applied stay applied.

use thiserror::Error;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced while reconciling a resource.
#[derive(Debug, Error)]
pub enum Error {
    /// A precondition on the desired configuration failed - a referenced
    /// parent resource does not exist, a required field is missing, or a
    /// value is outside its allowed range.
    #[error("{0}")]
    Config(String),

    /// The remote API rejected an operation (validation failure, conflict).
    #[error("remote API rejected request: {0}")]
    Remote(String),

    /// The remote API failed unexpectedly - connectivity, malformed
    /// response, unexpected status.
    #[error("unexpected client error: {0}")]
    Transport(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a remote-rejection error from the API's reason list.
    pub fn remote(reasons: impl IntoIterator<Item = String>) -> Self {
        Self::Remote(reasons.into_iter().collect::<Vec<_>>().join(", "))
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Transport(format!("invalid API payload: {err}"))
    }
}
