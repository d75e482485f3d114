use thiserror::Error;

/// Failures talking to the job-board API.
///
/// Every variant ends up as a `Failure` state in the view that issued the
/// request; none of them are retried automatically.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error! status: {status}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    /// The server understood the request and refused it (bad credentials).
    #[error("{0}")]
    Rejected(String),

    /// The background task running the request panicked or was cancelled.
    #[error("Request task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
