use thiserror::Error;

/// Failure of a single call to an external collaborator (feed, summarizer,
/// translator, messaging, price history). Always recoverable: callers log it and
/// move on to the next fallback or the next item.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status code.
    #[error("unexpected response status {status}: {body}")]
    Status { status: u16, body: String },

    /// The service answered, but not in the shape we expect.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The capability is not configured (e.g. missing API token).
    #[error("{0} is not configured")]
    Disabled(&'static str),
}

impl ServiceError {
    /// Timeouts, connection failures and 5xx statuses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Timeout => true,
            ServiceError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().map_or(false, |s| s.is_server_error())
            }
            ServiceError::Status { status, .. } => (500..600).contains(status),
            ServiceError::Malformed(_) | ServiceError::Disabled(_) => false,
        }
    }

    /// Builds a `Status` error, keeping only the head of the body for logs.
    pub fn status(status: reqwest::StatusCode, body: &str) -> Self {
        ServiceError::Status {
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        }
    }
}

impl From<tokio::time::error::Elapsed> for ServiceError {
    fn from(_: tokio::time::error::Elapsed) -> Self {
        ServiceError::Timeout
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Malformed(e.to_string())
    }
}

/// Startup configuration problems. Fatal before any task runs.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("dedup window ({window} min) must be wider than the poll interval ({poll} min)")]
    WindowTooNarrow { window: i64, poll: u64 },
}
