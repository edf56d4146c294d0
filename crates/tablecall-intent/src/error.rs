use thiserror::Error;

/// Failure talking to the completion vendor.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),
    #[error("rate limited")]
    RateLimited,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Failure turning a transcript into an [`Intent`](crate::Intent).
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The completion could not be read as one of the known intents.
    #[error("intent unrecognized: {0}")]
    Unrecognized(String),
    #[error(transparent)]
    Completion(#[from] LlmError),
}
