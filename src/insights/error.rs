use std::time::Duration;

use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request for context {context} failed: {message}")]
    Network { context: String, message: String },
    #[error("collaborator answered HTTP {status} for context {context}")]
    Status { context: String, status: u16 },
    #[error("request for context {context} timed out after {timeout:?}")]
    Timeout { context: String, timeout: Duration },
    #[error("could not decode cluster response: {0}")]
    Decode(String),
    #[error("fetch worker for context {context} went away without a result")]
    Disconnected { context: String },
}
