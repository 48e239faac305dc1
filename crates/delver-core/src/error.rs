use thiserror::Error;

/// A convenience `Result` alias using [`DelverError`].
pub type DelverResult<T> = Result<T, DelverError>;

/// Top-level error type for Delver.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Error, Debug)]
pub enum DelverError {
    /// The inference service failed: transport, timeout, HTTP status or an
    /// output that does not match the expected shape.
    #[error("Inference error: {0}")]
    Inference(String),

    /// An error from an outbound HTTP request that never reached the service.
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error related to conversation state.
    #[error("Session error: {0}")]
    Session(String),

    /// An error raised by the research pipeline itself.
    #[error("Orchestrator error: {0}")]
    Orchestrator(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DelverError {
    /// Whether this error came from the inference service boundary.
    pub fn is_service_error(&self) -> bool {
        matches!(self, DelverError::Inference(_) | DelverError::Http(_))
    }
}
