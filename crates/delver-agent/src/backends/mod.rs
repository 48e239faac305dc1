/// Anthropic messages API.
pub mod claude;
/// OpenAI-compatible chat completions.
pub mod openai;

use crate::config::ModelConfig;
use delver_core::{DelverError, DelverResult};
use std::time::Duration;

/// Build the HTTP client shared by a backend, with the configured
/// per-request timeout.
pub(crate) fn http_client(config: &ModelConfig) -> DelverResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| DelverError::Config(format!("failed to build HTTP client: {e}")))
}

/// Map a transport-level reqwest error into a service error.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> DelverError {
    if err.is_timeout() {
        DelverError::Inference(format!("{provider} request timed out: {err}"))
    } else {
        DelverError::Http(err.to_string())
    }
}
