use crate::backends::claude::ClaudeBackend;
use crate::backends::openai::OpenAiBackend;
use crate::config::{LlmProvider, ModelConfig};
use crate::service::{InferenceService, StageAgent};
use async_trait::async_trait;
use delver_core::DelverResult;
use std::time::Instant;
use tracing::{info, warn};

/// Inference client that dispatches to the configured provider backend.
///
/// To add a new provider: implement `InferenceService` in `backends/` and
/// wire it here.
pub struct InferenceClient {
    backend: Box<dyn InferenceService>,
}

impl InferenceClient {
    /// Build the backend for `config.provider`, resolving the API key from
    /// the environment when the config leaves it empty.
    pub fn new(mut config: ModelConfig) -> DelverResult<Self> {
        config.resolve_api_key()?;
        let backend: Box<dyn InferenceService> = match config.provider {
            LlmProvider::Claude => Box::new(ClaudeBackend::new(config)?),
            LlmProvider::OpenAi | LlmProvider::OpenRouter | LlmProvider::Groq => {
                Box::new(OpenAiBackend::new(config)?)
            }
        };
        Ok(Self { backend })
    }
}

#[async_trait]
impl InferenceService for InferenceClient {
    async fn invoke(&self, agent: &StageAgent, prompt: &str) -> DelverResult<serde_json::Value> {
        let start = Instant::now();
        let result = self.backend.invoke(agent, prompt).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(agent = %agent.name, elapsed_ms, "Inference call completed"),
            Err(e) => warn!(agent = %agent.name, elapsed_ms, error = %e, "Inference call failed"),
        }
        result
    }
}
