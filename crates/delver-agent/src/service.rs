use crate::schema::SchemaDescriptor;
use async_trait::async_trait;
use delver_core::{DelverError, DelverResult};
use serde::de::DeserializeOwned;
use tracing::debug;

/// The external inference boundary every pipeline stage calls through.
///
/// Implementations send `prompt` to a model primed with the agent's
/// instructions and return a value matching `agent.shape`. Any transport,
/// timeout, status or shape problem is an error; callers decide whether to
/// absorb it.
#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Run one call for `agent` with `prompt`.
    async fn invoke(&self, agent: &StageAgent, prompt: &str) -> DelverResult<serde_json::Value>;
}

/// A named pipeline stage: its instructions, its output shape, and whether
/// it may search the web.
#[derive(Debug, Clone, PartialEq)]
pub struct StageAgent {
    /// Stage name, used in logs and errors.
    pub name: String,
    /// System prompt for the stage.
    pub instructions: String,
    /// Expected output shape.
    pub shape: SchemaDescriptor,
    /// Whether the stage may search the web.
    pub web_search: bool,
}

impl StageAgent {
    /// A stage without web search.
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        shape: SchemaDescriptor,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            shape,
            web_search: false,
        }
    }

    /// Allow the stage to search the web.
    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }

    /// Invoke the service and deserialize its output into `T`.
    pub async fn invoke_typed<T: DeserializeOwned>(
        &self,
        service: &dyn InferenceService,
        prompt: &str,
    ) -> DelverResult<T> {
        debug!(agent = %self.name, prompt_len = prompt.len(), "Invoking stage agent");
        let value = service.invoke(self, prompt).await?;
        serde_json::from_value(value).map_err(|e| {
            DelverError::Inference(format!("{} returned malformed output: {e}", self.name))
        })
    }

    /// Invoke a text-shaped agent and return its string output.
    pub async fn invoke_text(
        &self,
        service: &dyn InferenceService,
        prompt: &str,
    ) -> DelverResult<String> {
        self.invoke_typed::<String>(service, prompt).await
    }
}
