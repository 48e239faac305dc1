use delver_core::{DelverError, DelverResult};
use serde::{Deserialize, Serialize};

/// LLM provider that backs the inference service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic messages API.
    Claude,
    /// OpenAI chat completions API.
    OpenAi,
    /// OpenRouter, OpenAI-compatible.
    OpenRouter,
    /// Groq cloud inference, OpenAI-compatible.
    Groq,
}

impl LlmProvider {
    /// Environment variable consulted when no API key is configured.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            LlmProvider::Claude => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::Groq => "GROQ_API_KEY",
        }
    }
}

/// Model and transport settings shared by every pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Which API to call.
    pub provider: LlmProvider,
    /// Model for every non-search stage.
    pub model_id: String,
    /// API key. Empty means read the provider's env var.
    #[serde(default)]
    pub api_key: String,
    /// Override the provider's base URL.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Model used by stages that search the web. When unset, see
    /// [`ModelConfig::search_model`].
    #[serde(default)]
    pub search_model_id: Option<String>,
    /// Sampling temperature, when the model accepts one.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Output token cap per call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Search model used with OpenAI when `search_model_id` is unset.
pub const DEFAULT_OPENAI_SEARCH_MODEL: &str = "gpt-4o-mini-search-preview";

fn default_max_tokens() -> u32 {
    4096
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            model_id: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            api_base_url: None,
            search_model_id: None,
            temperature: None,
            max_tokens: default_max_tokens(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ModelConfig {
    /// API base URL, without the `/v1/...` path.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.provider {
                LlmProvider::Claude => "https://api.anthropic.com",
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
            }
        }
    }

    /// The dedicated web-search model: `search_model_id` when set, else the
    /// provider's default. Only OpenAI has one.
    pub fn search_model(&self) -> Option<&str> {
        match self.search_model_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Some(id),
            _ => match self.provider {
                LlmProvider::OpenAi => Some(DEFAULT_OPENAI_SEARCH_MODEL),
                _ => None,
            },
        }
    }

    /// The model to call for a stage, honouring [`ModelConfig::search_model`]
    /// for web-search stages.
    pub fn model_for(&self, web_search: bool) -> &str {
        match (self.search_model(), web_search) {
            (Some(search_model), true) => search_model,
            _ => &self.model_id,
        }
    }

    /// Fill an empty `api_key` from the provider's environment variable.
    ///
    /// Returns a `Config` error when neither source provides a key.
    pub fn resolve_api_key(&mut self) -> DelverResult<()> {
        if !self.api_key.trim().is_empty() {
            return Ok(());
        }
        let var = self.provider.api_key_env();
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => {
                self.api_key = key;
                Ok(())
            }
            _ => Err(DelverError::Config(format!(
                "no API key configured: set model.api_key or {var}"
            ))),
        }
    }
}
