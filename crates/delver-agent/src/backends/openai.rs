use super::{http_client, transport_error};
use crate::config::{LlmProvider, ModelConfig};
use crate::schema::SchemaDescriptor;
use crate::service::{InferenceService, StageAgent};
use async_trait::async_trait;
use delver_core::{DelverError, DelverResult};
use tracing::warn;

/// OpenAI-compatible API backend.
///
/// Works with OpenAI, OpenRouter, Groq, Ollama, and any other provider
/// that implements the OpenAI chat completions API.
pub struct OpenAiBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Build the backend and its HTTP client.
    pub fn new(config: ModelConfig) -> DelverResult<Self> {
        if config.search_model().is_none() {
            warn!(
                provider = ?config.provider,
                "No search_model_id configured, search stages run without web search"
            );
        }
        let http = http_client(&config)?;
        Ok(Self { config, http })
    }

    /// Request body for one chat completion.
    ///
    /// `web_search_options` is only sent to a dedicated search model.
    pub fn build_body(&self, agent: &StageAgent, prompt: &str) -> serde_json::Value {
        let web_search = agent.web_search && self.config.search_model().is_some();
        let mut body = serde_json::json!({
            "model": self.config.model_for(web_search),
            "max_tokens": self.config.max_tokens,
            "messages": [
                {"role": "system", "content": agent.instructions},
                {"role": "user", "content": prompt},
            ],
        });

        if let SchemaDescriptor::Object { name, schema } = &agent.shape {
            body["response_format"] = serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": name,
                    "strict": true,
                    "schema": schema,
                }
            });
        }

        if web_search {
            // Search-preview models reject sampling parameters.
            body["web_search_options"] = serde_json::json!({});
        } else if let Some(temperature) = self.config.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        body
    }

    fn add_provider_headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json");

        // OpenRouter requires extra headers
        if matches!(self.config.provider, LlmProvider::OpenRouter) {
            request
                .header("HTTP-Referer", "https://github.com/fboiero/Delver")
                .header("X-Title", "Delver")
        } else {
            request
        }
    }
}

#[async_trait]
impl InferenceService for OpenAiBackend {
    async fn invoke(&self, agent: &StageAgent, prompt: &str) -> DelverResult<serde_json::Value> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());
        let body = self.build_body(agent, prompt);

        let resp = self
            .add_provider_headers(self.http.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| transport_error("OpenAI", e))?;

        if !status.is_success() {
            return Err(DelverError::Inference(format!(
                "OpenAI API error {status}: {resp_body}"
            )));
        }

        let value = parse_openai_response(&resp_body, &agent.shape)?;
        agent.shape.validate(&value)?;
        Ok(value)
    }
}

/// Extract the stage output from a chat completion. Refusals and
/// non-JSON object content are errors.
pub fn parse_openai_response(
    body: &serde_json::Value,
    shape: &SchemaDescriptor,
) -> DelverResult<serde_json::Value> {
    let message = &body["choices"][0]["message"];

    if let Some(refusal) = message["refusal"].as_str() {
        return Err(DelverError::Inference(format!("model refused: {refusal}")));
    }

    let content = message["content"].as_str().ok_or_else(|| {
        DelverError::Inference("OpenAI response had no message content".to_string())
    })?;

    match shape {
        SchemaDescriptor::Text => Ok(serde_json::Value::String(content.to_string())),
        SchemaDescriptor::Object { name, .. } => serde_json::from_str(content).map_err(|e| {
            DelverError::Inference(format!("{name}: response is not valid JSON: {e}"))
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan_shape() -> SchemaDescriptor {
        SchemaDescriptor::object(
            "web_search_plan",
            json!({"type": "object", "required": ["searches"]}),
        )
    }

    fn backend() -> OpenAiBackend {
        OpenAiBackend::new(ModelConfig {
            api_key: "sk-test".to_string(),
            temperature: Some(0.3),
            ..ModelConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_body_for_object_shape() {
        let agent = StageAgent::new("PlannerAgent", "Plan searches.", plan_shape());
        let body = backend().build_body(&agent, "Query: rust async");
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "Query: rust async");
        assert_eq!(body["response_format"]["json_schema"]["name"], "web_search_plan");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(body["temperature"], json!(0.3_f32));
        assert!(body.get("web_search_options").is_none());
    }

    #[test]
    fn test_body_for_search_stage() {
        let agent =
            StageAgent::new("SearchAgent", "Search.", SchemaDescriptor::Text).with_web_search();
        let body = backend().build_body(&agent, "Search term: tokio");
        assert_eq!(body["model"], "gpt-4o-mini-search-preview");
        assert!(body.get("response_format").is_none());
        assert!(body.get("temperature").is_none());
        assert!(body["web_search_options"].is_object());
    }

    #[test]
    fn test_minimal_toml_config_searches_with_search_model() {
        let config: ModelConfig = toml::from_str(
            "provider = \"openai\"\nmodel_id = \"gpt-4o-mini\"\napi_key = \"sk-test\"\n",
        )
        .unwrap();
        let agent =
            StageAgent::new("SearchAgent", "Search.", SchemaDescriptor::Text).with_web_search();
        let body = OpenAiBackend::new(config).unwrap().build_body(&agent, "Search term: tokio");
        assert_eq!(body["model"], "gpt-4o-mini-search-preview");
        assert!(body["web_search_options"].is_object());
    }

    #[test]
    fn test_search_stage_without_search_model_skips_web_search() {
        let backend = OpenAiBackend::new(ModelConfig {
            provider: LlmProvider::Groq,
            model_id: "llama-3.3-70b-versatile".to_string(),
            api_key: "gsk-test".to_string(),
            ..ModelConfig::default()
        })
        .unwrap();
        let agent =
            StageAgent::new("SearchAgent", "Search.", SchemaDescriptor::Text).with_web_search();
        let body = backend.build_body(&agent, "Search term: tokio");
        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert!(body.get("web_search_options").is_none());
    }

    #[test]
    fn test_parse_text_response() {
        let body = json!({"choices": [{"message": {"content": "summary"}, "finish_reason": "stop"}]});
        let value = parse_openai_response(&body, &SchemaDescriptor::Text).unwrap();
        assert_eq!(value, json!("summary"));
    }

    #[test]
    fn test_parse_object_response() {
        let body = json!({"choices": [{"message": {"content": "{\"searches\": []}"}}]});
        let value = parse_openai_response(&body, &plan_shape()).unwrap();
        assert_eq!(value, json!({"searches": []}));
    }

    #[test]
    fn test_parse_invalid_json_is_service_error() {
        let body = json!({"choices": [{"message": {"content": "not json"}}]});
        let err = parse_openai_response(&body, &plan_shape()).unwrap_err();
        assert!(err.is_service_error());
    }

    #[test]
    fn test_parse_refusal() {
        let body = json!({"choices": [{"message": {"content": null, "refusal": "no"}}]});
        let err = parse_openai_response(&body, &SchemaDescriptor::Text).unwrap_err();
        assert!(err.to_string().contains("model refused"));
    }
}
