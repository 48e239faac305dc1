use super::{http_client, transport_error};
use crate::config::ModelConfig;
use crate::schema::SchemaDescriptor;
use crate::service::{InferenceService, StageAgent};
use async_trait::async_trait;
use delver_core::{DelverError, DelverResult};

/// Claude (Anthropic) API backend.
///
/// Object shapes are obtained by forcing a single tool call whose input
/// schema is the expected shape.
pub struct ClaudeBackend {
    config: ModelConfig,
    http: reqwest::Client,
}

impl ClaudeBackend {
    /// Build the backend and its HTTP client.
    pub fn new(config: ModelConfig) -> DelverResult<Self> {
        let http = http_client(&config)?;
        Ok(Self { config, http })
    }

    /// Request body for one messages call.
    pub fn build_body(&self, agent: &StageAgent, prompt: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model_for(agent.web_search),
            "max_tokens": self.config.max_tokens,
            "system": agent.instructions,
            "messages": [{"role": "user", "content": prompt}],
        });

        let mut tools = Vec::new();
        if let SchemaDescriptor::Object { name, schema } = &agent.shape {
            tools.push(serde_json::json!({
                "name": name,
                "description": "Record the final structured answer.",
                "input_schema": schema,
            }));
        }
        if agent.web_search {
            tools.push(serde_json::json!({
                "type": "web_search_20250305",
                "name": "web_search",
                "max_uses": 5,
            }));
        }
        if !tools.is_empty() {
            body["tools"] = serde_json::Value::Array(tools);
        }

        match (&agent.shape, agent.web_search) {
            (SchemaDescriptor::Object { name, .. }, false) => {
                body["tool_choice"] = serde_json::json!({"type": "tool", "name": name});
            }
            (SchemaDescriptor::Object { .. }, true) => {
                body["tool_choice"] = serde_json::json!({"type": "auto"});
            }
            (SchemaDescriptor::Text, _) => {}
        }

        if let Some(temperature) = self.config.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }

        body
    }
}

#[async_trait]
impl InferenceService for ClaudeBackend {
    async fn invoke(&self, agent: &StageAgent, prompt: &str) -> DelverResult<serde_json::Value> {
        let url = format!("{}/v1/messages", self.config.base_url());
        let body = self.build_body(agent, prompt);

        let resp = self
            .http
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("Claude", e))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| transport_error("Claude", e))?;

        if !status.is_success() {
            return Err(DelverError::Inference(format!(
                "Claude API error {status}: {resp_body}"
            )));
        }

        let value = parse_claude_response(&resp_body, &agent.shape)?;
        agent.shape.validate(&value)?;
        Ok(value)
    }
}

/// Extract the stage output from a messages response: joined text
/// blocks for text shapes, the forced tool's input for object shapes.
pub fn parse_claude_response(
    body: &serde_json::Value,
    shape: &SchemaDescriptor,
) -> DelverResult<serde_json::Value> {
    let blocks = body["content"]
        .as_array()
        .ok_or_else(|| DelverError::Inference("Claude response had no content".to_string()))?;

    match shape {
        SchemaDescriptor::Text => {
            let text: String = blocks
                .iter()
                .filter(|b| b["type"] == "text")
                .filter_map(|b| b["text"].as_str())
                .collect();
            if text.is_empty() {
                return Err(DelverError::Inference(
                    "Claude response had no text content".to_string(),
                ));
            }
            Ok(serde_json::Value::String(text))
        }
        SchemaDescriptor::Object { name, .. } => blocks
            .iter()
            .find(|b| b["type"] == "tool_use" && b["name"] == name.as_str())
            .map(|b| b["input"].clone())
            .ok_or_else(|| {
                DelverError::Inference(format!("Claude response did not call `{name}`"))
            }),
    }
}
