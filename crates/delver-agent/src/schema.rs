use delver_core::{DelverError, DelverResult};
use serde::{Deserialize, Serialize};

/// The structured-output shape a stage expects back from the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SchemaDescriptor {
    /// A single free-form string.
    Text,
    /// A JSON object described by a JSON Schema.
    Object {
        /// Schema name sent to the provider.
        name: String,
        /// JSON Schema of the object.
        schema: serde_json::Value,
    },
}

impl SchemaDescriptor {
    /// An object shape named `name`.
    pub fn object(name: impl Into<String>, schema: serde_json::Value) -> Self {
        SchemaDescriptor::Object {
            name: name.into(),
            schema,
        }
    }

    /// Name used for response formats and forced tool calls.
    pub fn name(&self) -> &str {
        match self {
            SchemaDescriptor::Text => "text",
            SchemaDescriptor::Object { name, .. } => name,
        }
    }

    /// Shallow shape check: the value's JSON type, and for objects the
    /// presence of every `required` property.
    pub fn validate(&self, value: &serde_json::Value) -> DelverResult<()> {
        match self {
            SchemaDescriptor::Text => {
                if value.is_string() {
                    Ok(())
                } else {
                    Err(DelverError::Inference(format!(
                        "expected a string, got {value}"
                    )))
                }
            }
            SchemaDescriptor::Object { name, schema } => {
                let object = value.as_object().ok_or_else(|| {
                    DelverError::Inference(format!("{name}: expected a JSON object, got {value}"))
                })?;
                let required = schema["required"].as_array().into_iter().flatten();
                for key in required.filter_map(|k| k.as_str()) {
                    if !object.contains_key(key) {
                        return Err(DelverError::Inference(format!(
                            "{name}: missing required field `{key}`"
                        )));
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn questions_schema() -> SchemaDescriptor {
        SchemaDescriptor::object(
            "clarifying_questions",
            json!({
                "type": "object",
                "properties": {"questions": {"type": "array", "items": {"type": "string"}}},
                "required": ["questions"],
                "additionalProperties": false
            }),
        )
    }

    #[test]
    fn test_text_shape() {
        assert!(SchemaDescriptor::Text.validate(&json!("summary")).is_ok());
        assert!(SchemaDescriptor::Text.validate(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_object_shape_requires_fields() {
        let shape = questions_schema();
        assert!(shape.validate(&json!({"questions": []})).is_ok());

        let err = shape.validate(&json!({"other": 1})).unwrap_err();
        assert!(err.to_string().contains("missing required field `questions`"));
        assert!(err.is_service_error());

        assert!(shape.validate(&json!("not an object")).is_err());
    }

    #[test]
    fn test_shape_name() {
        assert_eq!(SchemaDescriptor::Text.name(), "text");
        assert_eq!(questions_schema().name(), "clarifying_questions");
    }
}
