//! Inference service boundary and LLM provider backends for Delver.
//!
//! Every pipeline stage is a [`StageAgent`]: instructions plus the
//! [`SchemaDescriptor`] it expects back. Stages call an [`InferenceService`],
//! which [`InferenceClient`] implements on top of the provider backends.

/// Provider HTTP backends.
pub mod backends;
/// Model and provider configuration.
pub mod config;
/// Provider-dispatching inference client.
pub mod llm;
/// Stage output shapes.
pub mod schema;
/// The inference trait and stage agents.
pub mod service;

pub use config::{LlmProvider, ModelConfig};
pub use llm::InferenceClient;
pub use schema::SchemaDescriptor;
pub use service::{InferenceService, StageAgent};
