//! `delver.toml` loading.

use anyhow::Context;
use delver_agent::ModelConfig;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Contents of `delver.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DelverConfig {
    /// Provider and model settings.
    #[serde(default)]
    pub model: ModelConfig,
    /// Pipeline settings.
    #[serde(default)]
    pub research: ResearchConfig,
}

/// The `[research]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ResearchConfig {
    /// Prefix planner and writer input with today's date.
    #[serde(default = "default_include_date")]
    pub include_date: bool,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            include_date: default_include_date(),
        }
    }
}

fn default_include_date() -> bool {
    true
}

impl DelverConfig {
    /// Read and parse `path`. A missing file yields the defaults.
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Self::parse(&raw)
                .with_context(|| format!("Failed to parse config file '{}'", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Failed to read config file '{}': {e}",
                path.display()
            )),
        }
    }

    /// Parse TOML text.
    pub fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}
