//! Configuration for embedding gateways

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default dimension of the local hashing provider.
pub const DEFAULT_HASHING_DIMENSION: usize = 384;

/// Which gateway implementation to construct.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Deterministic local feature hashing, no network
    #[default]
    Hashing,
    /// OpenAI-compatible `/embeddings` HTTP endpoint
    #[serde(alias = "openai")]
    OpenAi,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hashing" | "local" => Ok(ProviderKind::Hashing),
            "openai" | "open-ai" => Ok(ProviderKind::OpenAi),
            _ => Err(format!(
                "Invalid embedding provider: '{s}'. Valid values are: hashing, openai"
            )),
        }
    }
}

/// Configuration for an embedding gateway
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(default)]
pub struct EmbedConfig {
    /// Gateway implementation
    #[builder(default)]
    pub provider: ProviderKind,
    /// Model identifier sent to the service (also names the hashing model)
    #[builder(default = r#""feature-hashing".to_string()"#)]
    pub model_name: String,
    /// Base URL of an OpenAI-compatible API
    #[builder(default = r#""https://api.openai.com/v1".to_string()"#)]
    pub api_base: String,
    /// Environment variable holding the API key
    #[builder(default = r#""OPENAI_API_KEY".to_string()"#)]
    pub api_key_env: String,
    /// Output dimension. Required by the hashing provider, optional for HTTP
    #[builder(default = "Some(DEFAULT_HASHING_DIMENSION)")]
    pub dimension: Option<usize>,
    /// Maximum texts sent in one request
    #[builder(default = "64")]
    pub batch_size: usize,
    /// Whether to L2-normalize vectors
    #[builder(default = "true")]
    pub normalize: bool,
    /// Per-request deadline in milliseconds
    #[builder(default)]
    pub timeout_ms: Option<u64>,
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Local hashing provider with the given dimension.
    pub fn hashing(dimension: usize) -> Self {
        Self {
            provider: ProviderKind::Hashing,
            model_name: "feature-hashing".to_string(),
            dimension: Some(dimension),
            ..Self::default()
        }
    }

    /// OpenAI-compatible provider for a model.
    pub fn openai(model_name: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model_name: model_name.into(),
            dimension: None,
            ..Self::default()
        }
    }

    /// Set the batch size (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set the request timeout (builder style)
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            timeout_ms: Some(timeout.as_millis() as u64),
            ..self
        }
    }

    pub fn with_api_base(self, api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            ..self
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env).map_err(|_| {
            EmbedError::invalid_config(format!(
                "environment variable {} is not set",
                self.api_key_env
            ))
        })
    }

    /// Check the configuration without touching the network.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch_size must be at least 1"));
        }
        if self.dimension == Some(0) {
            return Err(EmbedError::invalid_config("dimension must be at least 1"));
        }
        if self.timeout_ms == Some(0) {
            return Err(EmbedError::invalid_config("timeout_ms must be at least 1"));
        }
        if self.provider == ProviderKind::OpenAi && self.api_base.trim().is_empty() {
            return Err(EmbedError::invalid_config("api_base must not be empty"));
        }
        tracing::debug!("Embedding config validated for model: {}", self.model_name);
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Hashing,
            model_name: "feature-hashing".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            dimension: Some(DEFAULT_HASHING_DIMENSION),
            batch_size: 64,
            normalize: true,
            timeout_ms: None,
        }
    }
}
