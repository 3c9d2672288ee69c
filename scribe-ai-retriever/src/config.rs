//! Retriever configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file at all) gives a
//! working in-memory setup with the offline hashing embedder:
//!
//! ```toml
//! metric = "cosine"
//! default_k = 5
//! context_char_budget = 4000
//! timeout_ms = 10000
//! database_path = "scribe-index.db"
//!
//! [embed]
//! provider = "open-ai"
//! model_name = "text-embedding-3-small"
//! ```

use crate::retrieval::index_manager::IndexManagerConfig;
use crate::retrieval::query_cache::QueryCache;
use crate::retrieval::registry::{DocumentRegistry, IndexFactory};
use crate::storage::{DistanceMetric, MemoryVectorIndex, SqliteVectorIndex, VectorIndex};
use anyhow::{Context, Result};
use scribe_ai_context::{Chunker, ChunkerConfig, FingerprintMode, MIN_CONTENT_CHARS};
use scribe_ai_embed::{EmbedConfig, EmbeddingGateway, create_gateway};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_K: usize = 5;
pub const DEFAULT_CONTEXT_CHAR_BUDGET: usize = 4000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    pub embed: EmbedConfig,
    pub metric: DistanceMetric,
    pub default_k: usize,
    /// Character budget for rendered context bundles
    pub context_char_budget: usize,
    /// LRU bound for cached query embeddings; unbounded when absent
    pub query_cache_capacity: Option<usize>,
    pub fingerprint_mode: FingerprintMode,
    /// Deadline for external calls. Applies to the vector index, and to the
    /// gateway unless `embed.timeout_ms` overrides it.
    pub timeout_ms: Option<u64>,
    /// SQLite file for persistent vectors; in-memory when absent
    pub database_path: Option<PathBuf>,
    pub min_content_chars: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            embed: EmbedConfig::default(),
            metric: DistanceMetric::default(),
            default_k: DEFAULT_K,
            context_char_budget: DEFAULT_CONTEXT_CHAR_BUDGET,
            query_cache_capacity: None,
            fingerprint_mode: FingerprintMode::default(),
            timeout_ms: None,
            database_path: None,
            min_content_chars: MIN_CONTENT_CHARS,
        }
    }
}

impl RetrieverConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{}'", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file at '{}'", path.display()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_k == 0 {
            anyhow::bail!("default_k must be at least 1");
        }
        if self.query_cache_capacity == Some(0) {
            anyhow::bail!("query_cache_capacity must be at least 1 when set");
        }
        self.embed.validate()?;
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Embedding config with the shared timeout filled in.
    pub fn effective_embed_config(&self) -> EmbedConfig {
        let mut embed = self.embed.clone();
        if embed.timeout_ms.is_none() {
            embed.timeout_ms = self.timeout_ms;
        }
        embed
    }

    pub fn manager_config(&self) -> IndexManagerConfig {
        let config = IndexManagerConfig::default()
            .with_chunker(Chunker::new(ChunkerConfig {
                min_content_chars: self.min_content_chars,
                ..ChunkerConfig::default()
            }))
            .with_fingerprint_mode(self.fingerprint_mode);
        match self.timeout() {
            Some(timeout) => config.with_store_timeout(timeout),
            None => config,
        }
    }

    pub fn query_cache(&self, gateway: Arc<dyn EmbeddingGateway>) -> QueryCache {
        match self.query_cache_capacity.and_then(NonZeroUsize::new) {
            Some(capacity) => QueryCache::with_capacity(gateway, capacity),
            None => QueryCache::new(gateway),
        }
    }

    /// Wire gateway, cache and storage into a registry.
    pub async fn build_registry(&self) -> Result<DocumentRegistry> {
        self.validate()?;
        let gateway = create_gateway(&self.effective_embed_config())?;
        let cache = Arc::new(self.query_cache(Arc::clone(&gateway)));
        let metric = self.metric;

        let index_factory: IndexFactory = match &self.database_path {
            Some(path) => {
                let db = SqliteVectorIndex::open(path, "default").await?;
                info!("Using vector database {}", path.display());
                Arc::new(move |document_id: &str| {
                    Ok(Arc::new(db.for_collection(document_id).with_metric(metric))
                        as Arc<dyn VectorIndex>)
                })
            }
            None => Arc::new(move |_: &str| {
                Ok(Arc::new(MemoryVectorIndex::with_metric(metric)) as Arc<dyn VectorIndex>)
            }),
        };

        Ok(DocumentRegistry::new(gateway, cache, index_factory)
            .with_manager_config(self.manager_config()))
    }
}
