//! Embedding gateway trait and local implementations

use crate::config::{EmbedConfig, ProviderKind};
use crate::error::{EmbedError, Result};
use crate::openai::OpenAiEmbedProvider;
use async_trait::async_trait;
use fnv::FnvHasher;
use std::hash::Hasher;
use std::sync::Arc;
use std::time::Duration;

/// Result of embedding generation
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text, in input order
    pub embeddings: Vec<Vec<f32>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result.
    ///
    /// The dimension is inferred from the first embedding vector. If the
    /// embeddings vector is empty, dimension defaults to 0.
    pub fn new(embeddings: Vec<Vec<f32>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }

    /// Fail unless there is exactly one vector per input text.
    pub fn ensure_len(self, expected: usize) -> Result<Self> {
        if self.embeddings.len() != expected {
            return Err(EmbedError::BatchMismatch {
                expected,
                actual: self.embeddings.len(),
            });
        }
        Ok(self)
    }
}

/// Batch text-to-vector function.
///
/// On success the result holds one vector per input text, in input order. On
/// failure the whole batch fails with a single error.
#[async_trait]
pub trait EmbeddingGateway: Send + Sync {
    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Generate the embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let result = self.embed_texts(&[text.to_string()]).await?.ensure_len(1)?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::malformed("No embedding generated for text"))
    }

    /// Dimension of produced vectors, when known ahead of the first call
    fn embedding_dimension(&self) -> Option<usize>;

    /// Get the name/identifier of this gateway
    fn provider_name(&self) -> &str;
}

#[async_trait]
impl<T: EmbeddingGateway + ?Sized> EmbeddingGateway for Arc<T> {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        (**self).embed_texts(texts).await
    }

    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        (**self).embed_text(text).await
    }

    fn embedding_dimension(&self) -> Option<usize> {
        (**self).embedding_dimension()
    }

    fn provider_name(&self) -> &str {
        (**self).provider_name()
    }
}

/// Build the gateway described by a config, wrapped in a deadline when one is set.
pub fn create_gateway(config: &EmbedConfig) -> Result<Arc<dyn EmbeddingGateway>> {
    config.validate()?;
    let gateway: Arc<dyn EmbeddingGateway> = match config.provider {
        ProviderKind::Hashing => Arc::new(HashingEmbedProvider::from_config(config)?),
        ProviderKind::OpenAi => Arc::new(OpenAiEmbedProvider::new(config.clone())?),
    };
    tracing::info!(
        "Created embedding gateway: {} (model {})",
        gateway.provider_name(),
        config.model_name
    );
    Ok(match config.timeout() {
        Some(timeout) => Arc::new(TimeoutGateway::new(gateway, timeout)),
        None => gateway,
    })
}

/// Deterministic local embeddings by feature hashing.
///
/// Each lower-cased word and each adjacent word pair is hashed with FNV into one
/// of `dimension` buckets with a hash-derived sign. Texts sharing vocabulary end
/// up close under cosine distance. There is no model to load and no network
/// access, which makes this provider the default for offline use and tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedProvider {
    dimension: usize,
    normalize: bool,
}

impl HashingEmbedProvider {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            normalize: true,
        }
    }

    pub fn from_config(config: &EmbedConfig) -> Result<Self> {
        let dimension = config
            .dimension
            .ok_or_else(|| EmbedError::invalid_config("hashing provider needs a dimension"))?;
        if dimension == 0 {
            return Err(EmbedError::invalid_config("dimension must be at least 1"));
        }
        Ok(Self {
            dimension,
            normalize: config.normalize,
        })
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        for word in &words {
            self.add_feature(&mut vector, word.as_bytes(), 1.0);
        }
        for pair in words.windows(2) {
            let feature = format!("{} {}", pair[0], pair[1]);
            self.add_feature(&mut vector, feature.as_bytes(), 0.5);
        }

        if self.normalize {
            let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for value in &mut vector {
                    *value /= norm;
                }
            }
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], feature: &[u8], weight: f32) {
        let mut hasher = FnvHasher::default();
        hasher.write(feature);
        let hash = hasher.finish();
        let bucket = (hash % self.dimension as u64) as usize;
        let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }
}

#[async_trait]
impl EmbeddingGateway for HashingEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        tracing::debug!("Hashing embeddings for {} texts", texts.len());
        let embeddings = texts.iter().map(|t| self.embed_one(t)).collect();
        Ok(EmbeddingResult {
            embeddings,
            dimension: self.dimension,
        })
    }

    fn embedding_dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }

    fn provider_name(&self) -> &str {
        "hashing"
    }
}

/// Applies a deadline to every call of an inner gateway.
///
/// An elapsed deadline is reported as [`EmbedError::Timeout`]; whatever the inner
/// call had produced so far is dropped.
pub struct TimeoutGateway<G: ?Sized> {
    inner: Arc<G>,
    timeout: Duration,
}

impl<G: EmbeddingGateway + ?Sized> TimeoutGateway<G> {
    pub fn new(inner: Arc<G>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<G: EmbeddingGateway + ?Sized> EmbeddingGateway for TimeoutGateway<G> {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        match tokio::time::timeout(self.timeout, self.inner.embed_texts(texts)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    "Embedding gateway {} timed out after {:?} ({} texts)",
                    self.inner.provider_name(),
                    self.timeout,
                    texts.len()
                );
                Err(EmbedError::Timeout {
                    timeout: self.timeout,
                })
            }
        }
    }

    fn embedding_dimension(&self) -> Option<usize> {
        self.inner.embedding_dimension()
    }

    fn provider_name(&self) -> &str {
        self.inner.provider_name()
    }
}
