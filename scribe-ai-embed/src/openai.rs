//! Gateway for OpenAI-compatible `/embeddings` endpoints

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingGateway, EmbeddingResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Remote embeddings over HTTP.
///
/// Batches larger than `batch_size` are split into several requests. Any failed
/// request fails the whole call.
pub struct OpenAiEmbedProvider {
    client: Client,
    config: EmbedConfig,
    api_key: String,
}

impl std::fmt::Debug for OpenAiEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedProvider")
            .field("config", &self.config)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl OpenAiEmbedProvider {
    /// Create a provider, reading the API key from the configured environment variable.
    pub fn new(config: EmbedConfig) -> Result<Self> {
        let api_key = config.api_key()?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: EmbedConfig, api_key: impl Into<String>) -> Result<Self> {
        config.validate()?;
        let client = Client::builder().build().map_err(EmbedError::request)?;
        Ok(Self {
            client,
            config,
            api_key: api_key.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.config.api_base.trim_end_matches('/'))
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.config.model_name,
            input: batch,
            dimensions: self.config.dimension,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(EmbedError::request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Embedding request failed with status {}", status);
            return Err(EmbedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::malformed(e.to_string()))?;
        order_by_index(parsed.data, batch.len())
    }
}

/// Put response items back into request order and check the batch is complete.
fn order_by_index(data: Vec<EmbeddingDatum>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(EmbedError::BatchMismatch {
            expected,
            actual: data.len(),
        });
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for datum in data {
        let slot = slots
            .get_mut(datum.index)
            .ok_or_else(|| EmbedError::malformed(format!("index {} out of range", datum.index)))?;
        if slot.replace(datum.embedding).is_some() {
            return Err(EmbedError::malformed(format!(
                "duplicate index {}",
                datum.index
            )));
        }
    }
    slots
        .into_iter()
        .map(|slot| slot.ok_or_else(|| EmbedError::malformed("missing embedding")))
        .collect()
}

#[async_trait]
impl EmbeddingGateway for OpenAiEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        tracing::debug!(
            "Requesting {} embeddings from {} ({})",
            texts.len(),
            self.endpoint(),
            self.config.model_name
        );

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size.max(1)) {
            all_embeddings.extend(self.embed_batch(batch).await?);
        }

        if self.config.normalize {
            for embedding in &mut all_embeddings {
                let norm = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
                if norm > 0.0 {
                    embedding.iter_mut().for_each(|x| *x /= norm);
                }
            }
        }

        EmbeddingResult::new(all_embeddings).ensure_len(texts.len())
    }

    fn embedding_dimension(&self) -> Option<usize> {
        self.config.dimension
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn datum(index: usize, value: f32) -> EmbeddingDatum {
        EmbeddingDatum {
            index,
            embedding: vec![value],
        }
    }

    #[test]
    fn test_order_by_index_restores_request_order() {
        let ordered = order_by_index(vec![datum(1, 1.0), datum(0, 0.0), datum(2, 2.0)], 3).unwrap();
        assert_eq!(ordered, vec![vec![0.0], vec![1.0], vec![2.0]]);
    }

    #[test]
    fn test_order_by_index_rejects_bad_batches() {
        assert!(matches!(
            order_by_index(vec![datum(0, 0.0)], 2),
            Err(EmbedError::BatchMismatch { .. })
        ));
        assert!(matches!(
            order_by_index(vec![datum(0, 0.0), datum(0, 1.0)], 2),
            Err(EmbedError::MalformedResponse { .. })
        ));
        assert!(matches!(
            order_by_index(vec![datum(0, 0.0), datum(5, 1.0)], 2),
            Err(EmbedError::MalformedResponse { .. })
        ));
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.5,0.25]}],"model":"m"}"#;
        let parsed: EmbeddingResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data.len(), 1);
        assert_eq!(parsed.data[0].embedding, vec![0.5, 0.25]);
    }

    #[test]
    fn test_endpoint_and_debug_redacts_key() {
        let config = EmbedConfig::openai("m").with_api_base("http://localhost:8080/v1/");
        let provider = OpenAiEmbedProvider::with_api_key(config, "sk-secret").unwrap();
        assert_eq!(provider.endpoint(), "http://localhost:8080/v1/embeddings");
        assert!(!format!("{provider:?}").contains("sk-secret"));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_request_error() {
        let config = EmbedConfig::openai("m").with_api_base("http://127.0.0.1:9");
        let provider = OpenAiEmbedProvider::with_api_key(config, "k").unwrap();
        let err = provider.embed_texts(&["x".to_string()]).await.unwrap_err();
        assert!(matches!(err, EmbedError::Request { .. }));
    }
}
