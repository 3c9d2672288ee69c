//! Error types for indexing and retrieval

use scribe_ai_embed::EmbedError;

/// Result type for index manager and retriever operations.
pub type Result<T> = std::result::Result<T, RetrieverError>;

/// Why a refresh or query could not produce a result.
///
/// None of these are fatal: after any of them the last successfully built index
/// is still in place, and callers are expected to carry on without semantic
/// context. An empty document is not an error at all; see
/// [`RefreshOutcome::EmptyDocument`](crate::retrieval::index_manager::RefreshOutcome).
#[derive(Debug, thiserror::Error)]
pub enum RetrieverError {
    /// The embedding gateway failed, timed out, or returned too few vectors
    #[error("Embedding service unavailable: {source}")]
    EmbeddingUnavailable {
        #[source]
        source: EmbedError,
    },

    /// There is no usable index to query
    #[error("Index unavailable{}", .last_error.as_deref().map(|e| format!(" (last error: {e})")).unwrap_or_default())]
    IndexUnavailable { last_error: Option<String> },

    /// The vector index failed or timed out
    #[error("Vector store unavailable: {source}")]
    StoreUnavailable {
        #[source]
        source: anyhow::Error,
    },
}

impl RetrieverError {
    pub fn store<E: Into<anyhow::Error>>(source: E) -> Self {
        Self::StoreUnavailable {
            source: source.into(),
        }
    }
}

impl From<EmbedError> for RetrieverError {
    fn from(source: EmbedError) -> Self {
        Self::EmbeddingUnavailable { source }
    }
}
