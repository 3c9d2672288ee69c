//! # scribe-ai-embed
//!
//! Embedding gateways for the scribe-ai workspace: a single async trait that turns
//! a batch of texts into vectors, plus the implementations the retriever can be
//! configured with.
//!
//! ## Gateways
//!
//! - [`HashingEmbedProvider`]: deterministic local feature hashing. No model files,
//!   no network. The default.
//! - [`OpenAiEmbedProvider`]: any OpenAI-compatible `/embeddings` endpoint.
//! - [`TimeoutGateway`]: wraps another gateway and fails calls that exceed a deadline.
//!
//! ## Quick Start
//!
//! ```
//! use scribe_ai_embed::{EmbedConfig, EmbeddingGateway, create_gateway};
//!
//! # async fn example() -> scribe_ai_embed::Result<()> {
//! let gateway = create_gateway(&EmbedConfig::hashing(128))?;
//!
//! let texts = vec!["INT. KITCHEN - NIGHT".to_string(), "Rain on the glass.".to_string()];
//! let result = gateway.embed_texts(&texts).await?;
//!
//! assert_eq!(result.len(), 2);
//! assert_eq!(result.dimension, 128);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`Result<T>`] using the crate's [`EmbedError`] type. A batch
//! either succeeds completely, with one vector per input in input order, or fails
//! with a single error.

pub mod config;
pub mod error;
pub mod openai;
pub mod provider;

// Re-export main types for easy access
pub use config::{EmbedConfig, EmbedConfigBuilder, ProviderKind};
pub use error::{EmbedError, Result};
pub use openai::OpenAiEmbedProvider;
pub use provider::{
    EmbeddingGateway, EmbeddingResult, HashingEmbedProvider, TimeoutGateway, create_gateway,
};
