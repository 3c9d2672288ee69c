//! scribe-ai-retriever: semantic scene retrieval for screenplays
//!
//! Keeps a vector index of each open screenplay's scenes in step with the
//! document and answers natural-language queries with the most similar scenes.
//! Rebuilds are skipped when a cheap fingerprint says nothing changed, and query
//! embeddings are cached, so asking the same thing twice about an unchanged
//! script costs one embedding call in total.
//!
//! ## Key Modules
//!
//! - **[`retrieval`]**: index manager, query cache, retriever and per-document registry
//! - **[`storage`]**: vector index abstraction with in-memory and SQLite backends
//! - **[`status`]**: user-facing search status and index reports
//! - **[`config`]**: TOML configuration and wiring
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scribe_ai_context::DocumentSnapshot;
//! use scribe_ai_retriever::config::RetrieverConfig;
//!
//! # async fn example(snapshot: DocumentSnapshot) -> anyhow::Result<()> {
//! let registry = RetrieverConfig::default().build_registry().await?;
//! let context = registry.context("pilot")?;
//!
//! context.ensure_up_to_date(&snapshot).await?;
//! for result in context.retrieve("a storm at sea", 3).await? {
//!     println!("{:.2} {}", result.similarity, result.id);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Snapshot → Fingerprint ─changed─→ Chunker → Embedding Gateway → Vector Index
//!                                                                      ↓
//! Query ──→ Query Cache ──→ Embedding Gateway            Retriever ← (read lock)
//! ```

pub mod config;
pub mod error;
pub mod retrieval;
pub mod status;
pub mod storage;

pub use config::RetrieverConfig;
pub use error::{Result, RetrieverError};
pub use retrieval::context_bundle::ContextBundle;
pub use retrieval::index_manager::{
    IndexManager, IndexManagerConfig, IndexState, IndexStatus, RefreshOutcome,
};
pub use retrieval::query_cache::QueryCache;
pub use retrieval::registry::{DocumentRegistry, IndexFactory, SemanticContext};
pub use retrieval::retriever::{RetrievalResult, Retriever, similarity};
pub use status::{IndexReport, SearchStatus};
pub use storage::{DistanceMetric, MemoryVectorIndex, SqliteVectorIndex, VectorIndex};
