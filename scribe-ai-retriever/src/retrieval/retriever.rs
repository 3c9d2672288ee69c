//! Similarity queries against a managed index.

use crate::error::{Result, RetrieverError};
use crate::retrieval::context_bundle::ContextBundle;
use crate::retrieval::index_manager::IndexManager;
use crate::retrieval::query_cache::QueryCache;
use crate::status::SearchStatus;
use scribe_ai_context::{ChunkMetadata, DocumentSnapshot};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// One scored chunk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub id: String,
    pub chunk_text: String,
    pub metadata: ChunkMetadata,
    /// Raw distance reported by the vector index
    pub distance: f32,
    /// `1 - distance / max_distance`, clamped to `[0, 1]`
    pub similarity: f32,
}

/// Map a distance onto `[0, 1]`, 1 being identical.
///
/// Out-of-range distances are clamped and NaN scores as 0.
pub fn similarity(distance: f32, max_distance: f32) -> f32 {
    let score = 1.0 - distance / max_distance;
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Answers natural-language queries for one document.
///
/// Query embeddings come from a shared [`QueryCache`]; the read side of the
/// manager's lock is held only around the vector index call, never around the
/// embedding call.
pub struct Retriever {
    manager: Arc<IndexManager>,
    cache: Arc<QueryCache>,
}

impl Retriever {
    pub fn new(manager: Arc<IndexManager>, cache: Arc<QueryCache>) -> Self {
        Self { manager, cache }
    }

    pub fn manager(&self) -> &Arc<IndexManager> {
        &self.manager
    }

    pub fn query_cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// The `k` chunks most similar to `query`, best first.
    ///
    /// Returns [`RetrieverError::IndexUnavailable`] when there is no ready index,
    /// which is distinct from an empty result.
    ///
    /// # Panics
    ///
    /// Panics if `k` is zero.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        assert!(k >= 1, "retrieve needs k >= 1");

        {
            let state = self.manager.read_state().await;
            if !state.ready {
                return Err(RetrieverError::IndexUnavailable {
                    last_error: state.last_error.clone(),
                });
            }
        }

        let vector = self.cache.get_or_compute(query).await?;

        let state = self.manager.read_state().await;
        // The index may have been cleared while we were embedding
        if !state.ready {
            return Err(RetrieverError::IndexUnavailable {
                last_error: state.last_error.clone(),
            });
        }
        let index = Arc::clone(self.manager.index());
        let max_distance = index.metric().max_distance();
        let hits = self
            .manager
            .with_store_deadline(async move { index.query(&vector, k).await })
            .await?;
        drop(state);

        let mut results: Vec<RetrievalResult> = hits
            .into_iter()
            .map(|hit| RetrievalResult {
                similarity: similarity(hit.distance, max_distance),
                id: hit.id,
                chunk_text: hit.text,
                metadata: hit.metadata,
                distance: hit.distance,
            })
            .collect();

        // Stable: equal similarities keep the store's order
        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(k);
        debug!("Retrieved {} results for query", results.len());
        Ok(results)
    }

    /// Refresh the index for `snapshot`, search it, and render a bounded bundle.
    ///
    /// Never fails: when no search is possible the bundle is empty and its status
    /// says why. A failed refresh falls back to the previous index when there is one.
    pub async fn retrieve_context(
        &self,
        snapshot: &DocumentSnapshot,
        query: &str,
        k: usize,
        char_budget: usize,
    ) -> ContextBundle {
        if self.manager.is_rebuilding() && !self.manager.is_ready() {
            return ContextBundle::empty(SearchStatus::Building);
        }

        match self.manager.ensure_up_to_date(snapshot).await {
            Ok(status) if !status.ready => {
                return ContextBundle::empty(SearchStatus::Unavailable { last_error: None });
            }
            Ok(_) => {}
            Err(e) => {
                if self.manager.is_ready() {
                    warn!("Index refresh failed, searching previous index: {}", e);
                } else {
                    return ContextBundle::empty(SearchStatus::Unavailable {
                        last_error: Some(e.to_string()),
                    });
                }
            }
        }

        match self.retrieve(query, k).await {
            Ok(results) => ContextBundle::assemble(&results, char_budget),
            Err(RetrieverError::IndexUnavailable { last_error }) => {
                ContextBundle::empty(SearchStatus::Unavailable { last_error })
            }
            Err(e) => {
                warn!("Semantic search failed: {}", e);
                ContextBundle::empty(SearchStatus::Unavailable {
                    last_error: Some(e.to_string()),
                })
            }
        }
    }
}
