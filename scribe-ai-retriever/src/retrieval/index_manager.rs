//! Keeps one document's vector index consistent with its latest snapshot.
//!
//! The manager owns the rebuild-or-skip decision. Every refresh fingerprints the
//! snapshot; an unchanged fingerprint on a ready index costs nothing else. A
//! changed one triggers a full rebuild:
//!
//! ```text
//! snapshot → fingerprint ──unchanged──→ done (no chunking, no embedding, no writes)
//!                 │
//!              changed
//!                 ↓
//!        [write lock] re-check → chunk → embed all → replace_all → new state
//! ```
//!
//! ## Locking
//!
//! One `tokio::sync::RwLock` per document guards the [`IndexState`] and, by
//! convention, the vector index behind it. Rebuilds hold the write lock from the
//! re-check to the final state swap, so concurrent refreshes with the same new
//! fingerprint perform exactly one rebuild and queries never see a half-replaced
//! index. Queries hold the read lock while they talk to the store.
//!
//! ## Failure Model
//!
//! A rebuild either replaces the index completely or leaves it as it was.
//! Embedding happens before the store is touched, and the store swap is a single
//! [`VectorIndex::replace_all`] call. If the gateway or the store fails (or times
//! out), the old vectors and the old state stay in place; only `last_error` is
//! recorded. A refresh future dropped mid-rebuild leaves the same picture, and the
//! `rebuilding` flag is reset on drop.

use crate::error::{Result, RetrieverError};
use crate::storage::{VectorIndex, VectorRecord};
use scribe_ai_context::{
    Chunk, Chunker, DocumentSnapshot, DocumentSource, Fingerprint, FingerprintMode,
};
use scribe_ai_embed::{EmbedError, EmbeddingGateway};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

/// What a refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshOutcome {
    /// Fingerprint matched a ready index; nothing was touched
    Unchanged,
    /// The index was rebuilt from the snapshot
    Rebuilt,
    /// The snapshot had nothing worth indexing; the index is not ready
    EmptyDocument,
}

/// Result of a successful refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexStatus {
    pub ready: bool,
    pub chunk_count: usize,
    pub outcome: RefreshOutcome,
}

/// Bookkeeping for the index of one document.
///
/// Replaced wholesale by a successful rebuild. Failed rebuilds only touch
/// `last_error`.
#[derive(Debug, Clone)]
pub struct IndexState {
    pub fingerprint: Fingerprint,
    pub chunk_count: usize,
    pub ready: bool,
    pub last_error: Option<String>,
    /// Number of completed rebuilds since creation
    pub rebuilds: u64,
}

impl Default for IndexState {
    fn default() -> Self {
        Self {
            fingerprint: Fingerprint::Unknown,
            chunk_count: 0,
            ready: false,
            last_error: None,
            rebuilds: 0,
        }
    }
}

/// Tunables for an [`IndexManager`].
#[derive(Debug, Clone, Default)]
pub struct IndexManagerConfig {
    pub chunker: Chunker,
    pub fingerprint_mode: FingerprintMode,
    /// Deadline for each vector index call
    pub store_timeout: Option<Duration>,
}

impl IndexManagerConfig {
    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_fingerprint_mode(mut self, mode: FingerprintMode) -> Self {
        self.fingerprint_mode = mode;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = Some(timeout);
        self
    }
}

/// Orchestrates chunker, gateway and vector index for one document.
pub struct IndexManager {
    gateway: Arc<dyn EmbeddingGateway>,
    index: Arc<dyn VectorIndex>,
    config: IndexManagerConfig,
    state: RwLock<IndexState>,
    rebuilding: AtomicBool,
    /// Mirrors `state.ready` for lock-free readers
    ready: AtomicBool,
}

impl IndexManager {
    pub fn new(gateway: Arc<dyn EmbeddingGateway>, index: Arc<dyn VectorIndex>) -> Self {
        Self::with_config(gateway, index, IndexManagerConfig::default())
    }

    pub fn with_config(
        gateway: Arc<dyn EmbeddingGateway>,
        index: Arc<dyn VectorIndex>,
        config: IndexManagerConfig,
    ) -> Self {
        Self {
            gateway,
            index,
            config,
            state: RwLock::new(IndexState::default()),
            rebuilding: AtomicBool::new(false),
            ready: AtomicBool::new(false),
        }
    }

    /// Bring the index in line with `snapshot`, rebuilding only if it changed.
    pub async fn ensure_up_to_date(&self, snapshot: &DocumentSnapshot) -> Result<IndexStatus> {
        let fingerprint = Fingerprint::of(Some(snapshot), self.config.fingerprint_mode);
        self.refresh(snapshot, fingerprint).await
    }

    /// Pull the current snapshot from `source` and refresh.
    ///
    /// A source with no readable document yields the [`Fingerprint::Unknown`]
    /// sentinel and is indexed as an empty document.
    pub async fn refresh_from(&self, source: &dyn DocumentSource) -> Result<IndexStatus> {
        match source.snapshot() {
            Some(snapshot) => self.ensure_up_to_date(&snapshot).await,
            None => {
                debug!("Document source returned no snapshot");
                self.refresh(&DocumentSnapshot::empty(), Fingerprint::Unknown)
                    .await
            }
        }
    }

    async fn refresh(
        &self,
        snapshot: &DocumentSnapshot,
        fingerprint: Fingerprint,
    ) -> Result<IndexStatus> {
        {
            let state = self.state.read().await;
            if state.ready && state.fingerprint.matches(&fingerprint) {
                debug!("Index up to date (fingerprint {})", fingerprint);
                return Ok(unchanged(&state));
            }
        }

        let mut state = self.state.write().await;
        // Another caller may have rebuilt for this fingerprint while we waited
        if state.ready && state.fingerprint.matches(&fingerprint) {
            debug!("Index rebuilt concurrently (fingerprint {})", fingerprint);
            return Ok(unchanged(&state));
        }

        let _rebuilding = RebuildingGuard::enter(&self.rebuilding);
        let result = self.rebuild(&mut state, snapshot, fingerprint).await;
        self.ready.store(state.ready, Ordering::SeqCst);
        result
    }

    async fn rebuild(
        &self,
        state: &mut IndexState,
        snapshot: &DocumentSnapshot,
        fingerprint: Fingerprint,
    ) -> Result<IndexStatus> {
        let started = Instant::now();
        let chunks = self.config.chunker.chunk(snapshot);

        if chunks.is_empty() {
            info!(
                "Document has nothing to index ({} lines), index not ready",
                snapshot.len()
            );
            state.fingerprint = fingerprint;
            state.chunk_count = 0;
            state.ready = false;
            return Ok(IndexStatus {
                ready: false,
                chunk_count: 0,
                outcome: RefreshOutcome::EmptyDocument,
            });
        }

        info!(
            "Rebuilding index: {} chunks (fingerprint {})",
            chunks.len(),
            fingerprint
        );

        let vectors = match self.embed_chunks(&chunks).await {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!("Embedding failed, keeping previous index: {}", e);
                state.last_error = Some(e.to_string());
                return Err(RetrieverError::EmbeddingUnavailable { source: e });
            }
        };

        let records: Vec<VectorRecord> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorRecord {
                id: chunk.id,
                vector,
                text: chunk.text,
                metadata: chunk.metadata,
            })
            .collect();
        let chunk_count = records.len();

        let index = Arc::clone(&self.index);
        let written = self
            .with_store_deadline(async move { index.replace_all(records).await })
            .await;
        if let Err(e) = written {
            warn!("Vector index write failed, keeping previous index: {}", e);
            state.last_error = Some(e.to_string());
            return Err(e);
        }

        *state = IndexState {
            fingerprint,
            chunk_count,
            ready: true,
            last_error: None,
            rebuilds: state.rebuilds + 1,
        };
        info!(
            "Index rebuilt: {} chunks in {:.2}s",
            chunk_count,
            started.elapsed().as_secs_f64()
        );

        Ok(IndexStatus {
            ready: true,
            chunk_count,
            outcome: RefreshOutcome::Rebuilt,
        })
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> std::result::Result<Vec<Vec<f32>>, EmbedError> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let result = self.gateway.embed_texts(&texts).await?;
        Ok(result.ensure_len(texts.len())?.embeddings)
    }

    /// Run a store operation under the configured deadline.
    pub(crate) async fn with_store_deadline<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let outcome = match self.config.store_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, operation).await {
                Ok(outcome) => outcome,
                Err(_) => Err(anyhow::anyhow!(
                    "vector index call timed out after {}ms",
                    timeout.as_millis()
                )),
            },
            None => operation.await,
        };
        outcome.map_err(RetrieverError::store)
    }

    /// Remove every vector and forget the fingerprint; the next refresh rebuilds.
    pub async fn clear_index(&self) -> Result<()> {
        let mut state = self.state.write().await;
        let index = Arc::clone(&self.index);
        self.with_store_deadline(async move { index.clear().await })
            .await?;
        *state = IndexState {
            rebuilds: state.rebuilds,
            ..IndexState::default()
        };
        self.ready.store(false, Ordering::SeqCst);
        info!("Index cleared");
        Ok(())
    }

    /// Current state. Waits for a running rebuild to finish.
    pub async fn state(&self) -> IndexState {
        self.state.read().await.clone()
    }

    /// Current state without waiting; `None` while a rebuild holds the lock.
    pub fn try_state(&self) -> Option<IndexState> {
        self.state.try_read().ok().map(|state| state.clone())
    }

    pub(crate) async fn read_state(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read().await
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::SeqCst)
    }

    /// Whether a ready index exists, without waiting for the lock.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    pub fn gateway(&self) -> &Arc<dyn EmbeddingGateway> {
        &self.gateway
    }
}

/// Holds the `rebuilding` flag up until dropped, including on cancellation.
struct RebuildingGuard<'a>(&'a AtomicBool);

impl<'a> RebuildingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for RebuildingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn unchanged(state: &IndexState) -> IndexStatus {
    IndexStatus {
        ready: state.ready,
        chunk_count: state.chunk_count,
        outcome: RefreshOutcome::Unchanged,
    }
}
