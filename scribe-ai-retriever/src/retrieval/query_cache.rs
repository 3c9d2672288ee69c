//! Memoized query embeddings.
//!
//! Users ask the same questions over and over ("where does it rain?"), and every
//! embedding call is a round trip to a paid service. The cache keys on a BLAKE3
//! hash of the exact query string: no trimming, no case folding.
//!
//! The mutex guarding the map is never held across an `.await`. Two concurrent
//! misses for the same query may both reach the gateway; the second result simply
//! overwrites the first.

use lru::LruCache;
use scribe_ai_embed::{EmbeddingGateway, Result};
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type QueryKey = [u8; 32];

/// Query string to embedding cache in front of an [`EmbeddingGateway`].
pub struct QueryCache {
    gateway: Arc<dyn EmbeddingGateway>,
    entries: Mutex<LruCache<QueryKey, Arc<Vec<f32>>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    /// Unbounded cache: entries live until [`QueryCache::clear`].
    pub fn new(gateway: Arc<dyn EmbeddingGateway>) -> Self {
        Self::with_entries(gateway, LruCache::unbounded())
    }

    /// Cache that evicts the least recently used query beyond `capacity` entries.
    pub fn with_capacity(gateway: Arc<dyn EmbeddingGateway>, capacity: NonZeroUsize) -> Self {
        Self::with_entries(gateway, LruCache::new(capacity))
    }

    fn with_entries(
        gateway: Arc<dyn EmbeddingGateway>,
        entries: LruCache<QueryKey, Arc<Vec<f32>>>,
    ) -> Self {
        Self {
            gateway,
            entries: Mutex::new(entries),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<QueryKey, Arc<Vec<f32>>>> {
        // A panic elsewhere cannot leave the map half-updated
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Embedding for `query`, computed at most once per distinct string.
    ///
    /// Failures are returned as-is and never cached, so the next call retries.
    pub async fn get_or_compute(&self, query: &str) -> Result<Arc<Vec<f32>>> {
        let key = *blake3::hash(query.as_bytes()).as_bytes();

        let cached = self.entries().get(&key).cloned();
        if let Some(vector) = cached {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Query cache hit ({} chars)", query.len());
            return Ok(vector);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Query cache miss ({} chars), embedding", query.len());
        let vector = Arc::new(self.gateway.embed_text(query).await?);
        self.entries().put(key, Arc::clone(&vector));
        Ok(vector)
    }

    /// Drop every cached embedding.
    pub fn clear(&self) {
        let mut entries = self.entries();
        let dropped = entries.len();
        entries.clear();
        tracing::info!("Query cache cleared ({} entries)", dropped);
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn capacity(&self) -> Option<usize> {
        let capacity = self.entries().cap().get();
        (capacity != usize::MAX).then_some(capacity)
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("gateway", &self.gateway.provider_name())
            .field("len", &self.len())
            .field("hits", &self.hits())
            .field("misses", &self.misses())
            .finish()
    }
}
