//! Test doubles and fixtures shared by the integration tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use scribe_ai_context::{DocumentSnapshot, LineType, ScriptLine};
use scribe_ai_embed::{EmbedError, EmbeddingGateway, EmbeddingResult, HashingEmbedProvider};
use scribe_ai_retriever::storage::{
    DistanceMetric, MemoryVectorIndex, QueryHit, VectorIndex, VectorRecord,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Hashing embedder that counts calls, and can fail or block on demand.
pub struct CountingGateway {
    inner: HashingEmbedProvider,
    pub calls: AtomicUsize,
    pub texts: AtomicUsize,
    pub failing: AtomicBool,
    pub blocking: AtomicBool,
    pub release: Notify,
}

impl CountingGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: HashingEmbedProvider::new(512),
            calls: AtomicUsize::new(0),
            texts: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            blocking: AtomicBool::new(false),
            release: Notify::new(),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingGateway for CountingGateway {
    async fn embed_texts(&self, texts: &[String]) -> scribe_ai_embed::Result<EmbeddingResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        if self.blocking.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(EmbedError::Status {
                status: 503,
                body: "service overloaded".to_string(),
            });
        }
        self.inner.embed_texts(texts).await
    }

    fn embedding_dimension(&self) -> Option<usize> {
        self.inner.embedding_dimension()
    }

    fn provider_name(&self) -> &str {
        "counting"
    }
}

/// In-memory index that counts writes and can fail or stall them.
#[derive(Default)]
pub struct RecordingIndex {
    inner: MemoryVectorIndex,
    pub clears: AtomicUsize,
    pub upserts: AtomicUsize,
    pub replaces: AtomicUsize,
    pub fail_writes: AtomicBool,
    /// Writes sleep for a minute before touching the records
    pub slow_writes: AtomicBool,
}

impl RecordingIndex {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn writes(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
            + self.upserts.load(Ordering::SeqCst)
            + self.replaces.load(Ordering::SeqCst)
    }

    async fn before_write(&self) -> Result<()> {
        if self.slow_writes.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;
        self.inner.upsert(records).await
    }

    async fn replace_all(&self, records: Vec<VectorRecord>) -> Result<()> {
        self.replaces.fetch_add(1, Ordering::SeqCst);
        self.before_write().await?;
        self.inner.replace_all(records).await
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>> {
        self.inner.query(vector, k).await
    }

    async fn clear(&self) -> Result<()> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        self.inner.clear().await
    }

    async fn count(&self) -> Result<usize> {
        self.inner.count().await
    }

    fn metric(&self) -> DistanceMetric {
        self.inner.metric()
    }
}

/// Three scenes: a harbour storm, a tavern conversation, a morning market.
pub fn three_scene_script() -> DocumentSnapshot {
    DocumentSnapshot::new(vec![
        ScriptLine::new(LineType::Heading, "EXT. HARBOUR - NIGHT"),
        ScriptLine::new(
            LineType::Action,
            "Foul weather. Rain lashes the pier. The weather turns the sea black.",
        ),
        ScriptLine::new(LineType::CharacterName, "MARA"),
        ScriptLine::new(LineType::Dialogue, "This weather will sink us all."),
        ScriptLine::new(LineType::Heading, "INT. TAVERN - NIGHT"),
        ScriptLine::new(
            LineType::Action,
            "Candles gutter. Fishermen hunch over tankards of ale and dice.",
        ),
        ScriptLine::new(LineType::CharacterName, "ODA"),
        ScriptLine::new(LineType::Dialogue, "Another round, and put it on my tab."),
        ScriptLine::new(LineType::Heading, "EXT. MARKET SQUARE - DAY"),
        ScriptLine::new(
            LineType::Action,
            "Stalls of bread, cheese and copper pots. Children chase a loose goat.",
        ),
    ])
}

/// The same script with the market scene rewritten.
pub fn revised_script() -> DocumentSnapshot {
    let mut lines = three_scene_script().lines().to_vec();
    lines.truncate(8);
    lines.push(ScriptLine::new(LineType::Heading, "INT. LIGHTHOUSE - DAWN"));
    lines.push(ScriptLine::new(
        LineType::Action,
        "The keeper climbs the spiral stairs with a can of oil for the lamp.",
    ));
    DocumentSnapshot::new(lines)
}
