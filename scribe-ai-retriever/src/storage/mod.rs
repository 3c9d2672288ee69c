//! Vector index abstraction for scribe-ai-retriever
//!
//! This module defines the contract between the index manager and whatever holds
//! the vectors. A [`VectorIndex`] stores `(id, vector, text, metadata)` records for
//! one document and answers nearest-neighbour queries over them. It knows nothing
//! about screenplays, fingerprints or rebuilds; consistency between the records
//! and the document is the index manager's job.
//!
//! ## Key Components
//!
//! - **VectorIndex**: async store trait (upsert, replace_all, query, clear, count)
//! - **MemoryVectorIndex**: process-local implementation
//! - **SqliteVectorIndex**: persistent implementation, one collection per document
//! - **DistanceMetric**: distance function plus its declared range
//!
//! ## Architecture
//!
//! ```text
//!                ┌─ MemoryVectorIndex
//! VectorIndex ───┤
//!                └─ SqliteVectorIndex ── SqlitePool (shared across collections)
//! ```

use anyhow::Result;
use async_trait::async_trait;
use scribe_ai_context::ChunkMetadata;
use serde::{Deserialize, Serialize};

pub mod memory_store;
pub mod sqlite_store;

pub use memory_store::MemoryVectorIndex;
pub use sqlite_store::SqliteVectorIndex;

/// One stored chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A query match, ordered by increasing distance.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHit {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
}

/// How distances are measured, and the range they fall in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceMetric {
    /// `1 - cos(a, b)`, in `[0, 2]`
    #[default]
    Cosine,
    /// Squared euclidean distance between unit vectors, in `[0, 4]`
    SquaredL2Unit,
}

impl DistanceMetric {
    /// Upper bound of the distance range.
    pub fn max_distance(&self) -> f32 {
        match self {
            DistanceMetric::Cosine => 2.0,
            DistanceMetric::SquaredL2Unit => 4.0,
        }
    }

    /// Distance between two vectors of equal length.
    ///
    /// A zero vector has no direction; under cosine it sits at distance 1 from
    /// everything.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::Cosine => {
                let mut dot = 0.0f32;
                let mut norm_a = 0.0f32;
                let mut norm_b = 0.0f32;
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                if norm_a == 0.0 || norm_b == 0.0 {
                    1.0
                } else {
                    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
                }
            }
            DistanceMetric::SquaredL2Unit => a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum(),
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(DistanceMetric::Cosine),
            "l2" | "squared-l2" | "squared-l2-unit" => Ok(DistanceMetric::SquaredL2Unit),
            _ => Err(format!(
                "Invalid distance metric: '{s}'. Valid values are: cosine, squared-l2-unit"
            )),
        }
    }
}

/// Brute-force k nearest neighbours over records in insertion order.
///
/// Ties keep insertion order. Records whose dimension differs from the query are
/// an error: mixing vectors from two different embedding models is never useful.
pub(crate) fn nearest<'a, I>(
    metric: DistanceMetric,
    records: I,
    query: &[f32],
    k: usize,
) -> Result<Vec<QueryHit>>
where
    I: IntoIterator<Item = &'a VectorRecord>,
{
    let mut hits = Vec::new();
    for record in records {
        if record.vector.len() != query.len() {
            anyhow::bail!(
                "query dimension {} does not match stored dimension {} (record {})",
                query.len(),
                record.vector.len(),
                record.id
            );
        }
        hits.push(QueryHit {
            id: record.id.clone(),
            text: record.text.clone(),
            metadata: record.metadata.clone(),
            distance: metric.distance(query, &record.vector),
        });
    }

    // Stable sort: equal distances keep insertion order
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits.truncate(k);
    Ok(hits)
}

/// Storage for one document's chunk vectors.
///
/// Implementations serialize their own operations. Rebuilds go through
/// [`VectorIndex::replace_all`], which is the only multi-record operation that
/// must be atomic; ordering against queries comes from the index manager's lock.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace records by id
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// The `k` records nearest to `vector`, by increasing distance
    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>>;

    /// Remove every record
    async fn clear(&self) -> Result<()>;

    /// Replace the whole contents with `records` as one unit.
    ///
    /// On error, or if the future is dropped before it completes, the previous
    /// records must still be in place.
    async fn replace_all(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// Number of stored records
    async fn count(&self) -> Result<usize>;

    /// Metric used by `query`
    fn metric(&self) -> DistanceMetric;
}
