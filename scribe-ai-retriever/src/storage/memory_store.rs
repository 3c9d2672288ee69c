//! In-process vector index

use super::{DistanceMetric, QueryHit, VectorIndex, VectorRecord, nearest};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::sync::RwLock;

/// Vector index held in memory, lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryVectorIndex {
    records: RwLock<Vec<VectorRecord>>,
    metric: DistanceMetric,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metric(metric: DistanceMetric) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            metric,
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        let mut stored = self
            .records
            .write()
            .map_err(|_| anyhow!("memory index lock poisoned"))?;
        for record in records {
            match stored.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => stored.push(record),
            }
        }
        Ok(())
    }

    async fn replace_all(&self, records: Vec<VectorRecord>) -> Result<()> {
        let mut replacement: Vec<VectorRecord> = Vec::with_capacity(records.len());
        for record in records {
            match replacement.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => replacement.push(record),
            }
        }
        *self
            .records
            .write()
            .map_err(|_| anyhow!("memory index lock poisoned"))? = replacement;
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>> {
        let stored = self
            .records
            .read()
            .map_err(|_| anyhow!("memory index lock poisoned"))?;
        nearest(self.metric, stored.iter(), vector, k)
    }

    async fn clear(&self) -> Result<()> {
        self.records
            .write()
            .map_err(|_| anyhow!("memory index lock poisoned"))?
            .clear();
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self
            .records
            .read()
            .map_err(|_| anyhow!("memory index lock poisoned"))?
            .len())
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }
}
