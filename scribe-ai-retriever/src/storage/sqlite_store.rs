//! SQLite implementation of the vector index
//!
//! All documents share one database file; each document's records live in their
//! own collection (a value of the `collection` column). Similarity search is
//! brute force: the collection's vectors are loaded and scored in memory, which
//! is plenty for the few hundred scenes of a screenplay.
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE vectors (
//!     collection TEXT NOT NULL,        -- one per document
//!     id TEXT NOT NULL,                -- chunk id
//!     content TEXT NOT NULL,           -- chunk text
//!     metadata TEXT NOT NULL,          -- ChunkMetadata as JSON
//!     embedding BLOB NOT NULL,         -- f32 vector, native byte order
//!     PRIMARY KEY (collection, id)
//! );
//! ```
//!
//! Rows are read back in rowid order so ties in distance keep insertion order.

use super::{DistanceMetric, QueryHit, VectorIndex, VectorRecord, nearest};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::path::Path;

/// SQLite-backed [`VectorIndex`] for one collection.
#[derive(Clone, Debug)]
pub struct SqliteVectorIndex {
    pool: SqlitePool,
    collection: String,
    metric: DistanceMetric,
}

impl SqliteVectorIndex {
    /// Opens (or creates) a database file and binds to one collection.
    pub async fn open(db_path: &Path, collection: impl Into<String>) -> Result<Self> {
        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(db_path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(std::time::Duration::from_secs(5))
                .create_if_missing(true),
        )
        .await
        .with_context(|| format!("opening vector database {}", db_path.display()))?;
        Self::new_with_pool(pool, collection).await
    }

    /// Opens an in-memory database, for tests and one-shot runs.
    pub async fn open_memory(collection: impl Into<String>) -> Result<Self> {
        // Every connection to :memory: is a separate database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        Self::new_with_pool(pool, collection).await
    }

    async fn new_with_pool(pool: SqlitePool, collection: impl Into<String>) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self {
            pool,
            collection: collection.into(),
            metric: DistanceMetric::Cosine,
        })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vectors (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL,
                embedding BLOB NOT NULL,
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Another collection in the same database.
    pub fn for_collection(&self, collection: impl Into<String>) -> Self {
        Self {
            pool: self.pool.clone(),
            collection: collection.into(),
            metric: self.metric,
        }
    }

    pub fn with_metric(self, metric: DistanceMetric) -> Self {
        Self { metric, ..self }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Every collection that currently holds records.
    pub async fn collections(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT collection FROM vectors ORDER BY collection")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("collection")).collect())
    }

    async fn insert_records(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        records: &[VectorRecord],
    ) -> Result<()> {
        for record in records {
            let metadata = serde_json::to_string(&record.metadata)?;
            sqlx::query(
                r#"
                INSERT INTO vectors (collection, id, content, metadata, embedding)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    content = excluded.content,
                    metadata = excluded.metadata,
                    embedding = excluded.embedding
                "#,
            )
            .bind(&self.collection)
            .bind(&record.id)
            .bind(&record.text)
            .bind(metadata)
            .bind(encode_vector(&record.vector))
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn load_records(&self) -> Result<Vec<VectorRecord>> {
        let rows = sqlx::query(
            "SELECT id, content, metadata, embedding FROM vectors
             WHERE collection = ?
             ORDER BY rowid",
        )
        .bind(&self.collection)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let metadata: String = row.get("metadata");
            let embedding: Vec<u8> = row.get("embedding");
            records.push(VectorRecord {
                metadata: serde_json::from_str(&metadata)
                    .with_context(|| format!("decoding metadata of {id}"))?,
                vector: decode_vector(&embedding).with_context(|| format!("decoding {id}"))?,
                text: row.get("content"),
                id,
            });
        }
        Ok(records)
    }
}

fn encode_vector(vector: &[f32]) -> &[u8] {
    bytemuck::cast_slice(vector)
}

fn decode_vector(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % std::mem::size_of::<f32>() != 0 {
        anyhow::bail!("embedding blob of {} bytes is not a whole f32 vector", bytes.len());
    }
    // Blob buffers carry no alignment guarantee, so copy instead of casting in place
    Ok(bytemuck::allocation::pod_collect_to_vec::<u8, f32>(bytes))
}

#[async_trait]
impl VectorIndex for SqliteVectorIndex {
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        self.insert_records(&mut tx, &records).await?;
        tx.commit().await?;
        tracing::debug!(
            "Upserted {} vectors into collection {}",
            records.len(),
            self.collection
        );
        Ok(())
    }

    async fn replace_all(&self, records: Vec<VectorRecord>) -> Result<()> {
        // Dropping an uncommitted transaction rolls it back
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM vectors WHERE collection = ?")
            .bind(&self.collection)
            .execute(&mut *tx)
            .await?;
        self.insert_records(&mut tx, &records).await?;
        tx.commit().await?;
        tracing::debug!(
            "Replaced collection {} with {} vectors",
            self.collection,
            records.len()
        );
        Ok(())
    }

    async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<QueryHit>> {
        let records = self.load_records().await?;
        nearest(self.metric, &records, vector, k)
    }

    async fn clear(&self) -> Result<()> {
        let result = sqlx::query("DELETE FROM vectors WHERE collection = ?")
            .bind(&self.collection)
            .execute(&self.pool)
            .await?;
        tracing::debug!(
            "Cleared {} vectors from collection {}",
            result.rows_affected(),
            self.collection
        );
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM vectors WHERE collection = ?")
            .bind(&self.collection)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.get("n");
        Ok(count as usize)
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }
}
