//! One semantic context per open document.
//!
//! Each document gets its own [`IndexManager`] (and so its own lock and its own
//! vector collection); all documents share one embedding gateway and one query
//! cache. Rebuilding one screenplay never blocks queries against another.

use crate::error::Result;
use crate::retrieval::context_bundle::ContextBundle;
use crate::retrieval::index_manager::{IndexManager, IndexManagerConfig, IndexStatus};
use crate::retrieval::query_cache::QueryCache;
use crate::retrieval::retriever::{RetrievalResult, Retriever};
use crate::status::IndexReport;
use crate::storage::VectorIndex;
use scribe_ai_context::{DocumentSnapshot, DocumentSource};
use scribe_ai_embed::EmbeddingGateway;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Creates the vector index for a newly opened document.
pub type IndexFactory = Arc<dyn Fn(&str) -> anyhow::Result<Arc<dyn VectorIndex>> + Send + Sync>;

/// Index manager and retriever for a single document.
pub struct SemanticContext {
    document_id: String,
    retriever: Retriever,
}

impl SemanticContext {
    pub fn new(document_id: impl Into<String>, retriever: Retriever) -> Self {
        Self {
            document_id: document_id.into(),
            retriever,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn manager(&self) -> &Arc<IndexManager> {
        self.retriever.manager()
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn ensure_up_to_date(&self, snapshot: &DocumentSnapshot) -> Result<IndexStatus> {
        self.manager().ensure_up_to_date(snapshot).await
    }

    pub async fn refresh_from(&self, source: &dyn DocumentSource) -> Result<IndexStatus> {
        self.manager().refresh_from(source).await
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        self.retriever.retrieve(query, k).await
    }

    pub async fn retrieve_context(
        &self,
        snapshot: &DocumentSnapshot,
        query: &str,
        k: usize,
        char_budget: usize,
    ) -> ContextBundle {
        self.retriever
            .retrieve_context(snapshot, query, k, char_budget)
            .await
    }

    pub async fn clear_index(&self) -> Result<()> {
        self.manager().clear_index().await
    }

    pub fn clear_query_cache(&self) {
        self.retriever.query_cache().clear();
    }

    /// Snapshot of index and cache state. Waits for a running rebuild.
    pub async fn report(&self) -> IndexReport {
        let manager = self.manager();
        let state = manager.state().await;
        let cache = self.retriever.query_cache();
        IndexReport {
            stored_vectors: manager.index().count().await.ok(),
            query_cache_entries: cache.len(),
            query_cache_hits: cache.hits(),
            query_cache_misses: cache.misses(),
            ..IndexReport::from_state(&self.document_id, &state, manager.is_rebuilding())
        }
    }
}

/// Hands out one [`SemanticContext`] per document id.
pub struct DocumentRegistry {
    gateway: Arc<dyn EmbeddingGateway>,
    cache: Arc<QueryCache>,
    index_factory: IndexFactory,
    manager_config: IndexManagerConfig,
    contexts: Mutex<HashMap<String, Arc<SemanticContext>>>,
}

impl DocumentRegistry {
    pub fn new(
        gateway: Arc<dyn EmbeddingGateway>,
        cache: Arc<QueryCache>,
        index_factory: IndexFactory,
    ) -> Self {
        Self {
            gateway,
            cache,
            index_factory,
            manager_config: IndexManagerConfig::default(),
            contexts: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_manager_config(mut self, config: IndexManagerConfig) -> Self {
        self.manager_config = config;
        self
    }

    /// The context for `document_id`, created on first use.
    pub fn context(&self, document_id: &str) -> anyhow::Result<Arc<SemanticContext>> {
        let mut contexts = self
            .contexts
            .lock()
            .map_err(|_| anyhow::anyhow!("document registry lock poisoned"))?;
        if let Some(context) = contexts.get(document_id) {
            return Ok(Arc::clone(context));
        }

        let index = (self.index_factory)(document_id)?;
        let manager = Arc::new(IndexManager::with_config(
            Arc::clone(&self.gateway),
            index,
            self.manager_config.clone(),
        ));
        let context = Arc::new(SemanticContext::new(
            document_id,
            Retriever::new(manager, Arc::clone(&self.cache)),
        ));
        contexts.insert(document_id.to_string(), Arc::clone(&context));
        info!("Opened semantic context for document {}", document_id);
        Ok(context)
    }

    /// Forget a document. Its stored vectors are left alone.
    pub fn close(&self, document_id: &str) -> bool {
        let removed = self
            .contexts
            .lock()
            .map(|mut contexts| contexts.remove(document_id).is_some())
            .unwrap_or(false);
        if removed {
            info!("Closed semantic context for document {}", document_id);
        }
        removed
    }

    pub fn document_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .contexts
            .lock()
            .map(|contexts| contexts.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    pub fn query_cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn clear_query_cache(&self) {
        self.cache.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryVectorIndex;
    use scribe_ai_context::{LineType, ScriptLine};
    use scribe_ai_embed::HashingEmbedProvider;

    fn registry() -> DocumentRegistry {
        let gateway: Arc<dyn EmbeddingGateway> = Arc::new(HashingEmbedProvider::new(64));
        let cache = Arc::new(QueryCache::new(Arc::clone(&gateway)));
        DocumentRegistry::new(
            gateway,
            cache,
            Arc::new(|_| Ok(Arc::new(MemoryVectorIndex::new()) as Arc<dyn VectorIndex>)),
        )
    }

    fn doc(place: &str) -> DocumentSnapshot {
        DocumentSnapshot::new(vec![
            ScriptLine::new(LineType::Heading, format!("INT. {place} - DAY")),
            ScriptLine::new(
                LineType::Action,
                "Sunlight through dusty blinds. A ceiling fan turns slowly above an \
                 empty desk covered in unpaid bills and cold coffee. \
                 Somewhere below, a radio plays an old song.",
            ),
        ])
    }

    #[tokio::test]
    async fn test_same_id_same_context() -> anyhow::Result<()> {
        let registry = registry();
        let a = registry.context("pilot")?;
        let b = registry.context("pilot")?;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.document_ids(), vec!["pilot".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_documents_are_independent() -> anyhow::Result<()> {
        let registry = registry();
        let pilot = registry.context("pilot")?;
        let finale = registry.context("finale")?;

        pilot.ensure_up_to_date(&doc("OFFICE")).await?;
        assert!(pilot.report().await.ready);
        assert!(!finale.report().await.ready);

        finale.ensure_up_to_date(&doc("GARAGE")).await?;
        pilot.clear_index().await?;
        assert!(!pilot.report().await.ready);
        assert_eq!(finale.report().await.stored_vectors, Some(1));
        Ok(())
    }

    #[tokio::test]
    async fn test_query_cache_is_shared() -> anyhow::Result<()> {
        let registry = registry();
        let pilot = registry.context("pilot")?;
        let finale = registry.context("finale")?;
        pilot.ensure_up_to_date(&doc("OFFICE")).await?;
        finale.ensure_up_to_date(&doc("GARAGE")).await?;

        pilot.retrieve("ceiling fan", 1).await?;
        finale.retrieve("ceiling fan", 1).await?;
        assert_eq!(registry.query_cache().misses(), 1);
        assert_eq!(registry.query_cache().hits(), 1);

        registry.clear_query_cache();
        assert!(registry.query_cache().is_empty());
        Ok(())
    }

    #[test]
    fn test_close_forgets_document() {
        let registry = registry();
        assert!(registry.context("pilot").is_ok());
        assert!(registry.close("pilot"));
        assert!(!registry.close("pilot"));
        assert!(registry.document_ids().is_empty());
    }
}
