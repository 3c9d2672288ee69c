//! End-to-end scenarios through the public API
//!
//! - Index a screenplay and ask about it
//! - Empty and placeholder documents
//! - The three user-facing "no context" situations
//! - A cancelled build leaves no stale "building" status
//! - Persistence through the SQLite vector index

mod common;

use anyhow::Result;
use common::{CountingGateway, three_scene_script};
use scribe_ai_context::DocumentSnapshot;
use scribe_ai_embed::EmbedConfig;
use scribe_ai_retriever::{
    IndexManager, MemoryVectorIndex, QueryCache, RefreshOutcome, Retriever, RetrieverConfig,
    RetrieverError, SearchStatus,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::tempdir;

fn retriever_with(gateway: Arc<CountingGateway>) -> Retriever {
    let manager = Arc::new(IndexManager::new(
        gateway.clone(),
        Arc::new(MemoryVectorIndex::new()),
    ));
    Retriever::new(manager, Arc::new(QueryCache::new(gateway)))
}

#[tokio::test]
async fn test_weather_query_finds_harbour_scene() -> Result<()> {
    let retriever = retriever_with(CountingGateway::new());
    let status = retriever
        .manager()
        .ensure_up_to_date(&three_scene_script())
        .await?;
    assert_eq!(status.chunk_count, 3);

    let results = retriever.retrieve("weather", 2).await?;
    assert_eq!(results.len(), 2);
    assert_eq!(
        results[0].metadata.heading.as_deref(),
        Some("EXT. HARBOUR - NIGHT")
    );
    assert_eq!(results[0].metadata.sequence_number, 1);
    assert_eq!(results[0].metadata.characters, vec!["MARA".to_string()]);
    assert!(results[0].similarity > results[1].similarity);
    Ok(())
}

#[tokio::test]
async fn test_empty_document_has_no_index() -> Result<()> {
    let gateway = CountingGateway::new();
    let retriever = retriever_with(gateway.clone());

    let status = retriever
        .manager()
        .ensure_up_to_date(&DocumentSnapshot::empty())
        .await?;
    assert_eq!(status.outcome, RefreshOutcome::EmptyDocument);
    assert!(!status.ready);

    let err = retriever.retrieve("weather", 2).await.unwrap_err();
    assert!(matches!(err, RetrieverError::IndexUnavailable { .. }));
    assert_eq!(gateway.calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_placeholder_text_is_not_indexed() -> Result<()> {
    let retriever = retriever_with(CountingGateway::new());
    let placeholder = DocumentSnapshot::from_screenplay_text("FADE IN:\n\nINT. ROOM - DAY\n");

    let bundle = retriever
        .retrieve_context(&placeholder, "anything", 3, 1000)
        .await;
    assert!(bundle.is_empty());
    assert_eq!(
        bundle.status.to_string(),
        "index unavailable (last error: none)"
    );
    Ok(())
}

#[tokio::test]
async fn test_context_bundle_for_indexed_script() -> Result<()> {
    let retriever = retriever_with(CountingGateway::new());
    let bundle = retriever
        .retrieve_context(&three_scene_script(), "weather", 2, 4000)
        .await;

    assert_eq!(bundle.status, SearchStatus::Matches { count: 2 });
    assert_eq!(bundle.status.to_string(), "2 relevant scenes found");
    assert!(bundle.text.starts_with("Scene 1: EXT. HARBOUR - NIGHT"));
    Ok(())
}

#[tokio::test]
async fn test_status_while_first_build_is_running() -> Result<()> {
    let gateway = CountingGateway::new();
    gateway.blocking.store(true, Ordering::SeqCst);
    let retriever = Arc::new(retriever_with(gateway.clone()));

    let building = {
        let retriever = Arc::clone(&retriever);
        tokio::spawn(async move {
            retriever
                .manager()
                .ensure_up_to_date(&three_scene_script())
                .await
        })
    };
    while !retriever.manager().is_rebuilding() {
        tokio::task::yield_now().await;
    }

    let bundle = retriever
        .retrieve_context(&three_scene_script(), "weather", 2, 4000)
        .await;
    assert_eq!(bundle.status, SearchStatus::Building);
    assert_eq!(bundle.status.to_string(), "index is being built");

    gateway.blocking.store(false, Ordering::SeqCst);
    gateway.release.notify_one();
    building.await??;
    assert!(retriever.manager().is_ready());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_build_does_not_stick_in_building() -> Result<()> {
    let gateway = CountingGateway::new();
    gateway.blocking.store(true, Ordering::SeqCst);
    let retriever = retriever_with(gateway.clone());

    let cancelled = tokio::time::timeout(
        Duration::from_millis(50),
        retriever.manager().ensure_up_to_date(&three_scene_script()),
    )
    .await;
    assert!(cancelled.is_err());
    assert!(!retriever.manager().is_rebuilding());
    assert!(!retriever.manager().is_ready());

    gateway.blocking.store(false, Ordering::SeqCst);
    let bundle = retriever
        .retrieve_context(&three_scene_script(), "weather", 2, 4000)
        .await;
    assert_ne!(bundle.status, SearchStatus::Building);
    assert_eq!(bundle.status, SearchStatus::Matches { count: 2 });
    Ok(())
}

#[tokio::test]
async fn test_status_after_failed_first_build() -> Result<()> {
    let gateway = CountingGateway::new();
    gateway.set_failing(true);
    let retriever = retriever_with(gateway);

    let bundle = retriever
        .retrieve_context(&three_scene_script(), "weather", 2, 4000)
        .await;
    assert!(bundle.is_empty());
    assert_eq!(
        bundle.status.to_string(),
        "index unavailable (last error: Embedding service unavailable: \
         Embedding service returned 503: service overloaded)"
    );
    Ok(())
}

#[tokio::test]
async fn test_status_when_nothing_matches() -> Result<()> {
    let bundle = scribe_ai_retriever::ContextBundle::assemble(&[], 4000);
    assert_eq!(bundle.status.to_string(), "no relevant matches found");
    Ok(())
}

#[tokio::test]
async fn test_vectors_persist_in_sqlite() -> Result<()> {
    let dir = tempdir()?;
    let config = RetrieverConfig {
        embed: EmbedConfig::hashing(128),
        database_path: Some(dir.path().join("scribe.db")),
        ..RetrieverConfig::default()
    };

    {
        let registry = config.build_registry().await?;
        let context = registry.context("harbour")?;
        context.ensure_up_to_date(&three_scene_script()).await?;
        assert_eq!(context.report().await.stored_vectors, Some(3));
    }

    let registry = config.build_registry().await?;
    let harbour = registry.context("harbour")?;
    let other = registry.context("other")?;
    assert_eq!(harbour.report().await.stored_vectors, Some(3));
    assert_eq!(other.report().await.stored_vectors, Some(0));

    let results = harbour.retrieve("weather", 1).await;
    // A fresh process has no fingerprint yet, so it must refresh before searching
    assert!(matches!(
        results,
        Err(RetrieverError::IndexUnavailable { .. })
    ));
    let status = harbour.ensure_up_to_date(&three_scene_script()).await?;
    assert_eq!(status.outcome, RefreshOutcome::Rebuilt);
    assert_eq!(harbour.retrieve("weather", 1).await?.len(), 1);
    Ok(())
}
