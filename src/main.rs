//! Memo Cache demo
//!
//! Drives a simulated document provider through the cache: thumbnails are
//! prefetched, a burst of concurrent metadata lookups is coalesced, and a
//! deleted document's entries are invalidated.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::future::join_all;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use memo_cache::{spawn_sweep_task, MemoCache, RuntimeConfig, WarmUpItem};

/// Simulated backend latency
const FETCH_LATENCY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Serialize)]
struct DocumentMetadata {
    id: String,
    title: String,
    pages: u32,
}

/// Stand-in for the remote document service.
#[derive(Default)]
struct DocumentProvider {
    fetches: AtomicUsize,
}

impl DocumentProvider {
    async fn metadata(&self, id: &str) -> anyhow::Result<DocumentMetadata> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(FETCH_LATENCY).await;
        if id.is_empty() {
            anyhow::bail!("document id must not be empty");
        }
        Ok(DocumentMetadata {
            id: id.to_string(),
            title: format!("Document {id}"),
            pages: id.len() as u32 * 3,
        })
    }

    async fn thumbnail(&self, key: &str) -> anyhow::Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(FETCH_LATENCY).await;
        Ok(key.bytes().cycle().take(256).collect())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "memo_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Memo Cache demo");

    let config = RuntimeConfig::from_env();
    info!(
        "Configuration loaded: ttl={:?}, max_entries={:?}, max_memory_bytes={:?}, policy={:?}, sweep_interval={:?}",
        config.cache.ttl,
        config.cache.max_entries,
        config.cache.max_memory_bytes,
        config.cache.eviction_policy,
        config.sweep_interval
    );

    let provider = Arc::new(DocumentProvider::default());
    let metadata: MemoCache<DocumentMetadata> = MemoCache::new(config.cache.clone());
    let thumbnails: MemoCache<Vec<u8>> = MemoCache::new(config.cache.clone());

    let metadata_sweep = spawn_sweep_task(metadata.clone(), config.sweep_interval);
    let thumbnail_sweep = spawn_sweep_task(thumbnails.clone(), config.sweep_interval);

    // Viewport comes into view: prefetch the first thumbnails
    let visible: Vec<String> = (1..=8).map(|i| format!("thumbnail:doc{i}")).collect();
    let fetcher = Arc::clone(&provider);
    thumbnails
        .prefetch(visible, move |key| {
            let fetcher = Arc::clone(&fetcher);
            async move { fetcher.thumbnail(&key).await }
        })
        .await
        .context("prefetch task panicked")?;
    info!("Prefetched {} thumbnails", thumbnails.len());

    // Warm metadata for the documents listed on the landing page
    let items = ["doc1", "doc2"].into_iter().map(|id| {
        let fetcher = Arc::clone(&provider);
        WarmUpItem::new(format!("metadata:{id}"), move || async move {
            fetcher.metadata(id).await
        })
    });
    metadata
        .warm_up(items)
        .await
        .context("warm-up task panicked")?;

    // A burst of concurrent lookups for a cold key triggers one fetch
    let before = provider.fetches.load(Ordering::SeqCst);
    let lookups = (0..8).map(|_| {
        let fetcher = Arc::clone(&provider);
        metadata.get(
            "metadata:doc3",
            move || async move { fetcher.metadata("doc3").await },
            None,
        )
    });
    for result in join_all(lookups).await {
        let doc = result?;
        info!("Resolved {} ({} pages)", doc.title, doc.pages);
    }
    info!(
        "Concurrent lookups issued {} backend fetch(es)",
        provider.fetches.load(Ordering::SeqCst) - before
    );

    // Document deleted: drop everything cached about it
    let pattern = "^(thumbnail|metadata):doc1$";
    let removed = metadata.invalidate_pattern(pattern)? + thumbnails.invalidate_pattern(pattern)?;
    info!("Invalidated {} entries for doc1", removed);

    info!(
        "Metadata cache stats: {}",
        serde_json::to_string(&metadata.stats())?
    );
    info!(
        "Thumbnail cache stats: {}",
        serde_json::to_string(&thumbnails.stats())?
    );

    metadata_sweep.abort();
    thumbnail_sweep.abort();
    info!("Demo complete");

    Ok(())
}
