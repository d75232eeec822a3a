//! Vector index adapter.
//!
//! [`VectorIndex`] owns the embedder and the active [`VectorStore`] backend
//! and exposes the small, failure-tolerant surface the rest of the service
//! uses: every operation degrades to an empty or `false` result instead of
//! returning an error, logging the cause. [`VectorIndex::try_search`] is
//! the one fallible variant, for callers that report failures themselves.
//!
//! # Lifecycle
//!
//! ```text
//! new() ──▶ uninitialised ("none")
//!              │ create_or_load(chunks)
//!              ▼
//!        open <index_dir>/index.sqlite ──fail──▶ transient InMemoryStore
//!              │
//!              ▼
//!        empty and chunks supplied? ──▶ embed + insert in batches ──▶ flush
//! ```
//!
//! The backend sits behind a `tokio::sync::RwLock`: searches share it,
//! `clear` and rebuilds take it exclusively.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use curriculum_rag_core::embedding::Embedder;
use curriculum_rag_core::models::{DocumentChunk, RetrievalResult};
use curriculum_rag_core::store::memory::InMemoryStore;
use curriculum_rag_core::store::VectorStore;

use crate::config::Config;
use crate::sqlite_store::SqliteStore;

pub struct VectorIndex {
    embedder: Arc<dyn Embedder>,
    backend: RwLock<Option<Box<dyn VectorStore>>>,
    index_file: PathBuf,
    batch_size: usize,
}

impl VectorIndex {
    pub fn new(embedder: Arc<dyn Embedder>, index_file: PathBuf, batch_size: usize) -> Self {
        Self {
            embedder,
            backend: RwLock::new(None),
            index_file,
            batch_size: batch_size.max(1),
        }
    }

    /// Index at `<index_dir>/index.sqlite` with the configured batch size.
    pub fn from_config(embedder: Arc<dyn Embedder>, config: &Config) -> Self {
        Self::new(
            embedder,
            config.paths.index_file(),
            config.retrieval.insert_batch_size,
        )
    }

    /// Open or create the persistent index, seeding it with `chunks` when
    /// it is empty. Falls back to an empty in-memory index on failure.
    pub async fn create_or_load(&self, chunks: &[DocumentChunk]) {
        let existed = self.index_file.exists();
        let store: Box<dyn VectorStore> = match self.open_sqlite().await {
            Ok(store) => {
                info!(
                    path = %self.index_file.display(),
                    existed,
                    "opened persistent vector index"
                );
                Box::new(store)
            }
            Err(e) => {
                error!(
                    path = %self.index_file.display(),
                    error = %e,
                    "failed to open vector index; using a transient in-memory index"
                );
                *self.backend.write().await = Some(Box::new(InMemoryStore::new()));
                return;
            }
        };

        let existing = store.count().await.unwrap_or(0);
        if existing == 0 && !chunks.is_empty() {
            match self.insert_batched(store.as_ref(), chunks).await {
                Ok(added) => info!(added, "seeded vector index"),
                Err(e) => error!(error = %e, "failed to seed vector index"),
            }
            if let Err(e) = store.flush().await {
                warn!(error = %e, "failed to flush vector index");
            }
        } else if existing == 0 {
            warn!("no documents provided for an empty vector index");
        } else {
            info!(documents = existing, "loaded existing vector index");
        }

        *self.backend.write().await = Some(store);
    }

    async fn open_sqlite(&self) -> Result<SqliteStore> {
        let current = self.embedder.model_name();
        let store = SqliteStore::open(&self.index_file).await?.tagged(current);
        let stored = store.embedding_model().await?;
        if stored.as_deref() != Some(current) {
            if store.count().await? == 0 {
                store.set_embedding_model(current).await?;
            } else {
                warn!(
                    stored = stored.as_deref().unwrap_or("unknown"),
                    current,
                    "index was built with a different embedding model; run `crag rebuild`"
                );
            }
        }
        Ok(store)
    }

    /// Embed and insert `chunks` in batches. Stops at the first failing batch.
    async fn insert_batched(
        &self,
        store: &dyn VectorStore,
        chunks: &[DocumentChunk],
    ) -> Result<usize> {
        let total_batches = chunks.len().div_ceil(self.batch_size);
        let mut added = 0;

        for (i, batch) in chunks.chunks(self.batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embedder.embed(&texts).await?;
            if vectors.len() != batch.len() {
                anyhow::bail!(
                    "embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
            }
            let items: Vec<_> = batch.iter().cloned().zip(vectors).collect();
            added += store.insert(&items).await?;
            info!(batch = i + 1, total_batches, "indexed batch");
        }

        Ok(added)
    }

    /// Top-`k` chunks for `query`, most similar first. Empty on any failure.
    pub async fn similarity_search(&self, query: &str, k: usize) -> Vec<RetrievalResult> {
        match self.try_search(query, k).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "similarity search failed");
                Vec::new()
            }
        }
    }

    /// Like [`similarity_search`](Self::similarity_search), but reports why a
    /// search could not run.
    pub async fn try_search(&self, query: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        if !self.is_initialized().await {
            bail!("vector index not initialized");
        }

        let vector = self
            .embedder
            .embed_query(query)
            .await
            .context("failed to embed query")?;

        let guard = self.backend.read().await;
        let Some(store) = guard.as_ref() else {
            bail!("vector index not initialized");
        };
        let hits = store.search(&vector, k).await?;
        Ok(hits.into_iter().map(|(r, _)| r).collect())
    }

    /// Append chunks; already-indexed chunks are skipped.
    pub async fn add_documents(&self, chunks: &[DocumentChunk]) -> bool {
        let guard = self.backend.read().await;
        let Some(store) = guard.as_ref() else {
            error!("vector index not initialized");
            return false;
        };
        let result = async {
            let added = self.insert_batched(store.as_ref(), chunks).await?;
            store.flush().await?;
            Ok::<_, anyhow::Error>(added)
        }
        .await;

        match result {
            Ok(added) => {
                info!(added, submitted = chunks.len(), "added documents");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to add documents");
                false
            }
        }
    }

    /// Remove every indexed chunk. The index stays usable, empty.
    pub async fn clear(&self) -> bool {
        let guard = self.backend.write().await;
        let Some(store) = guard.as_ref() else {
            return true;
        };
        match store.clear().await {
            Ok(()) => {
                if let Err(e) = store.flush().await {
                    warn!(error = %e, "failed to flush after clear");
                }
                info!("vector index cleared");
                true
            }
            Err(e) => {
                error!(error = %e, "failed to clear vector index");
                false
            }
        }
    }

    /// Clear and re-index under one exclusive lock. Returns chunks added.
    pub async fn rebuild(&self, chunks: &[DocumentChunk]) -> Result<usize> {
        let guard = self.backend.write().await;
        let store = guard
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("vector index not initialized"))?;
        store.clear().await?;
        let added = self.insert_batched(store.as_ref(), chunks).await?;
        store.flush().await?;
        Ok(added)
    }

    pub async fn count(&self) -> usize {
        let guard = self.backend.read().await;
        match guard.as_ref() {
            Some(store) => store.count().await.unwrap_or_else(|e| {
                warn!(error = %e, "failed to count indexed chunks");
                0
            }),
            None => 0,
        }
    }

    pub async fn is_initialized(&self) -> bool {
        self.backend.read().await.is_some()
    }

    /// `"sqlite"`, `"memory"`, or `"none"` before initialisation.
    pub async fn backend_kind(&self) -> &'static str {
        self.backend
            .read()
            .await
            .as_ref()
            .map_or("none", |store| store.kind())
    }

    pub fn embedder_name(&self) -> &str {
        self.embedder.model_name()
    }

    pub fn index_file(&self) -> &Path {
        &self.index_file
    }
}
