//! In-memory [`VectorStore`] used as the transient fallback index and in tests.
//!
//! Chunks live in a `Vec` behind `std::sync::RwLock`; search is brute-force
//! cosine similarity over every stored vector.

use std::collections::HashSet;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::{DocumentChunk, RetrievalResult};

use super::{rank_by_similarity, EmbeddedChunk, VectorStore};

#[derive(Default)]
struct Inner {
    ids: HashSet<String>,
    entries: Vec<(DocumentChunk, Vec<f32>)>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl VectorStore for InMemoryStore {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, items: &[EmbeddedChunk]) -> Result<usize> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let mut added = 0;
        for (chunk, vector) in items {
            if inner.ids.insert(chunk.id.clone()) {
                inner.entries.push((chunk.clone(), vector.clone()));
                added += 1;
            }
        }
        Ok(added)
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<(RetrievalResult, f32)>> {
        let inner = self.inner.read().map_err(poisoned)?;
        let candidates = inner
            .entries
            .iter()
            .map(|(chunk, v)| (RetrievalResult::from(chunk), v.as_slice()));
        Ok(rank_by_similarity(query, candidates, k))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.inner.read().map_err(poisoned)?.entries.len())
    }

    async fn clear(&self) -> Result<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.ids.clear();
        inner.entries.clear();
        Ok(())
    }
}
