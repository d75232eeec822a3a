//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the seam between the index adapter and a
//! concrete backend (SQLite in the app crate, [`memory::InMemoryStore`]
//! here). Stores hold chunks together with their embeddings and answer
//! nearest-neighbour queries by cosine similarity.
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`insert`](VectorStore::insert) | Add embedded chunks; duplicates by id are ignored |
//! | [`search`](VectorStore::search) | Top-k by descending similarity |
//! | [`count`](VectorStore::count) | Number of stored chunks |
//! | [`clear`](VectorStore::clear) | Drop everything |
//! | [`flush`](VectorStore::flush) | Make prior writes durable |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{DocumentChunk, RetrievalResult};

/// A chunk paired with its embedding, ready for insertion.
pub type EmbeddedChunk = (DocumentChunk, Vec<f32>);

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend label for health output, e.g. `"sqlite"`.
    fn kind(&self) -> &'static str;

    /// Insert chunks. Returns how many were new.
    async fn insert(&self, items: &[EmbeddedChunk]) -> Result<usize>;

    /// Return up to `k` results ordered by descending similarity.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<(RetrievalResult, f32)>>;

    async fn count(&self) -> Result<usize>;

    async fn clear(&self) -> Result<()>;

    /// No-op for backends without buffered writes.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Rank `(item, vector)` candidates against `query` and keep the top `k`.
///
/// Ties keep their insertion order so results are deterministic.
pub fn rank_by_similarity<T, V>(
    query: &[f32],
    candidates: impl IntoIterator<Item = (T, V)>,
    k: usize,
) -> Vec<(T, f32)>
where
    V: AsRef<[f32]>,
{
    let mut scored: Vec<(T, f32)> = candidates
        .into_iter()
        .map(|(item, v)| {
            let score = cosine_similarity(query, v.as_ref());
            (item, score)
        })
        .collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_orders_descending_and_truncates() {
        let query = [1.0, 0.0];
        let candidates = vec![
            ("far", vec![0.0, 1.0]),
            ("near", vec![1.0, 0.1]),
            ("exact", vec![1.0, 0.0]),
        ];
        let ranked = rank_by_similarity(&query, candidates, 2);
        let names: Vec<_> = ranked.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["exact", "near"]);
        assert!(ranked[0].1 >= ranked[1].1);
    }

    #[test]
    fn test_rank_ties_are_stable() {
        let query = [1.0, 0.0];
        let candidates = vec![("a", vec![2.0, 0.0]), ("b", vec![1.0, 0.0])];
        let ranked = rank_by_similarity(&query, candidates, 5);
        assert_eq!(ranked[0].0, "a");
        assert_eq!(ranked[1].0, "b");
    }
}
