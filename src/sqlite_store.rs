//! SQLite-backed [`VectorStore`].
//!
//! Vectors are stored as BLOBs next to their chunk text. Search loads every
//! vector and ranks by cosine similarity in Rust, which is plenty for a
//! curriculum-sized corpus (a few thousand chunks).

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use curriculum_rag_core::embedding::{blob_to_vec, vec_to_blob};
use curriculum_rag_core::models::{ChunkMetadata, RetrievalResult};
use curriculum_rag_core::store::{rank_by_similarity, EmbeddedChunk, VectorStore};

use crate::db;

pub struct SqliteStore {
    pool: SqlitePool,
    /// Model re-recorded in `meta` after a clear.
    model: Option<String>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool, model: None }
    }

    /// Tag the store with the embedding model that will fill it.
    pub fn tagged(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    /// Open or create the index file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(db::connect(path).await?))
    }

    /// Embedding model recorded for the stored vectors, if any.
    pub async fn embedding_model(&self) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM meta WHERE key = 'embedding_model'")
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get("value")))
    }

    pub async fn set_embedding_model(&self, model: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO meta (key, value) VALUES ('embedding_model', ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(model)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorStore for SqliteStore {
    fn kind(&self) -> &'static str {
        "sqlite"
    }

    async fn insert(&self, items: &[EmbeddedChunk]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut added = 0usize;

        for (chunk, vector) in items {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO chunks (id, text, source, file, chunk_index, embedding)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(&chunk.text)
            .bind(&chunk.source_path)
            .bind(&chunk.file_name)
            .bind(chunk.chunk_index as i64)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
            added += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(added)
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<(RetrievalResult, f32)>> {
        let rows = sqlx::query("SELECT text, source, file, embedding FROM chunks ORDER BY rowid")
            .fetch_all(&self.pool)
            .await?;

        let candidates = rows.iter().map(|row| {
            let blob: Vec<u8> = row.get("embedding");
            let result = RetrievalResult {
                content: row.get("text"),
                metadata: ChunkMetadata {
                    source: row.get("source"),
                    file: row.get("file"),
                },
            };
            (result, blob_to_vec(&blob))
        });

        Ok(rank_by_similarity(query, candidates, k))
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }

    async fn clear(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM chunks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM meta").execute(&mut *tx).await?;
        tx.commit().await?;
        if let Some(model) = &self.model {
            self.set_embedding_model(model).await?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
