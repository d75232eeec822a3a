#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tempfile::TempDir;

use curriculum_rag::chat::ChatService;
use curriculum_rag::config::Config;
use curriculum_rag::index::VectorIndex;
use curriculum_rag::ingest::load_documents;
use curriculum_rag::providers::ResponseGenerator;
use curriculum_rag::session::SessionStore;
use curriculum_rag_core::embedding::Embedder;

/// Deterministic embedder: one dimension per keyword, valued by occurrence count.
pub struct KeywordEmbedder;

const KEYWORDS: &[&str] = &[
    "python", "math", "calculus", "algebra", "systems", "network", "security", "ossu",
];

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword-test"
    }

    fn dims(&self) -> usize {
        KEYWORDS.len()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                KEYWORDS
                    .iter()
                    .map(|k| lower.matches(k).count() as f32)
                    .collect()
            })
            .collect())
    }
}

/// Embedder whose backend is unreachable: every call fails.
pub struct OfflineEmbedder;

#[async_trait]
impl Embedder for OfflineEmbedder {
    fn model_name(&self) -> &str {
        "offline-test"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("embedding backend offline")
    }
}

pub fn write_corpus(dir: &Path) {
    fs::create_dir_all(dir.join("extras")).unwrap();
    fs::write(
        dir.join("README.md"),
        "# OSSU Computer Science\n\nOSSU is a free, self-taught education in computer science.\n\nStart with Python in the introductory courses.",
    )
    .unwrap();
    fs::write(
        dir.join("math.md"),
        "# Core Math\n\n| Courses | Duration | Effort |\n| :-- | :--: | :--: |\n| [Calculus 1A](https://example.com/calc) | 13 weeks | 6-10 hours/week |\n| Linear Algebra | 15 weeks | 8 hours/week |\n\nCalculus and algebra are the math foundations.",
    )
    .unwrap();
    fs::write(
        dir.join("extras").join("systems.md"),
        "# Core Systems\n\nSystems courses cover network programming and security basics.",
    )
    .unwrap();
    fs::write(dir.join("notes.txt"), "python python python").unwrap();
}

/// Config rooted in `tmp` with a markdown corpus already written.
pub fn test_config(tmp: &TempDir) -> Config {
    let root = tmp.path();
    let mut cfg = Config::default();
    cfg.paths.markdown_dir = root.join("markdown");
    cfg.paths.index_dir = root.join("index");
    cfg.paths.upload_dir = root.join("uploads");
    cfg.paths.log_dir = root.join("logs");
    cfg.server.bind = "127.0.0.1:0".to_string();
    cfg.server.cors_origins = vec!["*".to_string()];
    write_corpus(&cfg.paths.markdown_dir);
    cfg
}

/// Seeded index over the test corpus.
pub async fn seeded_index(cfg: &Config) -> Arc<VectorIndex> {
    let chunks = load_documents(&cfg.paths.markdown_dir, &cfg.chunking);
    let index = Arc::new(VectorIndex::from_config(Arc::new(KeywordEmbedder), cfg));
    index.create_or_load(&chunks).await;
    index
}

/// Chat service that answers from templates only.
pub fn template_chat(index: Arc<VectorIndex>, cfg: &Config) -> ChatService {
    ChatService::new(
        index,
        ResponseGenerator::new(Vec::new(), 3, 500),
        SessionStore::new(&cfg.session),
        cfg.retrieval.search_k,
    )
}
