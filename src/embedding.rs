//! Concrete [`Embedder`] implementations and backend selection.
//!
//! | Embedder | When |
//! |----------|------|
//! | [`GeminiEmbedder`] | A Gemini key is configured and a test embedding request succeeds |
//! | `LocalEmbedder` | Otherwise, when built with the `local-embeddings` feature (fastembed) |
//! | [`DisabledEmbedder`] | Neither is available; every call errors, so search degrades to empty |
//!
//! Selection happens once, in [`select_embedder`]. The chosen embedder is
//! shared by ingestion and query-time search for the life of the process.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use curriculum_rag_core::embedding::Embedder;

use crate::config::Config;

// ============ Disabled ============

/// Embedder that always fails; used when no backend could be set up.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("embedding is disabled: no Gemini key and no local model available")
    }
}

// ============ Gemini ============

/// Hosted embeddings via the Gemini `batchEmbedContents` endpoint.
///
/// Documents are embedded with task type `RETRIEVAL_DOCUMENT` and queries
/// with `RETRIEVAL_QUERY`.
pub struct GeminiEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: AtomicUsize,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    pub fn new(api_key: &str, base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(api_key).context("invalid Gemini API key")?;
        key.set_sensitive(true);
        headers.insert("x-goog-api-key", key);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build Gemini HTTP client")?;

        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            dims: AtomicUsize::new(0),
        })
    }

    async fn embed_with_task(&self, texts: &[String], task_type: &str) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<_> = texts
            .iter()
            .map(|t| {
                json!({
                    "model": self.model,
                    "content": { "parts": [{ "text": t }] },
                    "taskType": task_type,
                })
            })
            .collect();

        let url = format!("{}/{}:batchEmbedContents", self.base_url, self.model);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "requests": requests }))
            .send()
            .await
            .context("Gemini embedding request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Gemini embedding API error {}: {}", status, body);
        }

        let parsed: BatchEmbedResponse = response
            .json()
            .await
            .context("invalid Gemini embedding response")?;
        if parsed.embeddings.len() != texts.len() {
            bail!(
                "Gemini returned {} embeddings for {} inputs",
                parsed.embeddings.len(),
                texts.len()
            );
        }

        let vectors: Vec<Vec<f32>> = parsed.embeddings.into_iter().map(|e| e.values).collect();
        if let Some(first) = vectors.first() {
            self.dims.store(first.len(), Ordering::Relaxed);
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims.load(Ordering::Relaxed)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.embed_with_task(texts, "RETRIEVAL_DOCUMENT").await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_task(&[text.to_string()], "RETRIEVAL_QUERY")
            .await?
            .pop()
            .ok_or_else(|| anyhow!("Gemini returned no query embedding"))
    }
}

// ============ Local (fastembed) ============

/// Sentence embeddings computed in-process with fastembed.
///
/// The model is downloaded and loaded on first use, then kept for the life
/// of the embedder. Inference runs on the blocking thread pool.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    name: String,
    model: fastembed::EmbeddingModel,
    dims: usize,
    loaded: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    pub fn new(name: &str) -> Result<Self> {
        let (model, dims) = match name.to_ascii_lowercase().as_str() {
            "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
                (fastembed::EmbeddingModel::AllMiniLML6V2, 384)
            }
            "bge-small-en-v1.5" => (fastembed::EmbeddingModel::BGESmallENV15, 384),
            "bge-base-en-v1.5" => (fastembed::EmbeddingModel::BGEBaseENV15, 768),
            other => bail!(
                "unknown local embedding model '{}'; supported: all-MiniLM-L6-v2, bge-small-en-v1.5, bge-base-en-v1.5",
                other
            ),
        };
        Ok(Self {
            name: name.to_string(),
            model,
            dims,
            loaded: Arc::new(std::sync::Mutex::new(None)),
        })
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let texts = texts.to_vec();
        let model = self.model.clone();
        let loaded = Arc::clone(&self.loaded);

        tokio::task::spawn_blocking(move || {
            let mut guard = loaded
                .lock()
                .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
            if guard.is_none() {
                let created = fastembed::TextEmbedding::try_new(fastembed::InitOptions::new(model))
                    .map_err(|e| anyhow!("failed to initialize local embedding model: {}", e))?;
                *guard = Some(created);
            }
            let embedder = guard
                .as_mut()
                .ok_or_else(|| anyhow!("local embedding model unavailable"))?;
            embedder
                .embed(texts, None)
                .map_err(|e| anyhow!("local embedding failed: {}", e))
        })
        .await?
    }
}

// ============ Selection ============

/// Pick the embedding backend once at startup.
///
/// Never fails: each rejected option is logged and the next one tried.
pub async fn select_embedder(config: &Config) -> Arc<dyn Embedder> {
    if let Some(key) = config.providers.gemini.key() {
        match try_gemini(config, key).await {
            Ok(embedder) => {
                info!(model = embedder.model_name(), dims = embedder.dims(), "using Gemini embeddings");
                return Arc::new(embedder);
            }
            Err(e) => warn!(error = %e, "Gemini embeddings unavailable, falling back to local model"),
        }
    }
    local_or_disabled(config)
}

async fn try_gemini(config: &Config, key: &str) -> Result<GeminiEmbedder> {
    let embedder = GeminiEmbedder::new(
        key,
        &config.providers.gemini.base_url,
        &config.embedding.gemini_model,
        Duration::from_secs(config.embedding.timeout_secs),
    )?;
    let sample = embedder.embed_query("test").await?;
    if sample.is_empty() {
        bail!("Gemini returned an empty test embedding");
    }
    Ok(embedder)
}

#[cfg(feature = "local-embeddings")]
fn local_or_disabled(config: &Config) -> Arc<dyn Embedder> {
    match LocalEmbedder::new(&config.embedding.local_model) {
        Ok(embedder) => {
            info!(model = embedder.model_name(), "using local embeddings");
            Arc::new(embedder)
        }
        Err(e) => {
            warn!(error = %e, "local embeddings unavailable; search is disabled");
            Arc::new(DisabledEmbedder)
        }
    }
}

#[cfg(not(feature = "local-embeddings"))]
fn local_or_disabled(_config: &Config) -> Arc<dyn Embedder> {
    warn!("built without local-embeddings; search is disabled");
    Arc::new(DisabledEmbedder)
}
