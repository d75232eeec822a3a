//! Configuration parsing, environment overrides, and validation.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. Built-in defaults (every section and field has one).
//! 2. An optional TOML file (`--config`, default `./config/crag.toml`).
//! 3. Environment variables, after loading a `.env` file if present.
//!
//! # Example
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8001"
//! cors_origins = ["http://localhost:3000"]
//!
//! [paths]
//! markdown_dir = "./data/markdown_files"
//! index_dir = "./data/index"
//!
//! [chunking]
//! chunk_size = 1000
//! chunk_overlap = 200
//!
//! [retrieval]
//! search_k = 4
//!
//! [providers.gemini]
//! model = "gemini-1.5-flash"
//!
//! [providers.huggingface]
//! models = ["mistralai/Mistral-7B-Instruct-v0.2", "google/flan-t5-large"]
//!
//! [session]
//! history_window = 10
//! ttl_minutes = 30
//! max_sessions = 1000
//! ```
//!
//! # Environment overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `GEMINI_API_KEY` | `providers.gemini.api_key` |
//! | `HF_TOKEN` | `providers.huggingface.token` |
//! | `MARKDOWN_DIR` / `INDEX_DIR` / `UPLOAD_DIR` / `LOG_DIR` | `paths.*` |
//! | `CHUNK_SIZE` / `CHUNK_OVERLAP` | `chunking.*` |
//! | `SEARCH_K` | `retrieval.search_k` |
//! | `BIND_ADDR` | `server.bind` |
//! | `CORS_ORIGINS` | `server.cors_origins` (comma separated) |
//!
//! Credentials that are blank or still hold a `your_..._here` placeholder
//! are treated as unset.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "./config/crag.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub paths: PathsConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub providers: ProvidersConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    /// Allowed CORS origins; `"*"` allows any.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8001".to_string(),
            cors_origins: [
                "http://localhost",
                "http://localhost:3000",
                "http://localhost:8000",
                "http://localhost:8001",
                "http://127.0.0.1:3000",
                "http://127.0.0.1:8000",
                "http://127.0.0.1:8001",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    pub markdown_dir: PathBuf,
    pub index_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            markdown_dir: PathBuf::from("./data/markdown_files"),
            index_dir: PathBuf::from("./data/index"),
            upload_dir: PathBuf::from("./data/uploads"),
            log_dir: PathBuf::from("./logs"),
        }
    }
}

impl PathsConfig {
    /// Location of the persisted SQLite vector index.
    pub fn index_file(&self) -> PathBuf {
        self.index_dir.join("index.sqlite")
    }
}

/// Character-based chunking parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Chunks retrieved per HTTP chat request.
    pub search_k: usize,
    /// Chunks retrieved per WebSocket message.
    pub ws_search_k: usize,
    /// Chunks embedded and inserted per batch when building the index.
    pub insert_batch_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_k: 4,
            ws_search_k: 3,
            insert_batch_size: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Hosted embedding model, used when a Gemini key is configured.
    pub gemini_model: String,
    /// Local fastembed model, used otherwise.
    pub local_model: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            gemini_model: "models/embedding-001".to_string(),
            local_model: "all-MiniLM-L6-v2".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub gemini: GeminiConfig,
    pub huggingface: HuggingFaceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Retrieved chunks included in the prompt.
    pub context_chunks: usize,
    /// Per-chunk character cap inside the prompt.
    pub chunk_chars: usize,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 60,
            context_chunks: 3,
            chunk_chars: 500,
        }
    }
}

impl GeminiConfig {
    pub fn key(&self) -> Option<&str> {
        credential(self.api_key.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HuggingFaceConfig {
    pub token: Option<String>,
    /// Candidate models, tried in rotation.
    pub models: Vec<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_new_tokens: u32,
    pub temperature: f32,
}

impl Default for HuggingFaceConfig {
    fn default() -> Self {
        Self {
            token: None,
            models: vec![
                "mistralai/Mistral-7B-Instruct-v0.2".to_string(),
                "meta-llama/Llama-2-7b-chat-hf".to_string(),
                "google/flan-t5-large".to_string(),
            ],
            base_url: "https://api-inference.huggingface.co/models".to_string(),
            timeout_secs: 30,
            max_new_tokens: 300,
            temperature: 0.7,
        }
    }
}

impl HuggingFaceConfig {
    pub fn token(&self) -> Option<&str> {
        credential(self.token.as_deref())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Most recent messages handed to prompt construction.
    pub history_window: usize,
    /// Idle minutes before a session is purged.
    pub ttl_minutes: u64,
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: 10,
            ttl_minutes: 30,
            max_sessions: 1000,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_minutes * 60)
    }
}

/// Returns the credential unless it is blank or a `your_..._here` placeholder.
pub fn credential(value: Option<&str>) -> Option<&str> {
    let value = value?.trim();
    if value.is_empty() || (value.starts_with("your_") && value.ends_with("_here")) {
        None
    } else {
        Some(value)
    }
}

/// Load `.env`, read the TOML file if it exists, apply environment
/// overrides, and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Apply overrides from `lookup`; blank values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GEMINI_API_KEY") {
            self.providers.gemini.api_key = Some(v);
        }
        if let Some(v) = get("HF_TOKEN") {
            self.providers.huggingface.token = Some(v);
        }
        if let Some(v) = get("MARKDOWN_DIR") {
            self.paths.markdown_dir = PathBuf::from(v);
        }
        if let Some(v) = get("INDEX_DIR") {
            self.paths.index_dir = PathBuf::from(v);
        }
        if let Some(v) = get("UPLOAD_DIR") {
            self.paths.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = get("LOG_DIR") {
            self.paths.log_dir = PathBuf::from(v);
        }
        if let Some(v) = get("CHUNK_SIZE") {
            self.chunking.chunk_size = parse_number("CHUNK_SIZE", &v)?;
        }
        if let Some(v) = get("CHUNK_OVERLAP") {
            self.chunking.chunk_overlap = parse_number("CHUNK_OVERLAP", &v)?;
        }
        if let Some(v) = get("SEARCH_K") {
            self.retrieval.search_k = parse_number("SEARCH_K", &v)?;
        }
        if let Some(v) = get("BIND_ADDR") {
            self.server.bind = v;
        }
        if let Some(v) = get("CORS_ORIGINS") {
            self.server.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunking.chunk_size == 0 {
            bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }
        if self.retrieval.search_k < 1 || self.retrieval.ws_search_k < 1 {
            bail!("retrieval.search_k and retrieval.ws_search_k must be >= 1");
        }
        if self.retrieval.insert_batch_size < 1 {
            bail!("retrieval.insert_batch_size must be >= 1");
        }
        if self.providers.huggingface.models.is_empty() {
            bail!("providers.huggingface.models must list at least one model");
        }
        if self.session.history_window < 1 || self.session.max_sessions < 1 {
            bail!("session.history_window and session.max_sessions must be >= 1");
        }
        Ok(())
    }

    /// Create the markdown, index, upload, and log directories.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            &self.paths.markdown_dir,
            &self.paths.index_dir,
            &self.paths.upload_dir,
            &self.paths.log_dir,
        ] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
        }
        Ok(())
    }

    /// A copy safe to print: credentials replaced by `***` (or `<unset>`).
    pub fn masked(&self) -> Config {
        let mask = |v: Option<&str>| Some(v.map_or("<unset>", |_| "***").to_string());
        let mut copy = self.clone();
        copy.providers.gemini.api_key = mask(self.providers.gemini.key());
        copy.providers.huggingface.token = mask(self.providers.huggingface.token());
        copy
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, value))
}
