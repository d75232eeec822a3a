//! Answer generation: an ordered chain of providers with a local fallback.
//!
//! ```text
//!   query + retrieved chunks + history
//!                 │
//!                 ▼
//!   ┌───────────────────────┐  None  ┌──────────────────────────┐  None  ┌──────────────┐
//!   │ Gemini (if key set)   │──────▶│ Hugging Face (if token)  │──────▶│ Template     │
//!   └───────────────────────┘        └──────────────────────────┘        └──────────────┘
//!                 │ Some                        │ Some                          │ always
//!                 ▼                             ▼                               ▼
//!                                       answer text
//! ```
//!
//! Each hosted provider reports failure as `None` after logging a
//! [`ProviderError`]; the orchestrator never surfaces provider errors to
//! callers and always returns text.

pub mod gemini;
pub mod huggingface;
pub mod template;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, info};

use curriculum_rag_core::models::{ChatMessage, RetrievalResult};

use crate::config::Config;

pub use gemini::GeminiProvider;
pub use huggingface::HuggingFaceProvider;
pub use template::TemplateProvider;

// ============ Errors ============

/// Why a hosted provider produced no answer.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 429 or a quota message in the error body.
    #[error("{provider} rate limited or out of quota: {snippet}")]
    RateLimited {
        provider: &'static str,
        snippet: String,
    },

    /// HTTP 503 while the hosted model warms up.
    #[error("{provider} model {model} is still loading")]
    ModelLoading {
        provider: &'static str,
        model: String,
    },

    #[error("{provider} returned HTTP {status}: {snippet}")]
    HttpStatus {
        provider: &'static str,
        status: StatusCode,
        snippet: String,
    },

    #[error("{provider} transport error: {source}")]
    Transport {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} response could not be decoded: {detail}")]
    Decode {
        provider: &'static str,
        detail: String,
    },

    #[error("{provider} returned an empty answer")]
    EmptyResponse { provider: &'static str },
}

/// First 200 characters of an upstream body, whitespace collapsed.
pub(crate) fn make_snippet(body: &str) -> String {
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, 200).to_string()
}

/// Longest prefix of `s` with at most `max` characters.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// ============ Provider trait ============

/// Retrieved material handed to every provider.
#[derive(Debug, Clone)]
pub struct AnswerContext<'a> {
    /// Top results rendered as `From {source}:\n{content}` blocks.
    pub text: String,
    /// The raw results, most similar first.
    pub results: &'a [RetrievalResult],
}

impl<'a> AnswerContext<'a> {
    pub fn new(results: &'a [RetrievalResult], max_chunks: usize, chunk_chars: usize) -> Self {
        Self {
            text: format_context(results, max_chunks, chunk_chars),
            results,
        }
    }
}

/// Render the first `max_chunks` results, each cut to `chunk_chars` characters.
pub fn format_context(results: &[RetrievalResult], max_chunks: usize, chunk_chars: usize) -> String {
    results
        .iter()
        .take(max_chunks)
        .map(|r| {
            let source = match r.source() {
                "" => "Unknown",
                s => s,
            };
            format!("From {}:\n{}", source, truncate_chars(&r.content, chunk_chars))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
pub trait AnswerProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Produce an answer, or `None` to defer to the next provider.
    async fn attempt(
        &self,
        query: &str,
        context: &AnswerContext<'_>,
        history: &[ChatMessage],
    ) -> Option<String>;
}

// ============ Orchestrator ============

pub struct ResponseGenerator {
    providers: Vec<Box<dyn AnswerProvider>>,
    fallback: TemplateProvider,
    context_chunks: usize,
    chunk_chars: usize,
}

impl ResponseGenerator {
    pub fn new(providers: Vec<Box<dyn AnswerProvider>>, context_chunks: usize, chunk_chars: usize) -> Self {
        Self {
            providers,
            fallback: TemplateProvider,
            context_chunks,
            chunk_chars,
        }
    }

    /// Build the chain from configuration. Hosted providers without
    /// credentials are left out; a client that cannot be built is logged
    /// and skipped.
    pub fn from_config(config: &Config) -> Self {
        let mut providers: Vec<Box<dyn AnswerProvider>> = Vec::new();

        let gemini = &config.providers.gemini;
        if let Some(key) = gemini.key() {
            match GeminiProvider::new(key, gemini) {
                Ok(p) => providers.push(Box::new(p)),
                Err(e) => tracing::warn!(error = %e, "Gemini provider disabled"),
            }
        }

        let hf = &config.providers.huggingface;
        if let Some(token) = hf.token() {
            match HuggingFaceProvider::new(token, hf) {
                Ok(p) => providers.push(Box::new(p)),
                Err(e) => tracing::warn!(error = %e, "Hugging Face provider disabled"),
            }
        }

        let generator = Self::new(providers, gemini.context_chunks, gemini.chunk_chars);
        info!(chain = ?generator.chain(), "answer providers ready");
        generator
    }

    /// Provider names in the order they are tried, ending with the fallback.
    pub fn chain(&self) -> Vec<&'static str> {
        self.providers
            .iter()
            .map(|p| p.name())
            .chain(std::iter::once(self.fallback.name()))
            .collect()
    }

    pub async fn generate(
        &self,
        query: &str,
        results: &[RetrievalResult],
        history: &[ChatMessage],
    ) -> String {
        let context = AnswerContext::new(results, self.context_chunks, self.chunk_chars);
        debug!(
            context_items = results.len(),
            history = history.len(),
            "generating answer"
        );

        for provider in &self.providers {
            if let Some(answer) = provider.attempt(query, &context, history).await {
                info!(provider = provider.name(), "answer generated");
                return answer;
            }
        }

        self.fallback.answer(query, &context)
    }
}
