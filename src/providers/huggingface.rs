//! Hugging Face Inference API provider with model rotation.
//!
//! The cursor survives across requests: a model that failed last time is
//! not the first one tried next time.

use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use curriculum_rag_core::models::ChatMessage;

use super::{make_snippet, truncate_chars, AnswerContext, AnswerProvider, ProviderError};
use crate::config::HuggingFaceConfig;

const PROVIDER: &str = "huggingface";

pub struct HuggingFaceProvider {
    client: reqwest::Client,
    base_url: String,
    models: Vec<String>,
    cursor: AtomicUsize,
    max_new_tokens: u32,
    temperature: f32,
}

impl HuggingFaceProvider {
    pub fn new(token: &str, config: &HuggingFaceConfig) -> Result<Self> {
        if config.models.is_empty() {
            bail!("no Hugging Face models configured");
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", token))
            .context("invalid Hugging Face token")?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .context("failed to build Hugging Face HTTP client")?;

        info!(models = ?config.models, "Hugging Face provider configured");
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            models: config.models.clone(),
            cursor: AtomicUsize::new(0),
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
        })
    }

    /// Model the next request starts with.
    pub fn current_model(&self) -> &str {
        &self.models[self.cursor.load(Ordering::Relaxed) % self.models.len()]
    }

    fn advance(&self, from: usize) {
        let next = (from + 1) % self.models.len();
        // Lose the race quietly if another request already moved on.
        let _ = self
            .cursor
            .compare_exchange(from, next, Ordering::Relaxed, Ordering::Relaxed);
    }

    async fn query_model(&self, model: &str, prompt: &str) -> Result<String, ProviderError> {
        let payload = json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": self.max_new_tokens,
                "temperature": self.temperature,
                "do_sample": true,
                "return_full_text": false,
            }
        });

        let response = self
            .client
            .post(format!("{}/{}", self.base_url, model))
            .json(&payload)
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: PROVIDER,
                source,
            })?;

        let status = response.status();
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(ProviderError::ModelLoading {
                provider: PROVIDER,
                model: model.to_string(),
            });
        }

        let body = response.text().await.map_err(|source| ProviderError::Transport {
            provider: PROVIDER,
            source,
        })?;
        if !status.is_success() {
            return Err(ProviderError::HttpStatus {
                provider: PROVIDER,
                status,
                snippet: make_snippet(&body),
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|e| ProviderError::Decode {
            provider: PROVIDER,
            detail: e.to_string(),
        })?;
        extract_generated_text(&value).ok_or(ProviderError::EmptyResponse { provider: PROVIDER })
    }
}

/// Prompt shape depends on the model family.
pub fn build_prompt(model: &str, query: &str, context_text: &str) -> String {
    let lower = model.to_lowercase();
    if lower.contains("mistral") || lower.contains("llama") {
        format!(
            "[INST] You are a helpful assistant. Based on this context:\n{}\n\nAnswer this question: {} [/INST]",
            truncate_chars(context_text, 1000),
            query
        )
    } else {
        format!(
            "Answer based on context. Context: {} Question: {} Answer:",
            truncate_chars(context_text, 500),
            query
        )
    }
}

/// `generated_text` from either a list response or a single object, trimmed.
fn extract_generated_text(value: &Value) -> Option<String> {
    let item = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let text = item.get("generated_text")?.as_str()?.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[async_trait]
impl AnswerProvider for HuggingFaceProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn attempt(
        &self,
        query: &str,
        context: &AnswerContext<'_>,
        _history: &[ChatMessage],
    ) -> Option<String> {
        // Each model is tried once per request, whatever concurrent requests
        // do to the shared cursor meanwhile.
        let len = self.models.len();
        let start = self.cursor.load(Ordering::Relaxed) % len;
        for offset in 0..len {
            let index = (start + offset) % len;
            let model = &self.models[index];
            debug!(model = %model, "trying Hugging Face model");

            let prompt = build_prompt(model, query, &context.text);
            match self.query_model(model, &prompt).await {
                Ok(answer) => return Some(answer),
                Err(e) => {
                    warn!(model = %model, error = %e, "Hugging Face model failed, rotating");
                    self.advance(index);
                }
            }
        }
        None
    }
}
