//! Gemini `generateContent` answer provider.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use curriculum_rag_core::models::{ChatMessage, Role};

use super::{make_snippet, AnswerContext, AnswerProvider, ProviderError};
use crate::config::GeminiConfig;

const PROVIDER: &str = "gemini";

const INSTRUCTIONS: &str = "You are a helpful and knowledgeable assistant for the OSSU (Open Source Society University) Computer Science curriculum.

IMPORTANT INSTRUCTIONS:
1. Always provide comprehensive, helpful answers even if the exact information isn't in the provided context
2. Use your knowledge about computer science education to supplement the context
3. For programming language questions, mention ALL languages used in OSSU: Python, JavaScript, C, Java, Haskell, SQL, Scheme/Racket, ML/OCaml, Ruby, etc.
4. For specific course questions like \"Introduction to Programming with Python\", provide details about CS50P from Harvard
5. Don't say \"the document doesn't contain\" - instead provide the best answer you can";

pub struct GeminiProvider {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GeminiProvider {
    pub fn new(api_key: &str, config: &GeminiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut key = HeaderValue::from_str(api_key).context("invalid Gemini API key")?;
        key.set_sensitive(true);
        headers.insert("x-goog-api-key", key);

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()
            .context("failed to build Gemini HTTP client")?;

        let model = config.model.trim_start_matches("models/");
        let endpoint = format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            model
        );

        info!(model, timeout_secs = config.timeout_secs, "Gemini provider configured");
        Ok(Self { client, endpoint })
    }

    /// Send one prompt and return the concatenated candidate text.
    pub async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: PROVIDER,
                source,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| ProviderError::Transport {
            provider: PROVIDER,
            source,
        })?;

        if !status.is_success() {
            return Err(classify_failure(status, &text));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| ProviderError::Decode {
                provider: PROVIDER,
                detail: e.to_string(),
            })?;

        let answer: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if answer.trim().is_empty() {
            return Err(ProviderError::EmptyResponse { provider: PROVIDER });
        }
        Ok(answer)
    }
}

fn classify_failure(status: StatusCode, body: &str) -> ProviderError {
    let snippet = make_snippet(body);
    if status == StatusCode::TOO_MANY_REQUESTS || body.to_lowercase().contains("quota") {
        ProviderError::RateLimited {
            provider: PROVIDER,
            snippet,
        }
    } else {
        ProviderError::HttpStatus {
            provider: PROVIDER,
            status,
            snippet,
        }
    }
}

/// Full prompt: instructions, retrieved context, prior turns, the question.
pub fn build_prompt(query: &str, context_text: &str, history: &[ChatMessage]) -> String {
    let mut prompt = format!("{INSTRUCTIONS}\n\nContext from documentation:\n{context_text}\n\n");

    if !history.is_empty() {
        prompt.push_str("Conversation so far:\n");
        for message in history {
            let speaker = match message.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
            };
            prompt.push_str(&format!("{}: {}\n", speaker, message.content));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "User Question: {query}\n\nPlease provide a clear, concise answer based on the context above. If the answer is not in the context, say so."
    ));
    prompt
}

#[async_trait]
impl AnswerProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn attempt(
        &self,
        query: &str,
        context: &AnswerContext<'_>,
        history: &[ChatMessage],
    ) -> Option<String> {
        let prompt = build_prompt(query, &context.text, history);
        match self.complete(&prompt).await {
            Ok(answer) => Some(answer),
            Err(e @ ProviderError::RateLimited { .. }) => {
                warn!(error = %e, "Gemini quota exceeded, falling back");
                None
            }
            Err(e) => {
                warn!(error = %e, "Gemini failed, falling back");
                None
            }
        }
    }
}
