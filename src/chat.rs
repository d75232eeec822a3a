//! The chat pipeline: session → retrieval → answer → history.

use std::sync::Arc;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use curriculum_rag_core::models::{ChatMessage, RetrievalResult};

use crate::config::Config;
use crate::index::VectorIndex;
use crate::providers::ResponseGenerator;
use crate::session::SessionStore;

/// Most citations returned with an answer.
pub const MAX_SOURCES: usize = 3;

pub const SUGGESTED_QUESTIONS: [&str; 8] = [
    "What is OSSU?",
    "Which programming languages are taught?",
    "How long does the curriculum take to complete?",
    "What are the prerequisites?",
    "Tell me about the Core CS courses",
    "What mathematics courses are included?",
    "How is OSSU different from a traditional CS degree?",
    "What projects will I build?",
];

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub response: String,
    pub sources: Vec<String>,
    pub session_id: String,
}

pub struct ChatService {
    index: Arc<VectorIndex>,
    generator: ResponseGenerator,
    sessions: SessionStore,
    search_k: usize,
}

impl ChatService {
    pub fn new(
        index: Arc<VectorIndex>,
        generator: ResponseGenerator,
        sessions: SessionStore,
        search_k: usize,
    ) -> Self {
        Self {
            index,
            generator,
            sessions,
            search_k,
        }
    }

    pub fn from_config(index: Arc<VectorIndex>, config: &Config) -> Self {
        Self::new(
            index,
            ResponseGenerator::from_config(config),
            SessionStore::new(&config.session),
            config.retrieval.search_k,
        )
    }

    /// Answer `message` in the given session (a new one when `None`).
    pub async fn answer(&self, message: &str, session_id: Option<&str>) -> Result<AnswerPayload> {
        let message = message.trim();
        if message.is_empty() {
            bail!("message must not be empty");
        }

        let (session_id, history) = self.sessions.get_or_create(session_id);
        let results = self.index.similarity_search(message, self.search_k).await;
        info!(
            session_id = %session_id,
            retrieved = results.len(),
            history = history.len(),
            "processing chat message"
        );

        let response = self.generator.generate(message, &results, &history).await;

        self.sessions.append(&session_id, ChatMessage::user(message));
        self.sessions
            .append(&session_id, ChatMessage::assistant(response.clone()));

        Ok(AnswerPayload {
            response,
            sources: unique_sources(&results, MAX_SOURCES),
            session_id,
        })
    }

    pub fn clear_session(&self, session_id: &str) {
        if self.sessions.delete(session_id) {
            info!(session_id, "session cleared");
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn provider_chain(&self) -> Vec<&'static str> {
        self.generator.chain()
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }
}

/// Distinct non-empty sources in rank order, at most `limit`.
pub fn unique_sources(results: &[RetrievalResult], limit: usize) -> Vec<String> {
    let mut sources: Vec<String> = Vec::new();
    for result in results {
        let source = result.metadata.source.as_str();
        if source.is_empty() || sources.iter().any(|s| s == source) {
            continue;
        }
        sources.push(source.to_string());
        if sources.len() == limit {
            break;
        }
    }
    sources
}
