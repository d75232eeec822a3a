//! Core data models for the ingestion, retrieval, and chat pipeline.
//!
//! | Type | Produced by | Consumed by |
//! |------|-------------|-------------|
//! | [`DocumentChunk`] | ingestion | vector stores |
//! | [`RetrievalResult`] | similarity search | answer providers, handlers |
//! | [`ChatMessage`] | chat pipeline | session store, prompt builders |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A bounded slice of a source markdown file, the unit of indexing.
///
/// Immutable once created. The `id` is derived from the source path and
/// the text, so inserting the same chunk twice is a no-op for stores that
/// key on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    pub id: String,
    pub text: String,
    /// Path relative to the ingestion root, e.g. `core/math.md`.
    pub source_path: String,
    /// Bare file name, e.g. `math.md`.
    pub file_name: String,
    /// Position of this chunk within its file.
    pub chunk_index: usize,
}

impl DocumentChunk {
    pub fn new(text: impl Into<String>, source_path: &str, file_name: &str, index: usize) -> Self {
        let text = text.into();
        Self {
            id: chunk_id(source_path, &text),
            text,
            source_path: source_path.to_string(),
            file_name: file_name.to_string(),
            chunk_index: index,
        }
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source: self.source_path.clone(),
            file: self.file_name.clone(),
        }
    }
}

/// SHA-256 over `source_path \0 text`, hex encoded.
pub fn chunk_id(source_path: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_path.as_bytes());
    hasher.update([0u8]);
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Metadata attached to every indexed chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Relative source path; the value cited back to callers.
    pub source: String,
    pub file: String,
}

/// One similarity search hit, normalised at the index boundary.
///
/// Results are ordered by descending similarity as reported by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub content: String,
    pub metadata: ChunkMetadata,
}

impl RetrievalResult {
    pub fn source(&self) -> &str {
        &self.metadata.source
    }
}

impl From<&DocumentChunk> for RetrievalResult {
    fn from(chunk: &DocumentChunk) -> Self {
        Self {
            content: chunk.text.clone(),
            metadata: chunk.metadata(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single conversational turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            timestamp: Some(Utc::now()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_id_depends_on_source_and_text() {
        let a = chunk_id("a.md", "hello");
        assert_eq!(a, chunk_id("a.md", "hello"));
        assert_ne!(a, chunk_id("b.md", "hello"));
        assert_ne!(a, chunk_id("a.md", "hello!"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = ChatMessage {
            role: Role::Assistant,
            content: "hi".into(),
            timestamp: None,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert!(json.get("timestamp").is_none());
    }
}
