//! # Curriculum RAG
//!
//! A retrieval-augmented question answering service over a directory of
//! markdown curriculum documents.
//!
//! Markdown files are split into overlapping chunks, embedded, and stored in
//! a persistent vector index. Each question retrieves the most similar
//! chunks, which are handed with recent conversation history to a chain of
//! answer providers (Gemini, then Hugging Face, then local templates).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │  Markdown   │──▶│  Chunk +    │──▶│ SQLite index │
//! │  directory  │   │  Embed      │   │ (or memory)  │
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                            │ similarity search
//!                      ┌─────────────────────┤
//!                      ▼                     ▼
//!                ┌───────────┐        ┌─────────────┐
//!                │ Providers │──────▶│ HTTP / WS   │
//!                │  chain    │        │ (axum)      │
//!                └───────────┘        └─────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration with environment overrides |
//! | [`telemetry`] | `tracing` subscriber setup |
//! | [`ingest`] | Markdown discovery and chunking |
//! | [`embedding`] | Gemini and local embedders, backend selection |
//! | [`db`] | SQLite connection and schema |
//! | [`sqlite_store`] | Persistent vector store |
//! | [`index`] | Failure-tolerant index adapter |
//! | [`providers`] | Answer provider chain |
//! | [`session`] | In-memory conversation sessions |
//! | [`chat`] | Chat pipeline |
//! | [`server`] | HTTP and WebSocket server |

pub mod chat;
pub mod config;
pub mod db;
pub mod embedding;
pub mod index;
pub mod ingest;
pub mod providers;
pub mod server;
pub mod session;
pub mod sqlite_store;
pub mod telemetry;
