//! # curriculum-rag core
//!
//! Runtime-free logic shared by the curriculum-rag service: data models,
//! the recursive chunker, the embedder and vector store abstractions, and
//! syllabus extraction helpers.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem I/O. Everything
//! that talks to the outside world lives in the `curriculum-rag` crate.

pub mod chunk;
pub mod embedding;
pub mod models;
pub mod store;
pub mod syllabus;
