//! Markdown ingestion: walk → read → chunk.
//!
//! Recursively scans the markdown root for `*.md` files (skipping `.git`
//! and `node_modules`), reads each as UTF-8, and splits it with the
//! recursive chunker. Each chunk carries the file's path relative to the
//! root as its citation `source`.
//!
//! Ingestion is best-effort: unreadable files, non-UTF-8 files, and walk
//! errors are logged and skipped, and a missing root yields no chunks.
//! Files are processed in sorted relative-path order so rebuilding the
//! index from the same tree always produces the same chunk sequence.

use std::path::{Path, PathBuf};

use anyhow::Result;
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use curriculum_rag_core::chunk::chunk_text;
use curriculum_rag_core::models::DocumentChunk;

use crate::config::ChunkingConfig;

const INCLUDE_GLOBS: &[&str] = &["**/*.md"];
const EXCLUDE_GLOBS: &[&str] = &["**/.git/**", "**/node_modules/**"];

/// A markdown file found under the ingestion root.
#[derive(Debug, Clone)]
pub struct MarkdownFile {
    pub path: PathBuf,
    /// Path relative to the root, `/`-separated.
    pub relative: String,
    pub file_name: String,
}

/// List markdown files under `root`, sorted by relative path.
pub fn scan_markdown(root: &Path) -> Result<Vec<MarkdownFile>> {
    let include = build_globset(INCLUDE_GLOBS)?;
    let exclude = build_globset(EXCLUDE_GLOBS)?;

    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        if exclude.is_match(&relative) || !include.is_match(&relative) {
            continue;
        }

        files.push(MarkdownFile {
            path: path.to_path_buf(),
            file_name: entry.file_name().to_string_lossy().to_string(),
            relative,
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

/// Load and chunk every markdown file under `root`.
pub fn load_documents(root: &Path, chunking: &ChunkingConfig) -> Vec<DocumentChunk> {
    if !root.is_dir() {
        warn!(root = %root.display(), "markdown directory does not exist; nothing to ingest");
        return Vec::new();
    }

    let files = match scan_markdown(root) {
        Ok(files) => files,
        Err(e) => {
            warn!(root = %root.display(), error = %e, "failed to scan markdown directory");
            return Vec::new();
        }
    };

    let mut chunks = Vec::new();
    for file in &files {
        let text = match std::fs::read_to_string(&file.path) {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %file.relative, error = %e, "skipping unreadable file");
                continue;
            }
        };

        let pieces = chunk_text(&text, chunking.chunk_size, chunking.chunk_overlap);
        debug!(file = %file.relative, chunks = pieces.len(), "chunked");
        chunks.extend(
            pieces
                .into_iter()
                .enumerate()
                .map(|(i, piece)| DocumentChunk::new(piece, &file.relative, &file.file_name, i)),
        );
    }

    info!(files = files.len(), chunks = chunks.len(), "loaded markdown documents");
    chunks
}

fn build_globset(patterns: &[&str]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn chunking(size: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            chunk_size: size,
            chunk_overlap: overlap,
        }
    }

    #[test]
    fn test_small_files_one_chunk_each() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("core")).unwrap();
        fs::write(tmp.path().join("intro.md"), "# Intro\n\nWelcome to OSSU.").unwrap();
        fs::write(tmp.path().join("core/math.md"), "# Math\n\nCalculus and more.").unwrap();
        fs::write(tmp.path().join("notes.txt"), "not markdown").unwrap();

        let chunks = load_documents(tmp.path(), &chunking(1000, 200));
        assert_eq!(chunks.len(), 2);
        // Sorted by relative path.
        assert_eq!(chunks[0].source_path, "core/math.md");
        assert_eq!(chunks[0].file_name, "math.md");
        assert_eq!(chunks[1].source_path, "intro.md");
        assert_eq!(chunks[1].text, "# Intro\n\nWelcome to OSSU.");
    }

    #[test]
    fn test_excludes_git_and_node_modules() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        fs::create_dir_all(tmp.path().join("web/node_modules/pkg")).unwrap();
        fs::write(tmp.path().join(".git/HEAD.md"), "ignored").unwrap();
        fs::write(tmp.path().join("web/node_modules/pkg/README.md"), "ignored").unwrap();
        fs::write(tmp.path().join("web/guide.md"), "kept").unwrap();

        let files = scan_markdown(tmp.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.relative.as_str()).collect();
        assert_eq!(names, vec!["web/guide.md"]);
    }

    #[test]
    fn test_non_utf8_file_is_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("bad.md"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        fs::write(tmp.path().join("good.md"), "fine").unwrap();

        let chunks = load_documents(tmp.path(), &chunking(1000, 200));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].source_path, "good.md");
    }

    #[test]
    fn test_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let chunks = load_documents(&tmp.path().join("nope"), &chunking(1000, 200));
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_long_file_indexes_chunks_in_order() {
        let tmp = TempDir::new().unwrap();
        let body: String = (0..400).map(|i| format!("word{} ", i)).collect();
        fs::write(tmp.path().join("long.md"), &body).unwrap();

        let chunks = load_documents(tmp.path(), &chunking(200, 50));
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i);
            assert!(c.text.chars().count() <= 200);
        }
    }
}
