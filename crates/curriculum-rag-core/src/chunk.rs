//! Recursive, overlap-aware text chunker.
//!
//! Splits a document into chunks of at most `chunk_size` characters,
//! preferring paragraph breaks, then line breaks, then spaces, and only
//! hard-cutting between characters when no boundary exists in the window.
//! Consecutive chunks carry over a tail of up to `overlap` characters so a
//! sentence cut at a boundary still appears whole in one of them.
//!
//! # Algorithm
//!
//! 1. Pick the first separator from `["\n\n", "\n", " ", ""]` that occurs
//!    in the text (`""` always matches and means "between characters").
//! 2. Split on it and drop empty pieces.
//! 3. Pieces that fit are buffered; an oversized piece flushes the buffer
//!    and is split again with the remaining, finer separators.
//! 4. Buffered pieces are merged greedily: once the next piece would push
//!    the running chunk past `chunk_size`, the chunk is emitted and pieces
//!    are dropped from its front until at most `overlap` characters remain.
//!
//! Lengths are counted in `char`s, never bytes, so multi-byte text is
//! never cut inside a code point.
//!
//! # Example
//!
//! ```rust
//! use curriculum_rag_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("Hello world.\n\nSecond paragraph.", 1000, 200);
//! assert_eq!(chunks.len(), 1);
//! ```

use std::collections::VecDeque;

/// Separators in preference order.
pub const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Split `text` into trimmed, non-empty chunks.
///
/// Whitespace-only input produces no chunks. `overlap` should be smaller
/// than `chunk_size`; configuration validation enforces that upstream.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    RecursiveSplitter::new(chunk_size, overlap).split(text)
}

/// Splitter holding the size parameters.
#[derive(Debug, Clone, Copy)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep));
        let (separator, finer) = match position {
            Some(i) => (separators[i], &separators[i + 1..]),
            None => ("", &[][..]),
        };

        let mut out = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_on(text, separator) {
            if char_len(piece) <= self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                out.extend(self.merge(&pending, separator));
                pending.clear();
            }
            if finer.is_empty() {
                push_trimmed(&mut out, piece);
            } else {
                out.extend(self.split_with(piece, finer));
            }
        }

        if !pending.is_empty() {
            out.extend(self.merge(&pending, separator));
        }
        out
    }

    fn merge(&self, pieces: &[&str], separator: &str) -> Vec<String> {
        let sep_len = char_len(separator);
        let mut docs = Vec::new();
        let mut current: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);
            let joiner = if current.is_empty() { 0 } else { sep_len };

            if total + len + joiner > self.chunk_size && !current.is_empty() {
                push_joined(&mut docs, &current, separator);

                // Shed the front until only the overlap tail is left and the
                // next piece fits.
                while total > self.overlap
                    || (total > 0
                        && total + len + if current.is_empty() { 0 } else { sep_len }
                            > self.chunk_size)
                {
                    let extra = if current.len() > 1 { sep_len } else { 0 };
                    match current.pop_front() {
                        Some((_, first_len)) => total -= first_len + extra,
                        None => break,
                    }
                }
            }

            current.push_back((piece, len));
            total += len + if current.len() > 1 { sep_len } else { 0 };
        }

        push_joined(&mut docs, &current, separator);
        docs
    }
}

fn split_on<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        text.char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect()
    } else {
        text.split(separator).filter(|p| !p.is_empty()).collect()
    }
}

fn push_joined(docs: &mut Vec<String>, current: &VecDeque<(&str, usize)>, separator: &str) {
    if current.is_empty() {
        return;
    }
    let joined = current
        .iter()
        .map(|(piece, _)| *piece)
        .collect::<Vec<_>>()
        .join(separator);
    push_trimmed(docs, &joined);
}

fn push_trimmed(docs: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Longest suffix of `prev` that is also a prefix of `next`, in chars.
    fn shared_overlap(prev: &str, next: &str) -> usize {
        let next_chars: Vec<char> = next.chars().collect();
        (1..=next_chars.len())
            .rev()
            .find(|&n| {
                let head: String = next_chars[..n].iter().collect();
                prev.ends_with(&head)
            })
            .unwrap_or(0)
    }

    fn numbered_words(n: usize) -> String {
        (0..n)
            .map(|i| format!("w{:03}", i))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("Hello, world!", 1000, 200);
        assert_eq!(chunks, vec!["Hello, world!".to_string()]);
    }

    #[test]
    fn test_empty_and_whitespace_text() {
        assert!(chunk_text("", 1000, 200).is_empty());
        assert!(chunk_text("  \n\n \n", 1000, 200).is_empty());
    }

    #[test]
    fn test_paragraphs_under_limit_stay_together() {
        let text = "First paragraph.\n\nSecond paragraph.\n\nThird paragraph.";
        let chunks = chunk_text(text, 1000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let para_a = "a".repeat(60);
        let para_b = "b".repeat(60);
        let text = format!("{}\n\n{}", para_a, para_b);
        let chunks = chunk_text(&text, 80, 10);
        assert_eq!(chunks, vec![para_a, para_b]);
    }

    #[test]
    fn test_falls_back_to_line_then_space() {
        let line_a = format!("{} {}", "x".repeat(30), "y".repeat(30));
        let line_b = "z".repeat(40);
        let text = format!("{}\n{}", line_a, line_b);
        let chunks = chunk_text(&text, 50, 0);
        assert!(chunks.iter().all(|c| c.chars().count() <= 50));
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0], "x".repeat(30));
        assert_eq!(chunks[2], line_b);
    }

    #[test]
    fn test_hard_cut_without_boundaries() {
        let text = "q".repeat(250);
        let chunks = chunk_text(&text, 100, 0);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[2].len(), 50);
    }

    #[test]
    fn test_long_text_chunk_count_and_overlap() {
        let text = numbered_words(300);
        let (size, overlap) = (100, 20);
        let chunks = chunk_text(&text, size, overlap);

        let len = text.chars().count();
        let lower_bound = (len - overlap).div_ceil(size - overlap);
        assert!(
            chunks.len() >= lower_bound,
            "{} chunks, expected at least {}",
            chunks.len(),
            lower_bound
        );

        for c in &chunks {
            assert!(c.chars().count() <= size);
        }
        for pair in chunks.windows(2) {
            let shared = shared_overlap(&pair[0], &pair[1]);
            assert!(shared > 0, "no overlap between {:?} and {:?}", pair[0], pair[1]);
            assert!(shared <= overlap);
        }
        assert!(chunks.last().unwrap().ends_with("w299"));
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘";
        let chunks = chunk_text(text, 8, 2);
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(c.chars().count() <= 8);
        }
    }

    #[test]
    fn test_deterministic() {
        let text = numbered_words(120);
        assert_eq!(chunk_text(&text, 40, 10), chunk_text(&text, 40, 10));
    }
}
