//! Overlapping token-window chunker.
//!
//! Splits normalized document text into windows of `size` whitespace
//! tokens. Each window starts `max(size - overlap, 1)` tokens after the
//! previous one, so consecutive chunks share `overlap` tokens of context.
//!
//! # Algorithm
//!
//! 1. Split the text on whitespace into tokens.
//! 2. Emit `tokens[start..start + size]` joined by single spaces.
//! 3. Advance `start` by the step; stop once `start` reaches the token count.
//!
//! The step is clamped to at least 1, so `overlap >= size` still
//! terminates. Empty text yields no chunks.
//!
//! # Example
//!
//! ```rust
//! use corpus_harness_core::chunk::chunk;
//!
//! let windows: Vec<String> = chunk("a b c d e", 2, 1).collect();
//! assert_eq!(windows, vec!["a b", "b c", "c d", "d e", "e"]);
//! ```

use std::path::Path;

use crate::models::Chunk;

/// Lazy iterator over token windows. Clone it before iterating (or call
/// [`chunk`] again) to replay the sequence.
#[derive(Debug, Clone)]
pub struct TokenWindows<'a> {
    tokens: Vec<&'a str>,
    size: usize,
    step: usize,
    start: usize,
}

impl<'a> TokenWindows<'a> {
    /// Distance between the starts of consecutive windows (always >= 1).
    pub fn step(&self) -> usize {
        self.step
    }
}

impl Iterator for TokenWindows<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.start >= self.tokens.len() {
            return None;
        }
        let end = (self.start + self.size).min(self.tokens.len());
        let window = self.tokens[self.start..end].join(" ");
        self.start += self.step;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.tokens.len().saturating_sub(self.start);
        let n = remaining.div_ceil(self.step);
        (n, Some(n))
    }
}

impl ExactSizeIterator for TokenWindows<'_> {}

/// Split `text` into overlapping windows of `size` tokens.
///
/// A `size` of zero is treated as one token.
pub fn chunk(text: &str, size: usize, overlap: usize) -> TokenWindows<'_> {
    let size = size.max(1);
    TokenWindows {
        tokens: text.split_whitespace().collect(),
        size,
        step: size.saturating_sub(overlap).max(1),
        start: 0,
    }
}

/// Chunk a whole document, tagging each window with its source and index.
pub fn chunk_document(source: &str, text: &str, size: usize, overlap: usize) -> Vec<Chunk> {
    let filename = Path::new(source)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string());

    chunk(text, size, overlap)
        .enumerate()
        .map(|(index, text)| Chunk {
            source: source.to_string(),
            filename: filename.clone(),
            index,
            text,
        })
        .collect()
}
