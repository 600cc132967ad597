//! Narrative chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`]: sliding character windows with a fixed overlap
//! - [`RecursiveChunker`]: separator-aware splitting (paragraphs, lines,
//!   sentences, words) merged back up to the chunk size
//!
//! Sizes and overlaps are measured in characters (Unicode scalar values), so
//! a window never splits a code point.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::document::{Chunk, ComplaintRecord};
use crate::error::{RagError, Result};

/// A strategy for splitting narratives into chunks.
///
/// Implementations are pure: the same text always yields the same chunks.
pub trait Chunker: Send + Sync {
    /// Split `text` into ordered chunk texts.
    ///
    /// Returns an empty `Vec` for empty text.
    fn split(&self, text: &str) -> Vec<String>;

    /// Split a record's narrative into [`Chunk`]s numbered from zero.
    fn chunk_record(&self, record: &ComplaintRecord) -> Vec<Chunk> {
        self.split(&record.narrative)
            .into_iter()
            .enumerate()
            .map(|(sequence_index, text)| Chunk {
                parent_id: record.complaint_id.clone(),
                sequence_index,
                text,
            })
            .collect()
    }
}

/// Which [`Chunker`] implementation to build from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    /// [`FixedSizeChunker`].
    #[default]
    Fixed,
    /// [`RecursiveChunker`].
    Recursive,
}

impl ChunkingStrategy {
    /// Build a validated chunker of this kind.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `chunk_size == 0` or
    /// `chunk_overlap >= chunk_size`.
    pub fn build(self, chunk_size: usize, chunk_overlap: usize) -> Result<Box<dyn Chunker>> {
        Ok(match self {
            ChunkingStrategy::Fixed => Box::new(FixedSizeChunker::new(chunk_size, chunk_overlap)?),
            ChunkingStrategy::Recursive => {
                Box::new(RecursiveChunker::new(chunk_size, chunk_overlap)?)
            }
        })
    }
}

/// Reject window parameters whose stride would not be positive.
pub(crate) fn validate_window(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::Config("chunk_size must be greater than zero".to_string()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::Config(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Splits text into fixed-size character windows with a fixed overlap.
///
/// Windows start at offsets `0, stride, 2*stride, ...` where
/// `stride = chunk_size - chunk_overlap`. The window that reaches the end of
/// the text is the last one.
///
/// # Example
///
/// ```rust
/// use complaintbot_rag::{Chunker, FixedSizeChunker};
///
/// let chunker = FixedSizeChunker::new(5, 2).unwrap();
/// assert_eq!(chunker.split("abcdefghij"), ["abcde", "defgh", "ghij"]);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of characters shared by consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `chunk_size == 0` or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_window(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Maximum number of characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of characters shared by consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Chunker for FixedSizeChunker {
    fn split(&self, text: &str) -> Vec<String> {
        char_windows(text, self.chunk_size, self.chunk_overlap)
    }
}

/// Sliding character windows. Callers guarantee `chunk_overlap < chunk_size`.
fn char_windows(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    // byte offset of every char boundary, plus the end of the string
    let bounds: Vec<usize> =
        text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
    let char_len = bounds.len() - 1;
    let stride = chunk_size - chunk_overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(char_len);
        chunks.push(text[bounds[start]..bounds[end]].to_string());
        if end == char_len {
            break;
        }
        start += stride;
    }
    chunks
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Separators tried in order by [`RecursiveChunker`].
const RECURSIVE_SEPARATORS: [&str; 6] = ["\n\n", "\n", ". ", "? ", "! ", " "];

/// Splits text hierarchically: paragraphs → lines → sentences → words → characters.
///
/// The text is cut at the coarsest separator it contains; pieces that still
/// exceed `chunk_size` are cut again with the next separator, and as a last
/// resort into character windows. Adjacent small pieces are then merged into
/// chunks of at most `chunk_size` characters, carrying up to `chunk_overlap`
/// characters of trailing pieces into the next chunk. Chunks are trimmed and
/// empty chunks dropped.
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if `chunk_size == 0` or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_window(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let Some(position) = separators.iter().position(|sep| text.contains(sep)) else {
            return char_windows(text, self.chunk_size, self.chunk_overlap)
                .into_iter()
                .filter_map(|window| non_empty_trimmed(&window))
                .collect();
        };
        let separator = separators[position];
        let finer = &separators[position + 1..];

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) <= self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            chunks.extend(self.split_with(piece, finer));
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    /// Merge pieces no longer than `chunk_size` into overlapping chunks.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                chunks.extend(join_window(&window));
                while total > self.chunk_overlap || (total > 0 && total + len > self.chunk_size) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }

        chunks.extend(join_window(&window));
        chunks
    }
}

impl Chunker for RecursiveChunker {
    fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        self.split_with(text, &RECURSIVE_SEPARATORS)
    }
}

fn join_window(window: &VecDeque<&str>) -> Option<String> {
    let joined: String = window.iter().copied().collect();
    non_empty_trimmed(&joined)
}

fn non_empty_trimmed(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Split text at a separator while keeping the separator attached to the preceding segment.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}
