//! Fixed-size overlapping chunker.
//!
//! Splits a normalized document into chunks of `chunk_size` characters with
//! `overlap` characters shared between consecutive chunks. Offsets advance by
//! `chunk_size - overlap`; the final chunk may be shorter. Offsets and
//! lengths count characters of the normalized text, not bytes, so chunk
//! spans tile the document exactly regardless of encoding.

use crate::errors::{RagError, Result};
use crate::types::{Chunk, NormalizedDocument};

/// Lazy iterator over the chunks of one document.
///
/// Cheap to clone; cloning restarts iteration from the beginning.
#[derive(Debug, Clone)]
pub struct ChunkIter {
    chars: Vec<char>,
    source: String,
    metadata: std::collections::HashMap<String, String>,
    chunk_size: usize,
    stride: usize,
    pos: usize,
    done: bool,
}

impl Iterator for ChunkIter {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done || self.pos >= self.chars.len() {
            return None;
        }

        let end = (self.pos + self.chunk_size).min(self.chars.len());
        let text: String = self.chars[self.pos..end].iter().collect();

        let chunk = Chunk {
            // Deterministic id: re-chunking the same document yields the same
            // ids, which makes re-indexing idempotent.
            id: format!("{}:{}", self.source, self.pos),
            text,
            source: self.source.clone(),
            offset: self.pos,
            length: end - self.pos,
            metadata: self.metadata.clone(),
        };

        if end == self.chars.len() {
            self.done = true;
        } else {
            self.pos += self.stride;
        }

        Some(chunk)
    }
}

/// Split a document into overlapping chunks.
///
/// Fails with a configuration error when `chunk_size` is zero or
/// `overlap >= chunk_size` (the window would never advance).
pub fn split(document: &NormalizedDocument, chunk_size: usize, overlap: usize) -> Result<ChunkIter> {
    if chunk_size == 0 {
        return Err(RagError::Configuration(
            "chunk_size must be > 0".to_string(),
        ));
    }
    if overlap >= chunk_size {
        return Err(RagError::Configuration(format!(
            "overlap ({}) must be < chunk_size ({})",
            overlap, chunk_size
        )));
    }

    Ok(ChunkIter {
        chars: document.text.chars().collect(),
        source: document.source.clone(),
        metadata: document.metadata.clone(),
        chunk_size,
        stride: chunk_size - overlap,
        pos: 0,
        done: false,
    })
}
