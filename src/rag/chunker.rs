//! Sentence-accumulating text chunker.
//!
//! The segmentation is a lossy heuristic with no semantic or structural
//! awareness: text is cut after every sentence terminator (`.` by
//! default, so "3.14" splits too) and sentences are packed greedily into
//! chunks of at most `max_chunk_size` characters. The limit is soft. A
//! sentence longer than the limit becomes its own oversized chunk and is
//! never cut mid-sentence.

use serde::{Deserialize, Serialize};

use super::store::UnitMetadata;
use crate::core::config::RagSettings;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Soft maximum chunk length in characters.
    pub max_chunk_size: usize,
    /// Characters that end a sentence.
    pub terminators: Vec<char>,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            terminators: vec!['.'],
        }
    }
}

impl From<&RagSettings> for ChunkerConfig {
    fn from(settings: &RagSettings) -> Self {
        Self {
            max_chunk_size: settings.chunk_size,
            terminators: settings.sentence_terminators.clone(),
        }
    }
}

/// A chunk produced by the chunker, not yet embedded or persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkDraft {
    pub text: String,
    /// Position of the chunk within its document.
    pub chunk_index: usize,
    pub metadata: UnitMetadata,
}

#[derive(Debug, Clone, Default)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    pub fn new(config: ChunkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Splits with the configured size limit.
    pub fn split(&self, text: &str) -> Vec<ChunkDraft> {
        self.split_with_limit(text, self.config.max_chunk_size)
    }

    /// Splits `text` into chunks of at most `max_chunk_size` characters
    /// (soft limit). Input with no sentence text yields exactly one
    /// empty chunk.
    pub fn split_with_limit(&self, text: &str, max_chunk_size: usize) -> Vec<ChunkDraft> {
        let limit = max_chunk_size.max(1);

        if text.trim().is_empty() {
            return vec![draft(String::new(), 0)];
        }

        let mut chunks = Vec::new();
        let mut buffer = String::new();
        let mut buffer_len = 0usize;

        for sentence in split_sentences(text, &self.config.terminators) {
            let sentence_len = sentence.chars().count();
            if buffer_len > 0 && buffer_len + sentence_len > limit {
                chunks.push(draft(buffer.trim().to_string(), chunks.len()));
                buffer.clear();
                buffer_len = 0;
            }
            buffer.push_str(&sentence);
            buffer_len += sentence_len;
        }

        if !buffer.trim().is_empty() {
            chunks.push(draft(buffer.trim().to_string(), chunks.len()));
        }

        // only terminators, no sentence bodies
        if chunks.is_empty() {
            chunks.push(draft(String::new(), 0));
        }

        chunks
    }
}

fn draft(text: String, chunk_index: usize) -> ChunkDraft {
    ChunkDraft {
        text,
        chunk_index,
        metadata: UnitMetadata::default(),
    }
}

/// Sentences with their terminator kept attached. Leading whitespace is
/// preserved so packed chunks read as the original prose; fragments that
/// are blank apart from a terminator are dropped.
fn split_sentences(text: &str, terminators: &[char]) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if terminators.contains(&ch) {
            let body = &current[..current.len() - ch.len_utf8()];
            if body.trim().is_empty() {
                current.clear();
            } else {
                sentences.push(std::mem::take(&mut current));
            }
        }
    }

    if !current.trim().is_empty() {
        sentences.push(current);
    }

    sentences
}
