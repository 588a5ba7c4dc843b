//! Grounding context assembly.
//!
//! Takes workspace-filtered candidates (best first), keeps the top
//! `limit`, and renders them into one context string while emitting a
//! citation per rendered block, in the same order.

use serde::{Deserialize, Serialize};

use super::store::RetrievalCandidate;

/// Name shown when a candidate's document name could not be resolved.
pub const UNKNOWN_DOCUMENT: &str = "Unknown";

/// Attribution record for one block of the grounding context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub document_id: String,
    pub document_name: String,
    pub unit_id: String,
    pub unit_text: String,
    pub similarity: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledContext {
    /// Rendered blocks joined by blank lines.
    pub context: String,
    /// One entry per block, in block order.
    pub sources: Vec<SourceCitation>,
}

impl AssembledContext {
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ContextAssembler;

impl ContextAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Renders the first `min(limit, candidates.len())` candidates.
    /// Callers pass candidates already ordered by descending similarity.
    pub fn assemble(&self, ranked: &[RetrievalCandidate], limit: usize) -> AssembledContext {
        let take = limit.min(ranked.len());
        let mut blocks = Vec::with_capacity(take);
        let mut sources = Vec::with_capacity(take);

        for candidate in &ranked[..take] {
            let document_name = candidate
                .document_name
                .clone()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_DOCUMENT.to_string());

            blocks.push(render_block(&document_name, &candidate.text));
            sources.push(SourceCitation {
                document_id: candidate.document_id.clone(),
                document_name,
                unit_id: candidate.unit_id.clone(),
                unit_text: candidate.text.clone(),
                similarity: candidate.similarity,
            });
        }

        AssembledContext {
            context: blocks.join("\n\n"),
            sources,
        }
    }
}

fn render_block(document_name: &str, unit_text: &str) -> String {
    format!("Context from {}:\n{}", document_name, unit_text)
}
