//! Retrieval-augmented generation core.
//!
//! - `Chunker`: splits extracted text into sentence-packed chunks
//! - `WorkspaceFilter`: scopes retrieval candidates to one workspace
//! - `ContextAssembler`: renders ranked candidates into grounding context
//! - `RagOrchestrator`: query and ingestion flows over injected collaborators
//! - `SqliteRagStore`: the bundled document/unit store

pub mod api;
pub mod chunker;
pub mod context_builder;
pub mod filter;
pub mod ingest_queue;
pub mod orchestrator;
pub mod prompt;
pub mod sqlite;
pub mod store;
pub mod vector_math;

#[cfg(test)]
pub(crate) mod testing;

pub use chunker::{Chunker, ChunkerConfig};
pub use context_builder::{ContextAssembler, SourceCitation};
pub use filter::WorkspaceFilter;
pub use ingest_queue::{DeadLetter, IngestQueue};
pub use orchestrator::{RagDependencies, RagOrchestrator};
pub use sqlite::SqliteRagStore;
pub use store::{MetadataStore, VectorStore};
