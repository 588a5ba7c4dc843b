//! Store traits consumed by the RAG core, plus the records they exchange.
//!
//! `VectorStore` is the similarity-search primitive; `MetadataStore` owns
//! documents, workspace membership and persisted units. The SQLite
//! implementation in `sqlite` provides both; production deployments can
//! put an indexed store behind `VectorStore` instead.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// A stored document (uploaded media file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// Generated file name, also the last segment of `storage_path`.
    pub name: String,
    pub original_name: Option<String>,
    pub media_type: String,
    pub owner_id: String,
    pub storage_path: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub name: String,
    pub original_name: Option<String>,
    pub media_type: String,
    pub owner_id: String,
    pub storage_path: String,
}

/// Structural hints attached to a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitMetadata {
    #[serde(default)]
    pub headings: Vec<String>,
    #[serde(default)]
    pub page_number: Option<i64>,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// A persisted, retrievable slice of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredUnit {
    pub id: String,
    pub document_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub page_number: Option<i64>,
    pub metadata: UnitMetadata,
}

/// A unit ready to persist. `text` is non-empty and `embedding` has the
/// embedder's dimension.
#[derive(Debug, Clone)]
pub struct NewUnit {
    pub document_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub page_number: Option<i64>,
    pub metadata: UnitMetadata,
}

/// One similarity hit for one query. Scores are never reused across queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalCandidate {
    pub unit_id: String,
    pub document_id: String,
    pub document_name: Option<String>,
    pub text: String,
    /// Cosine similarity in [-1, 1].
    pub similarity: f32,
    pub page_number: Option<i64>,
}

/// Similarity search over stored unit embeddings.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Candidates with `similarity >= threshold`, best first, at most `limit`.
    async fn search(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate>, ApiError>;
}

/// Document, membership and unit records.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn create_document(&self, document: NewDocument) -> Result<Document, ApiError>;

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>, ApiError>;

    async fn find_document_by_name(&self, name: &str) -> Result<Option<Document>, ApiError>;

    /// Deletes the document together with its units and memberships.
    async fn delete_document(&self, document_id: &str) -> Result<bool, ApiError>;

    async fn add_to_workspace(&self, document_id: &str, workspace_id: &str)
        -> Result<(), ApiError>;

    /// Ids of every document registered in the workspace (possibly empty).
    async fn workspace_document_ids(&self, workspace_id: &str)
        -> Result<HashSet<String>, ApiError>;

    /// Persists the units as one batch and returns their ids in input order.
    async fn insert_units(&self, units: Vec<NewUnit>) -> Result<Vec<String>, ApiError>;

    async fn list_units(&self, document_id: &str) -> Result<Vec<StoredUnit>, ApiError>;
}
