//! Request and response shapes the core exposes to its HTTP layer.

use serde::{Deserialize, Serialize};

use super::context_builder::SourceCitation;
use super::store::UnitMetadata;
use crate::conversion::{DocumentStructure, FigureData, TableData};

#[derive(Debug, Clone, Deserialize)]
pub struct QueryRequest {
    #[serde(alias = "query")]
    pub query_text: String,
    pub workspace_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub max_context_chunks: Option<usize>,
}

/// Which branch of the query flow produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grounding {
    /// Answer generated from assembled workspace context.
    Grounded,
    /// The vector store returned nothing above the threshold.
    NoCandidates,
    /// Candidates existed but none belonged to the workspace.
    OutOfWorkspace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer_text: String,
    pub sources: Vec<SourceCitation>,
    pub grounding: Grounding,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
    #[serde(alias = "fileName", alias = "file_name")]
    pub document_storage_reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub unit_id: String,
    pub page_number: Option<i64>,
    pub metadata: UnitMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub success: bool,
    pub chunk_count: usize,
    pub per_chunk: Vec<ChunkResult>,
    pub tables: Vec<TableData>,
    pub figures: Vec<FigureData>,
    pub structure: DocumentStructure,
    pub note: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(alias = "query")]
    pub query_text: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub similarity_threshold: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub unit_id: String,
    pub unit_text: String,
    pub similarity: f32,
    pub document_id: String,
    pub page_number: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub bytes: Vec<u8>,
    pub owner_id: String,
    pub workspace_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    /// Storage reference to pass to ingestion.
    pub file_name: String,
    pub document_id: String,
}
