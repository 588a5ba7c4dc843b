//! End-to-end query and ingestion flows.
//!
//! Query: embed query -> retrieve -> (empty? fallback) -> workspace filter
//! -> (empty? fallback) -> assemble context -> generate -> respond.
//! Every query reaches exactly one generation call; nothing is retried.
//!
//! Ingestion: download -> convert -> chunk -> embed every chunk -> persist
//! the batch. Units are only handed to the store once all embeddings exist.

use std::path::Path;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};

use super::api::{
    ChunkResult, Grounding, IngestRequest, IngestResponse, QueryRequest, QueryResponse,
    SearchHit, SearchRequest, UploadResponse, UploadedFile,
};
use super::chunker::{ChunkDraft, Chunker, ChunkerConfig};
use super::context_builder::ContextAssembler;
use super::filter::WorkspaceFilter;
use super::prompt::{grounded_user_prompt, FALLBACK_SYSTEM_PROMPT, GROUNDED_SYSTEM_PROMPT};
use super::store::{MetadataStore, NewDocument, NewUnit, StoredUnit, VectorStore};
use crate::conversion::DocumentConverter;
use crate::core::config::RagSettings;
use crate::core::errors::ApiError;
use crate::llm::{Embedder, Generator};
use crate::storage::BlobStore;

/// External collaborators, constructed once by the caller and injected.
#[derive(Clone)]
pub struct RagDependencies {
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub vectors: Arc<dyn VectorStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub converter: Arc<dyn DocumentConverter>,
}

pub struct RagOrchestrator {
    deps: RagDependencies,
    chunker: Chunker,
    filter: WorkspaceFilter,
    assembler: ContextAssembler,
    settings: RagSettings,
    embedding_dimensions: usize,
}

impl RagOrchestrator {
    pub fn new(deps: RagDependencies, settings: RagSettings, embedding_dimensions: usize) -> Self {
        let chunker = Chunker::new(ChunkerConfig::from(&settings));
        let filter = WorkspaceFilter::new(deps.metadata.clone());
        Self {
            deps,
            chunker,
            filter,
            assembler: ContextAssembler::new(),
            settings,
            embedding_dimensions,
        }
    }

    pub fn settings(&self) -> &RagSettings {
        &self.settings
    }

    // -----------------------------------------------------------------------
    // Query flow
    // -----------------------------------------------------------------------

    pub async fn answer(&self, request: QueryRequest) -> Result<QueryResponse, ApiError> {
        let query = request.query_text.trim();
        if query.is_empty() {
            return Err(ApiError::BadRequest("Query text is required".to_string()));
        }
        if request.workspace_id.trim().is_empty() {
            return Err(ApiError::BadRequest("Workspace id is required".to_string()));
        }
        let limit = match request.max_context_chunks {
            Some(0) => {
                return Err(ApiError::BadRequest(
                    "max_context_chunks must be at least 1".to_string(),
                ))
            }
            Some(limit) => limit,
            None => self.settings.max_context_chunks,
        };

        tracing::info!(
            "Answering query for workspace {} (user {})",
            request.workspace_id,
            request.user_id.as_deref().unwrap_or("-")
        );

        let query_embedding = self.embed_checked(query).await?;

        let candidates = self
            .deps
            .vectors
            .search(
                &query_embedding,
                self.settings.similarity_threshold,
                self.settings.match_count,
            )
            .await?;
        tracing::debug!("Vector search returned {} candidates", candidates.len());

        if candidates.is_empty() {
            tracing::info!("No similar units found; answering without context");
            return self.fallback(query, Grounding::NoCandidates).await;
        }

        let scoped = self
            .filter
            .filter(candidates, &request.workspace_id)
            .await?;

        if scoped.is_empty() {
            tracing::info!(
                "No candidates belong to workspace {}; answering without context",
                request.workspace_id
            );
            return self.fallback(query, Grounding::OutOfWorkspace).await;
        }

        let assembled = self.assembler.assemble(&scoped, limit);
        tracing::debug!(
            "Assembled {} context blocks ({} chars)",
            assembled.sources.len(),
            assembled.context.len()
        );

        let user_prompt = grounded_user_prompt(&assembled.context, query);
        let answer_text = self
            .deps
            .generator
            .generate(GROUNDED_SYSTEM_PROMPT, &user_prompt)
            .await?;

        Ok(QueryResponse {
            answer_text,
            sources: assembled.sources,
            grounding: Grounding::Grounded,
        })
    }

    async fn fallback(&self, query: &str, grounding: Grounding) -> Result<QueryResponse, ApiError> {
        let answer_text = self
            .deps
            .generator
            .generate(FALLBACK_SYSTEM_PROMPT, query)
            .await?;
        Ok(QueryResponse {
            answer_text,
            sources: Vec::new(),
            grounding,
        })
    }

    /// Ranked units for a free-text query, without workspace scoping.
    pub async fn search(&self, request: SearchRequest) -> Result<Vec<SearchHit>, ApiError> {
        let query = request.query_text.trim();
        if query.is_empty() {
            return Err(ApiError::BadRequest("Query text is required".to_string()));
        }
        let limit = request.limit.unwrap_or(self.settings.search_limit);
        if limit == 0 {
            return Err(ApiError::BadRequest("limit must be at least 1".to_string()));
        }
        let threshold = request
            .similarity_threshold
            .unwrap_or(self.settings.similarity_threshold);
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(ApiError::BadRequest(
                "similarity_threshold must be between -1 and 1".to_string(),
            ));
        }

        let query_embedding = self.embed_checked(query).await?;
        let candidates = self
            .deps
            .vectors
            .search(&query_embedding, threshold, limit)
            .await?;

        Ok(candidates
            .into_iter()
            .take(limit)
            .map(|candidate| SearchHit {
                unit_id: candidate.unit_id,
                unit_text: candidate.text,
                similarity: candidate.similarity,
                document_id: candidate.document_id,
                page_number: candidate.page_number,
            })
            .collect())
    }

    pub async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self.deps.embedder.embed_batch(texts).await?;
        for embedding in &embeddings {
            self.check_dimension(embedding)?;
        }
        Ok(embeddings)
    }

    // -----------------------------------------------------------------------
    // Ingestion flow
    // -----------------------------------------------------------------------

    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestResponse, ApiError> {
        let reference = request.document_storage_reference.trim();
        if reference.is_empty() {
            return Err(ApiError::BadRequest("File name is required".to_string()));
        }

        let bytes = self.deps.blobs.get(reference).await?;

        let file_name = Path::new(reference)
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ApiError::BadRequest(format!("Invalid file name: {}", reference)))?;
        let document = self
            .deps
            .metadata
            .find_document_by_name(file_name)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Document record not found: {}", file_name)))?;

        let file_type = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        tracing::info!("Processing file {} (document {})", reference, document.id);
        let converted = self.deps.converter.convert(&bytes, &file_type).await?;

        let per_chunk = self.ingest_text(&document.id, &converted.text).await?;
        tracing::info!(
            "Finished processing file {}: {} chunks stored",
            reference,
            per_chunk.len()
        );

        Ok(IngestResponse {
            success: true,
            chunk_count: per_chunk.len(),
            per_chunk,
            tables: converted.tables,
            figures: converted.figures,
            structure: converted.structure,
            note: "Document processed successfully".to_string(),
        })
    }

    /// Chunks, embeds and persists `text` as units of `document_id`.
    pub async fn ingest_text(
        &self,
        document_id: &str,
        text: &str,
    ) -> Result<Vec<ChunkResult>, ApiError> {
        // the blank-input chunk cannot be persisted as a unit
        let drafts: Vec<ChunkDraft> = self
            .chunker
            .split(text)
            .into_iter()
            .filter(|draft| !draft.text.trim().is_empty())
            .collect();

        if drafts.is_empty() {
            tracing::warn!("Document {} produced no text to index", document_id);
            return Ok(Vec::new());
        }

        let embeddings = self.embed_drafts(&drafts).await?;

        let units: Vec<NewUnit> = drafts
            .into_iter()
            .zip(embeddings)
            .map(|(draft, embedding)| NewUnit {
                document_id: document_id.to_string(),
                page_number: draft.metadata.page_number,
                text: draft.text,
                embedding,
                metadata: draft.metadata,
            })
            .collect();

        let results_meta: Vec<(Option<i64>, _)> = units
            .iter()
            .map(|unit| (unit.page_number, unit.metadata.clone()))
            .collect();

        let unit_ids = self.deps.metadata.insert_units(units).await?;
        if unit_ids.len() != results_meta.len() {
            return Err(ApiError::Upstream(format!(
                "Store acknowledged {} of {} units",
                unit_ids.len(),
                results_meta.len()
            )));
        }

        Ok(unit_ids
            .into_iter()
            .zip(results_meta)
            .map(|(unit_id, (page_number, metadata))| ChunkResult {
                unit_id,
                page_number,
                metadata,
            })
            .collect())
    }

    /// Embeds drafts in chunk order with at most `embed_concurrency` calls
    /// in flight. The first failure aborts the whole document.
    async fn embed_drafts(&self, drafts: &[ChunkDraft]) -> Result<Vec<Vec<f32>>, ApiError> {
        let concurrency = self.settings.embed_concurrency.max(1);
        // collected up front so the resulting future stays Send
        let pending: Vec<_> = drafts
            .iter()
            .map(|draft| self.embed_checked(&draft.text))
            .collect();
        stream::iter(pending)
            .buffered(concurrency)
            .try_collect()
            .await
    }

    async fn embed_checked(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let embedding = self.deps.embedder.embed(text).await?;
        self.check_dimension(&embedding)?;
        Ok(embedding)
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<(), ApiError> {
        if embedding.len() != self.embedding_dimensions {
            return Err(ApiError::Upstream(format!(
                "Embedding has {} dimensions, expected {}",
                embedding.len(),
                self.embedding_dimensions
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Document maintenance
    // -----------------------------------------------------------------------

    /// Stores an uploaded file and registers it in its workspace. Indexing
    /// is left to the caller (usually the background ingest queue).
    pub async fn store_upload(&self, upload: UploadedFile) -> Result<UploadResponse, ApiError> {
        if upload.owner_id.trim().is_empty() {
            return Err(ApiError::BadRequest("owner_id is required".to_string()));
        }
        if upload.workspace_id.trim().is_empty() {
            return Err(ApiError::BadRequest("workspace_id is required".to_string()));
        }

        let extension = Path::new(&upload.original_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
            .unwrap_or_default();
        let unique_name = format!("{}{}", uuid::Uuid::new_v4(), extension);
        let storage_path = format!("uploads/{}", unique_name);

        self.deps.blobs.put(&storage_path, &upload.bytes).await?;

        let document = self
            .deps
            .metadata
            .create_document(NewDocument {
                name: unique_name,
                original_name: Some(upload.original_name),
                media_type: "file".to_string(),
                owner_id: upload.owner_id,
                storage_path: storage_path.clone(),
            })
            .await?;

        if let Err(err) = self
            .deps
            .metadata
            .add_to_workspace(&document.id, &upload.workspace_id)
            .await
        {
            self.discard_upload(&document.id, &storage_path).await;
            return Err(err);
        }

        tracing::info!(
            "Stored upload {} as document {} in workspace {}",
            storage_path,
            document.id,
            upload.workspace_id
        );

        Ok(UploadResponse {
            success: true,
            file_name: storage_path,
            document_id: document.id,
        })
    }

    /// Best-effort cleanup of an upload that could not be registered.
    async fn discard_upload(&self, document_id: &str, storage_path: &str) {
        tracing::warn!(
            "Workspace registration failed for document {}; removing it",
            document_id
        );
        if let Err(err) = self.deps.metadata.delete_document(document_id).await {
            tracing::warn!("Failed to remove document {}: {}", document_id, err);
        }
        if let Err(err) = self.deps.blobs.remove(storage_path).await {
            tracing::warn!("Failed to delete file {} from storage: {}", storage_path, err);
        }
    }

    pub async fn list_units(&self, document_id: &str) -> Result<Vec<StoredUnit>, ApiError> {
        self.deps.metadata.list_units(document_id).await
    }

    /// Removes the stored file (best effort) and the document with its units.
    pub async fn delete_document(&self, document_id: &str) -> Result<(), ApiError> {
        let document = self
            .deps
            .metadata
            .get_document(document_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Document not found".to_string()))?;

        if let Err(err) = self.deps.blobs.remove(&document.storage_path).await {
            tracing::warn!(
                "Failed to delete file {} from storage: {}",
                document.storage_path,
                err
            );
        }

        self.deps.metadata.delete_document(document_id).await?;
        tracing::info!("Deleted document {} and its units", document_id);
        Ok(())
    }
}
