//! In-memory doubles for the RAG collaborators, shared by unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::orchestrator::{RagDependencies, RagOrchestrator};
use super::store::{
    Document, MetadataStore, NewDocument, NewUnit, RetrievalCandidate, StoredUnit, VectorStore,
};
use super::vector_math::{by_score_desc, cosine_similarity};
use crate::conversion::RoutingConverter;
use crate::core::config::RagSettings;
use crate::core::errors::ApiError;
use crate::llm::{Embedder, Generator};
use crate::storage::BlobStore;

const VOCABULARY: [&str; 8] = [
    "refund", "shipping", "policy", "days", "sentence", "one", "two", "three",
];

pub fn candidate(unit_id: &str, document_id: &str, similarity: f32) -> RetrievalCandidate {
    RetrievalCandidate {
        unit_id: unit_id.to_string(),
        document_id: document_id.to_string(),
        document_name: Some(format!("{}.txt", document_id)),
        text: format!("text of {}", unit_id),
        similarity,
        page_number: None,
    }
}

// ---------------------------------------------------------------------------
// Embedder
// ---------------------------------------------------------------------------

/// Counts vocabulary words; one extra component keeps every vector non-zero.
pub struct KeywordEmbedder {
    dimensions: AtomicUsize,
    calls: AtomicUsize,
    failing: AtomicBool,
    fail_after: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self {
            dimensions: AtomicUsize::new(VOCABULARY.len() + 1),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            fail_after: AtomicUsize::new(usize::MAX),
        }
    }

    pub fn dimensions(&self) -> usize {
        VOCABULARY.len() + 1
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Succeeds for the first `n` calls, then fails.
    pub fn fail_after(&self, n: usize) {
        self.fail_after.store(n, Ordering::SeqCst);
    }

    /// Emits vectors of the given length regardless of the vocabulary.
    pub fn set_dimensions(&self, dimensions: usize) {
        self.dimensions.store(dimensions, Ordering::SeqCst);
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) || call >= self.fail_after.load(Ordering::SeqCst) {
            return Err(ApiError::Upstream("embedding service unavailable".to_string()));
        }

        let lower = text.to_lowercase();
        let mut vector = vec![0.0f32; self.dimensions.load(Ordering::SeqCst)];
        for word in lower.split(|c: char| !c.is_alphanumeric()) {
            if let Some(slot) = VOCABULARY.iter().position(|v| *v == word) {
                if let Some(value) = vector.get_mut(slot) {
                    *value += 1.0;
                }
            }
        }
        if let Some(last) = vector.last_mut() {
            *last = 0.1;
        }
        Ok(vector)
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Echoes the user prompt and records every call.
#[derive(Default)]
pub struct RecordingGenerator {
    calls: Mutex<Vec<(String, String)>>,
    failing: AtomicBool,
}

impl RecordingGenerator {
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    fn name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ApiError> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_prompt.to_string()));
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::Upstream("chat completion failed".to_string()));
        }
        Ok(format!("ANSWER: {}", user_prompt))
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    documents: Vec<Document>,
    memberships: Vec<(String, String)>,
    units: Vec<StoredUnit>,
    scripted: Option<Vec<RetrievalCandidate>>,
}

/// Vector and metadata store in one. Search scans stored units unless a
/// scripted result list is installed.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    search_calls: AtomicUsize,
    membership_lookups: AtomicUsize,
    fail_inserts: AtomicBool,
    fail_memberships: AtomicBool,
    next_id: AtomicUsize,
}

impl InMemoryStore {
    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn add_document(&self, id: &str, name: &str) {
        self.state.lock().unwrap().documents.push(Document {
            id: id.to_string(),
            name: name.to_string(),
            original_name: None,
            media_type: "file".to_string(),
            owner_id: "owner".to_string(),
            storage_path: format!("uploads/{}", name),
            created_at: "2024-01-01T00:00:00Z".to_string(),
        });
    }

    pub fn add_membership(&self, document_id: &str, workspace_id: &str) {
        self.state
            .lock()
            .unwrap()
            .memberships
            .push((document_id.to_string(), workspace_id.to_string()));
    }

    pub fn script_search(&self, results: Vec<RetrievalCandidate>) {
        self.state.lock().unwrap().scripted = Some(results);
    }

    pub fn set_failing_inserts(&self, failing: bool) {
        self.fail_inserts.store(failing, Ordering::SeqCst);
    }

    pub fn set_failing_memberships(&self, failing: bool) {
        self.fail_memberships.store(failing, Ordering::SeqCst);
    }

    pub fn document_count(&self) -> usize {
        self.state.lock().unwrap().documents.len()
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn membership_lookups(&self) -> usize {
        self.membership_lookups.load(Ordering::SeqCst)
    }

    pub fn units_for(&self, document_id: &str) -> Vec<StoredUnit> {
        self.state
            .lock()
            .unwrap()
            .units
            .iter()
            .filter(|unit| unit.document_id == document_id)
            .cloned()
            .collect()
    }

    pub fn workspace_document_ids_sync(&self, workspace_id: &str) -> HashSet<String> {
        self.state
            .lock()
            .unwrap()
            .memberships
            .iter()
            .filter(|(_, ws)| ws == workspace_id)
            .map(|(doc, _)| doc.clone())
            .collect()
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn search(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate>, ApiError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();

        let mut hits: Vec<RetrievalCandidate> = match &state.scripted {
            Some(scripted) => scripted.clone(),
            None => state
                .units
                .iter()
                .map(|unit| RetrievalCandidate {
                    unit_id: unit.id.clone(),
                    document_id: unit.document_id.clone(),
                    document_name: state
                        .documents
                        .iter()
                        .find(|doc| doc.id == unit.document_id)
                        .map(|doc| doc.name.clone()),
                    text: unit.text.clone(),
                    similarity: cosine_similarity(query_embedding, &unit.embedding),
                    page_number: unit.page_number,
                })
                .collect(),
        };

        hits.retain(|hit| hit.similarity >= threshold);
        hits.sort_by(|a, b| by_score_desc(a.similarity, b.similarity));
        hits.truncate(limit);
        Ok(hits)
    }
}

#[async_trait]
impl MetadataStore for InMemoryStore {
    async fn create_document(&self, document: NewDocument) -> Result<Document, ApiError> {
        let created = Document {
            id: self.next_id("doc"),
            name: document.name,
            original_name: document.original_name,
            media_type: document.media_type,
            owner_id: document.owner_id,
            storage_path: document.storage_path,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        };
        self.state.lock().unwrap().documents.push(created.clone());
        Ok(created)
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>, ApiError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .documents
            .iter()
            .find(|doc| doc.id == document_id)
            .cloned())
    }

    async fn find_document_by_name(&self, name: &str) -> Result<Option<Document>, ApiError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .documents
            .iter()
            .find(|doc| doc.name == name)
            .cloned())
    }

    async fn delete_document(&self, document_id: &str) -> Result<bool, ApiError> {
        let mut state = self.state.lock().unwrap();
        let before = state.documents.len();
        state.documents.retain(|doc| doc.id != document_id);
        state.units.retain(|unit| unit.document_id != document_id);
        state.memberships.retain(|(doc, _)| doc != document_id);
        Ok(state.documents.len() < before)
    }

    async fn add_to_workspace(&self, document_id: &str, workspace_id: &str) -> Result<(), ApiError> {
        if self.fail_memberships.load(Ordering::SeqCst) {
            return Err(ApiError::Upstream("database is locked".to_string()));
        }
        self.add_membership(document_id, workspace_id);
        Ok(())
    }

    async fn workspace_document_ids(&self, workspace_id: &str) -> Result<HashSet<String>, ApiError> {
        self.membership_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.workspace_document_ids_sync(workspace_id))
    }

    async fn insert_units(&self, units: Vec<NewUnit>) -> Result<Vec<String>, ApiError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(ApiError::Upstream("database is locked".to_string()));
        }
        let stored: Vec<StoredUnit> = units
            .into_iter()
            .map(|unit| StoredUnit {
                id: self.next_id("unit"),
                document_id: unit.document_id,
                text: unit.text,
                embedding: unit.embedding,
                page_number: unit.page_number,
                metadata: unit.metadata,
            })
            .collect();
        let ids = stored.iter().map(|unit| unit.id.clone()).collect();
        self.state.lock().unwrap().units.extend(stored);
        Ok(ids)
    }

    async fn list_units(&self, document_id: &str) -> Result<Vec<StoredUnit>, ApiError> {
        Ok(self.units_for(document_id))
    }
}

#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn insert(&self, path: &str, bytes: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(path.to_string(), bytes.to_vec());
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.lock().unwrap().contains_key(path)
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<(), ApiError> {
        self.insert(path, bytes);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, ApiError> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("File not found in storage: {}", path)))
    }

    async fn remove(&self, path: &str) -> Result<(), ApiError> {
        self.objects
            .lock()
            .unwrap()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| ApiError::NotFound(format!("File not found in storage: {}", path)))
    }
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

/// An orchestrator wired to in-memory doubles that stay inspectable.
pub struct TestRig {
    pub orchestrator: Arc<RagOrchestrator>,
    pub embedder: Arc<KeywordEmbedder>,
    pub generator: Arc<RecordingGenerator>,
    pub store: Arc<InMemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
}

impl TestRig {
    pub fn new() -> Self {
        Self::with_settings(RagSettings::default())
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self::with_settings(RagSettings {
            chunk_size,
            ..RagSettings::default()
        })
    }

    pub fn with_settings(settings: RagSettings) -> Self {
        let embedder = Arc::new(KeywordEmbedder::new());
        let generator = Arc::new(RecordingGenerator::default());
        let store = Arc::new(InMemoryStore::default());
        let blobs = Arc::new(MemoryBlobStore::default());

        let deps = RagDependencies {
            embedder: embedder.clone(),
            generator: generator.clone(),
            vectors: store.clone(),
            metadata: store.clone(),
            blobs: blobs.clone(),
            converter: Arc::new(RoutingConverter::new(None)),
        };
        let orchestrator = Arc::new(RagOrchestrator::new(
            deps,
            settings,
            embedder.dimensions(),
        ));

        Self {
            orchestrator,
            embedder,
            generator,
            store,
            blobs,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.embedder.dimensions()
    }
}
