//! SQLite-backed document and unit store.
//!
//! Holds documents, workspace membership and units with their embeddings.
//! Similarity search is a brute-force cosine scan over every stored unit.

use std::collections::HashSet;
use std::path::PathBuf;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{
    Document, MetadataStore, NewDocument, NewUnit, RetrievalCandidate, StoredUnit, UnitMetadata,
    VectorStore,
};
use super::vector_math::{by_score_desc, cosine_similarity};
use crate::core::config::AppPaths;
use crate::core::errors::ApiError;

pub struct SqliteRagStore {
    pool: SqlitePool,
}

impl SqliteRagStore {
    pub async fn new(paths: &AppPaths) -> Result<Self, ApiError> {
        Self::with_path(paths.db_path.clone()).await
    }

    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(ApiError::internal)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self { pool };
        store.init_schema().await?;
        tracing::info!("Document store opened at {}", db_path.display());
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                original_name TEXT,
                media_type TEXT NOT NULL DEFAULT 'file',
                owner_id TEXT NOT NULL,
                storage_path TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS workspace_documents (
                workspace_id TEXT NOT NULL,
                document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                PRIMARY KEY (workspace_id, document_id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                content TEXT NOT NULL,
                page_number INTEGER,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn parse_metadata(raw: &str) -> UnitMetadata {
        serde_json::from_str(raw).unwrap_or_else(|err| {
            tracing::warn!("Ignoring unreadable unit metadata: {}", err);
            UnitMetadata::default()
        })
    }

    fn row_to_document(row: &sqlx::sqlite::SqliteRow) -> Document {
        Document {
            id: row.get("id"),
            name: row.get("name"),
            original_name: row.get("original_name"),
            media_type: row.get("media_type"),
            owner_id: row.get("owner_id"),
            storage_path: row.get("storage_path"),
            created_at: row.get("created_at"),
        }
    }

    fn row_to_unit(row: &sqlx::sqlite::SqliteRow) -> StoredUnit {
        let embedding_bytes: Vec<u8> = row.get("embedding");
        let metadata: String = row.get("metadata");
        StoredUnit {
            id: row.get("id"),
            document_id: row.get("document_id"),
            text: row.get("content"),
            embedding: Self::deserialize_embedding(&embedding_bytes),
            page_number: row.get("page_number"),
            metadata: Self::parse_metadata(&metadata),
        }
    }
}

const DOCUMENT_COLUMNS: &str =
    "id, name, original_name, media_type, owner_id, storage_path, created_at";

#[async_trait]
impl VectorStore for SqliteRagStore {
    async fn search(
        &self,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate>, ApiError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT c.id, c.document_id, c.content, c.page_number, c.embedding, d.name AS document_name
             FROM chunks c
             LEFT JOIN documents d ON d.id = c.document_id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::upstream)?;

        let mut scored: Vec<RetrievalCandidate> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let similarity = cosine_similarity(query_embedding, &stored);
                if similarity < threshold {
                    return None;
                }
                Some(RetrievalCandidate {
                    unit_id: row.get("id"),
                    document_id: row.get("document_id"),
                    document_name: row.get("document_name"),
                    text: row.get("content"),
                    similarity,
                    page_number: row.get("page_number"),
                })
            })
            .collect();

        scored.sort_by(|a, b| by_score_desc(a.similarity, b.similarity));
        scored.truncate(limit);
        Ok(scored)
    }
}

#[async_trait]
impl MetadataStore for SqliteRagStore {
    async fn create_document(&self, document: NewDocument) -> Result<Document, ApiError> {
        let created = Document {
            id: uuid::Uuid::new_v4().to_string(),
            name: document.name,
            original_name: document.original_name,
            media_type: document.media_type,
            owner_id: document.owner_id,
            storage_path: document.storage_path,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        sqlx::query(
            "INSERT INTO documents (id, name, original_name, media_type, owner_id, storage_path, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&created.id)
        .bind(&created.name)
        .bind(&created.original_name)
        .bind(&created.media_type)
        .bind(&created.owner_id)
        .bind(&created.storage_path)
        .bind(&created.created_at)
        .execute(&self.pool)
        .await
        .map_err(ApiError::upstream)?;

        Ok(created)
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>, ApiError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?1",
            DOCUMENT_COLUMNS
        ))
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::upstream)?;

        Ok(row.as_ref().map(Self::row_to_document))
    }

    async fn find_document_by_name(&self, name: &str) -> Result<Option<Document>, ApiError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE name = ?1",
            DOCUMENT_COLUMNS
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::upstream)?;

        Ok(row.as_ref().map(Self::row_to_document))
    }

    async fn delete_document(&self, document_id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(document_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::upstream)?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_to_workspace(&self, document_id: &str, workspace_id: &str) -> Result<(), ApiError> {
        sqlx::query(
            "INSERT OR IGNORE INTO workspace_documents (workspace_id, document_id) VALUES (?1, ?2)",
        )
        .bind(workspace_id)
        .bind(document_id)
        .execute(&self.pool)
        .await
        .map_err(ApiError::upstream)?;

        Ok(())
    }

    async fn workspace_document_ids(&self, workspace_id: &str) -> Result<HashSet<String>, ApiError> {
        let ids: Vec<String> =
            sqlx::query_scalar("SELECT document_id FROM workspace_documents WHERE workspace_id = ?1")
                .bind(workspace_id)
                .fetch_all(&self.pool)
                .await
                .map_err(ApiError::upstream)?;

        Ok(ids.into_iter().collect())
    }

    async fn insert_units(&self, units: Vec<NewUnit>) -> Result<Vec<String>, ApiError> {
        if units.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::upstream)?;
        let mut ids = Vec::with_capacity(units.len());

        for unit in &units {
            let id = uuid::Uuid::new_v4().to_string();
            let metadata = serde_json::to_string(&unit.metadata).map_err(ApiError::internal)?;

            sqlx::query(
                "INSERT INTO chunks (id, document_id, content, page_number, metadata, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(&id)
            .bind(&unit.document_id)
            .bind(&unit.text)
            .bind(unit.page_number)
            .bind(&metadata)
            .bind(Self::serialize_embedding(&unit.embedding))
            .execute(&mut *tx)
            .await
            .map_err(ApiError::upstream)?;

            ids.push(id);
        }

        tx.commit().await.map_err(ApiError::upstream)?;
        Ok(ids)
    }

    async fn list_units(&self, document_id: &str) -> Result<Vec<StoredUnit>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, document_id, content, page_number, metadata, embedding
             FROM chunks
             WHERE document_id = ?1
             ORDER BY rowid",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::upstream)?;

        Ok(rows.iter().map(Self::row_to_unit).collect())
    }
}
