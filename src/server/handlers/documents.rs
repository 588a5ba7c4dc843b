use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::rag::api::{IngestRequest, UploadedFile};
use crate::state::AppState;

/// Multipart upload: `file`, `owner_id`, `workspace_id`. The stored file
/// is queued for background indexing before the response is sent.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut owner_id = String::new();
    let mut workspace_id = String::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                file = Some((file_name, bytes.to_vec()));
            }
            "owner_id" | "ownerId" => {
                owner_id = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            }
            "workspace_id" | "workspaceId" => {
                workspace_id = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
            }
            other => tracing::debug!("Ignoring upload field {}", other),
        }
    }

    let (original_name, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("No file provided".to_string()))?;

    let response = state
        .rag
        .store_upload(UploadedFile {
            original_name,
            bytes,
            owner_id,
            workspace_id,
        })
        .await?;

    state.ingest_queue.enqueue(&response.file_name);

    Ok(Json(response))
}

/// Synchronous ingestion of an already-stored file.
pub async fn process_chunks(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IngestRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.rag.ingest(payload).await?;
    Ok(Json(response))
}

pub async fn list_chunks(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let units = state.rag.list_units(&document_id).await?;
    let chunks: Vec<_> = units
        .into_iter()
        .map(|unit| {
            json!({
                "id": unit.id,
                "document_id": unit.document_id,
                "text": unit.text,
                "page_number": unit.page_number,
                "metadata": unit.metadata,
                "embedding": unit.embedding
            })
        })
        .collect();
    Ok(Json(json!({ "chunks": chunks })))
}

pub async fn delete_media(
    State(state): State<Arc<AppState>>,
    Path(document_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.rag.delete_document(&document_id).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Media and associated data deleted successfully"
    })))
}
