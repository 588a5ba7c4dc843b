use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::rag::api::SearchRequest;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BatchEmbedRequest {
    pub texts: Vec<String>,
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let results = state.rag.search(payload).await?;
    Ok(Json(results))
}

pub async fn batch_embed(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BatchEmbedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.texts.is_empty() {
        return Err(ApiError::BadRequest("texts must not be empty".to_string()));
    }
    let embeddings = state.rag.embed_texts(&payload.texts).await?;
    Ok(Json(json!({
        "success": true,
        "embeddings": embeddings
    })))
}
