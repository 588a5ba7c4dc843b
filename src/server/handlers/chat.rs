use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;

use crate::core::errors::ApiError;
use crate::rag::api::QueryRequest;
use crate::state::AppState;

/// Answers a question grounded in the caller's workspace documents.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state.rag.answer(payload).await?;
    Ok(Json(response))
}
