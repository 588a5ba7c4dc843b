use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn dead_letters(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let failures = state.ingest_queue.dead_letters();
    Json(json!({
        "count": failures.len(),
        "dead_letters": failures
    }))
}
