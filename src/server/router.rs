use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, documents, embeddings, health, ingest};
use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Creates the application router: health, document management, chat,
/// embedding endpoints and ingest diagnostics, wrapped in CORS and
/// request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors_layer = build_cors_layer(&state.settings.server.cors_allowed_origins);
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/upload-file",
            post(documents::upload_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/process-chunks", post(documents::process_chunks))
        .route("/api/chunks/:document_id", get(documents::list_chunks))
        .route("/api/media/:document_id", delete(documents::delete_media))
        .route("/api/chat", post(chat::chat))
        .route("/api/embeddings/search", post(embeddings::search))
        .route("/api/embeddings/batch-embed", post(embeddings::batch_embed))
        .route("/api/ingest/dead-letters", get(ingest::dead_letters))
        .with_state(state)
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
}

fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let cleaned: Vec<&str> = origins
        .iter()
        .map(|origin| origin.trim())
        .filter(|origin| !origin.is_empty())
        .collect();

    let allow_origin = if cleaned.is_empty() || cleaned.contains(&"*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            cleaned
                .into_iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect::<Vec<_>>(),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE, header::AUTHORIZATION])
}
