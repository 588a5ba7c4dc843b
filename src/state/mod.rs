use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::conversion::RoutingConverter;
use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::llm::OpenAiClient;
use crate::rag::{IngestQueue, RagDependencies, RagOrchestrator, SqliteRagStore};
use crate::storage::LocalBlobStore;

pub mod error;

use error::InitializationError;

/// Shared application state handed to every route.
///
/// Holds the resolved settings, the RAG orchestrator with its injected
/// collaborators, and the background ingest queue.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Settings,
    pub rag: Arc<RagOrchestrator>,
    pub ingest_queue: IngestQueue,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Loads configuration, opens the document store and wires the
    /// OpenAI-compatible client, blob storage and converter into the
    /// orchestrator.
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let store = Arc::new(
            SqliteRagStore::new(paths.as_ref())
                .await
                .map_err(|e| InitializationError::Store(e.into()))?,
        );

        let openai = Arc::new(
            OpenAiClient::new(&settings.openai).map_err(|e| InitializationError::Llm(e.into()))?,
        );

        let converter = Arc::new(
            RoutingConverter::from_settings(&settings.conversion)
                .map_err(|e| InitializationError::Conversion(e.into()))?,
        );

        let blobs = Arc::new(LocalBlobStore::from_settings(&paths, &settings.storage));

        let deps = RagDependencies {
            embedder: openai.clone(),
            generator: openai,
            vectors: store.clone(),
            metadata: store,
            blobs,
            converter,
        };

        Ok(Self::from_parts(paths, config, settings, deps))
    }

    /// Builds state around already-constructed collaborators. Must run
    /// inside a tokio runtime because it starts the ingest worker.
    pub fn from_parts(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Settings,
        deps: RagDependencies,
    ) -> Arc<Self> {
        let rag = Arc::new(RagOrchestrator::new(
            deps,
            settings.rag.clone(),
            settings.openai.embedding_dimensions,
        ));
        let ingest_queue = IngestQueue::spawn(rag.clone());

        Arc::new(AppState {
            paths,
            config,
            settings,
            rag,
            ingest_queue,
            started_at: Utc::now(),
        })
    }
}
