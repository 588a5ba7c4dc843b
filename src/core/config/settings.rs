//! Typed view over the merged YAML configuration.
//!
//! Every field has a default so a missing `config.yml` still yields a
//! runnable process (minus the API key).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub openai: OpenAiSettings,
    pub rag: RagSettings,
    pub storage: StorageSettings,
    pub conversion: ConversionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub embedding_model: String,
    pub chat_model: String,
    /// Length every stored embedding must have.
    pub embedding_dimensions: usize,
    pub timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            embedding_model: "text-embedding-3-small".to_string(),
            chat_model: "gpt-4".to_string(),
            embedding_dimensions: 1536,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// Soft upper bound on chunk length, in characters.
    pub chunk_size: usize,
    pub sentence_terminators: Vec<char>,
    pub similarity_threshold: f32,
    /// Candidates requested from the vector store per query.
    pub match_count: usize,
    /// Blocks placed in the grounding context when the request does not say.
    pub max_context_chunks: usize,
    /// Default result count for ad hoc search.
    pub search_limit: usize,
    /// In-flight embedding calls per ingestion. 1 = strictly sequential.
    pub embed_concurrency: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            sentence_terminators: vec!['.'],
            similarity_threshold: 0.35,
            match_count: 20,
            max_context_chunks: 10,
            search_limit: 5,
            embed_concurrency: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub bucket: String,
    pub root: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            bucket: "media-bucket".to_string(),
            root: "storage".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionSettings {
    pub endpoint: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 300,
        }
    }
}
