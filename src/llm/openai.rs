use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;

use super::provider::{Embedder, Generator};
use super::types::{
    ChatCompletionResponse, ChatMessage, ChatRequest, EmbeddingRequest, EmbeddingResponse,
};
use crate::core::config::OpenAiSettings;
use crate::core::errors::ApiError;

/// Client for OpenAI-compatible `/embeddings` and `/chat/completions`.
///
/// One instance is built at startup and shared behind `Arc<dyn Embedder>`
/// and `Arc<dyn Generator>`. No retries happen here; the request timeout
/// is the only deadline applied.
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    client: Client,
    embedding_model: String,
    chat_model: String,
}

impl OpenAiClient {
    pub fn new(settings: &OpenAiSettings) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = settings.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            let auth = format!("Bearer {}", key.trim());
            let value = HeaderValue::from_str(&auth)
                .map_err(|_| ApiError::BadRequest("invalid OpenAI API key".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        } else {
            tracing::warn!("No OpenAI API key configured; requests will be unauthenticated");
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(ApiError::internal)?;

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            client,
            embedding_model: settings.embedding_model.clone(),
            chat_model: settings.chat_model.clone(),
        })
    }

    async fn request_embeddings(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let body = EmbeddingRequest {
            model: &self.embedding_model,
            input: inputs,
        };

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "OpenAI embeddings request failed ({}): {}",
                status, text
            )));
        }

        let payload: EmbeddingResponse = res.json().await.map_err(ApiError::upstream)?;
        collect_embeddings(payload, inputs.len())
    }
}

fn collect_embeddings(
    mut payload: EmbeddingResponse,
    expected: usize,
) -> Result<Vec<Vec<f32>>, ApiError> {
    payload.data.sort_by_key(|entry| entry.index);
    if payload.data.len() != expected {
        return Err(ApiError::Upstream(format!(
            "OpenAI returned {} embeddings for {} inputs",
            payload.data.len(),
            expected
        )));
    }
    Ok(payload.data.into_iter().map(|entry| entry.embedding).collect())
}

fn first_choice(payload: ChatCompletionResponse) -> Result<String, ApiError> {
    payload
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| ApiError::Upstream("OpenAI returned no completion choices".to_string()))
}

#[async_trait]
impl Embedder for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let mut embeddings = self.request_embeddings(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| ApiError::Upstream("OpenAI returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        self.request_embeddings(texts).await
    }
}

#[async_trait]
impl Generator for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ApiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest::new(
            &self.chat_model,
            vec![
                ChatMessage::system(system_prompt),
                ChatMessage::user(user_prompt),
            ],
        );

        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "OpenAI chat error ({}): {}",
                status, text
            )));
        }

        let payload: ChatCompletionResponse = res.json().await.map_err(ApiError::upstream)?;
        first_choice(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn embeddings_are_reordered_by_index() {
        let payload: EmbeddingResponse = serde_json::from_value(json!({
            "data": [
                { "embedding": [0.0, 1.0], "index": 1 },
                { "embedding": [1.0, 0.0], "index": 0 }
            ]
        }))
        .unwrap();

        let embeddings = collect_embeddings(payload, 2).unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn embedding_count_mismatch_is_upstream_error() {
        let payload: EmbeddingResponse = serde_json::from_value(json!({
            "data": [{ "embedding": [1.0], "index": 0 }]
        }))
        .unwrap();

        assert!(matches!(
            collect_embeddings(payload, 2),
            Err(ApiError::Upstream(_))
        ));
    }

    #[test]
    fn first_choice_content_is_the_answer() {
        let payload: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Thirty days." } }]
        }))
        .unwrap();
        assert_eq!(first_choice(payload).unwrap(), "Thirty days.");

        let empty: ChatCompletionResponse = serde_json::from_value(json!({ "choices": [] })).unwrap();
        assert!(matches!(first_choice(empty), Err(ApiError::Upstream(_))));
    }

    #[test]
    fn chat_request_serializes_two_turns() {
        let request = ChatRequest::new(
            "gpt-4",
            vec![ChatMessage::system("sys"), ChatMessage::user("hi")],
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4");
        assert_eq!(value["messages"][0]["role"], "system");
        assert_eq!(value["messages"][1]["content"], "hi");
        assert!(value.get("temperature").is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn live_openai_round_trip() {
        let settings = OpenAiSettings {
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            ..Default::default()
        };
        let client = OpenAiClient::new(&settings).unwrap();

        let embedding = client.embed("Refunds are processed within 30 days.").await.unwrap();
        println!("embedding dims: {}", embedding.len());
        assert_eq!(embedding.len(), settings.embedding_dimensions);

        let answer = client
            .generate("You are a helpful assistant.", "Say hello in one word.")
            .await
            .unwrap();
        println!("answer: {}", answer);
        assert!(!answer.is_empty());
    }
}
