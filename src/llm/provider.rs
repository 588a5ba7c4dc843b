use async_trait::async_trait;

use crate::core::errors::ApiError;

/// Maps text to a fixed-dimension vector through an external service.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// provider name used in logs (e.g. "openai")
    fn name(&self) -> &str;

    /// embed a single text; transport errors propagate unchanged
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError>;

    /// embed several texts, results in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Produces an answer from one system instruction and one user turn.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ApiError>;
}
