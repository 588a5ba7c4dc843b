//! Document conversion collaborator.
//!
//! Turns uploaded file bytes into extracted text. Plain-text formats are
//! decoded in-process; everything else goes to an external conversion
//! service that returns markdown. Layout and structure extraction stay
//! with that service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::config::ConversionSettings;
use crate::core::errors::ApiError;

const PLAIN_TEXT_TYPES: [&str; 5] = ["txt", "md", "markdown", "csv", "json"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub html: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FigureData {
    pub id: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    #[serde(default)]
    pub headings: Vec<String>,
    #[serde(default)]
    pub sections: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConvertedDocument {
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub tables: Vec<TableData>,
    #[serde(default)]
    pub figures: Vec<FigureData>,
    #[serde(default)]
    pub structure: DocumentStructure,
}

impl ConvertedDocument {
    pub fn from_text(text: String) -> Self {
        Self {
            text,
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// `file_type` is the lower-case extension without the dot.
    async fn convert(&self, bytes: &[u8], file_type: &str) -> Result<ConvertedDocument, ApiError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextConverter;

impl PlainTextConverter {
    pub fn supports(file_type: &str) -> bool {
        PLAIN_TEXT_TYPES.contains(&file_type)
    }
}

#[async_trait]
impl DocumentConverter for PlainTextConverter {
    async fn convert(&self, bytes: &[u8], file_type: &str) -> Result<ConvertedDocument, ApiError> {
        if !Self::supports(file_type) {
            return Err(ApiError::BadRequest(format!(
                "Unsupported plain-text type: {}",
                file_type
            )));
        }
        Ok(ConvertedDocument::from_text(
            String::from_utf8_lossy(bytes).into_owned(),
        ))
    }
}

/// Client for an external conversion service exposing
/// `POST /v1/convert/file` (multipart upload, markdown output).
pub struct HttpConverter {
    endpoint: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    document: Option<ConvertedPayload>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ConvertedPayload {
    #[serde(default)]
    md_content: Option<String>,
}

impl HttpConverter {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::internal)?;
        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client,
        })
    }
}

fn extract_markdown(payload: ConvertResponse) -> Result<ConvertedDocument, ApiError> {
    if !payload.errors.is_empty() {
        return Err(ApiError::Upstream(format!(
            "Document conversion failed: {}",
            Value::Array(payload.errors)
        )));
    }
    if let Some(status) = payload.status.as_deref() {
        if status.eq_ignore_ascii_case("failure") {
            return Err(ApiError::Upstream(
                "Document conversion reported failure".to_string(),
            ));
        }
    }

    let text = payload
        .document
        .and_then(|doc| doc.md_content)
        .ok_or_else(|| ApiError::Upstream("Conversion returned no markdown content".to_string()))?;

    Ok(ConvertedDocument::from_text(text))
}

#[async_trait]
impl DocumentConverter for HttpConverter {
    async fn convert(&self, bytes: &[u8], file_type: &str) -> Result<ConvertedDocument, ApiError> {
        let url = format!("{}/v1/convert/file", self.endpoint);
        let part = Part::bytes(bytes.to_vec()).file_name(format!("document.{}", file_type));
        let form = Form::new()
            .part("files", part)
            .text("to_formats", "md");

        let res = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(ApiError::upstream)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream(format!(
                "Document conversion request failed ({}): {}",
                status, text
            )));
        }

        let payload: ConvertResponse = res.json().await.map_err(ApiError::upstream)?;
        extract_markdown(payload)
    }
}

/// Plain text locally, everything else remotely when an endpoint exists.
pub struct RoutingConverter {
    plain: PlainTextConverter,
    remote: Option<HttpConverter>,
}

impl RoutingConverter {
    pub fn new(remote: Option<HttpConverter>) -> Self {
        Self {
            plain: PlainTextConverter,
            remote,
        }
    }

    pub fn from_settings(settings: &ConversionSettings) -> Result<Self, ApiError> {
        let remote = match settings.endpoint.as_deref().filter(|e| !e.trim().is_empty()) {
            Some(endpoint) => Some(HttpConverter::new(
                endpoint,
                Duration::from_secs(settings.timeout_secs),
            )?),
            None => {
                tracing::warn!("No conversion endpoint configured; only plain-text uploads can be ingested");
                None
            }
        };
        Ok(Self::new(remote))
    }
}

#[async_trait]
impl DocumentConverter for RoutingConverter {
    async fn convert(&self, bytes: &[u8], file_type: &str) -> Result<ConvertedDocument, ApiError> {
        if PlainTextConverter::supports(file_type) {
            return self.plain.convert(bytes, file_type).await;
        }
        match &self.remote {
            Some(remote) => remote.convert(bytes, file_type).await,
            None => Err(ApiError::BadRequest(format!(
                "No converter available for file type '{}'",
                file_type
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn plain_text_is_decoded_lossily() {
        let doc = PlainTextConverter
            .convert(b"Hello. World \xff.", "txt")
            .await
            .unwrap();
        assert!(doc.text.starts_with("Hello. World "));
        assert!(doc.tables.is_empty());
        assert!(doc.structure.headings.is_empty());
    }

    #[tokio::test]
    async fn routing_without_endpoint_rejects_binary_types() {
        let converter = RoutingConverter::new(None);

        let md = converter.convert(b"# Title", "md").await.unwrap();
        assert_eq!(md.text, "# Title");

        assert!(matches!(
            converter.convert(b"%PDF", "pdf").await,
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn markdown_is_read_from_conversion_payload() {
        let ok: ConvertResponse = serde_json::from_value(json!({
            "document": { "md_content": "# Policy\n\nRefunds are processed within 30 days." },
            "status": "success",
            "errors": []
        }))
        .unwrap();
        let doc = extract_markdown(ok).unwrap();
        assert!(doc.text.contains("Refunds are processed"));

        let failed: ConvertResponse = serde_json::from_value(json!({
            "document": null,
            "status": "failure",
            "errors": [{ "message": "unreadable" }]
        }))
        .unwrap();
        assert!(matches!(extract_markdown(failed), Err(ApiError::Upstream(_))));
    }
}
