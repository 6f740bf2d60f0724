use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::{KbforgeError, Result};
use crate::filter::SupportedType;
use crate::kb::KnowledgeBaseLoader;

/// Request structure for the knowledge-base service's document endpoint
#[derive(Serialize)]
struct LoadRequest<'a> {
    table: &'a str,
    file_name: &'a str,
    /// Raw document bytes, base64-encoded for the JSON transport.
    content: String,
}

/// HTTP client for the knowledge-base service.
///
/// Documents are posted to a per-format route (`pdf` or `text`), but every
/// route targets the same index table, so documents from all sources and
/// all batches become uniformly searchable together.
#[derive(Debug)]
pub struct KnowledgeBaseClient {
    client: Client,
    base_url: Url,
    table: String,
}

impl KnowledgeBaseClient {
    pub fn new(endpoint: &str, table: impl Into<String>) -> Result<Self> {
        let base_url = Url::parse(endpoint)
            .map_err(|e| KbforgeError::Config(format!("invalid knowledge-base endpoint: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| KbforgeError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            table: table.into(),
        })
    }

    /// Per-format route on the service. Text and markdown share the text
    /// loader; the index table is the same in both branches.
    fn route(doc_type: SupportedType) -> &'static str {
        match doc_type {
            SupportedType::Pdf => "pdf",
            SupportedType::PlainText | SupportedType::Markdown => "text",
        }
    }

    fn load_url(&self, doc_type: SupportedType) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                KbforgeError::Config("knowledge-base endpoint cannot be a base".to_string())
            })?
            .pop_if_empty()
            .extend(["v1", "knowledge", Self::route(doc_type)]);
        Ok(url)
    }
}

#[async_trait]
impl KnowledgeBaseLoader for KnowledgeBaseClient {
    async fn load(&self, path: &Path, doc_type: SupportedType) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                KbforgeError::Load(format!("staged path has no file name: {}", path.display()))
            })?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| KbforgeError::Load(format!("{file_name}: {e}")))?;

        let request = LoadRequest {
            table: &self.table,
            file_name,
            content: base64::engine::general_purpose::STANDARD.encode(&bytes),
        };

        let url = self.load_url(doc_type)?;
        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| KbforgeError::Load(format!("{file_name}: {e}")))?;

        if !response.status().is_success() {
            return Err(KbforgeError::Load(format!(
                "{file_name}: knowledge base rejected the document (HTTP {})",
                response.status()
            )));
        }

        log::debug!("Loaded {} into table {}", file_name, self.table);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_dispatch_by_type() {
        assert_eq!(KnowledgeBaseClient::route(SupportedType::Pdf), "pdf");
        assert_eq!(KnowledgeBaseClient::route(SupportedType::PlainText), "text");
        assert_eq!(KnowledgeBaseClient::route(SupportedType::Markdown), "text");
    }

    #[test]
    fn test_load_url_per_format() {
        let kb = KnowledgeBaseClient::new("http://localhost:8000/", "embeddings").unwrap();
        assert_eq!(
            kb.load_url(SupportedType::Pdf).unwrap().path(),
            "/v1/knowledge/pdf"
        );
        assert_eq!(
            kb.load_url(SupportedType::Markdown).unwrap().path(),
            "/v1/knowledge/text"
        );
    }

    #[test]
    fn test_request_serialization() {
        let request = LoadRequest {
            table: "embeddings",
            file_name: "a.pdf",
            content: base64::engine::general_purpose::STANDARD.encode(b"%PDF"),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["table"], "embeddings");
        assert_eq!(json["file_name"], "a.pdf");
        assert_eq!(json["content"], "JVBERg==");
    }

    #[test]
    fn test_invalid_endpoint_is_config_error() {
        let err = KnowledgeBaseClient::new("not a url", "embeddings").unwrap_err();
        assert!(matches!(err, KbforgeError::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_staged_file_is_load_error() {
        let kb = KnowledgeBaseClient::new("http://localhost:8000/", "embeddings").unwrap();
        let err = kb
            .load(Path::new("/nonexistent/staged.pdf"), SupportedType::Pdf)
            .await
            .unwrap_err();
        assert!(matches!(err, KbforgeError::Load(_)));
    }
}
