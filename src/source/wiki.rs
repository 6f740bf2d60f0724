use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::error::{KbforgeError, Result};
use crate::filter::FileFilter;
use crate::source::{DocumentRef, FetchedBlob, SourceConnector, SourceKind};
use crate::staging::StagingArea;

/// Pages/attachments requested per REST call. Listing pages with
/// `start`/`limit` until the space is exhausted.
const PAGE_LIMIT: usize = 50;

/// Username plus API token for the wiki's REST interface.
#[derive(Debug, Clone)]
pub struct WikiCredentials {
    pub username: String,
    pub api_token: String,
}

impl WikiCredentials {
    /// Reject obviously unusable material before any request is issued.
    pub fn new(username: impl Into<String>, api_token: impl Into<String>) -> Result<Self> {
        let username = username.into();
        let api_token = api_token.into();

        if username.trim().is_empty() || api_token.trim().is_empty() {
            return Err(KbforgeError::Auth(
                "wiki credentials require a username and an API token".to_string(),
            ));
        }

        Ok(Self { username, api_token })
    }
}

#[derive(Debug, Deserialize)]
struct PageListResponse {
    #[serde(default)]
    results: Vec<Page>,
}

#[derive(Debug, Deserialize)]
struct Page {
    id: String,
    title: String,
}

#[derive(Debug, Deserialize)]
struct AttachmentListResponse {
    #[serde(default)]
    results: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    title: String,
    metadata: AttachmentMetadata,
}

#[derive(Debug, Deserialize)]
struct AttachmentMetadata {
    #[serde(rename = "mediaType")]
    media_type: String,
}

/// Connector over a wiki's page attachments.
///
/// Listing enumerates every page, then every attachment on each page,
/// keeping attachments whose media type is supported. Fetch downloads one
/// attachment's content by page id and file name. The ref identifier is
/// `page_id/attachment_name`.
pub struct WikiAttachments {
    client: Client,
    base_url: Url,
    credentials: WikiCredentials,
}

impl WikiAttachments {
    pub fn new(base_url: &str, credentials: WikiCredentials) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| KbforgeError::Config(format!("invalid wiki base URL: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| KbforgeError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| KbforgeError::Config("wiki base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["rest", "api"])
            .extend(segments);
        Ok(url)
    }

    /// Download endpoint for one attachment: page id plus file name. The
    /// URL builder percent-encodes attachment names with spaces or unicode.
    fn download_url(&self, page_id: &str, file_name: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| KbforgeError::Config("wiki base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["download", "attachments", page_id, file_name]);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T> {
        let response = self
            .client
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.api_token))
            .send()
            .await
            .map_err(|e| KbforgeError::Listing(format!("wiki listing: {e}")))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(KbforgeError::Auth(format!(
                    "wiki rejected the credentials (HTTP {})",
                    response.status()
                )));
            }
            status if !status.is_success() => {
                return Err(KbforgeError::Listing(format!(
                    "wiki listing failed (HTTP {status})"
                )));
            }
            _ => {}
        }

        response
            .json()
            .await
            .map_err(|e| KbforgeError::Listing(format!("wiki listing: {e}")))
    }

    /// Enumerate all pages, following `start`/`limit` pagination.
    async fn list_pages(&self) -> Result<Vec<Page>> {
        let mut pages = Vec::new();
        let mut start = 0usize;

        loop {
            let mut url = self.api_url(&["content"])?;
            url.query_pairs_mut()
                .append_pair("type", "page")
                .append_pair("start", &start.to_string())
                .append_pair("limit", &PAGE_LIMIT.to_string());

            let batch: PageListResponse = self.get_json(url).await?;
            let count = batch.results.len();
            pages.extend(batch.results);

            if count < PAGE_LIMIT {
                break;
            }
            start += count;
        }

        Ok(pages)
    }

    /// Enumerate one page's attachments, keeping supported media types.
    async fn list_attachments(&self, page: &Page) -> Result<Vec<DocumentRef>> {
        let mut refs = Vec::new();
        let mut start = 0usize;

        loop {
            let mut url = self.api_url(&["content", &page.id, "child", "attachment"])?;
            url.query_pairs_mut()
                .append_pair("start", &start.to_string())
                .append_pair("limit", &PAGE_LIMIT.to_string());

            let batch: AttachmentListResponse = self.get_json(url).await?;
            let count = batch.results.len();

            for attachment in batch.results {
                let Some(doc_type) = FileFilter::by_media_type(&attachment.metadata.media_type)
                else {
                    continue;
                };

                refs.push(DocumentRef {
                    source_kind: SourceKind::WikiAttachments,
                    identifier: format!("{}/{}", page.id, attachment.title),
                    display_name: format!("{}: {}", page.title, attachment.title),
                    media_type: doc_type.media_type().to_string(),
                });
            }

            if count < PAGE_LIMIT {
                break;
            }
            start += count;
        }

        Ok(refs)
    }
}

#[async_trait]
impl SourceConnector for WikiAttachments {
    fn kind(&self) -> SourceKind {
        SourceKind::WikiAttachments
    }

    async fn list(&self) -> Result<Vec<DocumentRef>> {
        let pages = self.list_pages().await?;
        log::info!("Enumerating attachments across {} wiki page(s)", pages.len());

        let mut refs = Vec::new();
        for page in &pages {
            refs.extend(self.list_attachments(page).await?);
        }

        log::info!("Listed {} supported wiki attachment(s)", refs.len());
        Ok(refs)
    }

    async fn fetch(&self, doc: &DocumentRef, staging: &StagingArea) -> Result<FetchedBlob> {
        let (page_id, file_name) = doc.identifier.split_once('/').ok_or_else(|| {
            KbforgeError::Fetch(format!("malformed attachment identifier: {}", doc.identifier))
        })?;

        let url = self.download_url(page_id, file_name)?;

        let response = self
            .client
            .get(url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.api_token))
            .send()
            .await
            .map_err(|e| KbforgeError::Fetch(format!("{}: {e}", doc.display_name)))?;

        if !response.status().is_success() {
            return Err(KbforgeError::Fetch(format!(
                "{}: download failed (HTTP {})",
                doc.display_name,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| KbforgeError::Fetch(format!("{}: {e}", doc.display_name)))?;

        let local_path = staging.write(SourceKind::WikiAttachments, file_name, &bytes)?;

        Ok(FetchedBlob {
            doc: doc.clone(),
            local_path,
            size: bytes.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> WikiAttachments {
        let creds = WikiCredentials::new("user@example.com", "token").unwrap();
        WikiAttachments::new("https://wiki.example.com/", creds).unwrap()
    }

    #[test]
    fn test_blank_credentials_rejected() {
        assert!(matches!(
            WikiCredentials::new("", "token").unwrap_err(),
            KbforgeError::Auth(_)
        ));
        assert!(matches!(
            WikiCredentials::new("user", "  ").unwrap_err(),
            KbforgeError::Auth(_)
        ));
    }

    #[test]
    fn test_api_url_layout() {
        let url = connector()
            .api_url(&["content", "123", "child", "attachment"])
            .unwrap();
        assert_eq!(url.path(), "/rest/api/content/123/child/attachment");
    }

    #[test]
    fn test_download_url_encodes_attachment_name() {
        let url = connector().download_url("9001", "design notes.pdf").unwrap();
        assert_eq!(url.path(), "/download/attachments/9001/design%20notes.pdf");
    }

    #[test]
    fn test_attachment_media_type_parsing() {
        let body = r#"{
            "results": [
                {"title": "handbook.pdf", "metadata": {"mediaType": "application/pdf"}},
                {"title": "photo.png", "metadata": {"mediaType": "image/png"}}
            ]
        }"#;
        let parsed: AttachmentListResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert!(FileFilter::matches_media_type(&parsed.results[0].metadata.media_type));
        assert!(!FileFilter::matches_media_type(&parsed.results[1].metadata.media_type));
    }

    #[tokio::test]
    async fn test_malformed_identifier_is_fetch_error() {
        let doc = DocumentRef {
            source_kind: SourceKind::WikiAttachments,
            identifier: "no-slash".to_string(),
            display_name: "no-slash".to_string(),
            media_type: "application/pdf".to_string(),
        };

        let staging_dir = tempfile::TempDir::new().unwrap();
        let staging = StagingArea::new(staging_dir.path());

        let err = connector().fetch(&doc, &staging).await.unwrap_err();
        assert!(matches!(err, KbforgeError::Fetch(_)));
    }
}
