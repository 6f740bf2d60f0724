use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::error::{KbforgeError, Result};
use crate::filter::{FileFilter, SupportedType};
use crate::source::{DocumentRef, FetchedBlob, SourceConnector, SourceKind};
use crate::staging::StagingArea;

/// Results per metadata query. Listing follows `nextPageToken` until the
/// drive is exhausted, so this caps request size, not the total ref count.
const PAGE_SIZE: usize = 100;

/// Credential material for the cloud drive, parsed from a JSON blob.
///
/// The blob is parsed with a structured-data parser; anything malformed is
/// rejected as `Auth` before a single request is issued. Token acquisition
/// (service-account exchange, refresh) is the caller's concern — the core
/// only needs a bearer token valid for the duration of one batch.
#[derive(Debug, Clone, Deserialize)]
pub struct DriveCredentials {
    pub access_token: String,
}

impl DriveCredentials {
    pub fn from_json(text: &str) -> Result<Self> {
        let creds: DriveCredentials = serde_json::from_str(text).map_err(|e| {
            KbforgeError::Auth(format!("malformed cloud drive credentials: {e}"))
        })?;

        if creds.access_token.trim().is_empty() {
            return Err(KbforgeError::Auth(
                "cloud drive credentials carry an empty access token".to_string(),
            ));
        }

        Ok(creds)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListResponse {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    mime_type: String,
}

/// Connector over a cloud drive.
///
/// Listing issues a metadata query restricted to the three supported MIME
/// types and pages through the full result set. Fetch streams the file
/// content chunk by chunk, then stages the complete buffer.
#[derive(Debug)]
pub struct CloudDriveFolder {
    client: Client,
    base_url: Url,
    credentials: DriveCredentials,
    folder_id: Option<String>,
}

impl CloudDriveFolder {
    pub fn new(
        base_url: &str,
        credentials: DriveCredentials,
        folder_id: Option<String>,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|e| KbforgeError::Config(format!("invalid drive base URL: {e}")))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| KbforgeError::Config(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            credentials,
            folder_id,
        })
    }

    /// Metadata query restricted to supported MIME types, optionally scoped
    /// to one folder.
    fn list_query(&self) -> String {
        let mime_clause = SupportedType::all_media_types()
            .iter()
            .map(|mt| format!("mimeType='{mt}'"))
            .collect::<Vec<_>>()
            .join(" or ");

        match &self.folder_id {
            Some(folder) => format!("'{folder}' in parents and ({mime_clause})"),
            None => mime_clause,
        }
    }

    /// Endpoint URL for `files` plus any extra path segments, appended to
    /// the configured base so names and ids are percent-encoded.
    fn files_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| KbforgeError::Config("drive base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("files")
            .extend(segments);
        Ok(url)
    }
}

#[async_trait]
impl SourceConnector for CloudDriveFolder {
    fn kind(&self) -> SourceKind {
        SourceKind::CloudDrive
    }

    async fn list(&self) -> Result<Vec<DocumentRef>> {
        let query = self.list_query();
        let mut refs = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut url = self.files_url(&[])?;
            {
                let mut qp = url.query_pairs_mut();
                qp.append_pair("q", &query);
                qp.append_pair("pageSize", &PAGE_SIZE.to_string());
                qp.append_pair("fields", "nextPageToken,files(id,name,mimeType)");
                if let Some(token) = &page_token {
                    qp.append_pair("pageToken", token);
                }
            }

            let response = self
                .client
                .get(url)
                .bearer_auth(&self.credentials.access_token)
                .send()
                .await
                .map_err(|e| KbforgeError::Listing(format!("cloud drive listing: {e}")))?;

            match response.status() {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    return Err(KbforgeError::Auth(format!(
                        "cloud drive rejected the access token (HTTP {})",
                        response.status()
                    )));
                }
                status if !status.is_success() => {
                    return Err(KbforgeError::Listing(format!(
                        "cloud drive listing failed (HTTP {status})"
                    )));
                }
                _ => {}
            }

            let page: FileListResponse = response
                .json()
                .await
                .map_err(|e| KbforgeError::Listing(format!("cloud drive listing: {e}")))?;

            pages += 1;
            for file in page.files {
                // The query already restricts to supported MIME types; the
                // per-file check keeps the invariant local.
                let Some(doc_type) = FileFilter::by_media_type(&file.mime_type) else {
                    continue;
                };

                refs.push(DocumentRef {
                    source_kind: SourceKind::CloudDrive,
                    identifier: file.id,
                    display_name: file.name,
                    media_type: doc_type.media_type().to_string(),
                });
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        log::info!(
            "Listed {} supported drive file(s) across {} page(s)",
            refs.len(),
            pages
        );
        Ok(refs)
    }

    async fn fetch(&self, doc: &DocumentRef, staging: &StagingArea) -> Result<FetchedBlob> {
        let mut url = self.files_url(&[doc.identifier.as_str()])?;
        url.query_pairs_mut().append_pair("alt", "media");

        let mut response = self
            .client
            .get(url)
            .bearer_auth(&self.credentials.access_token)
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

        // Stream chunks until the download completes, then stage the full
        // buffer under the drive file's name.
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| KbforgeError::Fetch(format!("{}: {e}", doc.display_name)))?
        {
            buffer.extend_from_slice(&chunk);
        }

        let local_path = staging.write(SourceKind::CloudDrive, &doc.display_name, &buffer)?;

        Ok(FetchedBlob {
            doc: doc.clone(),
            local_path,
            size: buffer.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_parse_well_formed_json() {
        let creds = DriveCredentials::from_json(r#"{"access_token": "ya29.token"}"#).unwrap();
        assert_eq!(creds.access_token, "ya29.token");
    }

    #[test]
    fn test_malformed_credential_text_is_auth_error() {
        // The original evaluated this text as code; it must only ever be
        // parsed as data, and bad data is an auth failure.
        let err = DriveCredentials::from_json("__import__('os')").unwrap_err();
        assert!(matches!(err, KbforgeError::Auth(_)));

        let err = DriveCredentials::from_json("{not json").unwrap_err();
        assert!(matches!(err, KbforgeError::Auth(_)));
    }

    #[test]
    fn test_empty_access_token_is_auth_error() {
        let err = DriveCredentials::from_json(r#"{"access_token": "  "}"#).unwrap_err();
        assert!(matches!(err, KbforgeError::Auth(_)));
    }

    #[test]
    fn test_list_query_covers_all_supported_mime_types() {
        let creds = DriveCredentials {
            access_token: "t".to_string(),
        };
        let connector =
            CloudDriveFolder::new("https://www.googleapis.com/drive/v3/", creds, None).unwrap();

        let query = connector.list_query();
        assert!(query.contains("mimeType='application/pdf'"));
        assert!(query.contains("mimeType='text/plain'"));
        assert!(query.contains("mimeType='text/markdown'"));
        assert!(!query.contains("in parents"));
    }

    #[test]
    fn test_list_query_scopes_to_folder() {
        let creds = DriveCredentials {
            access_token: "t".to_string(),
        };
        let connector = CloudDriveFolder::new(
            "https://www.googleapis.com/drive/v3/",
            creds,
            Some("folder123".to_string()),
        )
        .unwrap();

        let query = connector.list_query();
        assert!(query.starts_with("'folder123' in parents and ("));
    }

    #[test]
    fn test_files_url_percent_encodes_segments() {
        let creds = DriveCredentials {
            access_token: "t".to_string(),
        };
        let connector =
            CloudDriveFolder::new("https://www.googleapis.com/drive/v3/", creds, None).unwrap();

        let url = connector.files_url(&["abc 123"]).unwrap();
        assert_eq!(url.path(), "/drive/v3/files/abc%20123");
    }

    #[test]
    fn test_invalid_base_url_is_config_error() {
        let creds = DriveCredentials {
            access_token: "t".to_string(),
        };
        let err = CloudDriveFolder::new("not a url", creds, None).unwrap_err();
        assert!(matches!(err, KbforgeError::Config(_)));
    }
}
