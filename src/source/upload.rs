use async_trait::async_trait;

use crate::error::{KbforgeError, Result};
use crate::filter::FileFilter;
use crate::source::{DocumentRef, FetchedBlob, SourceConnector, SourceKind};
use crate::staging::StagingArea;

/// One caller-provided file: a name plus its raw bytes.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self { name: name.into(), bytes }
    }
}

/// Connector over files the caller hands in directly.
///
/// There is no remote listing step: the ref set is exactly the set of files
/// provided for this batch. The media type is derived from the file name;
/// anything without a supported extension is still listed so the pipeline
/// records a `Skipped` outcome for it (the caller should see every file it
/// handed in accounted for).
pub struct UserUpload {
    files: Vec<UploadedFile>,
}

impl UserUpload {
    pub fn new(files: Vec<UploadedFile>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl SourceConnector for UserUpload {
    fn kind(&self) -> SourceKind {
        SourceKind::UserUpload
    }

    async fn list(&self) -> Result<Vec<DocumentRef>> {
        let refs = self
            .files
            .iter()
            .map(|file| {
                let media_type = FileFilter::by_name(&file.name)
                    .map(|t| t.media_type().to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());

                DocumentRef {
                    source_kind: SourceKind::UserUpload,
                    identifier: file.name.clone(),
                    display_name: file.name.clone(),
                    media_type,
                }
            })
            .collect();

        Ok(refs)
    }

    async fn fetch(&self, doc: &DocumentRef, staging: &StagingArea) -> Result<FetchedBlob> {
        let file = self
            .files
            .iter()
            .find(|f| f.name == doc.identifier)
            .ok_or_else(|| {
                KbforgeError::Fetch(format!("no uploaded bytes for {}", doc.identifier))
            })?;

        let local_path = staging.write(SourceKind::UserUpload, &file.name, &file.bytes)?;

        Ok(FetchedBlob {
            doc: doc.clone(),
            local_path,
            size: file.bytes.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_is_exactly_the_provided_set() {
        let connector = UserUpload::new(vec![
            UploadedFile::new("a.pdf", b"%PDF".to_vec()),
            UploadedFile::new("b.zip", b"PK".to_vec()),
        ]);

        let refs = connector.list().await.unwrap();

        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].media_type, "application/pdf");
        // Unsupported uploads are listed with their raw type so the
        // pipeline can record a Skipped outcome for them.
        assert_eq!(refs[1].media_type, "application/octet-stream");
    }

    #[tokio::test]
    async fn test_fetch_writes_caller_bytes_to_staging() {
        let temp_dir = TempDir::new().unwrap();
        let staging = StagingArea::new(temp_dir.path());

        let connector = UserUpload::new(vec![UploadedFile::new("notes.md", b"# hi".to_vec())]);
        let refs = connector.list().await.unwrap();
        let blob = connector.fetch(&refs[0], &staging).await.unwrap();

        assert!(blob.local_path.starts_with(temp_dir.path()));
        assert_eq!(std::fs::read(&blob.local_path).unwrap(), b"# hi");
        assert_eq!(blob.size, 4);
    }

    #[tokio::test]
    async fn test_fetch_unknown_identifier_is_fetch_error() {
        let temp_dir = TempDir::new().unwrap();
        let staging = StagingArea::new(temp_dir.path());
        let connector = UserUpload::new(vec![]);

        let doc = DocumentRef {
            source_kind: SourceKind::UserUpload,
            identifier: "ghost.txt".to_string(),
            display_name: "ghost.txt".to_string(),
            media_type: "text/plain".to_string(),
        };

        let err = connector.fetch(&doc, &staging).await.unwrap_err();
        assert!(matches!(err, KbforgeError::Fetch(_)));
    }
}
