use std::path::{Path, PathBuf};

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::error::{KbforgeError, Result};
use crate::filter::FileFilter;
use crate::source::{DocumentRef, FetchedBlob, SourceConnector, SourceKind};
use crate::staging::StagingArea;

/// Connector over a configured local directory tree.
///
/// Listing recursively walks the root and keeps files whose name carries a
/// supported extension. Fetch is a no-op copy: the bytes are already local,
/// so the existing path is reported directly without re-reading the content
/// into memory.
pub struct LocalDirectory {
    root: PathBuf,
}

impl LocalDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SourceConnector for LocalDirectory {
    fn kind(&self) -> SourceKind {
        SourceKind::LocalDirectory
    }

    async fn list(&self) -> Result<Vec<DocumentRef>> {
        if !self.root.is_dir() {
            return Err(KbforgeError::Listing(format!(
                "local root does not exist or is not a directory: {}",
                self.root.display()
            )));
        }

        let mut refs = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            let name = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("");

            let Some(doc_type) = FileFilter::by_name(name) else {
                continue;
            };

            let display_name = path
                .strip_prefix(&self.root)
                .unwrap_or(path)
                .to_string_lossy()
                .to_string();

            refs.push(DocumentRef {
                source_kind: SourceKind::LocalDirectory,
                identifier: path.to_string_lossy().to_string(),
                display_name,
                media_type: doc_type.media_type().to_string(),
            });
        }

        log::info!("Discovered {} supported file(s) in {}", refs.len(), self.root.display());
        Ok(refs)
    }

    async fn fetch(&self, doc: &DocumentRef, _staging: &StagingArea) -> Result<FetchedBlob> {
        let path = Path::new(&doc.identifier);

        let metadata = std::fs::metadata(path)
            .map_err(|e| KbforgeError::Fetch(format!("{}: {}", doc.display_name, e)))?;

        if !metadata.is_file() {
            return Err(KbforgeError::Fetch(format!(
                "{}: not a regular file",
                doc.display_name
            )));
        }

        Ok(FetchedBlob {
            doc: doc.clone(),
            local_path: path.to_path_buf(),
            size: metadata.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_keeps_supported_and_skips_rest() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();

        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("a.pdf"), b"%PDF-1.4").unwrap();
        fs::write(root.join("b.txt"), "plain").unwrap();
        fs::write(root.join("c.exe"), b"\x4d\x5a").unwrap();
        fs::write(root.join("nested/d.md"), "# doc").unwrap();

        let connector = LocalDirectory::new(root);
        let refs = connector.list().await.unwrap();

        assert_eq!(refs.len(), 3);
        assert!(refs.iter().all(|r| r.source_kind == SourceKind::LocalDirectory));
        assert!(!refs.iter().any(|r| r.display_name.contains("c.exe")));
        assert!(refs.iter().any(|r| r.display_name.contains("d.md")));
    }

    #[tokio::test]
    async fn test_list_missing_root_is_listing_error() {
        let connector = LocalDirectory::new("/nonexistent/kbforge-test-root");
        let err = connector.list().await.unwrap_err();
        assert!(matches!(err, KbforgeError::Listing(_)));
    }

    #[tokio::test]
    async fn test_fetch_reports_existing_path_without_staging() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "hello").unwrap();

        let staging_dir = TempDir::new().unwrap();
        let staging = StagingArea::new(staging_dir.path());

        let connector = LocalDirectory::new(root);
        let refs = connector.list().await.unwrap();
        let blob = connector.fetch(&refs[0], &staging).await.unwrap();

        assert_eq!(blob.local_path, root.join("a.txt"));
        assert_eq!(blob.size, 5);
        // Nothing was copied into the staging area
        assert!(!staging_dir.path().join("local").exists());
    }

    #[tokio::test]
    async fn test_fetch_missing_file_is_fetch_error() {
        let temp_dir = TempDir::new().unwrap();
        let connector = LocalDirectory::new(temp_dir.path());
        let staging = StagingArea::new(temp_dir.path().join("staging"));

        let doc = DocumentRef {
            source_kind: SourceKind::LocalDirectory,
            identifier: temp_dir.path().join("gone.pdf").to_string_lossy().to_string(),
            display_name: "gone.pdf".to_string(),
            media_type: "application/pdf".to_string(),
        };

        let err = connector.fetch(&doc, &staging).await.unwrap_err();
        assert!(matches!(err, KbforgeError::Fetch(_)));
    }
}
