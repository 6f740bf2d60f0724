pub mod local;
pub mod upload;
pub mod s3;
pub mod drive;
pub mod wiki;

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

use crate::error::Result;
use crate::staging::StagingArea;

pub use local::LocalDirectory;
pub use upload::{UploadedFile, UserUpload};
pub use s3::{ObjectStorageBucket, S3Credentials};
pub use drive::{CloudDriveFolder, DriveCredentials};
pub use wiki::{WikiAttachments, WikiCredentials};

/// The five document origins the pipeline can ingest from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    LocalDirectory,
    UserUpload,
    ObjectStorage,
    CloudDrive,
    WikiAttachments,
}

impl SourceKind {
    /// Directory name used to namespace this source's staging area.
    pub fn staging_dir(&self) -> &'static str {
        match self {
            Self::LocalDirectory => "local",
            Self::UserUpload => "uploads",
            Self::ObjectStorage => "object_storage",
            Self::CloudDrive => "cloud_drive",
            Self::WikiAttachments => "wiki",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::LocalDirectory => "local directory",
            Self::UserUpload => "user upload",
            Self::ObjectStorage => "object storage",
            Self::CloudDrive => "cloud drive",
            Self::WikiAttachments => "wiki attachments",
        };
        f.write_str(name)
    }
}

/// One listed document, immutable once produced by a connector.
///
/// `identifier` is source-specific: a filesystem path, an object key, a
/// drive file id, or a `page_id/attachment_name` pair.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRef {
    pub source_kind: SourceKind,
    pub identifier: String,
    pub display_name: String,
    pub media_type: String,
}

/// Bytes materialized to a local path, ready for the knowledge-base loader.
///
/// Created by a connector's fetch step. The path is handed to the loader as
/// a read-only input; the raw bytes are not kept in memory after staging.
#[derive(Debug, Clone)]
pub struct FetchedBlob {
    pub doc: DocumentRef,
    pub local_path: PathBuf,
    pub size: u64,
}

/// Adapter exposing list/fetch over one document origin.
///
/// Contract:
/// - `list` enumerates the source and applies the supported-type filter
///   where the source naturally allows it (extension or MIME query). A
///   whole-source failure (auth rejected, network unreachable) is returned
///   as `Auth`/`Listing` and aborts the batch before anything is fetched.
/// - `fetch` materializes one listed document to the staging area. A
///   per-item failure is returned as `Fetch` and must not affect siblings;
///   the pipeline records it and moves on.
#[async_trait]
pub trait SourceConnector: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn list(&self) -> Result<Vec<DocumentRef>>;

    async fn fetch(&self, doc: &DocumentRef, staging: &StagingArea) -> Result<FetchedBlob>;
}
