pub mod http;

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::filter::SupportedType;

pub use http::KnowledgeBaseClient;

/// Boundary to the external embedding/indexing service.
///
/// Accepts a staged file path and its document type; everything downstream
/// (chunking, embedding, vector storage) is the service's concern. Loading
/// the same file twice is last-write, not an error; true deduplication is
/// not guaranteed by this core.
#[async_trait]
pub trait KnowledgeBaseLoader: Send + Sync {
    async fn load(&self, path: &Path, doc_type: SupportedType) -> Result<()>;
}
