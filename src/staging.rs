use std::path::{Path, PathBuf};

use crate::error::{KbforgeError, Result};
use crate::source::SourceKind;

/// Writable scratch location for fetched bytes, namespaced per source kind
/// so concurrent batches against different sources never collide on a path.
///
/// Name collisions within one batch overwrite rather than error
/// (last write wins).
#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensure the scratch directory for one source kind exists, creating it
    /// if absent. Idempotent.
    pub fn reserve(&self, kind: SourceKind) -> Result<PathBuf> {
        let dir = self.root.join(kind.staging_dir());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Materialize fetched bytes under the source's scratch directory and
    /// return the local path.
    pub fn write(&self, kind: SourceKind, name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let dir = self.reserve(kind)?;
        let file_name = sanitize_name(name)?;
        let path = dir.join(file_name);
        std::fs::write(&path, bytes)?;
        log::debug!("Staged {} byte(s) to {}", bytes.len(), path.display());
        Ok(path)
    }
}

/// Reduce a remote-supplied name to its final path component so a crafted
/// name like `../../etc/passwd` cannot escape the scratch directory.
fn sanitize_name(name: &str) -> Result<String> {
    let normalized = name.replace('\\', "/");
    let candidate = normalized
        .rsplit('/')
        .next()
        .unwrap_or("")
        .trim();

    if candidate.is_empty() || candidate == "." || candidate == ".." {
        return Err(KbforgeError::Fetch(format!("unusable file name: {name}")));
    }

    Ok(candidate.to_string())
}
