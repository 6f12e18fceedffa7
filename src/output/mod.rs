//! Artifact writing with atomic replace semantics.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::core::{Error, Result};
use crate::render::Artifact;

/// Writes rendered artifacts under a configured root directory.
///
/// Every write goes to a temp file in the destination directory first
/// and is renamed over the target, so a crash mid-write never leaves a
/// truncated artifact visible, and a prior artifact at the same path is
/// replaced whole rather than appended to.
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> ArtifactWriter {
        ArtifactWriter { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write one artifact, creating parent directories as needed.
    /// Returns the absolute destination path.
    pub fn write(&self, artifact: &Artifact) -> Result<PathBuf> {
        let path = self.root.join(&artifact.relative_path);
        let dir = path.parent().unwrap_or(&self.root);
        std::fs::create_dir_all(dir).map_err(|e| Error::write(&path, e))?;

        let mut temp = NamedTempFile::new_in(dir).map_err(|e| Error::write(&path, e))?;
        temp.write_all(&artifact.bytes)
            .map_err(|e| Error::write(&path, e))?;
        temp.flush().map_err(|e| Error::write(&path, e))?;
        temp.persist(&path).map_err(|e| Error::write(&path, e.error))?;

        tracing::debug!(
            path = %path.display(),
            bytes = artifact.bytes.len(),
            "artifact written"
        );
        Ok(path)
    }
}
