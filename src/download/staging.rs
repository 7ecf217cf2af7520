//! Scratch space for one download, next to the final output.
//!
//! Fetched blocks and the merged document are written inside a hidden
//! temporary directory in the output's parent, so the final rename stays on
//! one filesystem. Dropping the [`StagingArea`] removes everything it holds;
//! [`StagingArea::commit`] is the only way a file reaches the output path.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StagingError {
    fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Temporary directory holding the intermediate files of one download.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
    output: PathBuf,
}

impl StagingArea {
    /// Creates `.{file_name}.XXXXXX.parts/` beside `output`.
    ///
    /// # Errors
    ///
    /// [`StagingError::Io`] if the directory cannot be created (missing or
    /// read-only parent, for instance).
    pub fn create(output: &Path) -> Result<Self, StagingError> {
        let parent = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let name = output
            .file_name()
            .map_or_else(|| "download".into(), |n| n.to_string_lossy());
        let dir = tempfile::Builder::new()
            .prefix(&format!(".{name}."))
            .suffix(".parts")
            .tempdir_in(parent)
            .map_err(|e| StagingError::io(parent, e))?;
        debug!(path = %dir.path().display(), "staging area created");
        Ok(Self {
            dir,
            output: output.to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// File name used for block `index` of the plan.
    #[must_use]
    pub fn block_path(&self, index: usize) -> PathBuf {
        self.dir.path().join(format!("block-{index:05}.pdf"))
    }

    /// Persists a fetched block.
    ///
    /// # Errors
    ///
    /// [`StagingError::Io`] on write failure.
    pub async fn write_block(&self, index: usize, payload: &[u8]) -> Result<PathBuf, StagingError> {
        let path = self.block_path(index);
        tokio::fs::write(&path, payload)
            .await
            .map_err(|e| StagingError::io(&path, e))?;
        Ok(path)
    }

    /// Reads a block written by [`StagingArea::write_block`].
    ///
    /// # Errors
    ///
    /// [`StagingError::Io`] on read failure.
    pub async fn read_block(&self, index: usize) -> Result<Vec<u8>, StagingError> {
        let path = self.block_path(index);
        tokio::fs::read(&path)
            .await
            .map_err(|e| StagingError::io(&path, e))
    }

    /// Writes `bytes` inside the staging area, then renames it onto the output.
    ///
    /// An existing output is replaced only by the rename. The staging
    /// directory is removed afterwards, whether or not the rename succeeded.
    ///
    /// # Errors
    ///
    /// [`StagingError::Io`] if the write or the rename fails.
    #[instrument(skip(self, bytes), fields(output = %self.output.display(), bytes = bytes.len()))]
    pub async fn commit(self, bytes: &[u8]) -> Result<PathBuf, StagingError> {
        let staged = self.dir.path().join("assembled.pdf");
        tokio::fs::write(&staged, bytes)
            .await
            .map_err(|e| StagingError::io(&staged, e))?;
        tokio::fs::rename(&staged, &self.output)
            .await
            .map_err(|e| StagingError::io(&self.output, e))?;
        debug!("output committed");
        Ok(self.output)
    }
}
