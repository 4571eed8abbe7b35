//! Uploaded files and their temporary on-disk copies.
//!
//! The RAG engine ingests from a file-system path, while an upload arrives
//! as an in-memory blob. [`materialize`] bridges the two by writing the blob
//! to a `.pdf` temp file. The returned [`TempPdf`] owns that file and deletes
//! it when dropped, so the file is released whether ingestion succeeds or
//! fails. Deletion errors are ignored.

use crate::error::{RagDemoError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// A file handed to the session by the user: display name plus raw bytes.
#[derive(Clone)]
pub struct Upload {
    name: String,
    bytes: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    /// Read a local file; the display name is its file name component.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| RagDemoError::UploadUnreadable {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the blob starts with the `%PDF` magic. Informational only;
    /// uploads are never rejected on this basis.
    pub fn looks_like_pdf(&self) -> bool {
        self.bytes.starts_with(b"%PDF")
    }
}

impl std::fmt::Debug for Upload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upload")
            .field("name", &self.name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A temporary `.pdf` file, removed when this value is dropped.
#[derive(Debug)]
pub struct TempPdf {
    file: NamedTempFile,
}

impl TempPdf {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file now. Errors are swallowed, like the drop path.
    pub fn release(self) {
        let path: PathBuf = self.file.path().to_path_buf();
        if let Err(e) = self.file.close() {
            debug!("Temp file {} not removed: {}", path.display(), e);
        }
    }
}

/// Write `bytes` to a new `.pdf` file in `dir` (system temp dir when `None`).
pub fn materialize(bytes: &[u8], dir: Option<&Path>) -> Result<TempPdf> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("mmrag-upload-").suffix(".pdf");
    let mut file = match dir {
        Some(d) => builder.tempfile_in(d),
        None => builder.tempfile(),
    }
    .map_err(|source| RagDemoError::TempFile { source })?;

    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|source| RagDemoError::TempFile { source })?;

    debug!(
        "Materialized {} bytes to {}",
        bytes.len(),
        file.path().display()
    );
    Ok(TempPdf { file })
}
