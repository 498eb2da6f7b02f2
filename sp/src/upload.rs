//! PDF intake: validation, transient local copy, remote upload
//!
//! The transient copy is a `NamedTempFile`; it is removed when dropped, which
//! happens at the end of [`upload_brief`] whether the upload worked or not.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

use crate::llm::{FileService, LlmError, RemoteFile};

pub const PDF_MIME_TYPE: &str = "application/pdf";

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Errors raised while taking in or uploading a document
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("{path} is not a PDF")]
    NotPdf { path: PathBuf },

    #[error("{path} is empty")]
    Empty { path: PathBuf },

    #[error("Could not read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not stage a local copy: {0}")]
    Stage(#[source] std::io::Error),

    #[error("Remote upload of {path} failed: {source}")]
    Remote {
        path: PathBuf,
        #[source]
        source: LlmError,
    },
}

/// A validated PDF copied to a temporary file
pub struct StagedPdf {
    file: NamedTempFile,
    file_name: String,
    size: usize,
}

impl StagedPdf {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Original file name, used as the remote display name
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Read and check a PDF without copying it
pub fn read_pdf(path: &Path) -> Result<Vec<u8>, UploadError> {
    debug!(?path, "read_pdf: called");
    let is_pdf_name = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    if !is_pdf_name {
        return Err(UploadError::NotPdf {
            path: path.to_path_buf(),
        });
    }

    let bytes = std::fs::read(path).map_err(|source| UploadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if bytes.is_empty() {
        return Err(UploadError::Empty {
            path: path.to_path_buf(),
        });
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(UploadError::NotPdf {
            path: path.to_path_buf(),
        });
    }
    Ok(bytes)
}

/// Validate a PDF and copy it to a transient local file
pub fn stage_pdf(path: &Path) -> Result<StagedPdf, UploadError> {
    let bytes = read_pdf(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "brief.pdf".to_string());

    let mut file = tempfile::Builder::new()
        .prefix("studyplan-")
        .suffix(".pdf")
        .tempfile()
        .map_err(UploadError::Stage)?;
    file.write_all(&bytes).map_err(UploadError::Stage)?;
    file.flush().map_err(UploadError::Stage)?;

    debug!(staged = ?file.path(), size = bytes.len(), "stage_pdf: staged");
    Ok(StagedPdf {
        file,
        file_name,
        size: bytes.len(),
    })
}

/// Stage `path` and upload the staged copy
///
/// The staged copy is gone by the time this returns, on every path.
pub async fn upload_brief(files: &dyn FileService, path: &Path) -> Result<RemoteFile, UploadError> {
    let staged = stage_pdf(path)?;
    let size = staged.size();
    let result = files.upload(staged.path(), PDF_MIME_TYPE, staged.file_name()).await;
    drop(staged);

    let remote = result.map_err(|source| UploadError::Remote {
        path: path.to_path_buf(),
        source,
    })?;
    info!(name = %remote.name, file = %path.display(), size, "Brief uploaded");
    Ok(remote)
}
