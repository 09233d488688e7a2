//! Download resolution: allow-list check on the base name, catalog path,
//! content type, open handle.

use domains::{DomainError, ReadHandle, Result, StorageError};

use crate::catalog::Catalog;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Fixed extension → MIME mapping; anything unknown is served as binary.
pub fn content_type_for(file_name: &str) -> &'static str {
    let lower = file_name.to_lowercase();
    let ext = lower.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    match ext {
        "pdf" => "application/pdf",
        "epub" => "application/epub+zip",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "rtf" => "application/rtf",
        "txt" => "text/plain",
        _ => OCTET_STREAM,
    }
}

/// An opened document ready to be streamed to the client.
pub struct Download {
    /// Base name, used for `Content-Disposition`.
    pub file_name: String,
    pub content_type: &'static str,
    pub size: u64,
    pub reader: Box<dyn ReadHandle>,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl Catalog {
    /// Fails with `Validation` (bad extension), `NotFound` (missing file) or
    /// `Storage` (the medium refused to open it).
    pub async fn open_download(&self, requested: &str) -> Result<Download> {
        let target = self.resolve_requested(requested)?;
        let storage = self.storage();

        if !storage.exists(&target.path).await {
            return Err(DomainError::NotFound("file", target.file_name));
        }
        let reader = match storage.open_read(&target.path).await {
            Ok(reader) => reader,
            Err(StorageError::NotFound(_)) => return Err(DomainError::NotFound("file", target.file_name)),
            Err(StorageError::InvalidPath(p)) => {
                return Err(DomainError::Validation(format!("invalid file name: {p}")))
            }
            Err(e) => {
                tracing::error!(path = %target.path, error = %e, "failed to open file for download");
                return Err(e.into());
            }
        };

        tracing::info!(path = %target.path, size = reader.size(), "download started");
        Ok(Download {
            content_type: content_type_for(&target.file_name),
            size: reader.size(),
            file_name: target.file_name,
            reader,
        })
    }
}
