//! Upload receiver.
//!
//! A transfer moves through `start → write* → finish` or ends in `abort`.
//! Only one transfer runs at a time: the session owns the permit of a
//! single-slot mutex for its whole life.

use domains::{Bucket, DomainError, Result, Storage, WriteHandle};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::catalog::{Catalog, CatalogPath};
use crate::storage::ensure_dir;

/// Bytes read back from a finished upload to prove it is readable.
const VERIFY_PROBE_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub file_name: String,
    pub bucket: Bucket,
    pub path: String,
    pub size: u64,
}

#[derive(Clone)]
pub struct Uploader {
    catalog: Arc<Catalog>,
    gate: Arc<Mutex<()>>,
}

impl Uploader {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog, gate: Arc::new(Mutex::new(())) }
    }

    /// Validates the name, waits for any running transfer, prepares the
    /// bucket directory and opens the target for writing. A file with the
    /// same name is replaced.
    pub async fn start(&self, file_name: &str) -> Result<UploadSession> {
        let target = self.catalog.locate(file_name)?;
        let permit = Arc::clone(&self.gate).lock_owned().await;
        let storage = Arc::clone(self.catalog.storage());

        tracing::info!(file = %target.file_name, path = %target.path, "upload started");

        let bucket_dir = self.catalog.bucket_path(target.bucket);
        if !ensure_dir(storage.as_ref(), self.catalog.root(), "document collection root").await
            || !ensure_dir(storage.as_ref(), &bucket_dir, "bucket directory").await
        {
            return Err(domains::StorageError::Io(format!("cannot prepare {bucket_dir}")).into());
        }

        if storage.exists(&target.path).await {
            tracing::info!(path = %target.path, "replacing existing file");
            storage.remove(&target.path).await?;
        }

        let handle = storage.create(&target.path).await.map_err(|e| {
            tracing::error!(path = %target.path, error = %e, "failed to open file for writing");
            e
        })?;

        Ok(UploadSession { storage, target, handle: Some(handle), written: 0, permit: Some(permit) })
    }
}

pub struct UploadSession {
    storage: Arc<dyn Storage>,
    target: CatalogPath,
    handle: Option<Box<dyn WriteHandle>>,
    written: u64,
    permit: Option<OwnedMutexGuard<()>>,
}

impl UploadSession {
    pub fn target(&self) -> &CatalogPath {
        &self.target
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Appends one chunk. A short write is logged and the shortfall is lost;
    /// the tracked size only counts accepted bytes.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<usize> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(0);
        };
        let accepted = handle.write(chunk).await?;
        if accepted < chunk.len() {
            tracing::warn!(path = %self.target.path, offered = chunk.len(), accepted, "short write");
        }
        self.written += accepted as u64;
        Ok(accepted)
    }

    /// Closes the file and reads it back. A verification failure is
    /// reported, but the file stays where it is.
    pub async fn finish(mut self) -> Result<UploadReceipt> {
        if let Some(handle) = self.handle.take() {
            handle.close().await?;
        }
        let path = self.target.path.clone();

        if let Err(reason) = verify(self.storage.as_ref(), &path, self.written).await {
            tracing::error!(path = %path, reason = %reason, "upload verification failed");
            return Err(DomainError::Verification { path, reason });
        }

        tracing::info!(path = %path, size = self.written, "upload complete");
        Ok(UploadReceipt {
            file_name: self.target.file_name.clone(),
            bucket: self.target.bucket,
            path,
            size: self.written,
        })
    }

    /// Closes and deletes the partial file.
    pub async fn abort(mut self) {
        tracing::warn!(path = %self.target.path, written = self.written, "upload aborted");
        discard(self.storage.clone(), self.handle.take(), &self.target.path).await;
    }
}

impl Drop for UploadSession {
    /// A session dropped mid-transfer (the request future was cancelled)
    /// is aborted in the background; the permit is held until the partial
    /// file is gone.
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                path = %self.target.path,
                written = self.written,
                "upload dropped outside the runtime; partial file left on the medium"
            );
            return;
        };
        tracing::warn!(path = %self.target.path, written = self.written, "upload dropped before completion");
        let storage = self.storage.clone();
        let path = self.target.path.clone();
        let permit = self.permit.take();
        runtime.spawn(async move {
            discard(storage, Some(handle), &path).await;
            drop(permit);
        });
    }
}

async fn discard(storage: Arc<dyn Storage>, handle: Option<Box<dyn WriteHandle>>, path: &str) {
    if let Some(handle) = handle {
        if let Err(e) = handle.close().await {
            tracing::warn!(path, error = %e, "failed to close aborted upload");
        }
    }
    if storage.exists(path).await {
        match storage.remove(path).await {
            Ok(()) => tracing::info!(path, "deleted partial upload"),
            Err(e) => tracing::error!(path, error = %e, "failed to delete partial upload"),
        }
    }
}

/// Re-opens a finished upload: it must exist, match the tracked size and,
/// when non-empty, yield at least one byte.
pub async fn verify(storage: &dyn Storage, path: &str, expected: u64) -> std::result::Result<(), String> {
    if !storage.exists(path).await {
        return Err("file does not exist after upload".to_string());
    }
    let meta = storage.metadata(path).await.map_err(|e| format!("cannot inspect file: {e}"))?;
    if meta.size != expected {
        return Err(format!("size mismatch: expected {expected} bytes, found {}", meta.size));
    }
    if expected == 0 {
        return Ok(());
    }
    let mut reader = storage.open_read(path).await.map_err(|e| format!("cannot reopen file: {e}"))?;
    let mut probe = [0u8; VERIFY_PROBE_LEN];
    match reader.read_chunk(&mut probe).await {
        Ok(0) => Err("no data could be read back".to_string()),
        Ok(_) => Ok(()),
        Err(e) => Err(format!("cannot read file: {e}")),
    }
}
