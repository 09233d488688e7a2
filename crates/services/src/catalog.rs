//! # Content Catalog
//!
//! Decides which files belong to the collection and where they live. The
//! collection root holds one directory per [`Bucket`]; only files whose
//! extension is on the allow-list are ever listed, served or accepted.

use domains::{Bucket, DirCursor, DomainError, Result, Storage, StorageError, StorageResult, StoredDocument};
use std::sync::Arc;

use crate::forum::FORUM_DIR;
use crate::storage::join;

/// Extensions accepted for upload and download (lowercase, without the dot).
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "pdf", "epub", "doc", "docx", "rtf", "txt", "azw", "mobi", "lib", "fb2", "prc", "pdb", "ibook",
];

/// Case-insensitive suffix check against [`ALLOWED_EXTENSIONS`].
pub fn is_allowed_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    ALLOWED_EXTENSIONS.iter().any(|ext| {
        lower.len() > ext.len() && lower.ends_with(ext) && lower[..lower.len() - ext.len()].ends_with('.')
    })
}

/// `1536` → `"1.50 KB"`. Two decimals below ten, one above.
pub fn human_readable_size(bytes: u64) -> String {
    const SUFFIXES: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut index = 0;
    while value >= 1024.0 && index < SUFFIXES.len() - 1 {
        value /= 1024.0;
        index += 1;
    }
    if value < 10.0 {
        format!("{value:.2} {}", SUFFIXES[index])
    } else {
        format!("{value:.1} {}", SUFFIXES[index])
    }
}

/// Percent-encodes a path for use in a query string, keeping `/` and the
/// RFC 3986 unreserved characters.
pub fn url_encode_path(path: &str) -> String {
    const HEX: &[u8; 16] = b"0123456789ABCDEF";
    let mut encoded = String::with_capacity(path.len() * 3);
    for &b in path.as_bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b'/') {
            encoded.push(b as char);
        } else {
            encoded.push('%');
            encoded.push(HEX[(b >> 4) as usize] as char);
            encoded.push(HEX[(b & 0x0F) as usize] as char);
        }
    }
    encoded
}

/// True for `/forum` and anything below it, whatever the case.
fn is_forum_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    lower == FORUM_DIR || lower.starts_with(&format!("{FORUM_DIR}/"))
}

/// A resolved download or upload target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogPath {
    pub bucket: Bucket,
    pub file_name: String,
    /// Full storage path: `<root>/<bucket>/<file_name>`.
    pub path: String,
}

pub struct Catalog {
    storage: Arc<dyn Storage>,
    /// Storage path of the collection, e.g. `/Alexandria`.
    root: String,
}

impl Catalog {
    pub fn new(storage: Arc<dyn Storage>, root: impl Into<String>) -> Self {
        let root = root.into();
        let root = format!("/{}", root.trim_matches('/'));
        Self { storage, root }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn bucket_path(&self, bucket: Bucket) -> String {
        join(&self.root, &bucket.dir_name())
    }

    /// Maps a file name onto its place in the collection.
    pub fn locate(&self, file_name: &str) -> Result<CatalogPath> {
        if file_name.is_empty() || file_name.contains('/') {
            return Err(DomainError::Validation(format!("invalid file name: {file_name:?}")));
        }
        if !is_allowed_file(file_name) {
            return Err(DomainError::Validation(format!("file type not allowed: {file_name}")));
        }
        let bucket = Bucket::for_file_name(file_name);
        Ok(CatalogPath {
            bucket,
            file_name: file_name.to_string(),
            path: join(&self.bucket_path(bucket), file_name),
        })
    }

    /// Resolves a `/download?file=` argument. Only the base name and a
    /// recognised bucket name are taken from the request; the rest of the
    /// path is rebuilt from the catalog, so directory components can never
    /// point outside a bucket.
    pub fn resolve_requested(&self, requested: &str) -> Result<CatalogPath> {
        let (dir, base) = match requested.rsplit_once('/') {
            Some((dir, base)) => (Some(dir.trim_matches('/')), base),
            None => (None, requested),
        };
        if !is_allowed_file(base) {
            return Err(DomainError::Validation(format!("file type not allowed: {base}")));
        }
        let bucket = dir
            .and_then(Bucket::parse)
            .unwrap_or_else(|| Bucket::for_file_name(base));
        Ok(CatalogPath {
            bucket,
            file_name: base.to_string(),
            path: join(&self.bucket_path(bucket), base),
        })
    }

    /// Recursively collects every allowed file under `dir`, skipping the
    /// forum subtree.
    pub async fn list_allowed_files(&self, dir: &str) -> StorageResult<Vec<(String, u64)>> {
        let mut files = Vec::new();
        let mut pending = vec![dir.to_string()];
        while let Some(current) = pending.pop() {
            let mut cursor = match self.storage.list(&current).await {
                Ok(cursor) => cursor,
                Err(StorageError::NotFound(_)) | Err(StorageError::NotADirectory(_)) => continue,
                Err(e) => return Err(e),
            };
            while let Some(entry) = cursor.next_entry().await? {
                let path = join(&current, &entry.name);
                if entry.is_dir {
                    if !is_forum_path(&path) {
                        pending.push(path);
                    }
                } else if is_allowed_file(&entry.name) {
                    files.push((path, entry.size));
                }
            }
        }
        Ok(files)
    }

    /// Counting pass over one bucket, yielding to the scheduler every
    /// `yield_batch` matches. A missing bucket directory is an error so the
    /// caller can tell "empty" from "absent".
    pub async fn count_bucket(&self, bucket: Bucket, yield_batch: usize) -> StorageResult<usize> {
        let mut cursor = self.open_bucket(bucket).await?;
        let mut total = 0;
        while cursor.next_document().await?.is_some() {
            total += 1;
            if total % yield_batch.max(1) == 0 {
                tokio::task::yield_now().await;
            }
        }
        Ok(total)
    }

    /// Starts a single pass over the allowed files of one bucket.
    pub async fn open_bucket(&self, bucket: Bucket) -> StorageResult<BucketCursor> {
        let cursor = self.storage.list(&self.bucket_path(bucket)).await?;
        Ok(BucketCursor { bucket, cursor })
    }
}

/// Lazy iterator over the documents of one bucket, in directory order.
pub struct BucketCursor {
    bucket: Bucket,
    cursor: Box<dyn DirCursor>,
}

impl BucketCursor {
    pub async fn next_document(&mut self) -> StorageResult<Option<StoredDocument>> {
        while let Some(entry) = self.cursor.next_entry().await? {
            if !entry.is_dir && is_allowed_file(&entry.name) {
                return Ok(Some(StoredDocument { bucket: self.bucket, name: entry.name, size: entry.size }));
            }
        }
        Ok(None)
    }
}
