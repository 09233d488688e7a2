//! # LocalStorage
//!
//! Filesystem implementation of `Storage`, rooted at a single directory
//! (the mount point of the card, or any directory during development).

use async_trait::async_trait;
use domains::{
    DirCursor, DirEntry, EntryMeta, ReadHandle, Storage, StorageError, StorageResult, WriteHandle,
};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

pub struct LocalStorage {
    /// Root directory of the medium (e.g., "/mnt/sd")
    root: PathBuf,
}

impl LocalStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Checks that the root exists and is a directory, creating it when
    /// missing. Fails the same way a card that refuses to mount would.
    pub async fn mount(root: PathBuf) -> StorageResult<Self> {
        match fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(StorageError::NotADirectory(root.display().to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                fs::create_dir_all(&root)
                    .await
                    .map_err(|e| StorageError::Io(format!("{}: {e}", root.display())))?;
            }
            Err(e) => return Err(StorageError::Io(format!("{}: {e}", root.display()))),
        }
        tracing::info!(root = %root.display(), "local storage mounted");
        Ok(Self { root })
    }

    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let mut full = self.root.clone();
        for part in crate::components(path)? {
            full.push(part);
        }
        Ok(full)
    }
}

fn io_error(path: &str, e: std::io::Error) -> StorageError {
    match e.kind() {
        ErrorKind::NotFound => StorageError::NotFound(path.to_string()),
        _ => StorageError::Io(format!("{path}: {e}")),
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn exists(&self, path: &str) -> bool {
        match self.resolve(path) {
            Ok(full) => fs::try_exists(full).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn metadata(&self, path: &str) -> StorageResult<EntryMeta> {
        let meta = fs::metadata(self.resolve(path)?)
            .await
            .map_err(|e| io_error(path, e))?;
        Ok(EntryMeta { is_dir: meta.is_dir(), size: if meta.is_dir() { 0 } else { meta.len() } })
    }

    async fn open_read(&self, path: &str) -> StorageResult<Box<dyn ReadHandle>> {
        let file = fs::File::open(self.resolve(path)?)
            .await
            .map_err(|e| io_error(path, e))?;
        let meta = file.metadata().await.map_err(|e| io_error(path, e))?;
        if meta.is_dir() {
            return Err(StorageError::Io(format!("{path}: is a directory")));
        }
        Ok(Box::new(LocalReadHandle { file, size: meta.len(), path: path.to_string() }))
    }

    async fn create(&self, path: &str) -> StorageResult<Box<dyn WriteHandle>> {
        let file = fs::File::create(self.resolve(path)?)
            .await
            .map_err(|e| io_error(path, e))?;
        Ok(Box::new(LocalWriteHandle { file, path: path.to_string() }))
    }

    async fn read_all(&self, path: &str) -> StorageResult<Vec<u8>> {
        fs::read(self.resolve(path)?).await.map_err(|e| io_error(path, e))
    }

    async fn write_all(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        fs::write(self.resolve(path)?, data).await.map_err(|e| io_error(path, e))
    }

    async fn append(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.resolve(path)?)
            .await
            .map_err(|e| io_error(path, e))?;
        file.write_all(data).await.map_err(|e| io_error(path, e))?;
        file.flush().await.map_err(|e| io_error(path, e))
    }

    async fn mkdir(&self, path: &str) -> StorageResult<()> {
        fs::create_dir(self.resolve(path)?).await.map_err(|e| io_error(path, e))
    }

    async fn remove(&self, path: &str) -> StorageResult<()> {
        fs::remove_file(self.resolve(path)?).await.map_err(|e| io_error(path, e))
    }

    async fn rmdir(&self, path: &str) -> StorageResult<()> {
        fs::remove_dir(self.resolve(path)?).await.map_err(|e| io_error(path, e))
    }

    async fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        fs::rename(self.resolve(from)?, self.resolve(to)?)
            .await
            .map_err(|e| io_error(from, e))
    }

    async fn list(&self, path: &str) -> StorageResult<Box<dyn DirCursor>> {
        let full = self.resolve(path)?;
        let meta = fs::metadata(&full).await.map_err(|e| io_error(path, e))?;
        if !meta.is_dir() {
            return Err(StorageError::NotADirectory(path.to_string()));
        }
        let entries = fs::read_dir(&full).await.map_err(|e| io_error(path, e))?;
        Ok(Box::new(LocalDirCursor { entries, path: path.to_string() }))
    }
}

struct LocalReadHandle {
    file: fs::File,
    size: u64,
    path: String,
}

#[async_trait]
impl ReadHandle for LocalReadHandle {
    fn size(&self) -> u64 {
        self.size
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        self.file.read(buf).await.map_err(|e| io_error(&self.path, e))
    }
}

struct LocalWriteHandle {
    file: fs::File,
    path: String,
}

#[async_trait]
impl WriteHandle for LocalWriteHandle {
    async fn write(&mut self, data: &[u8]) -> StorageResult<usize> {
        // A single write call may accept fewer bytes; the caller decides
        // what a short write means.
        self.file.write(data).await.map_err(|e| io_error(&self.path, e))
    }

    async fn close(mut self: Box<Self>) -> StorageResult<()> {
        self.file.flush().await.map_err(|e| io_error(&self.path, e))?;
        self.file.sync_all().await.map_err(|e| io_error(&self.path, e))
    }
}

struct LocalDirCursor {
    entries: fs::ReadDir,
    path: String,
}

#[async_trait]
impl DirCursor for LocalDirCursor {
    async fn next_entry(&mut self) -> StorageResult<Option<DirEntry>> {
        let Some(entry) = self.entries.next_entry().await.map_err(|e| io_error(&self.path, e))? else {
            return Ok(None);
        };
        let meta = entry.metadata().await.map_err(|e| io_error(&self.path, e))?;
        Ok(Some(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            is_dir: meta.is_dir(),
            size: if meta.is_dir() { 0 } else { meta.len() },
        }))
    }
}
