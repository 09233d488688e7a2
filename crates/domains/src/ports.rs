//! # Core Traits (Ports)
//!
//! Any adapter must implement these traits to be used by the binary.
//! Paths are `/`-separated and relative to the medium's root; a leading `/`
//! is optional.

use async_trait::async_trait;

use crate::error::StorageError;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Type and size of a single entry on the medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub is_dir: bool,
    pub size: u64,
}

/// One item yielded by a [`DirCursor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

/// Storage contract for the removable medium.
///
/// All calls block the calling task until the medium answers; there is no
/// timeout. A removed card shows up as `Io` or `NotFound` errors.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Storage: Send + Sync {
    async fn exists(&self, path: &str) -> bool;
    async fn metadata(&self, path: &str) -> StorageResult<EntryMeta>;

    /// Opens an existing file for sequential reading.
    async fn open_read(&self, path: &str) -> StorageResult<Box<dyn ReadHandle>>;
    /// Creates (or truncates) a file for sequential writing.
    async fn create(&self, path: &str) -> StorageResult<Box<dyn WriteHandle>>;

    async fn read_all(&self, path: &str) -> StorageResult<Vec<u8>>;
    /// Creates or truncates `path` and writes `data` in full.
    async fn write_all(&self, path: &str, data: &[u8]) -> StorageResult<()>;
    /// Appends to `path`, creating it when missing.
    async fn append(&self, path: &str, data: &[u8]) -> StorageResult<()>;

    async fn mkdir(&self, path: &str) -> StorageResult<()>;
    /// Removes a file. Directories are rejected.
    async fn remove(&self, path: &str) -> StorageResult<()>;
    /// Removes an empty directory.
    async fn rmdir(&self, path: &str) -> StorageResult<()>;
    async fn rename(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Starts a lazy, single-pass enumeration of a directory.
    async fn list(&self, path: &str) -> StorageResult<Box<dyn DirCursor>>;
}

/// Sequential reader over one open file.
#[async_trait]
pub trait ReadHandle: Send {
    fn size(&self) -> u64;
    /// Fills `buf` from the current position. `Ok(0)` means end of file.
    async fn read_chunk(&mut self, buf: &mut [u8]) -> StorageResult<usize>;
}

/// Sequential writer over one open file.
#[async_trait]
pub trait WriteHandle: Send {
    /// Returns how many bytes were accepted, which may be fewer than offered.
    async fn write(&mut self, data: &[u8]) -> StorageResult<usize>;
    /// Flushes and releases the handle.
    async fn close(self: Box<Self>) -> StorageResult<()>;
}

/// Finite, non-restartable directory enumeration.
#[async_trait]
pub trait DirCursor: Send {
    async fn next_entry(&mut self) -> StorageResult<Option<DirEntry>>;
}

/// Time source. Split so the cleanup trigger can be driven by a fake clock.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Clock: Send + Sync {
    /// Milliseconds from an arbitrary origin. Only differences are meaningful
    /// and the reading may wrap around.
    fn monotonic_millis(&self) -> u64;
    /// Milliseconds since the unix epoch.
    fn unix_millis(&self) -> u64;
}

/// The device's status LED.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait StatusIndicator: Send + Sync {
    fn set(&self, on: bool);
}
