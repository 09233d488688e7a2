//! # Forum Store
//!
//! Threads live in one index file, posts in one file per thread:
//!
//! ```text
//! /forum/threads.json          [ {id, title, author, timestamp}, ... ]
//! /forum/posts/<threadId>.json [ {id, author, content, timestamp}, ... ]
//! /forum/cleanup.log           one line per cleanup run
//! ```
//!
//! Every change reads the whole file, appends in memory and writes the whole
//! file back through a temporary sibling that is renamed over the original.
//! The index and the post file are updated separately; a failure between the
//! two leaves a post file without an index entry, never the reverse.
//!
//! Requests and the cleanup ticker run as separate tasks, so every
//! read-modify-rewrite holds the store's write gate from the first read to
//! the last rename. The [`cleanup::ForumJanitor`] built by
//! [`ForumStore::janitor`] shares that gate.

pub mod cleanup;
pub mod records;

use domains::{Clock, DomainError, ForumPost, ForumThread, Result, Storage, StorageError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use self::cleanup::ForumJanitor;

use crate::storage::join;

pub const FORUM_DIR: &str = "/forum";
pub const POSTS_DIR: &str = "/forum/posts";
pub const INDEX_PATH: &str = "/forum/threads.json";
pub const CLEANUP_LOG: &str = "/forum/cleanup.log";

pub const UNKNOWN_THREAD_TITLE: &str = "Unknown Thread";

/// Thread ids end up in file names, so only `[0-9A-Za-z_-]` is accepted.
pub fn is_valid_thread_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// `/forum/posts/<id>.json`, or `None` for an id that must not touch the disk.
pub fn posts_path(thread_id: &str) -> Option<String> {
    is_valid_thread_id(thread_id).then(|| join(POSTS_DIR, &format!("{thread_id}.json")))
}

/// Compact age for listings: `42s ago`, `5m ago`, `3h ago`, `2d ago`.
pub fn format_age(now_millis: u64, then_millis: u64) -> String {
    let secs = now_millis.saturating_sub(then_millis) / 1000;
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(DomainError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Current unix millis as a decimal string, bumped past any id already taken.
fn fresh_id<'a>(now: u64, taken: impl Iterator<Item = &'a str> + Clone) -> String {
    let mut candidate = now;
    while taken.clone().any(|id| id == candidate.to_string()) {
        candidate += 1;
    }
    candidate.to_string()
}

/// Serializes writers of the forum tree.
pub(crate) type WriteGate = Arc<Mutex<()>>;

pub struct ForumStore {
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    gate: WriteGate,
}

impl ForumStore {
    pub fn new(storage: Arc<dyn Storage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock, gate: Arc::new(Mutex::new(())) }
    }

    /// Cleanup runner over the same medium, excluded from running while a
    /// thread or post is being written.
    pub fn janitor(&self, interval: Duration, storage_ready: bool) -> ForumJanitor {
        ForumJanitor::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.clock),
            Arc::clone(&self.gate),
            interval,
            storage_ready,
        )
    }

    /// Reads a record file, falling back to the `.tmp` sibling a failed
    /// replacement leaves behind.
    async fn read_record(&self, path: &str) -> std::result::Result<Vec<u8>, StorageError> {
        match self.storage.read_all(path).await {
            Err(StorageError::NotFound(_)) => {
                let data = self.storage.read_all(&format!("{path}.tmp")).await;
                if data.is_ok() {
                    tracing::warn!(path, "reading record from left-over temporary file");
                }
                data.map_err(|_| StorageError::NotFound(path.to_string()))
            }
            other => other,
        }
    }

    /// All threads in creation order. A missing or unreadable index is empty.
    pub async fn list_threads(&self) -> Vec<ForumThread> {
        match self.read_record(INDEX_PATH).await {
            Ok(data) => records::decode_tolerant(&data),
            Err(e) => {
                tracing::debug!(error = %e, "thread index unavailable");
                Vec::new()
            }
        }
    }

    pub async fn find_thread(&self, id: &str) -> Option<ForumThread> {
        self.list_threads().await.into_iter().find(|t| t.id == id)
    }

    pub async fn thread_title(&self, id: &str) -> String {
        self.find_thread(id)
            .await
            .map(|t| t.title)
            .unwrap_or_else(|| UNKNOWN_THREAD_TITLE.to_string())
    }

    /// Creates the thread's post file with the opening post, then appends
    /// the thread to the index.
    pub async fn create_thread(&self, title: &str, author: &str, content: &str) -> Result<ForumThread> {
        let title = required("title", title)?;
        let author = required("author", author)?;
        let content = required("content", content)?;

        let _writer = self.gate.lock().await;
        let mut threads = self.list_threads().await;
        let now = self.clock.unix_millis();
        let id = fresh_id(now, threads.iter().map(|t| t.id.as_str()));
        let path = posts_path(&id).ok_or_else(|| DomainError::Validation(format!("bad thread id {id}")))?;

        let opening = ForumPost { id: id.clone(), author: author.clone(), content, timestamp: now };
        self.rewrite(&path, &records::encode(&[opening])?).await?;

        let thread = ForumThread { id, title, author, timestamp: now };
        threads.push(thread.clone());
        self.rewrite(INDEX_PATH, &records::encode(&threads)?).await?;

        tracing::info!(thread_id = %thread.id, title = %thread.title, "thread created");
        Ok(thread)
    }

    /// Posts of one thread in append order. Unknown or invalid ids are empty.
    pub async fn list_posts(&self, thread_id: &str) -> Vec<ForumPost> {
        let Some(path) = posts_path(thread_id) else {
            return Vec::new();
        };
        match self.read_record(&path).await {
            Ok(data) => records::decode_tolerant(&data),
            Err(e) => {
                tracing::debug!(thread_id, error = %e, "post file unavailable");
                Vec::new()
            }
        }
    }

    pub async fn add_post(&self, thread_id: &str, author: &str, content: &str) -> Result<ForumPost> {
        let author = required("author", author)?;
        let content = required("content", content)?;
        let not_found = || DomainError::NotFound("thread", thread_id.to_string());

        let path = posts_path(thread_id).ok_or_else(not_found)?;
        let _writer = self.gate.lock().await;
        let mut posts: Vec<ForumPost> = match self.read_record(&path).await {
            Ok(data) => records::decode_tolerant(&data),
            Err(StorageError::NotFound(_)) => return Err(not_found()),
            Err(e) => return Err(e.into()),
        };

        let now = self.clock.unix_millis();
        let post = ForumPost {
            id: fresh_id(now, posts.iter().map(|p| p.id.as_str())),
            author,
            content,
            timestamp: now,
        };
        posts.push(post.clone());
        self.rewrite(&path, &records::encode(&posts)?).await?;

        tracing::info!(thread_id, post_id = %post.id, "post added");
        Ok(post)
    }

    /// Writes `<path>.tmp` and renames it over `path`. Where the medium
    /// refuses to rename onto an existing file, the old file is removed
    /// first. If the second rename fails too, `<path>.tmp` is left behind as
    /// the only complete copy.
    async fn rewrite(&self, path: &str, data: &[u8]) -> Result<()> {
        let tmp = format!("{path}.tmp");
        self.storage.write_all(&tmp, data).await?;

        if let Err(e) = self.storage.rename(&tmp, path).await {
            tracing::debug!(path, error = %e, "rename over existing file refused");
        } else {
            return Ok(());
        }
        match self.storage.remove(path).await {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(e) => tracing::warn!(path, error = %e, "could not remove stale record file before rename"),
        }
        if let Err(e) = self.storage.rename(&tmp, path).await {
            tracing::error!(path, recovery = %tmp, error = %e, "failed to replace record file; new contents kept");
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ensure_layout, EMPTY_INDEX};
    use async_trait::async_trait;
    use domains::{DirCursor, EntryMeta, MockClock, ReadHandle, StorageResult, WriteHandle};
    use std::sync::atomic::{AtomicU64, Ordering};
    use storage_adapters::{LocalStorage, MemoryStorage};

    /// Unix clock that advances by `step` on every reading.
    struct SteppingClock {
        now: AtomicU64,
        step: u64,
    }

    impl Clock for SteppingClock {
        fn monotonic_millis(&self) -> u64 {
            0
        }
        fn unix_millis(&self) -> u64 {
            self.now.fetch_add(self.step, Ordering::SeqCst)
        }
    }

    async fn store_with(clock: Arc<dyn Clock>) -> (MemoryStorage, ForumStore) {
        let storage = MemoryStorage::new();
        assert!(ensure_layout(&storage, "/Alexandria").await);
        let store = ForumStore::new(Arc::new(storage.clone()), clock);
        (storage, store)
    }

    async fn store() -> (MemoryStorage, ForumStore) {
        store_with(Arc::new(SteppingClock { now: AtomicU64::new(1_700_000_000_000), step: 1000 })).await
    }

    #[test]
    fn thread_ids_are_restricted_to_safe_characters() {
        assert!(is_valid_thread_id("1700000000000"));
        assert!(is_valid_thread_id("abc_DEF-9"));
        assert!(!is_valid_thread_id(""));
        assert!(!is_valid_thread_id("../threads"));
        assert!(!is_valid_thread_id("a b"));
        assert_eq!(posts_path("42").as_deref(), Some("/forum/posts/42.json"));
        assert_eq!(posts_path("4/2"), None);
    }

    #[test]
    fn ages_are_compact() {
        assert_eq!(format_age(10_000, 0), "10s ago");
        assert_eq!(format_age(120_000, 0), "2m ago");
        assert_eq!(format_age(7_200_000, 0), "2h ago");
        assert_eq!(format_age(172_800_000, 0), "2d ago");
        assert_eq!(format_age(0, 5_000), "0s ago");
    }

    #[tokio::test]
    async fn creating_a_thread_writes_index_and_opening_post() {
        let (storage, store) = store().await;
        let thread = store.create_thread("Hello", "Ann", "First!").await.unwrap();

        let threads = store.list_threads().await;
        assert_eq!(threads, vec![thread.clone()]);
        assert_eq!(store.thread_title(&thread.id).await, "Hello");

        let posts = store.list_posts(&thread.id).await;
        assert_eq!(posts.len(), 1);
        assert_eq!((posts[0].author.as_str(), posts[0].content.as_str()), ("Ann", "First!"));
        assert!(!storage.exists(&format!("{INDEX_PATH}.tmp")).await);
    }

    #[tokio::test]
    async fn posts_come_back_in_call_order() {
        let (_, store) = store().await;
        let thread = store.create_thread("t", "a", "c0").await.unwrap();
        for i in 1..=3 {
            store.add_post(&thread.id, "b", &format!("c{i}")).await.unwrap();
        }
        let contents: Vec<_> = store.list_posts(&thread.id).await.into_iter().map(|p| p.content).collect();
        assert_eq!(contents, ["c0", "c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn colliding_ids_are_bumped() {
        let mut clock = MockClock::new();
        clock.expect_unix_millis().return_const(5_000u64);
        let (_, store) = store_with(Arc::new(clock)).await;

        let first = store.create_thread("one", "a", "x").await.unwrap();
        let second = store.create_thread("two", "a", "x").await.unwrap();
        assert_eq!(first.id, "5000");
        assert_eq!(second.id, "5001");

        let reply = store.add_post(&first.id, "b", "y").await.unwrap();
        assert_eq!(reply.id, "5001");
        let ids: Vec<_> = store.list_posts(&first.id).await.into_iter().map(|p| p.id).collect();
        assert_eq!(ids, ["5000", "5001"]);
    }

    #[tokio::test]
    async fn blank_fields_are_rejected() {
        let (storage, store) = store().await;
        assert!(matches!(store.create_thread("  ", "a", "c").await, Err(DomainError::Validation(_))));
        assert!(matches!(store.create_thread("t", "a", "").await, Err(DomainError::Validation(_))));
        assert_eq!(storage.read_all(INDEX_PATH).await.unwrap(), EMPTY_INDEX);
    }

    #[tokio::test]
    async fn posting_to_a_missing_thread_is_not_found() {
        let (_, store) = store().await;
        assert!(matches!(store.add_post("123", "a", "c").await, Err(DomainError::NotFound(..))));
        assert!(matches!(store.add_post("../x", "a", "c").await, Err(DomainError::NotFound(..))));
        assert!(store.list_posts("../x").await.is_empty());
        assert_eq!(store.thread_title("nope").await, UNKNOWN_THREAD_TITLE);
    }

    #[tokio::test]
    async fn damaged_index_still_lists_good_threads() {
        let (storage, store) = store().await;
        storage
            .write_all(INDEX_PATH, br#"[{"id":"1","title":"kept","author":"a","timestamp":"1"},{"id":"2","ti"#)
            .await
            .unwrap();
        let threads = store.list_threads().await;
        assert_eq!(threads.len(), 1);
        assert_eq!(threads[0].title, "kept");

        let created = store.create_thread("new", "b", "c").await.unwrap();
        let ids: Vec<_> = store.list_threads().await.into_iter().map(|t| t.id).collect();
        assert_eq!(ids, ["1".to_string(), created.id]);
    }

    #[tokio::test]
    async fn missing_index_reads_as_empty() {
        let store = ForumStore::new(
            Arc::new(MemoryStorage::new()),
            Arc::new(SteppingClock { now: AtomicU64::new(0), step: 1 }),
        );
        assert!(store.list_threads().await.is_empty());
    }

    fn fixed_clock(millis: u64) -> Arc<dyn Clock> {
        let mut clock = MockClock::new();
        clock.expect_unix_millis().return_const(millis);
        clock.expect_monotonic_millis().return_const(0u64);
        Arc::new(clock)
    }

    #[tokio::test]
    async fn concurrent_creates_keep_both_threads() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());
        assert!(ensure_layout(&storage, "/Alexandria").await);
        let store = ForumStore::new(Arc::new(storage), fixed_clock(5_000));

        let (first, second) = tokio::join!(
            store.create_thread("first", "a", "one"),
            store.create_thread("second", "b", "two"),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_ne!(first.id, second.id);

        let titles: Vec<_> = store.list_threads().await.into_iter().map(|t| t.title).collect();
        assert_eq!(titles, ["first", "second"]);
        assert_eq!(store.list_posts(&first.id).await[0].content, "one");
        assert_eq!(store.list_posts(&second.id).await[0].content, "two");
    }

    #[tokio::test]
    async fn cleanup_waits_for_a_running_create() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path().to_path_buf());
        assert!(ensure_layout(&storage, "/Alexandria").await);
        let store = ForumStore::new(Arc::new(storage), fixed_clock(5_000));
        let janitor = store.janitor(std::time::Duration::from_secs(3600), true);

        let (created, cleaned) = tokio::join!(store.create_thread("t", "a", "c"), janitor.cleanup());
        created.unwrap();
        cleaned.unwrap();
        assert!(store.list_threads().await.is_empty());
    }

    /// Medium that cannot rename at all.
    struct NoRename(MemoryStorage);

    #[async_trait]
    impl Storage for NoRename {
        async fn exists(&self, path: &str) -> bool {
            self.0.exists(path).await
        }
        async fn metadata(&self, path: &str) -> StorageResult<EntryMeta> {
            self.0.metadata(path).await
        }
        async fn open_read(&self, path: &str) -> StorageResult<Box<dyn ReadHandle>> {
            self.0.open_read(path).await
        }
        async fn create(&self, path: &str) -> StorageResult<Box<dyn WriteHandle>> {
            self.0.create(path).await
        }
        async fn read_all(&self, path: &str) -> StorageResult<Vec<u8>> {
            self.0.read_all(path).await
        }
        async fn write_all(&self, path: &str, data: &[u8]) -> StorageResult<()> {
            self.0.write_all(path, data).await
        }
        async fn append(&self, path: &str, data: &[u8]) -> StorageResult<()> {
            self.0.append(path, data).await
        }
        async fn mkdir(&self, path: &str) -> StorageResult<()> {
            self.0.mkdir(path).await
        }
        async fn remove(&self, path: &str) -> StorageResult<()> {
            self.0.remove(path).await
        }
        async fn rmdir(&self, path: &str) -> StorageResult<()> {
            self.0.rmdir(path).await
        }
        async fn rename(&self, _from: &str, to: &str) -> StorageResult<()> {
            Err(StorageError::Io(format!("cannot rename onto {to}")))
        }
        async fn list(&self, path: &str) -> StorageResult<Box<dyn DirCursor>> {
            self.0.list(path).await
        }
    }

    #[tokio::test]
    async fn failed_replacement_keeps_the_new_copy() {
        let (storage, store) = store().await;
        let thread = store.create_thread("t", "a", "c0").await.unwrap();
        let path = posts_path(&thread.id).unwrap();

        let broken = ForumStore::new(
            Arc::new(NoRename(storage.clone())),
            Arc::new(SteppingClock { now: AtomicU64::new(1_800_000_000_000), step: 1000 }),
        );
        assert!(matches!(broken.add_post(&thread.id, "b", "c1").await, Err(DomainError::Storage(_))));

        assert!(!storage.exists(&path).await);
        assert!(storage.exists(&format!("{path}.tmp")).await);
        let contents: Vec<_> = broken.list_posts(&thread.id).await.into_iter().map(|p| p.content).collect();
        assert_eq!(contents, ["c0", "c1"]);
    }
}
