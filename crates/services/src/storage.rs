//! Startup checks and recursive helpers built on the `Storage` port.

use domains::{Storage, StorageResult};
use std::future::Future;
use std::pin::Pin;

use crate::forum::{FORUM_DIR, INDEX_PATH, POSTS_DIR};

/// Empty thread index written into a fresh forum.
pub const EMPTY_INDEX: &[u8] = b"[]\n";

/// Makes sure `path` is a directory. A file in the way is removed first.
pub async fn ensure_dir(storage: &dyn Storage, path: &str, description: &str) -> bool {
    tracing::debug!(path, description, "checking directory");
    if storage.exists(path).await {
        match storage.metadata(path).await {
            Ok(meta) if meta.is_dir => return true,
            Ok(_) => {
                tracing::warn!(path, "path exists but is not a directory; removing");
                if let Err(e) = storage.remove(path).await {
                    tracing::error!(path, error = %e, "failed to remove conflicting entry");
                    return false;
                }
            }
            Err(e) => {
                tracing::error!(path, error = %e, "failed to inspect existing entry");
                return false;
            }
        }
    } else {
        tracing::info!(path, description, "directory missing; creating");
    }

    match storage.mkdir(path).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(path, error = %e, "failed to create directory");
            false
        }
    }
}

/// Makes sure `path` is a non-empty file, writing `default` into it when it
/// is missing or empty. A directory in the way is removed recursively.
pub async fn ensure_file(storage: &dyn Storage, path: &str, description: &str, default: &[u8]) -> bool {
    tracing::debug!(path, description, "checking file");
    if storage.exists(path).await {
        match storage.metadata(path).await {
            Ok(meta) if meta.is_dir => {
                tracing::warn!(path, "path exists but is a directory; removing");
                if let Err(e) = remove_tree(storage, path).await {
                    tracing::error!(path, error = %e, "failed to remove conflicting directory");
                    return false;
                }
            }
            Ok(meta) if meta.size > 0 => return true,
            Ok(_) => tracing::warn!(path, "file is empty; writing default content"),
            Err(e) => {
                tracing::error!(path, error = %e, "failed to inspect existing file");
                return false;
            }
        }
    } else {
        tracing::info!(path, description, "file missing; creating");
    }

    match storage.write_all(path, default).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(path, error = %e, "failed to write file");
            false
        }
    }
}

/// Verifies the skeleton the rest of the application relies on. Returns
/// `false` when any requirement could not be met; every failure is logged.
pub async fn ensure_layout(storage: &dyn Storage, collection_root: &str) -> bool {
    let mut all_ok = true;
    all_ok &= ensure_dir(storage, FORUM_DIR, "forum root directory").await;
    all_ok &= ensure_dir(storage, POSTS_DIR, "forum posts directory").await;
    all_ok &= ensure_file(storage, INDEX_PATH, "forum threads index", EMPTY_INDEX).await;
    all_ok &= ensure_dir(storage, collection_root, "document collection root").await;
    if all_ok {
        tracing::info!("all storage requirements satisfied");
    } else {
        tracing::warn!("some storage requirements failed; review logs");
    }
    all_ok
}

/// Removes `path` and everything below it. Returns the number of files
/// deleted. Entries are collected before deletion so the cursor never sees
/// a directory being modified under it.
pub fn remove_tree<'a>(
    storage: &'a dyn Storage,
    path: &'a str,
) -> Pin<Box<dyn Future<Output = StorageResult<usize>> + Send + 'a>> {
    Box::pin(async move {
        let mut cursor = storage.list(path).await?;
        let mut entries = Vec::new();
        while let Some(entry) = cursor.next_entry().await? {
            entries.push(entry);
        }
        drop(cursor);

        let mut removed = 0;
        for entry in entries {
            let child = join(path, &entry.name);
            if entry.is_dir {
                removed += remove_tree(storage, &child).await?;
            } else {
                storage.remove(&child).await?;
                removed += 1;
            }
        }
        storage.rmdir(path).await?;
        Ok(removed)
    })
}

/// Joins a storage directory and an entry name.
pub fn join(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}
