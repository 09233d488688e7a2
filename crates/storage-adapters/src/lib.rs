//! # storage-adapters
//!
//! Implementations of the [`domains::Storage`] port.
//!
//! - [`LocalStorage`]: a directory on the host filesystem standing in for the
//!   removable medium.
//! - [`MemoryStorage`]: an in-memory tree, used by tests and when running
//!   without a medium.

mod local;
mod memory;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

use domains::{StorageError, StorageResult};

/// Splits a storage path into its components, refusing anything that could
/// step outside the root.
pub(crate) fn components(path: &str) -> StorageResult<Vec<&str>> {
    let mut parts = Vec::new();
    for part in path.split('/') {
        match part {
            "" => continue,
            "." | ".." => return Err(StorageError::InvalidPath(path.to_string())),
            p if p.contains('\\') || p.contains('\0') => {
                return Err(StorageError::InvalidPath(path.to_string()))
            }
            p => parts.push(p),
        }
    }
    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn components_skip_empty_segments() {
        assert_eq!(components("/forum//posts/").unwrap(), vec!["forum", "posts"]);
        assert!(components("/").unwrap().is_empty());
    }

    #[test]
    fn components_reject_traversal() {
        assert!(matches!(components("/a/../b"), Err(StorageError::InvalidPath(_))));
        assert!(matches!(components("./a"), Err(StorageError::InvalidPath(_))));
        assert!(matches!(components("a\\..\\b"), Err(StorageError::InvalidPath(_))));
    }
}
