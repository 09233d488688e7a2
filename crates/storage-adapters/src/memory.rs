//! In-memory `Storage`. Behaves like a FAT-formatted card: creating an entry
//! requires its parent directory, and directories must be empty to remove.

use async_trait::async_trait;
use domains::{
    DirCursor, DirEntry, EntryMeta, ReadHandle, Storage, StorageError, StorageResult, WriteHandle,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

type Tree = BTreeMap<String, Node>;

#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    nodes: Arc<Mutex<Tree>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn tree(&self) -> MutexGuard<'_, Tree> {
        lock(&self.nodes)
    }
}

fn lock(nodes: &Mutex<Tree>) -> MutexGuard<'_, Tree> {
    nodes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Normalised key: components joined by `/`, no leading slash. The root is "".
fn key(path: &str) -> StorageResult<String> {
    Ok(crate::components(path)?.join("/"))
}

fn parent(key: &str) -> &str {
    key.rsplit_once('/').map(|(p, _)| p).unwrap_or("")
}

fn is_dir(tree: &Tree, key: &str) -> bool {
    key.is_empty() || matches!(tree.get(key), Some(Node::Dir))
}

fn require_parent(tree: &Tree, key: &str, path: &str) -> StorageResult<()> {
    if key.is_empty() {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    if is_dir(tree, parent(key)) {
        Ok(())
    } else {
        Err(StorageError::NotFound(parent(key).to_string()))
    }
}

fn has_children(tree: &Tree, key: &str) -> bool {
    let prefix = format!("{key}/");
    tree.range(prefix.clone()..).next().is_some_and(|(k, _)| k.starts_with(&prefix))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn exists(&self, path: &str) -> bool {
        match key(path) {
            Ok(k) => k.is_empty() || self.tree().contains_key(&k),
            Err(_) => false,
        }
    }

    async fn metadata(&self, path: &str) -> StorageResult<EntryMeta> {
        let k = key(path)?;
        let tree = self.tree();
        if k.is_empty() {
            return Ok(EntryMeta { is_dir: true, size: 0 });
        }
        match tree.get(&k) {
            Some(Node::Dir) => Ok(EntryMeta { is_dir: true, size: 0 }),
            Some(Node::File(data)) => Ok(EntryMeta { is_dir: false, size: data.len() as u64 }),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    async fn open_read(&self, path: &str) -> StorageResult<Box<dyn ReadHandle>> {
        match self.tree().get(&key(path)?) {
            Some(Node::File(data)) => Ok(Box::new(MemoryReadHandle { data: data.clone(), pos: 0 })),
            Some(Node::Dir) => Err(StorageError::Io(format!("{path}: is a directory"))),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    async fn create(&self, path: &str) -> StorageResult<Box<dyn WriteHandle>> {
        let k = key(path)?;
        let mut tree = self.tree();
        require_parent(&tree, &k, path)?;
        if is_dir(&tree, &k) {
            return Err(StorageError::Io(format!("{path}: is a directory")));
        }
        tree.insert(k.clone(), Node::File(Vec::new()));
        Ok(Box::new(MemoryWriteHandle { nodes: Arc::clone(&self.nodes), key: k }))
    }

    async fn read_all(&self, path: &str) -> StorageResult<Vec<u8>> {
        match self.tree().get(&key(path)?) {
            Some(Node::File(data)) => Ok(data.clone()),
            Some(Node::Dir) => Err(StorageError::Io(format!("{path}: is a directory"))),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    async fn write_all(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let k = key(path)?;
        let mut tree = self.tree();
        require_parent(&tree, &k, path)?;
        if is_dir(&tree, &k) {
            return Err(StorageError::Io(format!("{path}: is a directory")));
        }
        tree.insert(k, Node::File(data.to_vec()));
        Ok(())
    }

    async fn append(&self, path: &str, data: &[u8]) -> StorageResult<()> {
        let k = key(path)?;
        let mut tree = self.tree();
        require_parent(&tree, &k, path)?;
        match tree.entry(k).or_insert_with(|| Node::File(Vec::new())) {
            Node::File(existing) => {
                existing.extend_from_slice(data);
                Ok(())
            }
            Node::Dir => Err(StorageError::Io(format!("{path}: is a directory"))),
        }
    }

    async fn mkdir(&self, path: &str) -> StorageResult<()> {
        let k = key(path)?;
        let mut tree = self.tree();
        require_parent(&tree, &k, path)?;
        if tree.contains_key(&k) {
            return Err(StorageError::Io(format!("{path}: already exists")));
        }
        tree.insert(k, Node::Dir);
        Ok(())
    }

    async fn remove(&self, path: &str) -> StorageResult<()> {
        let k = key(path)?;
        let mut tree = self.tree();
        match tree.get(&k) {
            Some(Node::File(_)) => {
                tree.remove(&k);
                Ok(())
            }
            Some(Node::Dir) => Err(StorageError::Io(format!("{path}: is a directory"))),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    async fn rmdir(&self, path: &str) -> StorageResult<()> {
        let k = key(path)?;
        let mut tree = self.tree();
        match tree.get(&k) {
            Some(Node::Dir) if has_children(&tree, &k) => {
                Err(StorageError::Io(format!("{path}: directory not empty")))
            }
            Some(Node::Dir) => {
                tree.remove(&k);
                Ok(())
            }
            Some(Node::File(_)) => Err(StorageError::NotADirectory(path.to_string())),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        let (from_key, to_key) = (key(from)?, key(to)?);
        let mut tree = self.tree();
        require_parent(&tree, &to_key, to)?;
        match tree.get(&from_key) {
            Some(Node::File(_)) if !is_dir(&tree, &to_key) => {
                if let Some(node) = tree.remove(&from_key) {
                    tree.insert(to_key, node);
                }
                Ok(())
            }
            Some(_) => Err(StorageError::Io(format!("cannot rename {from} to {to}"))),
            None => Err(StorageError::NotFound(from.to_string())),
        }
    }

    async fn list(&self, path: &str) -> StorageResult<Box<dyn DirCursor>> {
        let k = key(path)?;
        let tree = self.tree();
        if !k.is_empty() {
            match tree.get(&k) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => return Err(StorageError::NotADirectory(path.to_string())),
                None => return Err(StorageError::NotFound(path.to_string())),
            }
        }
        let prefix = if k.is_empty() { String::new() } else { format!("{k}/") };
        let entries: Vec<DirEntry> = tree
            .range(prefix.clone()..)
            .take_while(|(name, _)| name.starts_with(&prefix))
            .filter_map(|(name, node)| {
                let rest = &name[prefix.len()..];
                if rest.is_empty() || rest.contains('/') {
                    return None;
                }
                Some(match node {
                    Node::Dir => DirEntry { name: rest.to_string(), is_dir: true, size: 0 },
                    Node::File(data) => {
                        DirEntry { name: rest.to_string(), is_dir: false, size: data.len() as u64 }
                    }
                })
            })
            .collect();
        Ok(Box::new(MemoryDirCursor { entries: entries.into_iter() }))
    }
}

struct MemoryReadHandle {
    data: Vec<u8>,
    pos: usize,
}

#[async_trait]
impl ReadHandle for MemoryReadHandle {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_chunk(&mut self, buf: &mut [u8]) -> StorageResult<usize> {
        let remaining = &self.data[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

/// Writes land in the shared tree immediately, so an unclosed handle leaves
/// a partial file behind exactly like a real card does.
struct MemoryWriteHandle {
    nodes: Arc<Mutex<Tree>>,
    key: String,
}

#[async_trait]
impl WriteHandle for MemoryWriteHandle {
    async fn write(&mut self, data: &[u8]) -> StorageResult<usize> {
        match lock(&self.nodes).get_mut(&self.key) {
            Some(Node::File(existing)) => {
                existing.extend_from_slice(data);
                Ok(data.len())
            }
            _ => Err(StorageError::Io(format!("{}: file vanished while open", self.key))),
        }
    }

    async fn close(self: Box<Self>) -> StorageResult<()> {
        Ok(())
    }
}

struct MemoryDirCursor {
    entries: std::vec::IntoIter<DirEntry>,
}

#[async_trait]
impl DirCursor for MemoryDirCursor {
    async fn next_entry(&mut self) -> StorageResult<Option<DirEntry>> {
        Ok(self.entries.next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creating_requires_parent_directory() {
        let storage = MemoryStorage::new();
        assert!(storage.write_all("/forum/threads.json", b"[]").await.unwrap_err().is_not_found());
        storage.mkdir("/forum").await.unwrap();
        storage.write_all("/forum/threads.json", b"[]").await.unwrap();
        assert!(storage.exists("/forum/threads.json").await);
    }

    #[tokio::test]
    async fn list_only_returns_direct_children() {
        let storage = MemoryStorage::new();
        storage.mkdir("/B").await.unwrap();
        storage.mkdir("/B/inner").await.unwrap();
        storage.write_all("/B/Bob.pdf", b"abc").await.unwrap();
        storage.write_all("/B/inner/deep.pdf", b"abcd").await.unwrap();
        storage.mkdir("/BB").await.unwrap();

        let mut cursor = storage.list("/B").await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = cursor.next_entry().await.unwrap() {
            names.push((entry.name, entry.is_dir, entry.size));
        }
        assert_eq!(names, vec![("Bob.pdf".into(), false, 3), ("inner".into(), true, 0)]);

        let mut root = storage.list("/").await.unwrap();
        let mut top = Vec::new();
        while let Some(entry) = root.next_entry().await.unwrap() {
            top.push(entry.name);
        }
        assert_eq!(top, vec!["B".to_string(), "BB".to_string()]);
    }

    #[tokio::test]
    async fn rmdir_refuses_non_empty_directories() {
        let storage = MemoryStorage::new();
        storage.mkdir("/forum").await.unwrap();
        storage.write_all("/forum/x", b"1").await.unwrap();
        assert!(storage.rmdir("/forum").await.is_err());
        storage.remove("/forum/x").await.unwrap();
        storage.rmdir("/forum").await.unwrap();
        assert!(!storage.exists("/forum").await);
    }

    #[tokio::test]
    async fn unclosed_writer_leaves_partial_file() {
        let storage = MemoryStorage::new();
        let mut writer = storage.create("/partial.pdf").await.unwrap();
        writer.write(b"half").await.unwrap();
        drop(writer);
        assert_eq!(storage.read_all("/partial.pdf").await.unwrap(), b"half");
    }
}
