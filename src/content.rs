//! Virtual file trees holding one package's extracted files
//!
//! A `ContentStore` is populated once from a fetched `PackageContent` and
//! then shared read-only behind an `Arc`.

use bytes::Bytes;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Queryable file tree for a single package
pub trait ContentStore: Send + Sync {
    /// Store `content` at `path`, replacing any earlier file at that path
    fn write(&mut self, path: &str, content: Bytes);

    /// Read the file at `path`
    fn read(&self, path: &str) -> Option<Bytes>;

    /// Finish the build phase; called once after the last `write`
    fn commit(&mut self) {}

    /// All stored paths in sorted order
    fn paths(&self) -> Vec<String>;

    /// Number of stored files
    fn len(&self) -> usize;

    /// Whether the store holds no files
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Factory used by the loader to create a fresh store per package
pub type StoreFactory = Arc<dyn Fn() -> Box<dyn ContentStore> + Send + Sync>;

/// Default factory producing `MemoryStore`s
pub fn memory_store_factory() -> StoreFactory {
    Arc::new(|| Box::new(MemoryStore::new()) as Box<dyn ContentStore>)
}

/// In-memory file tree
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: BTreeMap<String, Bytes>,
    committed: bool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Total size of all stored files in bytes
    pub fn size_bytes(&self) -> usize {
        self.files.values().map(Bytes::len).sum()
    }

    /// Whether `commit` has been called
    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

impl ContentStore for MemoryStore {
    fn write(&mut self, path: &str, content: Bytes) {
        self.files.insert(normalize_path(path), content);
    }

    fn read(&self, path: &str) -> Option<Bytes> {
        self.files.get(&normalize_path(path)).cloned()
    }

    fn commit(&mut self) {
        self.committed = true;
    }

    fn paths(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.files.len()
    }
}

/// Normalize a package-relative path
///
/// Leading `/` and `./` are dropped, `.` segments are removed, `..` pops the
/// previous segment (never escaping the root) and repeated separators
/// collapse, so `index.js`, `/index.js` and `./lib/../index.js` all name the
/// same file.
pub fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    segments.join("/")
}
