//! In-memory hierarchical file system.
//!
//! [`VfsTree`] stores named byte blobs in a path-keyed trie: directory nodes
//! map lowercased segments to children, file nodes own their bytes. The tree
//! is populated one path at a time, from a parsed archive, or from a host
//! directory tree, and serves files as independent read streams.
//!
//! Keys are lowercased on both insert and lookup; callers preserving case
//! must not rely on exact-case retrieval. Routine failures — duplicate
//! inserts, a file standing where a directory is needed, lookups of missing
//! paths — are `bool`/`Option` results, not errors.
//!
//! # Example
//!
//! ```rust
//! use std::io::Read;
//! use bundlefs::vfs::VfsTree;
//!
//! let mut vfs = VfsTree::new();
//! assert!(vfs.add_bytes("assets/readme.txt", b"hello".to_vec()));
//! assert!(vfs.contains("Assets/README.TXT")); // case-insensitive keys
//!
//! let mut stream = vfs.get("assets/readme.txt").unwrap();
//! let mut text = String::new();
//! stream.read_to_string(&mut text).unwrap();
//! assert_eq!(text, "hello");
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use walkdir::WalkDir;

use crate::archive::Container;
use crate::stream::MemorySource;
use crate::{Error, Result};

/// One node of the trie: a directory of children or a file payload.
#[derive(Debug, Clone)]
enum Node {
    Directory(BTreeMap<String, Node>),
    File(Vec<u8>),
}

impl Node {
    fn directory() -> Self {
        Node::Directory(BTreeMap::new())
    }
}

/// Path-keyed in-memory file tree.
///
/// The root is always a directory. File streams returned by [`get`](Self::get)
/// borrow the node's buffer and stay valid for the borrow's lifetime.
#[derive(Debug, Clone, Default)]
pub struct VfsTree {
    root: BTreeMap<String, Node>,
}

/// Splits a path into lowercased segments, dropping empty ones.
///
/// Empty segments only occur as leading/trailing slash markers (a trailing
/// slash marks a directory entry during archive ingestion) or as doubled
/// separators; none of them name a node.
fn segments(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
        .collect()
}

impl VfsTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a directory at `path`, creating intermediate directories.
    ///
    /// Returns `false` if the path is empty, if a file stands anywhere along
    /// the way, or if the terminal segment already exists.
    pub fn add(&mut self, path: &str) -> bool {
        let parts = segments(path);
        let Some((terminal, intermediate)) = parts.split_last() else {
            return false;
        };
        let Some(parent) = descend_create(&mut self.root, intermediate) else {
            return false;
        };
        if parent.contains_key(terminal) {
            return false;
        }
        parent.insert(terminal.clone(), Node::directory());
        true
    }

    /// Inserts `bytes` as a file leaf at `path`, creating intermediate
    /// directories.
    ///
    /// Fails under the same conditions as [`add`](Self::add).
    pub fn add_bytes(&mut self, path: &str, bytes: Vec<u8>) -> bool {
        let parts = segments(path);
        let Some((terminal, intermediate)) = parts.split_last() else {
            return false;
        };
        let Some(parent) = descend_create(&mut self.root, intermediate) else {
            return false;
        };
        if parent.contains_key(terminal) {
            return false;
        }
        parent.insert(terminal.clone(), Node::File(bytes));
        true
    }

    /// Returns `true` if a node (file or directory) exists at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    /// Removes the node at `path`; a directory goes with its whole subtree.
    ///
    /// Returns `false` if no such node exists.
    pub fn remove(&mut self, path: &str) -> bool {
        let parts = segments(path);
        let Some((terminal, intermediate)) = parts.split_last() else {
            return false;
        };
        let mut current = &mut self.root;
        for part in intermediate {
            match current.get_mut(part) {
                Some(Node::Directory(children)) => current = children,
                _ => return false,
            }
        }
        current.remove(terminal).is_some()
    }

    /// Returns a read stream over the file at `path`.
    ///
    /// The stream borrows the file's buffer. Returns `None` when the path is
    /// missing or names a directory.
    pub fn get(&self, path: &str) -> Option<MemorySource<'_>> {
        match self.find(path)? {
            Node::File(bytes) => Some(MemorySource::new(bytes)),
            Node::Directory(_) => None,
        }
    }

    /// Removes every node.
    pub fn clear(&mut self) {
        self.root.clear();
    }

    /// Total number of nodes in the tree.
    pub fn len(&self) -> usize {
        fn count(children: &BTreeMap<String, Node>) -> usize {
            children
                .values()
                .map(|node| match node {
                    Node::Directory(children) => 1 + count(children),
                    Node::File(_) => 1,
                })
                .sum()
        }
        count(&self.root)
    }

    /// Returns `true` if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Ingests every entry of an archive.
    ///
    /// Names ending in `/` become directories; everything else becomes a
    /// file with the entry's decompressed bytes. Returns the number of nodes
    /// added. On a conflicting entry the tree is cleared before the error is
    /// returned.
    pub fn load_archive(&mut self, archive: &dyn Container) -> Result<usize> {
        let mut added = 0;
        for entry in archive.directory() {
            let ok = if entry.name.ends_with('/') {
                self.add(&entry.name)
            } else {
                let bytes = archive.peek(&entry)?;
                self.add_bytes(&entry.name, bytes)
            };
            if !ok {
                self.clear();
                return Err(Error::InvalidFormat(format!(
                    "archive entry '{}' conflicts with an existing node",
                    entry.name
                )));
            }
            added += 1;
        }
        Ok(added)
    }

    /// Ingests a host directory tree rooted at `root`.
    ///
    /// Every reachable directory and file below `root` is added, keyed by its
    /// path relative to `root`. Returns the number of nodes added. On a key
    /// collision (possible through case folding) the tree is cleared before
    /// the error is returned.
    pub fn load_directory(&mut self, root: impl AsRef<Path>) -> Result<usize> {
        let root = root.as_ref();
        let mut added = 0;
        for entry in WalkDir::new(root).min_depth(1) {
            let entry = entry.map_err(|e| Error::Io(std::io::Error::other(e)))?;
            let relative = entry
                .path()
                .strip_prefix(root)
                .map_err(|e| Error::InvalidPath(e.to_string()))?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            let ok = if entry.file_type().is_dir() {
                self.add(&key)
            } else {
                self.add_bytes(&key, std::fs::read(entry.path())?)
            };
            if !ok {
                self.clear();
                return Err(Error::InvalidPath(format!(
                    "'{key}' collides with an existing node"
                )));
            }
            added += 1;
        }
        Ok(added)
    }

    /// Writes the tree out to an archive, the inverse of
    /// [`load_archive`](Self::load_archive).
    ///
    /// Directories are pushed as empty entries with a trailing `/`; files
    /// are pushed with their bytes. Returns the number of entries pushed.
    pub fn write_to_archive(&self, archive: &mut dyn Container) -> Result<usize> {
        let mut written = 0;
        let mut prefix = String::new();
        walk(&self.root, &mut prefix, &mut |path, bytes| {
            match bytes {
                None => archive.push(&format!("{path}/"), &mut std::io::empty())?,
                Some(mut data) => archive.push(path, &mut data)?,
            }
            written += 1;
            Ok(())
        })?;
        Ok(written)
    }

    /// Materialises the tree under a host directory, the inverse of
    /// [`load_directory`](Self::load_directory).
    ///
    /// Returns the number of nodes written.
    pub fn write_to_directory(&self, root: impl AsRef<Path>) -> Result<usize> {
        let root = root.as_ref();
        std::fs::create_dir_all(root)?;

        let mut written = 0;
        let mut prefix = String::new();
        walk(&self.root, &mut prefix, &mut |path, bytes| {
            let target = root.join(path);
            match bytes {
                None => std::fs::create_dir_all(&target)?,
                Some(data) => {
                    if let Some(parent) = target.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&target, data)?;
                }
            }
            written += 1;
            Ok(())
        })?;
        Ok(written)
    }

    fn find(&self, path: &str) -> Option<&Node> {
        let parts = segments(path);
        let (terminal, intermediate) = parts.split_last()?;
        let mut current = &self.root;
        for part in intermediate {
            match current.get(part) {
                Some(Node::Directory(children)) => current = children,
                _ => return None,
            }
        }
        current.get(terminal)
    }
}

/// Depth-first visit of every node: directories get `(path, None)`, files
/// get `(path, Some(bytes))`, parents before children.
fn walk<'a>(
    children: &'a BTreeMap<String, Node>,
    prefix: &mut String,
    visit: &mut impl FnMut(&str, Option<&'a [u8]>) -> Result<()>,
) -> Result<()> {
    for (name, node) in children {
        let saved = prefix.len();
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(name);
        match node {
            Node::Directory(sub) => {
                visit(prefix, None)?;
                walk(sub, prefix, visit)?;
            }
            Node::File(bytes) => visit(prefix, Some(bytes))?,
        }
        prefix.truncate(saved);
    }
    Ok(())
}

/// Walks `parts`, creating missing directories; `None` if a file is in the
/// way.
fn descend_create<'a>(
    root: &'a mut BTreeMap<String, Node>,
    parts: &[String],
) -> Option<&'a mut BTreeMap<String, Node>> {
    let mut current = root;
    for part in parts {
        let node = current
            .entry(part.clone())
            .or_insert_with(Node::directory);
        match node {
            Node::Directory(children) => current = children,
            Node::File(_) => return None,
        }
    }
    Some(current)
}
