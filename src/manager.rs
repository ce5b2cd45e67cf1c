//! Path-stack file-manager façade.
//!
//! [`FileManager`] keeps a mutable root plus a stack of pushed folders over
//! the host file system, mirrors every stack change into the host working
//! directory, resolves well-known folder names, walks directories
//! breadth-first, and routes resource lookups through an attached
//! [`VfsTree`] when one is present.
//!
//! The manager is an explicit handle; create one per process and pass it by
//! reference. It mutates the process working directory, so concurrent use
//! from multiple threads must be serialised by the caller.
//!
//! ```rust,no_run
//! use bundlefs::{FileManager, Result};
//!
//! fn main() -> Result<()> {
//!     let mut manager = FileManager::new()?;
//!     manager.push("saves/slot1", true)?;
//!     // ... work relative to <root>/saves/slot1 ...
//!     manager.pop_all()?;
//!     Ok(())
//! }
//! ```

use std::collections::{HashMap, VecDeque};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use crate::codec::{CompressionOptions, DeflateSink, InflateSource};
use crate::serial::Serializable;
use crate::stream::{MemorySource, OpenMode};
use crate::vfs::VfsTree;
use crate::{Error, Result};

/// Characters rejected anywhere in a pushed path segment.
const INVALID_SEGMENT_CHARS: &str = "%*?|\"<>,;=:\\";

/// Node-kind filter for [`FileManager::traverse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraverseMode(u8);

impl TraverseMode {
    /// Yield file entries.
    pub const FILES: TraverseMode = TraverseMode(0x01);
    /// Yield directory entries.
    pub const DIRECTORIES: TraverseMode = TraverseMode(0x02);
    /// Yield everything.
    pub const ALL: TraverseMode = TraverseMode(0xFF);

    /// Returns `true` if file entries are yielded.
    pub fn includes_files(self) -> bool {
        self.0 & Self::FILES.0 != 0
    }

    /// Returns `true` if directory entries are yielded.
    pub fn includes_directories(self) -> bool {
        self.0 & Self::DIRECTORIES.0 != 0
    }
}

impl std::ops::BitOr for TraverseMode {
    type Output = TraverseMode;

    fn bitor(self, rhs: TraverseMode) -> TraverseMode {
        TraverseMode(self.0 | rhs.0)
    }
}

/// Options for [`FileManager::traverse`].
#[derive(Debug, Clone)]
pub struct TraverseOptions {
    /// How many directory levels to descend; [`UNBOUNDED`](Self::UNBOUNDED)
    /// walks everything. Zero is rejected.
    pub depth: i32,
    /// Which node kinds to yield.
    pub mode: TraverseMode,
    /// File-extension filters (with or without the leading dot). Empty means
    /// no filtering. Only applied to files.
    pub filters: Vec<String>,
}

impl TraverseOptions {
    /// Depth value meaning "no depth limit".
    pub const UNBOUNDED: i32 = -1;
}

impl Default for TraverseOptions {
    fn default() -> Self {
        Self {
            depth: 1,
            mode: TraverseMode::ALL,
            filters: Vec::new(),
        }
    }
}

/// A resource stream: embedded bytes or a host file.
pub enum Resource<'a> {
    /// Served from the attached resource VFS; borrows the manager.
    Memory(MemorySource<'a>),
    /// Served from disk under the manager's root.
    File(fs::File),
}

impl Read for Resource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Resource::Memory(source) => source.read(buf),
            Resource::File(file) => file.read(buf),
        }
    }
}

/// Mutable root + pushed-folder stack over the host file system.
///
/// The front of the stack is the root; the joined stack is the current
/// directory. Every stack change is mirrored into the host working
/// directory; when that mirror fails, the manager restores itself to its
/// initial root before the error propagates.
pub struct FileManager {
    /// Front = root, back = innermost pushed folder.
    folders: Vec<PathBuf>,
    known_paths: HashMap<String, PathBuf>,
    serialize_filename: String,
    resources: Option<VfsTree>,
}

impl FileManager {
    /// Creates a manager rooted at the process working directory.
    ///
    /// Well-known names are resolved once at construction: `HOME`,
    /// `APPDATA`, `DOCUMENTS` from the platform's user directories, `TEMP`
    /// from the host temp directory, `PWD` from the working directory.
    /// Names the host cannot resolve are left out (and logged).
    pub fn new() -> Result<Self> {
        let pwd = env::current_dir()?;

        let mut known_paths = HashMap::new();
        known_paths.insert("PWD".to_string(), pwd.clone());
        known_paths.insert("TEMP".to_string(), env::temp_dir());
        for (name, resolved) in [
            ("HOME", dirs::home_dir()),
            ("APPDATA", dirs::config_dir()),
            ("DOCUMENTS", dirs::document_dir()),
        ] {
            match resolved {
                Some(path) => {
                    known_paths.insert(name.to_string(), path);
                }
                None => log::warn!("well-known path '{name}' is not resolvable on this host"),
            }
        }

        Ok(Self {
            folders: vec![pwd],
            known_paths,
            serialize_filename: "srl.dat".to_string(),
            resources: None,
        })
    }

    /// The root of the folder stack.
    pub fn root(&self) -> &Path {
        &self.folders[0]
    }

    /// The current directory: the joined folder stack.
    pub fn current(&self) -> PathBuf {
        let mut path = self.folders[0].clone();
        for folder in &self.folders[1..] {
            path.push(folder);
        }
        path
    }

    /// Looks up a well-known folder name resolved at construction.
    pub fn known_path(&self, name: &str) -> Option<&Path> {
        self.known_paths.get(name).map(PathBuf::as_path)
    }

    /// Repoints the root.
    ///
    /// With `None` the current element becomes the new root and the stack
    /// collapses onto it; the host directory is already there, so it is left
    /// alone. With a path, the directory is validated and created if
    /// missing, the stack is reset to it, and the host working directory
    /// follows.
    pub fn set_root(&mut self, path: Option<&Path>) -> Result<()> {
        match path {
            None => {
                let current = self.current();
                self.folders = vec![current];
                Ok(())
            }
            Some(path) => {
                validate_root(path)?;
                fs::create_dir_all(path)?;
                self.folders = vec![path.to_path_buf()];
                let current = self.current();
                self.change_host_dir(&current)
            }
        }
    }

    /// Repoints the root at a well-known folder.
    pub fn set_root_to_known(&mut self, name: &str) -> Result<()> {
        let path = self
            .known_paths
            .get(name)
            .cloned()
            .ok_or_else(|| Error::InvalidArgument(format!("unknown well-known path '{name}'")))?;
        self.set_root(Some(&path))
    }

    /// Returns to the working directory the manager was created in.
    pub fn reset(&mut self) -> Result<()> {
        self.set_root_to_known("PWD")
    }

    /// Pushes `path` onto the folder stack, one segment at a time.
    ///
    /// `.` segments are no-ops and `..` pops. Segments are rejected when
    /// absolute, when carrying any of `% * ? | " < > , ; = : \`, when ending
    /// in `.`, or when colliding with an existing non-directory. With
    /// `create = true` missing directories are created; otherwise a missing
    /// target returns `Ok(false)`. On any failure the stack is restored to
    /// its pre-call state.
    pub fn push(&mut self, path: impl AsRef<Path>, create: bool) -> Result<bool> {
        let saved = self.folders.clone();
        match self.push_components(path.as_ref(), create) {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.folders = saved;
                let current = self.current();
                self.change_host_dir(&current)?;
                Ok(false)
            }
            Err(e) => {
                self.folders = saved;
                // Best effort: the error that caused this takes precedence.
                let _ = env::set_current_dir(self.current());
                Err(e)
            }
        }
    }

    fn push_components(&mut self, path: &Path, create: bool) -> Result<bool> {
        for component in path.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => self.pop(1)?,
                Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::InvalidPath(format!(
                        "'{}' is absolute; pushed paths must be relative",
                        path.display()
                    )));
                }
                Component::Normal(segment) => {
                    let segment = segment.to_str().ok_or_else(|| {
                        Error::InvalidPath("path segment is not valid UTF-8".into())
                    })?;
                    if !self.push_segment(segment, create)? {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    fn push_segment(&mut self, segment: &str, create: bool) -> Result<bool> {
        validate_segment(segment)?;

        let target = self.current().join(segment);
        if target.exists() && !target.is_dir() {
            return Err(Error::InvalidPath(format!(
                "'{segment}' already exists and is not a directory"
            )));
        }
        if create {
            fs::create_dir_all(&target)?;
        } else if !target.exists() {
            return Ok(false);
        }

        self.folders.push(PathBuf::from(segment));
        let current = self.current();
        self.change_host_dir(&current)?;
        Ok(true)
    }

    /// Pops `amount` folders off the stack.
    ///
    /// Popping at the root, or more folders than were pushed, is a
    /// [`Error::StackUnderflow`].
    pub fn pop(&mut self, amount: usize) -> Result<()> {
        if self.folders.len() == 1 || amount >= self.folders.len() {
            return Err(Error::StackUnderflow);
        }
        self.folders.truncate(self.folders.len() - amount);
        let current = self.current();
        self.change_host_dir(&current)
    }

    /// Pops every pushed folder, returning to the root.
    pub fn pop_all(&mut self) -> Result<()> {
        if self.folders.len() == 1 {
            return Err(Error::StackUnderflow);
        }
        self.folders.truncate(1);
        let current = self.current();
        self.change_host_dir(&current)
    }

    /// Opens a file relative to the current directory.
    ///
    /// Returns `Ok(None)` when a read-mode target does not exist.
    pub fn push_file(&self, name: impl AsRef<Path>, mode: OpenMode) -> Result<Option<fs::File>> {
        let path = self.current().join(name.as_ref());
        if mode.read && !path.exists() {
            return Ok(None);
        }
        Ok(Some(mode.to_open_options().open(&path)?))
    }

    /// Breadth-first enumeration of the current directory.
    ///
    /// Results are relative to the current directory. Directories are
    /// yielded before their contents; sibling order is host order.
    pub fn traverse(&self, options: &TraverseOptions) -> Result<Vec<PathBuf>> {
        if options.depth == 0 {
            return Err(Error::InvalidArgument(
                "traversal depth must not be zero".into(),
            ));
        }

        let filters: Vec<String> = options
            .filters
            .iter()
            .map(|f| f.trim_start_matches('.').to_lowercase())
            .collect();

        let base = self.current();
        let mut result = Vec::new();
        let mut queue = VecDeque::new();
        queue.push_back(base.clone());

        let mut level_remaining = 1usize;
        let mut level = 0i32;

        while let Some(dir) = queue.pop_front() {
            for entry in fs::read_dir(&dir)? {
                let entry = entry?;
                let path = entry.path();
                let relative = path.strip_prefix(&base).unwrap_or(&path).to_path_buf();

                if path.is_dir() {
                    if options.mode.includes_directories() {
                        result.push(relative);
                    }
                    queue.push_back(path);
                } else if options.mode.includes_files() {
                    if !filters.is_empty() {
                        let extension = path
                            .extension()
                            .map(|e| e.to_string_lossy().to_lowercase());
                        let matched = extension
                            .map(|e| filters.iter().any(|f| *f == e))
                            .unwrap_or(false);
                        if !matched {
                            continue;
                        }
                    }
                    result.push(relative);
                }
            }

            level_remaining -= 1;
            if level_remaining == 0 {
                level_remaining = queue.len();
                level += 1;
                if options.depth > TraverseOptions::UNBOUNDED && level >= options.depth {
                    break;
                }
            }
        }
        Ok(result)
    }

    /// Attaches an embedded-resource VFS; subsequent [`resource`](Self::resource)
    /// lookups are served from it instead of the disk.
    pub fn attach_resources(&mut self, resources: VfsTree) {
        self.resources = Some(resources);
    }

    /// The attached resource VFS, if any.
    pub fn resources(&self) -> Option<&VfsTree> {
        self.resources.as_ref()
    }

    /// Opens a named resource.
    ///
    /// Served from the attached VFS when one is present, otherwise from disk
    /// under the root. A missing resource is [`Error::NotFound`] naming it.
    pub fn resource(&self, name: &str) -> Result<Resource<'_>> {
        if let Some(vfs) = &self.resources {
            return vfs
                .get(name)
                .map(Resource::Memory)
                .ok_or_else(|| Error::NotFound { path: name.into() });
        }

        let path = self.root().join(name);
        if !path.exists() {
            return Err(Error::NotFound { path: name.into() });
        }
        Ok(Resource::File(fs::File::open(&path)?))
    }

    /// Sets the file name used by the serialization entry points.
    pub fn set_serialize_filename(&mut self, name: impl Into<String>) {
        self.serialize_filename = name.into();
    }

    /// The current serialization file name.
    pub fn serialize_filename(&self) -> &str {
        &self.serialize_filename
    }

    /// Serializes `object` into the current serialization file.
    pub fn serialize(&self, object: &dyn Serializable) -> Result<()> {
        let path = self.current().join(&self.serialize_filename);
        let mut file = OpenMode::WRITE.to_open_options().open(&path)?;
        object.serialize(&mut file)
    }

    /// Reloads `object` from the current serialization file.
    pub fn deserialize(&self, object: &mut dyn Serializable) -> Result<()> {
        let path = self.current().join(&self.serialize_filename);
        if !path.exists() {
            return Err(Error::NotFound {
                path: path.display().to_string(),
            });
        }
        let mut file = fs::File::open(&path)?;
        object.deserialize(&mut file)
    }

    /// Serializes `object` through a zlib deflate stream.
    pub fn serialize_compressed(&self, object: &dyn Serializable) -> Result<()> {
        let path = self.current().join(&self.serialize_filename);
        let file = OpenMode::WRITE.to_open_options().open(&path)?;
        let mut sink = DeflateSink::new(file, &CompressionOptions::default())?;
        object.serialize(&mut sink)?;
        sink.finish()?;
        Ok(())
    }

    /// Reloads `object` through a zlib inflate stream.
    pub fn deserialize_compressed(&self, object: &mut dyn Serializable) -> Result<()> {
        let path = self.current().join(&self.serialize_filename);
        if !path.exists() {
            return Err(Error::NotFound {
                path: path.display().to_string(),
            });
        }
        let file = fs::File::open(&path)?;
        let mut source = InflateSource::new(file, &CompressionOptions::default())?;
        object.deserialize(&mut source)
    }

    /// Mirrors the folder stack into the host working directory.
    ///
    /// On failure the manager is put back into a well-defined state (its
    /// initial root) before the error propagates.
    fn change_host_dir(&mut self, path: &Path) -> Result<()> {
        if let Err(e) = env::set_current_dir(path) {
            self.restore_initial_root();
            return Err(Error::Io(e));
        }
        Ok(())
    }

    fn restore_initial_root(&mut self) {
        if let Some(pwd) = self.known_paths.get("PWD").cloned() {
            let _ = env::set_current_dir(&pwd);
            self.folders = vec![pwd];
        }
        log::warn!("file manager restored to its initial root after a failed directory change");
    }
}

fn validate_segment(segment: &str) -> Result<()> {
    if segment
        .chars()
        .any(|c| INVALID_SEGMENT_CHARS.contains(c))
    {
        return Err(Error::InvalidPath(format!(
            "'{segment}' contains an invalid character"
        )));
    }
    if segment.ends_with('.') {
        return Err(Error::InvalidPath(format!(
            "'{segment}' must not end with '.'"
        )));
    }
    Ok(())
}

/// Root paths may be absolute and carry separators, but their segments obey
/// the same character rules as pushed segments.
fn validate_root(path: &Path) -> Result<()> {
    for component in path.components() {
        if let Component::Normal(segment) = component {
            let segment = segment
                .to_str()
                .ok_or_else(|| Error::InvalidPath("root path is not valid UTF-8".into()))?;
            validate_segment(segment)?;
        }
    }
    if path.exists() && !path.is_dir() {
        return Err(Error::InvalidPath(format!(
            "'{}' already exists and is not a directory",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traverse_mode_bits() {
        assert!(TraverseMode::FILES.includes_files());
        assert!(!TraverseMode::FILES.includes_directories());
        assert!(TraverseMode::DIRECTORIES.includes_directories());
        assert!(TraverseMode::ALL.includes_files());
        assert!(TraverseMode::ALL.includes_directories());

        let both = TraverseMode::FILES | TraverseMode::DIRECTORIES;
        assert!(both.includes_files());
        assert!(both.includes_directories());
    }

    #[test]
    fn segment_validation() {
        for segment in ["%", "?", "*", ":", "|", "\"", "<", ">", ",", ";", "=", "back\\slash"] {
            assert!(validate_segment(segment).is_err(), "{segment:?} accepted");
        }
        assert!(validate_segment("not_valid.").is_err());
        assert!(validate_segment("fine-name_01").is_ok());
        assert!(validate_segment("name.with.dots").is_ok());
    }

    #[test]
    fn root_validation() {
        assert!(validate_root(Path::new("plain/relative")).is_ok());
        assert!(validate_root(Path::new("ends.")).is_err());
        assert!(validate_root(Path::new("has|pipe")).is_err());
        // Root segments obey the same character rules as pushed segments.
        assert!(validate_root(Path::new("has:colon")).is_err());
        assert!(validate_root(Path::new("back\\slash")).is_err());
    }

    #[test]
    fn default_traverse_options() {
        let options = TraverseOptions::default();
        assert_eq!(options.depth, 1);
        assert!(options.filters.is_empty());
    }
}
