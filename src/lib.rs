//! # bundlefs
//!
//! An in-memory virtual file system and binary container library: streaming
//! DEFLATE compression, ZIP and Rezip archives, a path-addressable VFS trie,
//! a path-stack file-manager façade, and binary serialization helpers.
//!
//! ## Quick Start
//!
//! ### Building and reading an archive
//!
//! ```rust
//! use std::io::Cursor;
//! use bundlefs::{Container, ZipArchive};
//!
//! let mut archive = ZipArchive::new();
//! archive.push("docs/readme.txt", &mut b"hello".as_slice()).unwrap();
//!
//! let mut bytes = Vec::new();
//! archive.write(&mut bytes).unwrap();
//!
//! let parsed = ZipArchive::from_source(&mut Cursor::new(bytes)).unwrap();
//! let listing = parsed.directory();
//! assert_eq!(listing[0].name, "docs/readme.txt");
//! assert_eq!(parsed.peek(&listing[0]).unwrap(), b"hello");
//! ```
//!
//! ### Serving archive contents through the VFS
//!
//! ```rust
//! use std::io::Read;
//! use bundlefs::{Container, VfsTree, ZipArchive};
//!
//! let mut archive = ZipArchive::new();
//! archive.push("assets/pixel.dat", &mut [1u8, 2, 3].as_slice()).unwrap();
//!
//! let mut vfs = VfsTree::new();
//! vfs.load_archive(&archive).unwrap();
//!
//! let mut stream = vfs.get("assets/pixel.dat").unwrap();
//! let mut bytes = Vec::new();
//! stream.read_to_end(&mut bytes).unwrap();
//! assert_eq!(bytes, [1, 2, 3]);
//! ```
//!
//! ### Transparent compressed I/O
//!
//! ```rust
//! use std::io::{Read, Write};
//! use bundlefs::codec::{CompressionOptions, DeflateSink, InflateSource, Wrap};
//!
//! let options = CompressionOptions::with_wrap(Wrap::Gzip);
//! let mut sink = DeflateSink::new(Vec::new(), &options).unwrap();
//! sink.write_all(b"stream me").unwrap();
//! let compressed = sink.finish().unwrap();
//!
//! let mut plain = Vec::new();
//! InflateSource::new(compressed.as_slice(), &options)
//!     .unwrap()
//!     .read_to_end(&mut plain)
//!     .unwrap();
//! assert_eq!(plain, b"stream me");
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`Result<T>`]. Routine outcomes — missing VFS
//! paths, duplicate inserts, missing read-mode files — are `bool`/`Option`
//! results rather than errors; see [`error`] for the full taxonomy.
//!
//! ## Concurrency
//!
//! Everything here is synchronous and single-threaded. Archive and VFS
//! values are independent; [`FileManager`] mutates the process working
//! directory and must be externally serialised.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod archive;
pub mod checksum;
pub mod codec;
pub mod error;
pub mod manager;
pub mod serial;
pub mod stream;
pub mod vfs;

pub use error::{Error, Result};

// Re-export the main API at the crate root for convenience
pub use archive::{ArchiveEntry, Container, RezipArchive, ZipArchive};
pub use codec::{CHUNK_SIZE, CompressionOptions, DeflateSink, InflateSource, Level, Strategy, Wrap};
pub use manager::{FileManager, Resource, TraverseMode, TraverseOptions};
pub use serial::Serializable;
pub use stream::{FileSink, FileSource, MemorySink, MemorySource, OpenMode, slurp};
pub use vfs::VfsTree;
