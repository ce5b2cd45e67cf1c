//! Binary archive containers.
//!
//! Two container formats share one contract: [`ZipArchive`] speaks the
//! standard ZIP layout (store + deflate profile, no ZIP64, no encryption),
//! and [`RezipArchive`] is a slimmed format with the same structure but
//! smaller fixed headers, intended for embedded-resource bundles.
//!
//! Both hold their entries fully in memory as compressed payloads. Entries
//! keep insertion order; parsing keeps central-directory order.
//!
//! # Example
//!
//! ```rust
//! use std::io::Cursor;
//! use bundlefs::archive::{Container, ZipArchive};
//!
//! let mut archive = ZipArchive::new();
//! archive.push("greeting.txt", &mut b"hello archive".as_slice()).unwrap();
//!
//! let mut bytes = Vec::new();
//! archive.write(&mut bytes).unwrap();
//!
//! let parsed = ZipArchive::from_source(&mut Cursor::new(bytes)).unwrap();
//! let listing = parsed.directory();
//! assert_eq!(listing[0].name, "greeting.txt");
//! assert_eq!(parsed.peek(&listing[0]).unwrap(), b"hello archive");
//! ```

pub mod rezip;
pub mod zip;

pub use rezip::RezipArchive;
pub use zip::ZipArchive;

use std::io::{Read, Write};

use crate::checksum::Crc32;
use crate::codec::{self, CompressionOptions, Wrap};
use crate::stream::slurp;
use crate::{Error, Result};

/// Compression method id for stored (uncompressed) payloads.
pub(crate) const METHOD_STORE: u16 = 0;
/// Compression method id for raw-deflate payloads.
pub(crate) const METHOD_DEFLATE: u16 = 8;

/// Descriptor of one archive entry.
///
/// Handles are snapshots: `index` is stable until an entry is popped, after
/// which later indices shift down and stale descriptors are rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name: UTF-8, forward-slash separators.
    pub name: String,
    /// Position within the archive.
    pub index: usize,
    /// Plaintext size in bytes.
    pub uncompressed_size: u64,
    /// Stored payload size in bytes.
    pub compressed_size: u64,
}

/// The shared archive contract.
pub trait Container {
    /// Reads `source` to completion and records it as a new entry at the end.
    ///
    /// The payload is compressed with raw deflate; when compression does not
    /// shrink the data (or the payload is empty) it is stored verbatim.
    fn push(&mut self, name: &str, source: &mut dyn Read) -> Result<()>;

    /// Decompresses an entry without removing it.
    fn peek(&self, entry: &ArchiveEntry) -> Result<Vec<u8>>;

    /// Decompresses an entry and removes it; subsequent indices shift down.
    fn pop(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>>;

    /// Snapshot of the current entries, in order.
    fn directory(&self) -> Vec<ArchiveEntry>;

    /// Serialises the archive to `sink` in the container's binary format.
    fn write(&self, sink: &mut dyn Write) -> Result<()>;
}

/// One in-memory entry: header fields plus the compressed payload.
#[derive(Debug, Clone)]
pub(crate) struct StoredEntry {
    pub name: String,
    pub method: u16,
    pub crc32: u32,
    pub uncompressed_size: u64,
    pub compressed_size: u64,
    pub payload: Vec<u8>,
}

/// Slurps a source and builds a stored entry, choosing deflate or store.
pub(crate) fn build_entry(name: &str, source: &mut dyn Read) -> Result<StoredEntry> {
    let plain = slurp(source)?;
    let crc32 = Crc32::compute(&plain);
    let uncompressed_size = plain.len() as u64;

    let (method, payload) = if plain.is_empty() {
        (METHOD_STORE, plain)
    } else {
        let compressed = codec::compress(&plain, &CompressionOptions::with_wrap(Wrap::Raw))?;
        if compressed.len() >= plain.len() {
            (METHOD_STORE, plain)
        } else {
            (METHOD_DEFLATE, compressed)
        }
    };

    Ok(StoredEntry {
        name: name.to_string(),
        method,
        crc32,
        uncompressed_size,
        compressed_size: payload.len() as u64,
        payload,
    })
}

/// Decompresses a stored entry back to its plaintext.
pub(crate) fn extract_entry(entry: &StoredEntry, verify_crc: bool) -> Result<Vec<u8>> {
    let plain = match entry.method {
        METHOD_STORE => entry.payload.clone(),
        METHOD_DEFLATE => {
            let plain =
                codec::decompress(&entry.payload, &CompressionOptions::with_wrap(Wrap::Raw))?;
            if plain.len() as u64 != entry.uncompressed_size {
                return Err(Error::codec(format!(
                    "entry '{}' inflated to {} bytes, expected {}",
                    entry.name,
                    plain.len(),
                    entry.uncompressed_size
                )));
            }
            plain
        }
        other => return Err(Error::UnsupportedMethod { method: other }),
    };

    if verify_crc {
        let actual = Crc32::compute(&plain);
        if actual != entry.crc32 {
            return Err(Error::CrcMismatch {
                name: entry.name.clone(),
                expected: entry.crc32,
                actual,
            });
        }
    }
    Ok(plain)
}

/// Validates a caller-held descriptor against the live entry list.
pub(crate) fn locate<'a>(
    entries: &'a [StoredEntry],
    entry: &ArchiveEntry,
) -> Result<&'a StoredEntry> {
    let stored = entries.get(entry.index).ok_or_else(|| {
        Error::InvalidArgument(format!(
            "archive entry '{}' (index {}) is out of range",
            entry.name, entry.index
        ))
    })?;
    if stored.name != entry.name {
        return Err(Error::InvalidArgument(format!(
            "stale archive entry: index {} now names '{}', not '{}'",
            entry.index, stored.name, entry.name
        )));
    }
    Ok(stored)
}

/// Builds the public directory snapshot from the live entry list.
pub(crate) fn directory_of(entries: &[StoredEntry]) -> Vec<ArchiveEntry> {
    entries
        .iter()
        .enumerate()
        .map(|(index, e)| ArchiveEntry {
            name: e.name.clone(),
            index,
            uncompressed_size: e.uncompressed_size,
            compressed_size: e.compressed_size,
        })
        .collect()
}
