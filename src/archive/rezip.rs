//! Rezip: a slimmed container for embedded-resource bundles.
//!
//! Same structure as ZIP — local headers with payloads, a trailing central
//! directory, an end record — but with fixed-size records and 64-bit sizes:
//!
//! - Local file header (25 bytes): signature, CRC-32, compressed size (8),
//!   uncompressed size (8), method (1).
//! - Central directory header (20 bytes + name): signature, local-header
//!   offset (8), name length (8), name bytes.
//! - End record (24 bytes): signature, central directory size (8), record
//!   count (4), central directory offset (8).
//!
//! The end record has a fixed size and no comment, so reading seeks straight
//! to `end - 24` instead of scanning.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};

use super::{
    ArchiveEntry, Container, METHOD_DEFLATE, METHOD_STORE, StoredEntry, build_entry,
    directory_of, extract_entry, locate,
};
use crate::{Error, Result};

const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x0405564C;
const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0201564C;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x0605564C;

const LOCAL_FILE_HEADER_SIZE: u64 = 25;
const CENTRAL_DIRECTORY_HEADER_FIXED_SIZE: u64 = 20;
const EOCD_SIZE: u64 = 24;

/// Upper bound on entry names; anything larger marks a corrupt directory.
const MAX_NAME_LENGTH: u64 = 32 * 1024;

/// In-memory Rezip archive.
#[derive(Debug, Default)]
pub struct RezipArchive {
    entries: Vec<StoredEntry>,
    verify_crc: bool,
}

impl RezipArchive {
    /// Creates an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables CRC-32 verification on `peek`/`pop`.
    pub fn set_verify_crc(&mut self, verify: bool) {
        self.verify_crc = verify;
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the archive holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses an existing archive from a seekable source.
    pub fn from_source<R: Read + Seek>(source: &mut R) -> Result<Self> {
        let file_size = source.seek(SeekFrom::End(0))?;
        if file_size < EOCD_SIZE {
            return Err(Error::InvalidFormat(
                "too small to hold an end of central directory record".into(),
            ));
        }

        let eocd_pos = file_size - EOCD_SIZE;
        source.seek(SeekFrom::Start(eocd_pos))?;
        let signature = source.read_u32::<LE>()?;
        if signature != END_OF_CENTRAL_DIRECTORY_SIGNATURE {
            return Err(Error::InvalidFormat(format!(
                "bad end of central directory signature {signature:#010x}"
            )));
        }
        let cd_size = source.read_u64::<LE>()?;
        let records = source.read_u32::<LE>()?;
        let cd_offset = source.read_u64::<LE>()?;

        if eocd_pos.checked_sub(cd_offset) != Some(cd_size) {
            return Err(Error::InvalidFormat(format!(
                "central directory size {cd_size} does not line up with its offset {cd_offset}"
            )));
        }

        let mut archive = Self::default();
        if records == 0 && cd_size == 0 {
            return Ok(archive);
        }

        // The end record's offset must land on a central directory header.
        source.seek(SeekFrom::Start(cd_offset))?;
        let cdh_signature = source.read_u32::<LE>()?;
        if cdh_signature != CENTRAL_DIRECTORY_SIGNATURE {
            return Err(Error::InvalidFormat(
                "end record offset does not point at the central directory".into(),
            ));
        }

        source.seek(SeekFrom::Start(cd_offset))?;
        for _ in 0..records {
            let (name, local_offset) = read_central_directory_header(source, file_size)?;
            let after_cdh = source.stream_position()?;

            source.seek(SeekFrom::Start(local_offset))?;
            let entry = read_local_entry(source, name, file_size)?;
            archive.entries.push(entry);

            source.seek(SeekFrom::Start(after_cdh))?;
        }
        Ok(archive)
    }
}

impl Container for RezipArchive {
    fn push(&mut self, name: &str, source: &mut dyn Read) -> Result<()> {
        let entry = build_entry(name, source)?;
        self.entries.push(entry);
        Ok(())
    }

    fn peek(&self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        extract_entry(locate(&self.entries, entry)?, self.verify_crc)
    }

    fn pop(&mut self, entry: &ArchiveEntry) -> Result<Vec<u8>> {
        locate(&self.entries, entry)?;
        let stored = self.entries.remove(entry.index);
        extract_entry(&stored, self.verify_crc)
    }

    fn directory(&self) -> Vec<ArchiveEntry> {
        directory_of(&self.entries)
    }

    fn write(&self, sink: &mut dyn Write) -> Result<()> {
        let mut offset: u64 = 0;
        let mut offsets = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            offsets.push(offset);
            sink.write_u32::<LE>(LOCAL_FILE_HEADER_SIGNATURE)?;
            sink.write_u32::<LE>(entry.crc32)?;
            sink.write_u64::<LE>(entry.compressed_size)?;
            sink.write_u64::<LE>(entry.uncompressed_size)?;
            sink.write_u8(entry.method as u8)?;
            sink.write_all(&entry.payload)?;
            offset += LOCAL_FILE_HEADER_SIZE + entry.payload.len() as u64;
        }

        let cd_offset = offset;
        let mut cd_size: u64 = 0;
        for (entry, &local_offset) in self.entries.iter().zip(&offsets) {
            sink.write_u32::<LE>(CENTRAL_DIRECTORY_SIGNATURE)?;
            sink.write_u64::<LE>(local_offset)?;
            sink.write_u64::<LE>(entry.name.len() as u64)?;
            sink.write_all(entry.name.as_bytes())?;
            cd_size += CENTRAL_DIRECTORY_HEADER_FIXED_SIZE + entry.name.len() as u64;
        }

        sink.write_u32::<LE>(END_OF_CENTRAL_DIRECTORY_SIGNATURE)?;
        sink.write_u64::<LE>(cd_size)?;
        sink.write_u32::<LE>(self.entries.len() as u32)?;
        sink.write_u64::<LE>(cd_offset)?;
        Ok(())
    }
}

fn read_central_directory_header<R: Read + Seek>(
    source: &mut R,
    file_size: u64,
) -> Result<(String, u64)> {
    let signature = source.read_u32::<LE>()?;
    if signature != CENTRAL_DIRECTORY_SIGNATURE {
        return Err(Error::InvalidFormat(format!(
            "bad central directory signature {signature:#010x}"
        )));
    }
    let local_offset = source.read_u64::<LE>()?;
    let name_len = source.read_u64::<LE>()?;
    if name_len > MAX_NAME_LENGTH {
        return Err(Error::InvalidFormat(format!(
            "entry name of {name_len} bytes is not plausible"
        )));
    }
    let mut name = vec![0u8; name_len as usize];
    source.read_exact(&mut name)?;
    let name = String::from_utf8_lossy(&name).into_owned();

    // The recorded offset must land on a local file header.
    if local_offset + 4 > file_size {
        return Err(Error::InvalidFormat(format!(
            "entry '{name}' points past the end of the archive"
        )));
    }
    let here = source.stream_position()?;
    source.seek(SeekFrom::Start(local_offset))?;
    let lfh_signature = source.read_u32::<LE>()?;
    source.seek(SeekFrom::Start(here))?;
    if lfh_signature != LOCAL_FILE_HEADER_SIGNATURE {
        return Err(Error::InvalidFormat(format!(
            "entry '{name}' does not point at a local file header"
        )));
    }

    Ok((name, local_offset))
}

fn read_local_entry<R: Read + Seek>(
    source: &mut R,
    name: String,
    file_size: u64,
) -> Result<StoredEntry> {
    let signature = source.read_u32::<LE>()?;
    if signature != LOCAL_FILE_HEADER_SIGNATURE {
        return Err(Error::InvalidFormat(format!(
            "bad local file header signature {signature:#010x}"
        )));
    }
    let crc32 = source.read_u32::<LE>()?;
    let compressed_size = source.read_u64::<LE>()?;
    let uncompressed_size = source.read_u64::<LE>()?;
    let method = source.read_u8()? as u16;

    if method != METHOD_STORE && method != METHOD_DEFLATE {
        return Err(Error::UnsupportedMethod { method });
    }
    if compressed_size > file_size {
        return Err(Error::InvalidFormat(format!(
            "entry '{name}' claims {compressed_size} compressed bytes in a \
             {file_size}-byte archive"
        )));
    }

    let mut payload = vec![0u8; compressed_size as usize];
    source.read_exact(&mut payload)?;

    Ok(StoredEntry {
        name,
        method,
        crc32,
        uncompressed_size,
        compressed_size,
        payload,
    })
}
