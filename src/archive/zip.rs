//! Standard ZIP container (PKWARE APPNOTE 6.3.9, store + deflate profile).
//!
//! Supported: methods 0 (store) and 8 (deflate), single disk, zeroed
//! timestamps. Not supported: ZIP64, encryption, data descriptors (general
//! purpose flag bit 3 must be unset on both read and write).

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};

use super::{
    ArchiveEntry, Container, METHOD_DEFLATE, METHOD_STORE, StoredEntry, build_entry,
    directory_of, extract_entry, locate,
};
use crate::{Error, Result};

const LOCAL_FILE_HEADER_SIGNATURE: u32 = 0x04034B50;
const CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x02014B50;
const END_OF_CENTRAL_DIRECTORY_SIGNATURE: u32 = 0x06054B50;

/// Fixed part of a local file header.
const LOCAL_FILE_HEADER_SIZE: u64 = 30;
/// Fixed part of a central directory header.
const CENTRAL_DIRECTORY_HEADER_SIZE: u64 = 46;
/// Fixed part of the end-of-central-directory record.
const EOCD_SIZE: u64 = 22;
/// Maximum trailing comment length, bounding the EOCD backward scan.
const MAX_COMMENT_LENGTH: u64 = 0xFFFF;

/// Version needed to extract, as the original tooling writes it.
const VERSION_NEEDED: u16 = 2;

/// A flag-bit-3 entry defers sizes to a data descriptor, which this profile
/// rejects.
const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;

/// In-memory ZIP archive.
///
/// Parsing slurps every entry's compressed payload into memory; writing
/// emits local headers and payloads, the central directory, and the EOCD.
#[derive(Debug, Default)]
pub struct ZipArchive {
    entries: Vec<StoredEntry>,
    verify_crc: bool,
}

/// Parsed end-of-central-directory fields this profile uses.
struct Eocd {
    records: u16,
    cd_size: u32,
    cd_offset: u32,
}

impl ZipArchive {
    /// Creates an empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables CRC-32 verification on `peek`/`pop`.
    ///
    /// Off by default; CRCs are always computed and written.
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
        let eocd = find_eocd(source, file_size)?;

        source.seek(SeekFrom::Start(eocd.cd_offset as u64))?;
        let mut headers = Vec::with_capacity(eocd.records as usize);
        for _ in 0..eocd.records {
            headers.push(read_central_directory_header(source)?);
        }
        let cd_end = source.stream_position()?;
        if cd_end.checked_sub(eocd.cd_offset as u64) != Some(eocd.cd_size as u64) {
            return Err(Error::InvalidFormat(format!(
                "central directory spans {} bytes, record claims {}",
                cd_end.saturating_sub(eocd.cd_offset as u64),
                eocd.cd_size
            )));
        }

        let mut entries = Vec::with_capacity(headers.len());
        for header in headers {
            if header.compressed_size as u64 > file_size {
                return Err(Error::InvalidFormat(format!(
                    "entry '{}' claims {} compressed bytes in a {}-byte archive",
                    header.name, header.compressed_size, file_size
                )));
            }
            source.seek(SeekFrom::Start(header.offset as u64))?;
            skip_local_file_header(source)?;

            let mut payload = vec![0u8; header.compressed_size as usize];
            source.read_exact(&mut payload)?;

            entries.push(StoredEntry {
                name: header.name,
                method: header.method,
                crc32: header.crc32,
                uncompressed_size: header.uncompressed_size as u64,
                compressed_size: header.compressed_size as u64,
                payload,
            });
        }

        Ok(Self {
            entries,
            verify_crc: false,
        })
    }
}

impl Container for ZipArchive {
    fn push(&mut self, name: &str, source: &mut dyn Read) -> Result<()> {
        let entry = build_entry(name, source)?;
        if entry.name.len() > u16::MAX as usize {
            return Err(Error::InvalidPath(format!(
                "entry name of {} bytes exceeds the ZIP limit",
                entry.name.len()
            )));
        }
        if entry.uncompressed_size > u32::MAX as u64 {
            return Err(Error::InvalidArgument(format!(
                "entry '{}' exceeds 4 GiB; ZIP64 is not supported",
                entry.name
            )));
        }
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
        if self.entries.len() > u16::MAX as usize {
            return Err(Error::InvalidArgument(
                "too many entries for a ZIP archive without ZIP64".into(),
            ));
        }

        let mut offset: u64 = 0;
        let mut offsets = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            offsets.push(offset);
            write_local_file_header(sink, entry)?;
            sink.write_all(&entry.payload)?;
            offset += LOCAL_FILE_HEADER_SIZE + entry.name.len() as u64 + entry.payload.len() as u64;
        }

        let cd_offset = offset;
        if cd_offset > u32::MAX as u64 {
            return Err(Error::InvalidArgument(
                "archive exceeds 4 GiB; ZIP64 is not supported".into(),
            ));
        }
        let mut cd_size: u64 = 0;
        for (entry, &local_offset) in self.entries.iter().zip(&offsets) {
            write_central_directory_header(sink, entry, local_offset)?;
            cd_size += CENTRAL_DIRECTORY_HEADER_SIZE + entry.name.len() as u64;
        }

        sink.write_u32::<LE>(END_OF_CENTRAL_DIRECTORY_SIGNATURE)?;
        sink.write_u16::<LE>(0)?; // disk number
        sink.write_u16::<LE>(0)?; // disk where the central directory starts
        sink.write_u16::<LE>(self.entries.len() as u16)?;
        sink.write_u16::<LE>(self.entries.len() as u16)?;
        sink.write_u32::<LE>(cd_size as u32)?;
        sink.write_u32::<LE>(cd_offset as u32)?;
        sink.write_u16::<LE>(0)?; // comment length
        Ok(())
    }
}

fn write_local_file_header(sink: &mut dyn Write, entry: &StoredEntry) -> Result<()> {
    sink.write_u32::<LE>(LOCAL_FILE_HEADER_SIGNATURE)?;
    sink.write_u16::<LE>(VERSION_NEEDED)?;
    sink.write_u16::<LE>(0)?; // general purpose flags
    sink.write_u16::<LE>(entry.method)?;
    sink.write_u16::<LE>(0)?; // modification time
    sink.write_u16::<LE>(0)?; // modification date
    sink.write_u32::<LE>(entry.crc32)?;
    sink.write_u32::<LE>(entry.compressed_size as u32)?;
    sink.write_u32::<LE>(entry.uncompressed_size as u32)?;
    sink.write_u16::<LE>(entry.name.len() as u16)?;
    sink.write_u16::<LE>(0)?; // extra field length
    sink.write_all(entry.name.as_bytes())?;
    Ok(())
}

fn write_central_directory_header(
    sink: &mut dyn Write,
    entry: &StoredEntry,
    local_offset: u64,
) -> Result<()> {
    sink.write_u32::<LE>(CENTRAL_DIRECTORY_SIGNATURE)?;
    sink.write_u16::<LE>(0)?; // version made by
    sink.write_u16::<LE>(VERSION_NEEDED)?;
    sink.write_u16::<LE>(0)?; // general purpose flags
    sink.write_u16::<LE>(entry.method)?;
    sink.write_u16::<LE>(0)?; // modification time
    sink.write_u16::<LE>(0)?; // modification date
    sink.write_u32::<LE>(entry.crc32)?;
    sink.write_u32::<LE>(entry.compressed_size as u32)?;
    sink.write_u32::<LE>(entry.uncompressed_size as u32)?;
    sink.write_u16::<LE>(entry.name.len() as u16)?;
    sink.write_u16::<LE>(0)?; // extra field length
    sink.write_u16::<LE>(0)?; // comment length
    sink.write_u16::<LE>(0)?; // disk number start
    sink.write_u16::<LE>(0)?; // internal attributes
    sink.write_u32::<LE>(0)?; // external attributes
    sink.write_u32::<LE>(local_offset as u32)?;
    sink.write_all(entry.name.as_bytes())?;
    Ok(())
}

/// Central directory header fields this profile uses.
struct CdHeader {
    name: String,
    method: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    offset: u32,
}

fn read_central_directory_header<R: Read>(source: &mut R) -> Result<CdHeader> {
    let signature = source.read_u32::<LE>()?;
    if signature != CENTRAL_DIRECTORY_SIGNATURE {
        return Err(Error::InvalidFormat(format!(
            "bad central directory signature {signature:#010x}"
        )));
    }
    let _version_made_by = source.read_u16::<LE>()?;
    let _version_needed = source.read_u16::<LE>()?;
    let flags = source.read_u16::<LE>()?;
    let method = source.read_u16::<LE>()?;
    let _mod_time = source.read_u16::<LE>()?;
    let _mod_date = source.read_u16::<LE>()?;
    let crc32 = source.read_u32::<LE>()?;
    let compressed_size = source.read_u32::<LE>()?;
    let uncompressed_size = source.read_u32::<LE>()?;
    let name_len = source.read_u16::<LE>()? as usize;
    let extra_len = source.read_u16::<LE>()? as usize;
    let comment_len = source.read_u16::<LE>()? as usize;
    let _disk_start = source.read_u16::<LE>()?;
    let _internal_attributes = source.read_u16::<LE>()?;
    let _external_attributes = source.read_u32::<LE>()?;
    let offset = source.read_u32::<LE>()?;

    let mut name = vec![0u8; name_len];
    source.read_exact(&mut name)?;
    let name = String::from_utf8_lossy(&name).into_owned();

    if flags & FLAG_DATA_DESCRIPTOR != 0 {
        return Err(Error::InvalidFormat(format!(
            "entry '{name}' uses a data descriptor, which is not supported"
        )));
    }
    if method != METHOD_STORE && method != METHOD_DEFLATE {
        return Err(Error::UnsupportedMethod { method });
    }

    let mut skip = vec![0u8; extra_len + comment_len];
    source.read_exact(&mut skip)?;

    Ok(CdHeader {
        name,
        method,
        crc32,
        compressed_size,
        uncompressed_size,
        offset,
    })
}

/// Reads and validates a local file header, leaving the source positioned at
/// the start of the compressed payload.
fn skip_local_file_header<R: Read + Seek>(source: &mut R) -> Result<()> {
    let signature = source.read_u32::<LE>()?;
    if signature != LOCAL_FILE_HEADER_SIGNATURE {
        return Err(Error::InvalidFormat(format!(
            "central directory offset does not point at a local file header \
             (found {signature:#010x})"
        )));
    }
    let _version = source.read_u16::<LE>()?;
    let flags = source.read_u16::<LE>()?;
    if flags & FLAG_DATA_DESCRIPTOR != 0 {
        return Err(Error::InvalidFormat(
            "local header uses a data descriptor, which is not supported".into(),
        ));
    }
    let method = source.read_u16::<LE>()?;
    if method != METHOD_STORE && method != METHOD_DEFLATE {
        return Err(Error::UnsupportedMethod { method });
    }
    let _mod_time = source.read_u16::<LE>()?;
    let _mod_date = source.read_u16::<LE>()?;
    let _crc32 = source.read_u32::<LE>()?;
    let _compressed_size = source.read_u32::<LE>()?;
    let _uncompressed_size = source.read_u32::<LE>()?;
    let name_len = source.read_u16::<LE>()? as i64;
    let extra_len = source.read_u16::<LE>()? as i64;
    source.seek(SeekFrom::Current(name_len + extra_len))?;
    Ok(())
}

/// Locates the end-of-central-directory record by scanning backward from EOF.
///
/// A signature hit is only accepted when the claimed central-directory offset
/// carries a CDH signature and the record's tail lines up with the end of the
/// file; anything else keeps scanning.
fn find_eocd<R: Read + Seek>(source: &mut R, file_size: u64) -> Result<Eocd> {
    if file_size < EOCD_SIZE {
        return Err(Error::InvalidFormat(
            "too small to hold an end of central directory record".into(),
        ));
    }

    let tail_len = file_size.min(EOCD_SIZE + MAX_COMMENT_LENGTH);
    let tail_start = file_size - tail_len;
    source.seek(SeekFrom::Start(tail_start))?;
    let mut tail = vec![0u8; tail_len as usize];
    source.read_exact(&mut tail)?;

    let signature = END_OF_CENTRAL_DIRECTORY_SIGNATURE.to_le_bytes();
    for pos in (0..=tail.len() - EOCD_SIZE as usize).rev() {
        if tail[pos..pos + 4] != signature {
            continue;
        }

        let mut fields = &tail[pos + 4..];
        let _disk_number = fields.read_u16::<LE>()?;
        let _disk_start = fields.read_u16::<LE>()?;
        let _records_on_disk = fields.read_u16::<LE>()?;
        let records = fields.read_u16::<LE>()?;
        let cd_size = fields.read_u32::<LE>()?;
        let cd_offset = fields.read_u32::<LE>()?;
        let comment_len = fields.read_u16::<LE>()?;

        // The record must end exactly at EOF.
        let eocd_pos = tail_start + pos as u64;
        if eocd_pos + EOCD_SIZE + comment_len as u64 != file_size {
            continue;
        }

        let eocd = Eocd {
            records,
            cd_size,
            cd_offset,
        };

        // An empty archive has no central directory header to point at.
        if records == 0 && cd_size == 0 {
            return Ok(eocd);
        }

        // The claimed offset must carry a central directory signature.
        if (cd_offset as u64) + 4 <= file_size {
            source.seek(SeekFrom::Start(cd_offset as u64))?;
            if source.read_u32::<LE>()? == CENTRAL_DIRECTORY_SIGNATURE {
                return Ok(eocd);
            }
        }
    }

    Err(Error::InvalidFormat(
        "no valid end of central directory record found".into(),
    ))
}
