//! Byte-stream adapters over memory buffers and host files.
//!
//! The unified read/write/seek interface of this crate is the standard
//! [`Read`]/[`Write`]/[`Seek`] trait family; everything above this module
//! (codec, containers, VFS, serialization) is written against those traits.
//! This module supplies the concrete adapters:
//!
//! - [`MemorySource`]: a seekable reader over borrowed or owned bytes.
//! - [`MemorySink`]: a growable in-memory sink.
//! - [`FileSource`] / [`FileSink`]: buffered host-file adapters opened
//!   through an explicit [`OpenMode`].
//!
//! End-of-stream is not an error: a read that returns fewer bytes than
//! requested — or zero bytes for a non-empty buffer — signals EOF, and
//! callers loop or use [`slurp`].

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::Result;

/// Reads a source to its end into a fresh byte buffer.
pub fn slurp<R: Read + ?Sized>(source: &mut R) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    source.read_to_end(&mut data)?;
    Ok(data)
}

/// A seekable byte source over a borrowed slice or an owned buffer.
///
/// Seeking is O(1). Reads past the end return zero bytes.
#[derive(Debug, Clone)]
pub struct MemorySource<'a> {
    data: Cow<'a, [u8]>,
    pos: usize,
}

impl<'a> MemorySource<'a> {
    /// Creates a source borrowing the given slice.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data: Cow::Borrowed(data),
            pos: 0,
        }
    }

    /// Creates a source owning the given buffer.
    pub fn from_vec(data: Vec<u8>) -> MemorySource<'static> {
        MemorySource {
            data: Cow::Owned(data),
            pos: 0,
        }
    }

    /// Total length of the underlying bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the underlying buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Current read position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Returns `true` once the position has reached the end.
    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Bytes remaining after the current position.
    pub fn remaining(&self) -> &[u8] {
        &self.data[self.pos.min(self.data.len())..]
    }

    /// Advances the position by up to `n` bytes and returns how far it moved.
    pub fn skip(&mut self, n: usize) -> usize {
        let step = n.min(self.data.len() - self.pos.min(self.data.len()));
        self.pos += step;
        step
    }
}

impl Read for MemorySource<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.remaining();
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Seek for MemorySource<'_> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.data.len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => len + offset,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of buffer",
            ));
        }
        self.pos = target as usize;
        Ok(self.pos as u64)
    }
}

/// A growable in-memory byte sink.
///
/// Writes always succeed and append to the internal buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    data: Vec<u8>,
}

impl MemorySink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes written so far.
    pub fn position(&self) -> usize {
        self.data.len()
    }

    /// The collected bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the sink and returns the collected bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Open mode for host-file adapters.
///
/// Binary access is always implied; there is no text translation anywhere in
/// this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    /// Open for reading.
    pub read: bool,
    /// Open for writing.
    pub write: bool,
    /// Append instead of overwriting.
    pub append: bool,
    /// Truncate existing contents on open.
    pub truncate: bool,
}

impl OpenMode {
    /// Read-only access.
    pub const READ: OpenMode = OpenMode {
        read: true,
        write: false,
        append: false,
        truncate: false,
    };

    /// Write access, truncating existing contents.
    pub const WRITE: OpenMode = OpenMode {
        read: false,
        write: true,
        append: false,
        truncate: true,
    };

    /// Write access, appending to existing contents.
    pub const APPEND: OpenMode = OpenMode {
        read: false,
        write: true,
        append: true,
        truncate: false,
    };

    /// Read and write access without truncation.
    pub const READ_WRITE: OpenMode = OpenMode {
        read: true,
        write: true,
        append: false,
        truncate: false,
    };

    /// Translates this mode into host open options.
    pub fn to_open_options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options
            .read(self.read)
            .write(self.write || self.append)
            .append(self.append)
            .truncate(self.truncate)
            .create(self.write || self.append);
        options
    }
}

/// A buffered, seekable reader over a host file.
#[derive(Debug)]
pub struct FileSource {
    inner: BufReader<File>,
    len: u64,
}

impl FileSource {
    /// Opens the file at `path` for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self {
            inner: BufReader::new(file),
            len,
        })
    }

    /// Size of the file in bytes, as observed at open time.
    pub fn size(&self) -> u64 {
        self.len
    }
}

impl Read for FileSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Seek for FileSource {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}

/// A buffered, seekable writer over a host file.
#[derive(Debug)]
pub struct FileSink {
    inner: BufWriter<File>,
}

impl FileSink {
    /// Creates or opens the file at `path` with the given mode.
    ///
    /// The mode must include write or append access.
    pub fn create(path: impl AsRef<Path>, mode: OpenMode) -> Result<Self> {
        if !mode.write && !mode.append {
            return Err(crate::Error::InvalidArgument(
                "file sink requires a writable open mode".into(),
            ));
        }
        let file = mode.to_open_options().open(path)?;
        Ok(Self {
            inner: BufWriter::new(file),
        })
    }

    /// Flushes buffered bytes and returns the underlying file.
    pub fn into_file(self) -> Result<File> {
        self.inner
            .into_inner()
            .map_err(|e| crate::Error::Io(e.into_error()))
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl Seek for FileSink {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.seek(pos)
    }
}
