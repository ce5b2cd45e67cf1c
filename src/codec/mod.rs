//! Streaming DEFLATE codec.
//!
//! This module presents the deflate/zlib/gzip state machine as ordinary
//! sequential byte streams: [`DeflateSink`] is a [`Write`](std::io::Write)
//! that compresses into an inner sink, [`InflateSource`] is a
//! [`Read`](std::io::Read) that decompresses from an inner source. Framing,
//! level, and entropy strategy are selected through [`CompressionOptions`].
//!
//! Both wrappers stage data in fixed [`CHUNK_SIZE`] buffers and drive the
//! backend until it reports spare output room, so callers never see partial
//! state: compressed bytes reach the inner sink only when a chunk fills, on
//! `flush`, or on [`DeflateSink::finish`].
//!
//! # Example
//!
//! ```rust
//! use std::io::{Read, Write};
//! use bundlefs::codec::{CompressionOptions, DeflateSink, InflateSource, Wrap};
//!
//! let options = CompressionOptions::with_wrap(Wrap::Zlib);
//!
//! let mut sink = DeflateSink::new(Vec::new(), &options).unwrap();
//! sink.write_all(b"the quick brown fox jumps over the lazy dog").unwrap();
//! let compressed = sink.finish().unwrap();
//!
//! let mut source = InflateSource::new(compressed.as_slice(), &options).unwrap();
//! let mut plain = Vec::new();
//! source.read_to_end(&mut plain).unwrap();
//! assert_eq!(plain, b"the quick brown fox jumps over the lazy dog");
//! ```

mod deflate;
mod inflate;
mod options;

pub use deflate::DeflateSink;
pub use inflate::InflateSource;
pub use options::{CompressionOptions, Level, Strategy, Wrap};

use crate::{Error, Result};

/// Fixed staging-buffer size used by the codec wrappers, in bytes.
pub const CHUNK_SIZE: usize = 16384;

/// Compresses a byte slice in one call.
///
/// Convenience wrapper over [`DeflateSink`]; the options must name a
/// concrete framing (not [`Wrap::Detect`]).
pub fn compress(data: &[u8], options: &CompressionOptions) -> Result<Vec<u8>> {
    use std::io::Write;

    let mut sink = DeflateSink::new(Vec::new(), options)?;
    sink.write_all(data).map_err(map_codec_io)?;
    sink.finish()
}

/// Decompresses a byte slice in one call.
pub fn decompress(data: &[u8], options: &CompressionOptions) -> Result<Vec<u8>> {
    use std::io::Read;

    let mut source = InflateSource::new(data, options)?;
    let mut plain = Vec::new();
    source.read_to_end(&mut plain).map_err(map_codec_io)?;
    Ok(plain)
}

/// Reclassifies I/O errors produced inside the codec as codec failures.
///
/// The stream wrappers speak `io::Error` because they implement the standard
/// traits; decode failures surface there as `InvalidData`/`UnexpectedEof`.
pub(crate) fn map_codec_io(err: std::io::Error) -> Error {
    match err.kind() {
        std::io::ErrorKind::InvalidData | std::io::ErrorKind::UnexpectedEof => Error::codec(err),
        _ => Error::Io(err),
    }
}
