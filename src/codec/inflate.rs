//! Streaming decompression source.

use std::io::{self, BufReader, Chain, Cursor, Read};

use flate2::bufread::GzDecoder;
use miniz_oxide::inflate::stream::{InflateState, inflate};
use miniz_oxide::{DataFormat, MZFlush, MZStatus};

use super::{CHUNK_SIZE, CompressionOptions, Wrap};
use crate::Result;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// A gzip reader whose input may be prefixed by already-sniffed bytes.
type GzipReader<R> = GzDecoder<BufReader<Chain<Cursor<Vec<u8>>, R>>>;

/// A read source that decompresses an inner compressed source on demand.
///
/// The source owns an input staging buffer (raw compressed bytes pulled from
/// the inner reader) and decodes into the caller's buffer on each `read`.
/// Once the decoder reports stream-end, every further read returns 0; bytes
/// the inner reader may hold past the logical stream end are left untouched.
///
/// With [`Wrap::Detect`] the first two input bytes select gzip (magic
/// `1F 8B`) or zlib framing.
///
/// Decode failures surface as `io::Error` of kind `InvalidData`; an input
/// that ends before the logical stream end surfaces as `UnexpectedEof`.
pub struct InflateSource<R: Read> {
    inner: Inner<R>,
}

enum Inner<R: Read> {
    /// Detect framing not yet resolved; holds the unread input.
    Pending(Option<R>),
    Stream(StreamState<R>),
    Gzip(GzipReader<R>),
}

struct StreamState<R> {
    state: Box<InflateState>,
    input: R,
    staging: Vec<u8>,
    start: usize,
    end: usize,
    input_eof: bool,
    done: bool,
}

impl<R: Read> StreamState<R> {
    fn new(input: R, format: DataFormat) -> Self {
        Self {
            state: InflateState::new_boxed(format),
            input,
            staging: vec![0u8; CHUNK_SIZE],
            start: 0,
            end: 0,
            input_eof: false,
            done: false,
        }
    }

    fn read_decoded(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.done {
            return Ok(0);
        }
        loop {
            if self.start == self.end && !self.input_eof {
                let n = self.input.read(&mut self.staging)?;
                self.start = 0;
                self.end = n;
                if n == 0 {
                    self.input_eof = true;
                }
            }
            let result = inflate(
                &mut self.state,
                &self.staging[self.start..self.end],
                buf,
                MZFlush::None,
            );
            self.start += result.bytes_consumed;
            match result.status {
                Ok(MZStatus::StreamEnd) => {
                    self.done = true;
                    return Ok(result.bytes_written);
                }
                Ok(_) => {
                    if result.bytes_written > 0 {
                        return Ok(result.bytes_written);
                    }
                    if self.input_eof && self.start == self.end {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            "compressed stream ended before its logical end",
                        ));
                    }
                }
                Err(e) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("inflate failed: {e:?}"),
                    ));
                }
            }
        }
    }
}

impl<R: Read> InflateSource<R> {
    /// Creates a source decompressing from `input`.
    pub fn new(input: R, options: &CompressionOptions) -> Result<Self> {
        let inner = match options.wrap {
            Wrap::Raw => Inner::Stream(StreamState::new(input, DataFormat::Raw)),
            Wrap::Zlib => Inner::Stream(StreamState::new(input, DataFormat::Zlib)),
            Wrap::Gzip => Inner::Gzip(gzip_reader(Vec::new(), input)),
            Wrap::Detect => Inner::Pending(Some(input)),
        };
        Ok(Self { inner })
    }

    /// Returns `true` once the logical end of the compressed stream was
    /// reached.
    pub fn is_eos(&self) -> bool {
        match &self.inner {
            Inner::Pending(_) => false,
            Inner::Stream(state) => state.done,
            Inner::Gzip(_) => false,
        }
    }

    /// Resolves a pending detect wrapper by sniffing the first two bytes.
    fn resolve_detect(&mut self) -> io::Result<()> {
        let Inner::Pending(slot) = &mut self.inner else {
            return Ok(());
        };
        let mut input = slot.take().expect("pending input already taken");

        let mut magic = [0u8; 2];
        let mut have = 0;
        while have < magic.len() {
            let n = input.read(&mut magic[have..])?;
            if n == 0 {
                break;
            }
            have += n;
        }

        if have == 2 && magic == GZIP_MAGIC {
            self.inner = Inner::Gzip(gzip_reader(magic.to_vec(), input));
        } else {
            let mut state = StreamState::new(input, DataFormat::Zlib);
            state.staging[..have].copy_from_slice(&magic[..have]);
            state.end = have;
            state.input_eof = have < 2;
            self.inner = Inner::Stream(state);
        }
        Ok(())
    }
}

fn gzip_reader<R: Read>(prefix: Vec<u8>, input: R) -> GzipReader<R> {
    GzDecoder::new(BufReader::new(Cursor::new(prefix).chain(input)))
}

impl<R: Read> Read for InflateSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if matches!(self.inner, Inner::Pending(_)) {
            self.resolve_detect()?;
        }
        match &mut self.inner {
            Inner::Pending(_) => unreachable!("detect framing resolved above"),
            Inner::Stream(state) => state.read_decoded(buf),
            Inner::Gzip(decoder) => decoder.read(buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{DeflateSink, compress};
    use std::io::Write;

    fn compressed(data: &[u8], wrap: Wrap) -> Vec<u8> {
        compress(data, &CompressionOptions::with_wrap(wrap)).unwrap()
    }

    #[test]
    fn reads_after_stream_end_return_zero() {
        let bytes = compressed(b"payload", Wrap::Zlib);
        let mut source =
            InflateSource::new(bytes.as_slice(), &CompressionOptions::with_wrap(Wrap::Zlib))
                .unwrap();
        let mut out = Vec::new();
        source.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"payload");
        assert!(source.is_eos());

        let mut buf = [0u8; 16];
        assert_eq!(source.read(&mut buf).unwrap(), 0);
        assert_eq!(source.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn trailing_bytes_after_stream_end_are_not_consumed() {
        let mut bytes = compressed(b"head", Wrap::Raw);
        bytes.extend_from_slice(b"tail");
        let mut source =
            InflateSource::new(bytes.as_slice(), &CompressionOptions::with_wrap(Wrap::Raw))
                .unwrap();
        let mut out = Vec::new();
        source.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"head");
    }

    #[test]
    fn small_destination_buffers() {
        let data: Vec<u8> = (0..10_000).map(|i| (i % 13) as u8).collect();
        let bytes = compressed(&data, Wrap::Zlib);
        let mut source =
            InflateSource::new(bytes.as_slice(), &CompressionOptions::with_wrap(Wrap::Zlib))
                .unwrap();

        let mut out = Vec::new();
        let mut buf = [0u8; 7];
        loop {
            let n = source.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, data);
    }

    #[test]
    fn detect_resolves_gzip() {
        let bytes = compressed(b"detected gzip body", Wrap::Gzip);
        let mut source =
            InflateSource::new(bytes.as_slice(), &CompressionOptions::with_wrap(Wrap::Detect))
                .unwrap();
        let mut out = Vec::new();
        source.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"detected gzip body");
    }

    #[test]
    fn detect_resolves_zlib() {
        let bytes = compressed(b"detected zlib body", Wrap::Zlib);
        let mut source =
            InflateSource::new(bytes.as_slice(), &CompressionOptions::with_wrap(Wrap::Detect))
                .unwrap();
        let mut out = Vec::new();
        source.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"detected zlib body");
    }

    #[test]
    fn premature_eof_is_an_error() {
        let bytes = compressed(&vec![7u8; 4096], Wrap::Raw);
        let truncated = &bytes[..bytes.len() - 3];
        let mut source =
            InflateSource::new(truncated, &CompressionOptions::with_wrap(Wrap::Raw)).unwrap();
        let mut out = Vec::new();
        let err = source.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn garbage_input_is_invalid_data() {
        let garbage = [0xAAu8; 64];
        let mut source =
            InflateSource::new(&garbage[..], &CompressionOptions::with_wrap(Wrap::Zlib)).unwrap();
        let mut out = Vec::new();
        let err = source.read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn multi_chunk_stream_from_sink() {
        let data: Vec<u8> = (0..3 * CHUNK_SIZE + 17).map(|i| (i % 251) as u8).collect();
        let options = CompressionOptions::with_wrap(Wrap::Raw);

        let mut sink = DeflateSink::new(Vec::new(), &options).unwrap();
        sink.write_all(&data).unwrap();
        let bytes = sink.finish().unwrap();

        let mut source = InflateSource::new(bytes.as_slice(), &options).unwrap();
        let mut out = Vec::new();
        source.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }
}
