//! Streaming compression sink.

use std::io::{self, Write};

use flate2::write::GzEncoder;
use miniz_oxide::deflate::core::CompressorOxide;
use miniz_oxide::deflate::stream::deflate;
use miniz_oxide::{MZFlush, MZStatus};

use super::{CHUNK_SIZE, CompressionOptions, Wrap};
use crate::{Error, Result};

/// A write sink that compresses everything written to it into an inner sink.
///
/// Plaintext accumulates in a [`CHUNK_SIZE`] staging buffer; the encoder runs
/// when the buffer fills, on `flush`, and on [`finish`](Self::finish), each
/// time draining output in chunks until the backend leaves spare output room.
/// The inner sink therefore never observes partially-encoded state between
/// those points.
///
/// [`finish`](Self::finish) consumes the sink, drives the encoder to
/// stream-end, and returns the inner sink. Dropping an unfinished sink
/// finalises it as well; a failure on that path is reported through
/// [`log::error!`] and swallowed, since destructors must not fail.
pub struct DeflateSink<W: Write> {
    inner: Option<Inner<W>>,
    staging: Vec<u8>,
    chunk: Vec<u8>,
}

enum Inner<W: Write> {
    Stream {
        state: Box<CompressorOxide>,
        output: W,
    },
    Gzip(GzEncoder<W>),
}

impl<W: Write> DeflateSink<W> {
    /// Creates a sink compressing into `output`.
    ///
    /// # Errors
    ///
    /// [`Wrap::Detect`] is an input-side option; requesting it here returns
    /// [`Error::InvalidArgument`].
    pub fn new(output: W, options: &CompressionOptions) -> Result<Self> {
        let inner = match options.wrap {
            Wrap::Detect => {
                return Err(Error::InvalidArgument(
                    "detect framing is only valid for decompression".into(),
                ));
            }
            Wrap::Gzip => Inner::Gzip(GzEncoder::new(output, options.level.to_flate2())),
            Wrap::Raw | Wrap::Zlib => Inner::Stream {
                state: Box::new(CompressorOxide::new(
                    options.stream_flags(options.wrap == Wrap::Zlib),
                )),
                output,
            },
        };
        Ok(Self {
            inner: Some(inner),
            staging: Vec::with_capacity(CHUNK_SIZE),
            chunk: vec![0u8; CHUNK_SIZE],
        })
    }

    /// Returns `true` once the sink has been finished.
    pub fn is_finished(&self) -> bool {
        self.inner.is_none()
    }

    /// Compresses any staged bytes, drives the encoder to stream-end, and
    /// returns the inner sink.
    pub fn finish(mut self) -> Result<W> {
        if let Err(e) = self.drain_staging(MZFlush::Finish) {
            // Poisoned stream; release the context so drop stays quiet.
            self.inner = None;
            return Err(e);
        }
        match self.inner.take() {
            Some(Inner::Stream { output, .. }) => Ok(output),
            Some(Inner::Gzip(encoder)) => Ok(encoder.finish()?),
            None => Err(Error::CodecFinished),
        }
    }

    /// Runs the encoder over the staged input with the given flush mode.
    ///
    /// With [`MZFlush::Finish`] the loop only exits on stream-end status.
    fn drain_staging(&mut self, flush: MZFlush) -> Result<()> {
        let inner = self.inner.as_mut().ok_or(Error::CodecFinished)?;
        match inner {
            Inner::Gzip(encoder) => {
                encoder.write_all(&self.staging)?;
                if flush == MZFlush::Sync {
                    encoder.flush()?;
                }
            }
            Inner::Stream { state, output } => {
                let mut consumed = 0;
                loop {
                    let result =
                        deflate(state, &self.staging[consumed..], &mut self.chunk, flush);
                    consumed += result.bytes_consumed;
                    output.write_all(&self.chunk[..result.bytes_written])?;
                    match result.status {
                        Ok(MZStatus::StreamEnd) => break,
                        Ok(_) => {}
                        Err(e) => {
                            return Err(Error::codec(format!("deflate failed: {e:?}")));
                        }
                    }
                    let input_drained = consumed >= self.staging.len();
                    let output_has_room = result.bytes_written < self.chunk.len();
                    if flush != MZFlush::Finish && input_drained && output_has_room {
                        break;
                    }
                }
                if flush == MZFlush::Sync {
                    output.flush()?;
                }
            }
        }
        self.staging.clear();
        Ok(())
    }

    /// Drop-path finalisation; shared error reporting lives at the call site.
    fn finalize_in_place(&mut self) -> Result<()> {
        self.drain_staging(MZFlush::Finish)?;
        match self.inner.take() {
            Some(Inner::Stream { mut output, .. }) => output.flush()?,
            Some(Inner::Gzip(encoder)) => {
                encoder.finish()?;
            }
            None => {}
        }
        Ok(())
    }
}

impl<W: Write> Write for DeflateSink<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.inner.is_none() {
            return Err(io::Error::other(Error::CodecFinished.to_string()));
        }
        let mut written = 0;
        while written < buf.len() {
            let room = CHUNK_SIZE - self.staging.len();
            if room == 0 {
                self.drain_staging(MZFlush::None)
                    .map_err(|e| io::Error::other(e.to_string()))?;
            } else {
                let take = room.min(buf.len() - written);
                self.staging.extend_from_slice(&buf[written..written + take]);
                written += take;
            }
        }
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.drain_staging(MZFlush::Sync)
            .map_err(|e| io::Error::other(e.to_string()))
    }
}

impl<W: Write> Drop for DeflateSink<W> {
    fn drop(&mut self) {
        if self.inner.is_some() {
            if let Err(e) = self.finalize_in_place() {
                log::error!("deflate sink finalisation failed during drop: {e}");
            }
        }
    }
}
