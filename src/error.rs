//! Error types for VFS, codec, and container operations.
//!
//! All fallible operations in this crate return [`Result<T>`], an alias for
//! `std::result::Result<T, Error>`. Routine outcomes — a missing VFS path, a
//! duplicate insert, a `push` with `create = false` whose target does not
//! exist — are reported as `bool`/`Option` results instead of errors.
//!
//! ```rust,no_run
//! use bundlefs::{FileManager, Error};
//!
//! fn open_root(path: &str) -> bundlefs::Result<FileManager> {
//!     let mut manager = FileManager::new()?;
//!     match manager.set_root(Some(path.as_ref())) {
//!         Ok(()) => Ok(manager),
//!         Err(Error::Io(e)) => {
//!             eprintln!("cannot enter {path}: {e}");
//!             Err(Error::Io(e))
//!         }
//!         Err(e) => Err(e),
//!     }
//! }
//! ```

use std::io;

/// The main error type for this crate.
///
/// Variants map onto the failure categories of the library:
///
/// | Category | Variants |
/// |----------|----------|
/// | Host I/O | [`Io`][Self::Io] |
/// | Container format | [`InvalidFormat`][Self::InvalidFormat], [`UnsupportedMethod`][Self::UnsupportedMethod], [`CrcMismatch`][Self::CrcMismatch] |
/// | Codec | [`Codec`][Self::Codec] |
/// | Arguments | [`InvalidPath`][Self::InvalidPath], [`InvalidArgument`][Self::InvalidArgument] |
/// | State | [`StackUnderflow`][Self::StackUnderflow], [`CodecFinished`][Self::CodecFinished] |
/// | Lookup | [`NotFound`][Self::NotFound] |
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// An I/O error occurred on the underlying host stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The container data is not a valid archive of the expected format.
    ///
    /// Returned for bad signatures, offsets that do not land on the record
    /// they claim to, and an end-of-central-directory record that cannot be
    /// located at all.
    #[error("invalid archive format: {0}")]
    InvalidFormat(String),

    /// An archive entry uses a compression method other than store or deflate.
    #[error("unsupported compression method: {method}")]
    UnsupportedMethod {
        /// The method id found in the entry header.
        method: u16,
    },

    /// The compression backend reported a failure, or a compressed stream
    /// ended before its logical end.
    #[error("codec error: {0}")]
    Codec(String),

    /// A codec sink was used after it was finished.
    #[error("codec stream already finished")]
    CodecFinished,

    /// An entry's stored CRC-32 does not match its decompressed payload.
    ///
    /// Only produced when CRC verification is enabled on the archive.
    #[error("CRC mismatch for entry '{name}': expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        /// The entry name.
        name: String,
        /// The CRC recorded in the entry header.
        expected: u32,
        /// The CRC of the decompressed payload.
        actual: u32,
    },

    /// A path was rejected by validation (invalid characters, trailing dot,
    /// absolute where relative is required, or a file standing where a
    /// directory is needed).
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// An argument was rejected (zero traversal depth, `detect` framing on a
    /// compression stream, an unknown well-known folder name).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A pop was attempted past the root of the folder stack.
    #[error("folder stack underflow: current directory is the root")]
    StackUnderflow,

    /// A required file or resource does not exist.
    #[error("not found: {path}")]
    NotFound {
        /// The path or resource name that was looked up.
        path: String,
    },
}

impl Error {
    /// Creates a codec error from any displayable failure.
    pub(crate) fn codec(message: impl std::fmt::Display) -> Self {
        Error::Codec(message.to_string())
    }

    /// Returns `true` if this error indicates malformed container data.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidFormat(_) | Error::UnsupportedMethod { .. } | Error::CrcMismatch { .. }
        )
    }

    /// Returns `true` if this error indicates data corruption rather than a
    /// usage mistake.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::CrcMismatch { .. } | Error::Codec(_))
    }

    /// Returns `true` if this error was caused by the caller (bad argument,
    /// bad path, or a state-machine violation).
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidPath(_)
                | Error::InvalidArgument(_)
                | Error::StackUnderflow
                | Error::CodecFinished
        )
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;
