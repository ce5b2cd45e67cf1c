//! Binary serialization helpers.
//!
//! Free functions for fixed-layout primitives and ranges, plus the
//! [`Serializable`] trait that [`FileManager`](crate::FileManager) dispatches
//! through. Layout is native-endian raw bytes; no portability across
//! architectures is claimed.
//!
//! Value types are bounded by [`bytemuck::Pod`], which is what makes the
//! raw-byte view sound: every bit pattern of a `Pod` type is a valid value.
//!
//! # Example
//!
//! ```rust
//! use bundlefs::serial::{read_pod, write_pod};
//!
//! let mut buffer = Vec::new();
//! write_pod(&mut buffer, &42u64).unwrap();
//! write_pod(&mut buffer, &3.5f64).unwrap();
//!
//! let mut source = buffer.as_slice();
//! assert_eq!(read_pod::<u64, _>(&mut source).unwrap(), 42);
//! assert_eq!(read_pod::<f64, _>(&mut source).unwrap(), 3.5);
//! ```

use std::io::{Read, Write};

use bytemuck::{Pod, Zeroable};

use crate::{Error, Result};

/// An object that knows how to write and reload itself.
///
/// Implementations drive the free functions of this module (or any other
/// byte-level encoding) against the given sink/source. The
/// [`FileManager`](crate::FileManager) serialization entry points dispatch
/// through this trait, optionally routing the stream through the codec.
pub trait Serializable {
    /// Writes the object's state to `sink`.
    fn serialize(&self, sink: &mut dyn Write) -> Result<()>;

    /// Replaces the object's state from `source`.
    fn deserialize(&mut self, source: &mut dyn Read) -> Result<()>;
}

/// Writes one value as its raw bytes.
pub fn write_pod<T: Pod, W: Write + ?Sized>(sink: &mut W, value: &T) -> Result<()> {
    sink.write_all(bytemuck::bytes_of(value))?;
    Ok(())
}

/// Reads one value from its raw bytes.
pub fn read_pod<T: Pod, R: Read + ?Sized>(source: &mut R) -> Result<T> {
    let mut value = T::zeroed();
    source.read_exact(bytemuck::bytes_of_mut(&mut value))?;
    Ok(value)
}

/// Writes a fixed-size run of values as concatenated raw bytes.
///
/// The element count is not recorded; the reader supplies a slice of the
/// same length.
pub fn write_pod_slice<T: Pod, W: Write + ?Sized>(sink: &mut W, values: &[T]) -> Result<()> {
    sink.write_all(bytemuck::cast_slice(values))?;
    Ok(())
}

/// Reads a fixed-size run of values into a caller-sized slice.
pub fn read_pod_slice<T: Pod, R: Read + ?Sized>(source: &mut R, values: &mut [T]) -> Result<()> {
    source.read_exact(bytemuck::cast_slice_mut(values))?;
    Ok(())
}

/// Writes a contiguous range: its byte count (as `u64`), then raw bytes.
pub fn write_pod_vec<T: Pod, W: Write + ?Sized>(sink: &mut W, values: &[T]) -> Result<()> {
    let byte_count = std::mem::size_of_val(values) as u64;
    write_pod(sink, &byte_count)?;
    sink.write_all(bytemuck::cast_slice(values))?;
    Ok(())
}

/// Reads a contiguous range written by [`write_pod_vec`], resizing the
/// destination when its current length does not match.
pub fn read_pod_vec<T: Pod, R: Read + ?Sized>(source: &mut R, values: &mut Vec<T>) -> Result<()> {
    let byte_count = read_pod::<u64, _>(source)? as usize;
    let element_size = std::mem::size_of::<T>();
    if element_size == 0 || byte_count % element_size != 0 {
        return Err(Error::InvalidFormat(format!(
            "byte count {byte_count} is not a multiple of the element size {element_size}"
        )));
    }
    let count = byte_count / element_size;
    if values.len() != count {
        values.resize(count, T::zeroed());
    }
    source.read_exact(bytemuck::cast_slice_mut(values.as_mut_slice()))?;
    Ok(())
}

/// Writes a sequence element by element: its length, then each value.
///
/// Suitable for non-contiguous containers; the iterator must know its
/// length up front.
pub fn write_seq<T, W, I>(sink: &mut W, values: I) -> Result<()>
where
    T: Pod,
    W: Write + ?Sized,
    I: IntoIterator<Item = T>,
    I::IntoIter: ExactSizeIterator,
{
    let iter = values.into_iter();
    write_pod(sink, &(iter.len() as u64))?;
    for value in iter {
        write_pod(sink, &value)?;
    }
    Ok(())
}

/// Reads a sequence written by [`write_seq`] into any extendable container.
pub fn read_seq<T, C, R>(source: &mut R) -> Result<C>
where
    T: Pod,
    C: Default + Extend<T>,
    R: Read + ?Sized,
{
    let count = read_pod::<u64, _>(source)? as usize;
    let mut container = C::default();
    for _ in 0..count {
        container.extend(std::iter::once(read_pod::<T, _>(source)?));
    }
    Ok(container)
}

/// Writes a string as a length-prefixed contiguous byte range.
pub fn write_string<W: Write + ?Sized>(sink: &mut W, value: &str) -> Result<()> {
    write_pod_vec(sink, value.as_bytes())
}

/// Reads a string written by [`write_string`].
pub fn read_string<R: Read + ?Sized>(source: &mut R) -> Result<String> {
    let mut bytes = Vec::new();
    read_pod_vec(source, &mut bytes)?;
    String::from_utf8(bytes)
        .map_err(|_| Error::InvalidFormat("string payload is not valid UTF-8".into()))
}
