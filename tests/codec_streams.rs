//! Round-trip and boundary tests for the streaming codec.
//!
//! The archive suites cover raw deflate indirectly; this file exercises the
//! stream wrappers directly across framings, levels, strategies, and chunk
//! boundaries.

use std::io::{Read, Write};

use bundlefs::codec::{
    CHUNK_SIZE, CompressionOptions, DeflateSink, InflateSource, Level, Strategy, Wrap, compress,
    decompress,
};
use proptest::prelude::*;

fn roundtrip(data: &[u8], options: &CompressionOptions) {
    let compressed = compress(data, options).expect("compress failed");
    let plain = decompress(&compressed, options).expect("decompress failed");
    assert_eq!(plain, data, "round-trip mismatch for {options:?}");
}

#[test]
fn all_wraps_roundtrip() {
    let data = b"a reasonably repetitive payload payload payload payload";
    for wrap in [Wrap::Raw, Wrap::Zlib, Wrap::Gzip] {
        roundtrip(data, &CompressionOptions::with_wrap(wrap));
    }
}

#[test]
fn all_levels_roundtrip() {
    let data: Vec<u8> = (0..20_000).map(|i| (i % 31) as u8).collect();
    for level in [Level::None, Level::Default, Level::Best] {
        roundtrip(&data, &CompressionOptions::default().level(level));
    }
}

#[test]
fn all_strategies_roundtrip() {
    let data: Vec<u8> = (0..10_000).map(|i| (i % 7) as u8).collect();
    for strategy in [
        Strategy::Default,
        Strategy::Filtered,
        Strategy::HuffmanOnly,
        Strategy::Rle,
    ] {
        for wrap in [Wrap::Raw, Wrap::Zlib] {
            roundtrip(
                &data,
                &CompressionOptions::with_wrap(wrap).strategy(strategy),
            );
        }
    }
}

#[test]
fn exact_chunk_payload() {
    let data = vec![0x5Au8; CHUNK_SIZE];
    roundtrip(&data, &CompressionOptions::default());
}

#[test]
fn four_chunk_payload() {
    let data: Vec<u8> = (0..4 * CHUNK_SIZE).map(|i| (i % 200) as u8).collect();
    roundtrip(&data, &CompressionOptions::default());
}

#[test]
fn off_by_one_around_chunk_boundary() {
    for size in [CHUNK_SIZE - 1, CHUNK_SIZE, CHUNK_SIZE + 1] {
        let data = vec![0x11u8; size];
        roundtrip(&data, &CompressionOptions::with_wrap(Wrap::Raw));
    }
}

#[test]
fn empty_payload() {
    for wrap in [Wrap::Raw, Wrap::Zlib, Wrap::Gzip] {
        roundtrip(b"", &CompressionOptions::with_wrap(wrap));
    }
}

#[test]
fn writes_of_awkward_sizes() {
    let data: Vec<u8> = (0..100_000).map(|i| (i * 17 % 251) as u8).collect();
    let options = CompressionOptions::with_wrap(Wrap::Zlib);

    let mut sink = DeflateSink::new(Vec::new(), &options).unwrap();
    let mut offset = 0;
    let mut step = 1;
    while offset < data.len() {
        let end = (offset + step).min(data.len());
        sink.write_all(&data[offset..end]).unwrap();
        offset = end;
        step = step * 2 + 1;
    }
    let compressed = sink.finish().unwrap();
    assert_eq!(decompress(&compressed, &options).unwrap(), data);
}

#[test]
fn reader_with_one_byte_buffers() {
    let data = b"tiny reads still make progress";
    let compressed = compress(data, &CompressionOptions::default()).unwrap();

    let mut source =
        InflateSource::new(compressed.as_slice(), &CompressionOptions::default()).unwrap();
    let mut out = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match source.read(&mut byte).unwrap() {
            0 => break,
            _ => out.push(byte[0]),
        }
    }
    assert_eq!(out, data);
}

#[test]
fn compression_actually_shrinks_compressible_data() {
    let data = vec![b'x'; 3 * CHUNK_SIZE];
    let compressed = compress(&data, &CompressionOptions::default()).unwrap();
    assert!(compressed.len() < data.len());
}

#[test]
fn level_none_does_not_shrink() {
    let data = vec![b'x'; 4096];
    let options = CompressionOptions::default().level(Level::None);
    let compressed = compress(&data, &options).unwrap();
    assert!(compressed.len() >= data.len());
    assert_eq!(decompress(&compressed, &options).unwrap(), data);
}

#[test]
fn detect_wrap_on_both_framings() {
    let data = b"framing to be sniffed";
    let detect = CompressionOptions::with_wrap(Wrap::Detect);
    for wrap in [Wrap::Zlib, Wrap::Gzip] {
        let compressed = compress(data, &CompressionOptions::with_wrap(wrap)).unwrap();
        assert_eq!(decompress(&compressed, &detect).unwrap(), data);
    }
}

#[test]
fn detect_rejects_raw_streams() {
    // Autodetection distinguishes zlib from gzip only; a bare deflate
    // stream carries neither framing and must fail to decode.
    let raw = compress(
        b"raw deflate has no detectable framing",
        &CompressionOptions::with_wrap(Wrap::Raw),
    )
    .unwrap();
    assert!(decompress(&raw, &CompressionOptions::with_wrap(Wrap::Detect)).is_err());
}

#[test]
fn gzip_stream_carries_gzip_magic() {
    let compressed = compress(b"data", &CompressionOptions::with_wrap(Wrap::Gzip)).unwrap();
    assert_eq!(&compressed[..2], &[0x1F, 0x8B]);
}

#[test]
fn zlib_stream_carries_zlib_header() {
    let compressed = compress(b"data", &CompressionOptions::with_wrap(Wrap::Zlib)).unwrap();
    // CMF: deflate with a 32 KiB window; header checksum divisible by 31.
    assert_eq!(compressed[0] & 0x0F, 8);
    let header = u16::from_be_bytes([compressed[0], compressed[1]]);
    assert_eq!(header % 31, 0);
}

proptest! {
    #[test]
    fn arbitrary_payloads_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..8192)) {
        for wrap in [Wrap::Raw, Wrap::Zlib, Wrap::Gzip] {
            let options = CompressionOptions::with_wrap(wrap);
            let compressed = compress(&data, &options).unwrap();
            prop_assert_eq!(&decompress(&compressed, &options).unwrap(), &data);
        }
    }
}
