//! Archive round-trip tests for both container formats.

mod common;

use std::io::Cursor;

use bundlefs::{Container, RezipArchive, ZipArchive};

#[test]
fn zip_roundtrip_preserves_names_order_and_payloads() {
    let entries = common::sample_entries();
    let mut archive = ZipArchive::new();
    common::fill(&mut archive, &entries);

    let bytes = common::write_to_vec(&archive);
    let parsed = ZipArchive::from_source(&mut Cursor::new(&bytes)).unwrap();
    common::verify_contents(&parsed, &entries);
}

#[test]
fn rezip_roundtrip_preserves_names_order_and_payloads() {
    let entries = common::sample_entries();
    let mut archive = RezipArchive::new();
    common::fill(&mut archive, &entries);

    let bytes = common::write_to_vec(&archive);
    let parsed = RezipArchive::from_source(&mut Cursor::new(&bytes)).unwrap();
    common::verify_contents(&parsed, &entries);
}

#[test]
fn zip_second_roundtrip_is_byte_identical() {
    let mut archive = ZipArchive::new();
    common::fill(&mut archive, &common::sample_entries());

    let first = common::write_to_vec(&archive);
    let parsed = ZipArchive::from_source(&mut Cursor::new(&first)).unwrap();
    let second = common::write_to_vec(&parsed);
    assert_eq!(first, second);
}

#[test]
fn rezip_second_roundtrip_is_byte_identical() {
    let mut archive = RezipArchive::new();
    common::fill(&mut archive, &common::sample_entries());

    let first = common::write_to_vec(&archive);
    let parsed = RezipArchive::from_source(&mut Cursor::new(&first)).unwrap();
    let second = common::write_to_vec(&parsed);
    assert_eq!(first, second);
}

#[test]
fn zip_eocd_sits_at_end_of_file() {
    let mut archive = ZipArchive::new();
    common::fill(&mut archive, &common::sample_entries());
    let bytes = common::write_to_vec(&archive);

    // EOCD: 22 bytes, zero comment, signature first.
    let eocd = &bytes[bytes.len() - 22..];
    assert_eq!(&eocd[..4], &0x06054B50u32.to_le_bytes());
    // comment length is the final field
    assert_eq!(&eocd[20..], &[0, 0]);
}

#[test]
fn zip_central_directory_offset_matches_payload_bytes() {
    let entries = common::sample_entries();
    let mut archive = ZipArchive::new();
    common::fill(&mut archive, &entries);
    let bytes = common::write_to_vec(&archive);

    let eocd = bytes.len() - 22;
    let cd_size = u32::from_le_bytes(bytes[eocd + 12..eocd + 16].try_into().unwrap()) as usize;
    let cd_offset = u32::from_le_bytes(bytes[eocd + 16..eocd + 20].try_into().unwrap()) as usize;

    // local headers + payloads fill the file up to the central directory,
    // and the central directory fills it up to the EOCD.
    assert_eq!(cd_offset + cd_size, eocd);

    // the sum of per-entry (30 + name + compressed) equals the CD offset.
    let listing = archive.directory();
    let expected: usize = listing
        .iter()
        .map(|e| 30 + e.name.len() + e.compressed_size as usize)
        .sum();
    assert_eq!(expected, cd_offset);
}

#[test]
fn rezip_end_record_invariants() {
    let entries = common::sample_entries();
    let mut archive = RezipArchive::new();
    common::fill(&mut archive, &entries);
    let bytes = common::write_to_vec(&archive);

    let eocd = bytes.len() - 24;
    assert_eq!(&bytes[eocd..eocd + 4], &0x0605564Cu32.to_le_bytes());

    let cd_size = u64::from_le_bytes(bytes[eocd + 4..eocd + 12].try_into().unwrap());
    let records = u32::from_le_bytes(bytes[eocd + 12..eocd + 16].try_into().unwrap());
    let cd_offset = u64::from_le_bytes(bytes[eocd + 16..eocd + 24].try_into().unwrap());

    assert_eq!(records as usize, entries.len());
    assert_eq!(cd_offset + cd_size, eocd as u64);

    let expected: u64 = archive
        .directory()
        .iter()
        .map(|e| 25 + e.compressed_size)
        .sum();
    assert_eq!(expected, cd_offset);
}

#[test]
fn pop_returns_plaintext_and_shrinks_both_formats() {
    let entries = common::sample_entries();

    let mut zip = ZipArchive::new();
    common::fill(&mut zip, &entries);
    let listing = zip.directory();
    assert_eq!(zip.pop(&listing[2]).unwrap(), b"this is a test");
    assert_eq!(zip.directory().len(), 2);

    let mut rezip = RezipArchive::new();
    common::fill(&mut rezip, &entries);
    let listing = rezip.directory();
    assert_eq!(rezip.pop(&listing[0]).unwrap(), b"this is a text");
    let remaining = rezip.directory();
    assert_eq!(remaining[0].name, "b.txt");
    assert_eq!(remaining[0].index, 0);
}

#[test]
fn directory_entries_carry_sizes() {
    let mut archive = ZipArchive::new();
    common::fill(&mut archive, &common::sample_entries());
    let listing = archive.directory();

    assert_eq!(listing[0].uncompressed_size, 14);
    assert_eq!(listing[1].uncompressed_size, 0);
    assert_eq!(listing[1].compressed_size, 0);
    for (i, entry) in listing.iter().enumerate() {
        assert_eq!(entry.index, i);
    }
}

#[test]
fn incompressible_entries_store_in_both_formats() {
    use rand::RngCore;
    let mut noise = vec![0u8; 16 * 1024];
    rand::thread_rng().fill_bytes(&mut noise);

    for archive in [
        &mut ZipArchive::new() as &mut dyn Container,
        &mut RezipArchive::new() as &mut dyn Container,
    ] {
        archive.push("noise.bin", &mut noise.as_slice()).unwrap();
        let listing = archive.directory();
        assert_eq!(listing[0].compressed_size, listing[0].uncompressed_size);
        assert_eq!(archive.peek(&listing[0]).unwrap(), noise);
    }
}

#[test]
fn large_compressible_entry_roundtrips_through_zip() {
    let data: Vec<u8> = (0..256 * 1024).map(|i| (i / 100) as u8).collect();
    let mut archive = ZipArchive::new();
    archive.push("big.bin", &mut data.as_slice()).unwrap();

    let listing = archive.directory();
    assert!(listing[0].compressed_size < listing[0].uncompressed_size);

    let bytes = common::write_to_vec(&archive);
    let parsed = ZipArchive::from_source(&mut Cursor::new(&bytes)).unwrap();
    assert_eq!(parsed.peek(&parsed.directory()[0]).unwrap(), data);
}

#[test]
fn crc_is_preserved_across_zip_roundtrip_with_verification() {
    let entries = common::sample_entries();
    let mut archive = ZipArchive::new();
    common::fill(&mut archive, &entries);
    let bytes = common::write_to_vec(&archive);

    let mut parsed = ZipArchive::from_source(&mut Cursor::new(&bytes)).unwrap();
    parsed.set_verify_crc(true);
    // With verification on, peek recomputes and compares every CRC.
    common::verify_contents(&parsed, &entries);
}

#[test]
fn directory_style_names_roundtrip() {
    let entries: Vec<(&str, &[u8])> = vec![
        ("test/A/", b"".as_slice()),
        ("test/A/A/", b"".as_slice()),
        ("test/A/B.txt", b"this is a text".as_slice()),
        ("test/B/", b"".as_slice()),
        ("test/B/empty.txt", b"".as_slice()),
        ("test/C.txt", b"this is a test".as_slice()),
    ];
    let mut archive = ZipArchive::new();
    common::fill(&mut archive, &entries);

    let bytes = common::write_to_vec(&archive);
    let parsed = ZipArchive::from_source(&mut Cursor::new(&bytes)).unwrap();
    common::verify_contents(&parsed, &entries);
}
