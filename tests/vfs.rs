//! VFS integration: archive ingestion and host-tree ingestion.

mod common;

use std::io::Cursor;

use bundlefs::{RezipArchive, VfsTree, ZipArchive, slurp};

fn tree_archive() -> ZipArchive {
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
    archive
}

#[test]
fn vfs_from_archive() {
    let mut vfs = VfsTree::new();
    let added = vfs.load_archive(&tree_archive()).unwrap();
    assert_eq!(added, 6);

    assert!(vfs.contains("test/A/B.txt"));
    assert!(vfs.get("test/A").is_none());

    let mut stream = vfs.get("test/C.txt").unwrap();
    assert_eq!(slurp(&mut stream).unwrap(), b"this is a test");

    let mut empty = vfs.get("test/B/empty.txt").unwrap();
    assert!(slurp(&mut empty).unwrap().is_empty());
}

#[test]
fn vfs_from_parsed_archive_bytes() {
    // The full chain: build, serialise, parse, ingest, read back.
    let bytes = common::write_to_vec(&tree_archive());
    let parsed = ZipArchive::from_source(&mut Cursor::new(&bytes)).unwrap();

    let mut vfs = VfsTree::new();
    vfs.load_archive(&parsed).unwrap();

    let mut stream = vfs.get("test/A/B.txt").unwrap();
    assert_eq!(slurp(&mut stream).unwrap(), b"this is a text");
}

#[test]
fn vfs_from_rezip() {
    let mut archive = RezipArchive::new();
    common::fill(
        &mut archive,
        &[
            ("res/", b"".as_slice()),
            ("res/shader.glsl", b"void main() {}".as_slice()),
        ],
    );

    let mut vfs = VfsTree::new();
    assert_eq!(vfs.load_archive(&archive).unwrap(), 2);
    let mut stream = vfs.get("res/shader.glsl").unwrap();
    assert_eq!(slurp(&mut stream).unwrap(), b"void main() {}");
}

#[test]
fn vfs_lookup_is_case_insensitive() {
    let mut vfs = VfsTree::new();
    vfs.load_archive(&tree_archive()).unwrap();

    assert!(vfs.contains("TEST/a/b.TXT"));
    assert!(vfs.get("Test/C.txt").is_some());
}

#[test]
fn removing_a_prefix_removes_the_subtree() {
    let mut vfs = VfsTree::new();
    vfs.load_archive(&tree_archive()).unwrap();

    assert!(vfs.remove("test/a"));
    assert!(!vfs.contains("test/A"));
    assert!(!vfs.contains("test/A/A"));
    assert!(!vfs.contains("test/A/B.txt"));
    assert!(vfs.contains("test/B/empty.txt"));
    assert!(vfs.contains("test/C.txt"));
}

#[test]
fn streams_are_independent() {
    let mut vfs = VfsTree::new();
    vfs.load_archive(&tree_archive()).unwrap();

    let mut first = vfs.get("test/C.txt").unwrap();
    let mut second = vfs.get("test/C.txt").unwrap();

    let mut buf = [0u8; 4];
    use std::io::Read;
    first.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"this");

    // The second stream starts at the beginning regardless.
    assert_eq!(slurp(&mut second).unwrap(), b"this is a test");
    assert_eq!(slurp(&mut first).unwrap(), b" is a test");
}

#[test]
fn load_directory_roundtrip_through_host_fs() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("assets/textures")).unwrap();
    std::fs::write(dir.path().join("assets/config.ini"), b"[core]\n").unwrap();
    std::fs::write(dir.path().join("assets/textures/t1.raw"), vec![9u8; 512]).unwrap();

    let mut vfs = VfsTree::new();
    let added = vfs.load_directory(dir.path()).unwrap();
    assert_eq!(added, 4);

    assert!(vfs.contains("assets/textures"));
    let mut stream = vfs.get("assets/textures/t1.raw").unwrap();
    assert_eq!(slurp(&mut stream).unwrap(), vec![9u8; 512]);
}

#[test]
fn ingest_add_remove_add_cycle() {
    let mut vfs = VfsTree::new();
    vfs.load_archive(&tree_archive()).unwrap();

    assert!(vfs.remove("test/c.txt"));
    assert!(!vfs.contains("test/C.txt"));
    assert!(vfs.add_bytes("test/C.txt", b"rewritten".to_vec()));

    let mut stream = vfs.get("test/c.txt").unwrap();
    assert_eq!(slurp(&mut stream).unwrap(), b"rewritten");
}
