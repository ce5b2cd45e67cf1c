//! Shared helpers for the integration suites.
//!
//! Note: `#![allow(dead_code)]` is required because each integration test
//! file compiles as a separate crate and may only use a subset of these
//! helpers.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use bundlefs::{ArchiveEntry, Container};

/// The canonical three-entry payload used across the archive suites.
pub fn sample_entries() -> Vec<(&'static str, &'static [u8])> {
    vec![
        ("a.txt", b"this is a text".as_slice()),
        ("b.txt", b"".as_slice()),
        ("c.txt", b"this is a test".as_slice()),
    ]
}

/// Pushes `entries` into any container, in order.
pub fn fill(container: &mut dyn Container, entries: &[(&str, &[u8])]) {
    for (name, data) in entries {
        let mut source: &[u8] = data;
        container
            .push(name, &mut source)
            .unwrap_or_else(|e| panic!("push of '{name}' failed: {e}"));
    }
}

/// Serialises a container to bytes.
pub fn write_to_vec(container: &dyn Container) -> Vec<u8> {
    let mut bytes = Vec::new();
    container.write(&mut bytes).expect("archive write failed");
    bytes
}

/// Asserts that a parsed directory matches the expected names and payloads.
pub fn verify_contents(container: &dyn Container, entries: &[(&str, &[u8])]) {
    let listing: Vec<ArchiveEntry> = container.directory();
    assert_eq!(listing.len(), entries.len(), "entry count mismatch");
    for (entry, (name, data)) in listing.iter().zip(entries) {
        assert_eq!(entry.name, *name, "entry order/name mismatch");
        assert_eq!(entry.uncompressed_size, data.len() as u64);
        let plain = container
            .peek(entry)
            .unwrap_or_else(|e| panic!("peek of '{name}' failed: {e}"));
        assert_eq!(plain, *data, "payload mismatch for '{name}'");
    }
}

/// Serialised guard over the process working directory.
///
/// Tests that construct a `FileManager` and push folders mutate the process
/// CWD; within one test binary they run on parallel threads, so every such
/// test takes this lock and the guard restores the original directory when
/// it drops.
pub struct CwdLock {
    _guard: MutexGuard<'static, ()>,
    original: PathBuf,
}

pub fn lock_cwd() -> CwdLock {
    static LOCK: Mutex<()> = Mutex::new(());
    let guard = LOCK.lock().unwrap_or_else(|e| e.into_inner());
    CwdLock {
        _guard: guard,
        original: std::env::current_dir().expect("current dir gone"),
    }
}

impl Drop for CwdLock {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}
