//! Tests for FileKeyLoader
//!
//! These tests verify:
//! - `file:` identifier resolution
//! - Rejection of unusable identifiers and files
//! - Exact key bytes, zero bytes included

use std::fs;
use std::path::PathBuf;

use keyward::{FileKeyLoader, KeyId, KeyLoader, KeywardError};
use tempfile::TempDir;

fn id_for(path: &std::path::Path) -> KeyId {
    KeyId::from(format!("file:{}", path.display()))
}

// =============================================================================
// Resolution Tests
// =============================================================================

#[test]
fn test_resolve_single_slash_form() {
    let path = FileKeyLoader::resolve(&KeyId::from("file:/etc/keys/kek.bin")).unwrap();
    assert_eq!(path, PathBuf::from("/etc/keys/kek.bin"));
}

#[test]
fn test_resolve_triple_slash_form() {
    let path = FileKeyLoader::resolve(&KeyId::from("file:///etc/keys/kek.bin")).unwrap();
    assert_eq!(path, PathBuf::from("/etc/keys/kek.bin"));
}

#[test]
fn test_resolve_rejects_other_schemes() {
    for id in ["pkcs11:token=x", "/etc/keys/kek.bin", "http://host/key", ""] {
        assert!(
            matches!(FileKeyLoader::resolve(&KeyId::from(id)), Err(KeywardError::KeyLoad(_))),
            "accepted {:?}",
            id
        );
    }
}

#[test]
fn test_resolve_rejects_relative_and_remote_paths() {
    assert!(FileKeyLoader::resolve(&KeyId::from("file:keys/kek.bin")).is_err());
    assert!(FileKeyLoader::resolve(&KeyId::from("file://host/kek.bin")).is_err());
}

#[test]
fn test_resolve_rejects_non_utf8() {
    let id = KeyId::new(b"file:/keys/\xFF".to_vec());
    assert!(matches!(FileKeyLoader::resolve(&id), Err(KeywardError::KeyLoad(_))));
}

// =============================================================================
// Load Tests
// =============================================================================

#[test]
fn test_load_reads_exact_bytes() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("kek.bin");
    let bytes: [u8; 8] = [0x00, 0x11, 0x00, 0x22, 0x00, 0x33, 0x00, 0x44];
    fs::write(&path, bytes).unwrap();

    let key = FileKeyLoader::new().load_key(&id_for(&path)).unwrap();

    assert_eq!(key.as_bytes(), &bytes);
}

#[test]
fn test_load_missing_file() {
    let temp = TempDir::new().unwrap();
    let result = FileKeyLoader::new().load_key(&id_for(&temp.path().join("absent")));

    assert!(matches!(result, Err(KeywardError::KeyLoad(_))));
}

#[test]
fn test_load_empty_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("empty.bin");
    fs::write(&path, b"").unwrap();

    assert!(FileKeyLoader::new().load_key(&id_for(&path)).is_err());
}

#[test]
fn test_load_oversized_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("huge.bin");
    fs::write(&path, vec![1u8; FileKeyLoader::MAX_KEY_SIZE as usize + 1]).unwrap();

    assert!(FileKeyLoader::new().load_key(&id_for(&path)).is_err());
}

#[test]
fn test_load_directory() {
    let temp = TempDir::new().unwrap();

    assert!(FileKeyLoader::new().load_key(&id_for(temp.path())).is_err());
}
