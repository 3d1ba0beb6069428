#![allow(dead_code)]

use std::{fs, path::Path};

/// Writes a minimal little-endian ARM ELF32 header with `entry` as its entry
/// point.
pub fn write_elf(path: &Path, entry: u32) {
    let mut header = Vec::with_capacity(52);
    header.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0]);
    header.extend_from_slice(&[0; 8]);
    header.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    header.extend_from_slice(&40u16.to_le_bytes()); // EM_ARM
    header.extend_from_slice(&1u32.to_le_bytes());
    header.extend_from_slice(&entry.to_le_bytes());
    header.extend_from_slice(&0u32.to_le_bytes()); // e_phoff
    header.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
    header.extend_from_slice(&0x0500_0200u32.to_le_bytes());
    header.extend_from_slice(&52u16.to_le_bytes());
    header.extend_from_slice(&32u16.to_le_bytes());
    header.extend_from_slice(&0u16.to_le_bytes());
    header.extend_from_slice(&40u16.to_le_bytes());
    header.extend_from_slice(&0u16.to_le_bytes());
    header.extend_from_slice(&0u16.to_le_bytes());
    assert_eq!(header.len(), 52);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, header).unwrap();
}

/// Creates `path` and its parents, with empty contents.
pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, b"").unwrap();
}
