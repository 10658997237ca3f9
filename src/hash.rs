//! BLAKE3 hashing utilities for bundle content
//!
//! Directory hashes are deterministic (files visited in sorted relative-path
//! order) so an unchanged tree always hashes the same. Used by the
//! change-summary diff and by rollback verification in tests.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use blake3::Hasher;
use walkdir::WalkDir;

use crate::error::{BunkerError, Result};
use crate::store::METADATA_FILE;

/// Hash prefix for BLAKE3 hashes
pub const HASH_PREFIX: &str = "blake3:";

/// Calculate BLAKE3 hash of a file
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path).map_err(|e| BunkerError::FileReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut reader = BufReader::new(file);
    let mut hasher = Hasher::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| BunkerError::FileReadFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex()))
}

/// Calculate BLAKE3 hash of a directory's contents
///
/// Hashes relative paths and file contents in sorted order. Excludes git
/// metadata and the bunker metadata file, so a tracked repo hashes the same
/// as its detached copy.
pub fn hash_directory(path: &Path) -> Result<String> {
    if !path.is_dir() {
        return Err(BunkerError::IoError {
            message: format!("Not a directory: {}", path.display()),
        });
    }

    let mut files: Vec<_> = WalkDir::new(path)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.file_name() != METADATA_FILE)
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();

    let mut hasher = Hasher::new();
    for file in &files {
        let relative = file.strip_prefix(path).unwrap_or(file);
        hasher.update(relative.to_string_lossy().replace('\\', "/").as_bytes());
        hasher.update(b"\0");
        let content_hash = hash_file(file)?;
        hasher.update(content_hash.as_bytes());
    }

    Ok(format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex()))
}
