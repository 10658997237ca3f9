//! Content diffing for post-update change summaries
//!
//! Snapshots are per-file blake3 hashes keyed by relative path. Hashing
//! fans out over a small bounded pool of scoped threads; the merge is
//! deterministic because the snapshot is a sorted map and the diff walks
//! both sides in key order.

use std::collections::BTreeMap;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{BunkerError, Result};
use crate::hash;
use crate::store::METADATA_FILE;

/// Hashing threads per snapshot. Diffing is read-only, so snapshots of
/// different directories may also run concurrently with each other.
const MAX_HASH_WORKERS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Modified => "modified",
        };
        write!(f, "{label}")
    }
}

/// One changed file, relative to the bundle root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
}

/// Hash every file under `dir` into a sorted path -> hash map.
///
/// `.git` internals and the install metadata file are excluded, matching
/// what the directory hash covers. A missing directory yields an empty
/// snapshot so callers can diff across a removal.
pub fn snapshot(dir: &Path) -> Result<BTreeMap<String, String>> {
    if !dir.is_dir() {
        return Ok(BTreeMap::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
    {
        let entry = entry.map_err(|e| BunkerError::IoError {
            message: format!("failed to walk {}: {}", dir.display(), e),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name() == METADATA_FILE {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        files.push((relative, entry.path().to_path_buf()));
    }

    let workers = MAX_HASH_WORKERS.min(files.len()).max(1);
    let chunk_size = files.len().div_ceil(workers);
    let mut hashed: Vec<Result<Vec<(String, String)>>> = Vec::new();

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for chunk in files.chunks(chunk_size.max(1)) {
            handles.push(scope.spawn(move || {
                let mut out = Vec::with_capacity(chunk.len());
                for (relative, path) in chunk {
                    out.push((relative.clone(), hash::hash_file(path)?));
                }
                Ok(out)
            }));
        }
        for handle in handles {
            match handle.join() {
                Ok(result) => hashed.push(result),
                Err(_) => hashed.push(Err(BunkerError::IoError {
                    message: "hash worker panicked".to_string(),
                })),
            }
        }
    });

    let mut map = BTreeMap::new();
    for result in hashed {
        for (relative, file_hash) in result? {
            map.insert(relative, file_hash);
        }
    }
    Ok(map)
}

/// Diff two snapshots. Output is sorted by path.
pub fn diff_snapshots(
    before: &BTreeMap<String, String>,
    after: &BTreeMap<String, String>,
) -> Vec<FileChange> {
    let mut changes = Vec::new();
    for (path, old_hash) in before {
        match after.get(path) {
            None => changes.push(FileChange {
                path: path.clone(),
                kind: ChangeKind::Removed,
            }),
            Some(new_hash) if new_hash != old_hash => changes.push(FileChange {
                path: path.clone(),
                kind: ChangeKind::Modified,
            }),
            Some(_) => {}
        }
    }
    for path in after.keys() {
        if !before.contains_key(path) {
            changes.push(FileChange {
                path: path.clone(),
                kind: ChangeKind::Added,
            });
        }
    }
    changes.sort_by(|a, b| a.path.cmp(&b.path));
    changes
}
