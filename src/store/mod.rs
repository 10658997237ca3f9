//! The managed local store
//!
//! Installed bundles live as directories directly under the store root. A
//! tracked repository keeps its `.git` and is marked by a `_` name prefix;
//! everything else is a detached copy with a metadata file recording its
//! origin. The store is handed off as-is to the external distribution layer.

pub mod metadata;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BunkerError, Result};
use crate::source::Source;

pub use metadata::Metadata;

/// Metadata file name inside each installed bundle
pub const METADATA_FILE: &str = ".bunker.json";

/// Directory-name prefix marking a tracked (live git) bundle
pub const TRACKED_PREFIX: &str = "_";

/// Handle to the store root directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

/// One installed bundle as found in the store.
#[derive(Debug, Clone)]
pub struct InstalledEntry {
    /// Display name (tracked prefix stripped)
    pub name: String,
    /// Absolute directory path
    pub path: PathBuf,
    /// Tracked repositories are live git working copies
    pub tracked: bool,
    /// Origin metadata, when the install recorded one
    pub metadata: Option<Metadata>,
}

impl InstalledEntry {
    /// Whether this entry can be updated automatically.
    pub fn update_eligible(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(Metadata::update_eligible)
    }
}

impl Store {
    /// Open (creating if needed) a store at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| BunkerError::IoError {
            message: format!("failed to create store at {}: {}", root.display(), e),
        })?;
        Ok(Self { root })
    }

    /// Default store root: `$BUNKER_STORE`, or `~/.bunker/store`.
    pub fn default_root() -> PathBuf {
        if let Ok(path) = std::env::var("BUNKER_STORE") {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".bunker")
            .join("store")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination directory for a bundle name, honoring the tracked prefix
    /// and an optional `into` subpath.
    pub fn dest_for(&self, name: &str, tracked: bool, into: Option<&str>) -> PathBuf {
        let dir_name = if tracked {
            format!("{TRACKED_PREFIX}{name}")
        } else {
            name.to_string()
        };
        match into {
            Some(sub) if !sub.is_empty() => self.root.join(sub).join(dir_name),
            _ => self.root.join(dir_name),
        }
    }

    /// Enumerate installed bundles, sorted by name.
    ///
    /// Bundles installed under an `--into` subpath live below intermediate
    /// directories; those carry neither metadata nor a manifest marker and
    /// are descended through, not listed.
    pub fn entries(&self) -> Result<Vec<InstalledEntry>> {
        let mut entries = Vec::new();
        self.collect_entries(&self.root, &mut entries)?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn collect_entries(&self, dir: &Path, entries: &mut Vec<InstalledEntry>) -> Result<()> {
        for dir_entry in fs::read_dir(dir).map_err(|e| BunkerError::IoError {
            message: format!("failed to read store {}: {}", dir.display(), e),
        })? {
            let dir_entry = dir_entry.map_err(|e| BunkerError::IoError {
                message: e.to_string(),
            })?;
            let path = dir_entry.path();
            if !path.is_dir() {
                continue;
            }
            let dir_name = dir_entry.file_name().to_string_lossy().to_string();
            if dir_name == ".git" {
                continue;
            }
            let metadata = Metadata::load(&path)?;
            if metadata.is_none() && !path.join(crate::discovery::MARKER_FILE).exists() {
                self.collect_entries(&path, entries)?;
                continue;
            }
            let tracked = dir_name.starts_with(TRACKED_PREFIX);
            let name = dir_name
                .strip_prefix(TRACKED_PREFIX)
                .unwrap_or(&dir_name)
                .to_string();
            entries.push(InstalledEntry {
                name,
                path,
                tracked,
                metadata,
            });
        }
        Ok(())
    }

    /// Find an installed entry by display name.
    pub fn find_by_name(&self, name: &str) -> Result<Option<InstalledEntry>> {
        Ok(self.entries()?.into_iter().find(|e| e.name == name))
    }

    /// Cross-destination duplicate guard: the first installed entry whose
    /// recorded origin resolves to the same `clone_url` and `subdir`.
    ///
    /// Two installs from different subdirectories of one repository are not
    /// duplicates of each other.
    pub fn find_by_source(&self, clone_url: &str, subdir: &str) -> Result<Option<InstalledEntry>> {
        Ok(self.entries()?.into_iter().find(|e| {
            e.metadata.as_ref().is_some_and(|m| {
                Source::resolve(&m.source)
                    .is_ok_and(|s| s.clone_url == clone_url && s.subdir == subdir)
            })
        }))
    }
}
