//! Bundle discovery for fetched trees and local directories
//!
//! A bundle is a directory containing a `bundle.yaml` marker. Discovery walks
//! the tree (skipping version-control metadata), reads each marker, and
//! returns bundles in lexicographic relative-path order so repeated discovery
//! on unchanged content is idempotent.
//!
//! Orchestrator shape: a bundle at the tree root (`relative_path == "."`)
//! with at least one other bundle nested beneath it. Callers may install the
//! group as a unit or pick a subset of children.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use crate::error::{BunkerError, Result};

/// Marker file that makes a directory a bundle
pub const MARKER_FILE: &str = "bundle.yaml";

/// One installable unit of content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    /// Bundle name (manifest `name`, or the directory name)
    pub name: String,

    /// Path relative to the discovery root, `"."` for the root itself
    pub relative_path: String,

    /// SPDX license string from the manifest, if any
    pub license: Option<String>,

    /// Free-form description from the manifest, if any
    pub description: Option<String>,
}

impl Bundle {
    /// True for the orchestrator root bundle.
    pub fn is_root(&self) -> bool {
        self.relative_path == "."
    }

    /// True iff this bundle's path is nested under `other`'s path.
    pub fn is_child_of(&self, other: &Bundle) -> bool {
        if self.relative_path == other.relative_path {
            return false;
        }
        other.is_root()
            || self
                .relative_path
                .starts_with(&format!("{}/", other.relative_path))
    }
}

/// Manifest as written in `bundle.yaml`; every field is optional.
#[derive(Debug, Default, Deserialize)]
struct Manifest {
    name: Option<String>,
    license: Option<String>,
    description: Option<String>,
}

/// Discover all bundles under `root`, in lexicographic relative-path order.
pub fn discover(root: &Path) -> Result<Vec<Bundle>> {
    if !root.is_dir() {
        return Err(BunkerError::DiscoveryFailed {
            root: root.display().to_string(),
            reason: "not a directory".to_string(),
        });
    }

    let mut bundles = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git")
    {
        let entry = entry.map_err(|e| BunkerError::DiscoveryFailed {
            root: root.display().to_string(),
            reason: e.to_string(),
        })?;
        if !entry.file_type().is_file() || entry.file_name() != MARKER_FILE {
            continue;
        }
        let Some(dir) = entry.path().parent() else {
            continue;
        };
        bundles.push(read_bundle(root, dir, entry.path())?);
    }

    bundles.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(bundles)
}

fn read_bundle(root: &Path, dir: &Path, marker: &Path) -> Result<Bundle> {
    let content = std::fs::read_to_string(marker).map_err(|e| BunkerError::DiscoveryFailed {
        root: root.display().to_string(),
        reason: format!("unreadable marker {}: {}", marker.display(), e),
    })?;
    let manifest: Manifest =
        serde_yaml::from_str(&content).map_err(|e| BunkerError::DiscoveryFailed {
            root: root.display().to_string(),
            reason: format!("invalid marker {}: {}", marker.display(), e),
        })?;

    let relative_path = relative_path_of(root, dir);
    let fallback_name = dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "bundle".to_string());

    Ok(Bundle {
        name: manifest.name.unwrap_or(fallback_name),
        relative_path,
        license: manifest.license,
        description: manifest.description,
    })
}

fn relative_path_of(root: &Path, dir: &Path) -> String {
    match dir.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string_lossy().replace('\\', "/"),
        Err(_) => ".".to_string(),
    }
}

/// The orchestrator root bundle, if one was discovered.
pub fn find_root(bundles: &[Bundle]) -> Option<&Bundle> {
    bundles.iter().find(|b| b.is_root())
}

/// True when a root bundle plus at least one nested bundle were discovered.
pub fn is_orchestrator(bundles: &[Bundle]) -> bool {
    find_root(bundles).is_some() && bundles.len() > 1
}

/// All bundles nested under `parent`, in discovery order.
pub fn children_of<'a>(parent: &Bundle, bundles: &'a [Bundle]) -> Vec<&'a Bundle> {
    bundles.iter().filter(|b| b.is_child_of(parent)).collect()
}

/// Explicit discovery result cache keyed by root path.
///
/// Owned by the orchestrator, never global. Invalidation after any mutation
/// of a cached tree is a required post-condition of every write path.
#[derive(Debug, Default)]
pub struct DiscoveryCache {
    entries: HashMap<PathBuf, Vec<Bundle>>,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover through the cache.
    pub fn discover(&mut self, root: &Path) -> Result<Vec<Bundle>> {
        if let Some(cached) = self.entries.get(root) {
            return Ok(cached.clone());
        }
        let bundles = discover(root)?;
        self.entries.insert(root.to_path_buf(), bundles.clone());
        Ok(bundles)
    }

    /// Drop the cached result for `path` and anything nested under it.
    pub fn invalidate(&mut self, path: &Path) {
        self.entries
            .retain(|root, _| !root.starts_with(path) && !path.starts_with(root));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_marker(dir: &Path, yaml: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(MARKER_FILE), yaml).unwrap();
    }

    #[test]
    fn test_discover_single_bundle() {
        let temp = TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        write_marker(
            temp.path(),
            "name: solo\nlicense: MIT\ndescription: A bundle\n",
        );

        let bundles = discover(temp.path()).unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].name, "solo");
        assert_eq!(bundles[0].relative_path, ".");
        assert_eq!(bundles[0].license.as_deref(), Some("MIT"));
        assert!(bundles[0].is_root());
    }

    #[test]
    fn test_discover_name_defaults_to_directory() {
        let temp = TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        write_marker(&temp.path().join("tools/linter"), "description: no name\n");

        let bundles = discover(temp.path()).unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].name, "linter");
        assert_eq!(bundles[0].relative_path, "tools/linter");
    }

    #[test]
    fn test_discover_is_idempotent_and_ordered() {
        let temp = TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        write_marker(&temp.path().join("zeta"), "name: zeta\n");
        write_marker(&temp.path().join("alpha"), "name: alpha\n");
        write_marker(&temp.path().join("alpha/nested"), "name: nested\n");

        let first = discover(temp.path()).unwrap();
        let second = discover(temp.path()).unwrap();
        assert_eq!(first, second);

        let paths: Vec<&str> = first.iter().map(|b| b.relative_path.as_str()).collect();
        assert_eq!(paths, ["alpha", "alpha/nested", "zeta"]);
    }

    #[test]
    fn test_discover_skips_git_dir() {
        let temp = TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        write_marker(&temp.path().join(".git/hooks"), "name: hidden\n");
        write_marker(&temp.path().join("real"), "name: real\n");

        let bundles = discover(temp.path()).unwrap();
        assert_eq!(bundles.len(), 1);
        assert_eq!(bundles[0].name, "real");
    }

    #[test]
    fn test_orchestrator_detection() {
        let temp = TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        write_marker(temp.path(), "name: suite\n");
        write_marker(&temp.path().join("tools/linter"), "name: linter\n");
        write_marker(&temp.path().join("tools/fmt"), "name: fmt\n");

        let bundles = discover(temp.path()).unwrap();
        assert!(is_orchestrator(&bundles));

        let root = find_root(&bundles).unwrap();
        assert_eq!(root.name, "suite");

        let children = children_of(root, &bundles);
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.is_child_of(root)));
    }

    #[test]
    fn test_no_orchestrator_without_root() {
        let temp = TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        write_marker(&temp.path().join("a"), "name: a\n");
        write_marker(&temp.path().join("b"), "name: b\n");

        let bundles = discover(temp.path()).unwrap();
        assert!(!is_orchestrator(&bundles));
        assert!(find_root(&bundles).is_none());
    }

    #[test]
    fn test_nesting_by_path_prefix_not_string_prefix() {
        let a = Bundle {
            name: "a".into(),
            relative_path: "tools".into(),
            license: None,
            description: None,
        };
        let b = Bundle {
            name: "b".into(),
            relative_path: "tools-extra".into(),
            license: None,
            description: None,
        };
        let c = Bundle {
            name: "c".into(),
            relative_path: "tools/linter".into(),
            license: None,
            description: None,
        };
        assert!(!b.is_child_of(&a));
        assert!(c.is_child_of(&a));
    }

    #[test]
    fn test_discovery_cache_returns_cached_and_invalidates() {
        let temp = TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        write_marker(&temp.path().join("one"), "name: one\n");

        let mut cache = DiscoveryCache::new();
        let first = cache.discover(temp.path()).unwrap();
        assert_eq!(first.len(), 1);

        // Mutation without invalidation is not observed
        write_marker(&temp.path().join("two"), "name: two\n");
        let stale = cache.discover(temp.path()).unwrap();
        assert_eq!(stale.len(), 1);

        cache.invalidate(temp.path());
        let fresh = cache.discover(temp.path()).unwrap();
        assert_eq!(fresh.len(), 2);
    }

    #[test]
    fn test_discover_rejects_missing_root() {
        let temp = TempDir::new_in(crate::temp::temp_dir_base()).unwrap();
        let result = discover(&temp.path().join("missing"));
        assert!(matches!(result, Err(BunkerError::DiscoveryFailed { .. })));
    }
}
