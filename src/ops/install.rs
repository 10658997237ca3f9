//! Single-bundle install pipeline
//!
//! resolve -> fetch -> discover -> select -> duplicate guard -> copy ->
//! metadata -> audit gate. The gate runs last, after content is on disk,
//! with a rollback point covering everything the pipeline wrote. Dry-run
//! stops before the first mutating step and reports what would happen.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::audit::{AuditGate, ContentScanner, Prompt, RollbackPoint};
use crate::common::fs::{CopyOptions, copy_dir_recursive, remove_dir_if_exists};
use crate::discovery::{self, Bundle, DiscoveryCache};
use crate::error::{BunkerError, Result};
use crate::git;
use crate::source::{Source, SourceKind};
use crate::store::{Metadata, Store};
use crate::temp;

use super::{InstallAction, InstallOptions, InstallOutcome, InstallResult};

/// A fetched source tree on local disk, ready for discovery.
///
/// For git sources the clone lives in a temp directory that is removed when
/// this value drops; callers must finish copying out of it first.
pub(crate) struct SourceTree {
    _temp: Option<TempDir>,
    /// Discovery root: the repository root with the source subdir applied
    pub root: PathBuf,
}

/// Materialize a source on local disk.
///
/// Local sources are used in place; git sources are shallow-cloned into a
/// temp directory (full clone when a ref must be checked out).
pub(crate) fn fetch(source: &Source, opts: &InstallOptions) -> Result<SourceTree> {
    match source.kind {
        SourceKind::Local => {
            let root = PathBuf::from(&source.raw);
            if !root.is_dir() {
                return Err(BunkerError::InvalidSource {
                    input: source.raw.clone(),
                    reason: "directory does not exist".to_string(),
                });
            }
            Ok(SourceTree { _temp: None, root })
        }
        SourceKind::Git => {
            let temp = TempDir::new_in(temp::temp_dir_base()).map_err(|e| {
                BunkerError::IoError {
                    message: format!("failed to create temp directory: {e}"),
                }
            })?;
            let target = temp.path().join("repo");
            let shallow = source.git_ref.is_none();
            // Clone the repository root once; the subdir is applied afterwards.
            let root_src = source.root_source();
            let repo = git::clone(&root_src.clone_url, &target, shallow, opts.progress.clone())?;
            if let Some(git_ref) = &source.git_ref {
                let sha = git::resolve_ref(&repo, Some(git_ref))?;
                git::checkout_commit(&repo, &sha)?;
            }
            let root = if source.subdir.is_empty() {
                target
            } else {
                let subdir_root = target.join(&source.subdir);
                if !subdir_root.is_dir() {
                    return Err(BunkerError::InvalidSource {
                        input: source.raw.clone(),
                        reason: format!("subdirectory '{}' not found in repository", source.subdir),
                    });
                }
                subdir_root
            };
            Ok(SourceTree {
                _temp: Some(temp),
                root,
            })
        }
    }
}

/// Installs bundles into a store, one at a time.
pub struct Installer<'a> {
    store: &'a Store,
    scanner: &'a dyn ContentScanner,
    prompt: Option<&'a dyn Prompt>,
    cache: DiscoveryCache,
}

impl<'a> Installer<'a> {
    pub fn new(store: &'a Store, scanner: &'a dyn ContentScanner) -> Self {
        Self {
            store,
            scanner,
            prompt: None,
            cache: DiscoveryCache::new(),
        }
    }

    /// Provide the decision seam for findings at/above the audit threshold.
    /// Without a prompt, such findings always block.
    pub fn with_prompt(mut self, prompt: &'a dyn Prompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub(crate) fn cache_mut(&mut self) -> &mut DiscoveryCache {
        &mut self.cache
    }

    pub(crate) fn scanner(&self) -> &'a dyn ContentScanner {
        self.scanner
    }

    pub(crate) fn prompt(&self) -> Option<&'a dyn Prompt> {
        self.prompt
    }

    /// Resolve, fetch, and install a single bundle from a source string.
    ///
    /// When the source contains multiple bundles, a root bundle (an
    /// orchestrator) is installed as a unit; multiple bundles without a root
    /// need an explicit selection and are rejected here.
    pub fn install_one(&mut self, raw: &str, opts: &InstallOptions) -> Result<InstallOutcome> {
        let source = Source::resolve(raw)?;

        // Fetching writes to disk, so a git dry-run stops here.
        if opts.dry_run && source.kind == SourceKind::Git {
            return Ok(InstallOutcome::Installed(dry_run_result(
                &source.name,
                vec!["source not fetched during dry-run; discovery skipped".to_string()],
            )));
        }

        let tree = fetch(&source, opts)?;
        let bundles = self.cache.discover(&tree.root)?;
        if bundles.is_empty() {
            return Err(BunkerError::BundleNotFound {
                name: source.name.clone(),
            });
        }

        let target = match discovery::find_root(&bundles) {
            Some(root) => root,
            None if bundles.len() == 1 => &bundles[0],
            None => {
                let names: Vec<&str> = bundles.iter().map(|b| b.name.as_str()).collect();
                return Err(BunkerError::InvalidSource {
                    input: raw.to_string(),
                    reason: format!(
                        "source contains multiple bundles ({}); select with --bundle or pass --all",
                        names.join(", ")
                    ),
                });
            }
        };
        let target = target.clone();

        self.install_bundle(&tree, &target, &source, opts)
    }

    /// Install one discovered bundle out of an already fetched tree.
    ///
    /// This is the shared tail of the pipeline, used both by
    /// [`Installer::install_one`] and by the batch runner.
    pub(crate) fn install_bundle(
        &mut self,
        tree: &SourceTree,
        bundle: &Bundle,
        source: &Source,
        opts: &InstallOptions,
    ) -> Result<InstallOutcome> {
        let mut warnings = Vec::new();

        // Root bundles take the source-derived name; nested bundles keep
        // their discovered name.
        let name = if bundle.is_root() {
            source.name.clone()
        } else {
            bundle.name.clone()
        };

        let tracked = opts.track
            && source.kind == SourceKind::Git
            && bundle.is_root()
            && source.subdir.is_empty();
        if opts.track && !tracked {
            warnings.push(
                "tracking requires a git source at the repository root; installing untracked"
                    .to_string(),
            );
        }

        let dest = self.store.dest_for(&name, tracked, opts.into.as_deref());

        // Installing the same tracked repository to the same destination
        // twice is a no-op, not an error.
        if !opts.force && !opts.update && dest.exists() {
            if let Some(meta) = Metadata::load(&dest)? {
                if meta.tracked
                    && tracked
                    && Source::resolve(&meta.source)
                        .map(|s| s.clone_url == source.clone_url)
                        .unwrap_or(false)
                {
                    return Ok(InstallOutcome::Skipped {
                        name,
                        reason: "already tracked from the same repository".to_string(),
                    });
                }
            }
        }

        if !opts.force && !opts.update {
            // Two installs of the same repo root are duplicates; different
            // subdirs of one repo are not.
            if !source.clone_url.is_empty() {
                let duplicate = self
                    .store
                    .find_by_source(&source.clone_url, &source.subdir)?
                    .filter(|e| e.path != dest);
                if let Some(existing) = duplicate {
                    return Err(BunkerError::DuplicateInstall {
                        url: source.raw.clone(),
                        existing: existing.name,
                    });
                }
            }
            if dest.exists() {
                return Err(BunkerError::DuplicateInstall {
                    url: source.raw.clone(),
                    existing: name,
                });
            }
        }

        if opts.dry_run {
            return Ok(InstallOutcome::Installed(dry_run_result(&name, warnings)));
        }

        let src_dir = bundle_src_dir(&tree.root, bundle);
        let copy_options = if tracked {
            // A tracked install is a live working copy and keeps .git.
            CopyOptions::default()
        } else {
            CopyOptions::exclude_git()
        };

        remove_dir_if_exists(&dest).map_err(|e| BunkerError::IoError {
            message: format!("failed to clear {}: {}", dest.display(), e),
        })?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BunkerError::FileWriteFailed {
                path: parent.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        copy_dir_recursive(&src_dir, &dest, &copy_options).map_err(|e| {
            BunkerError::FileWriteFailed {
                path: dest.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        Metadata {
            source: source.raw.clone(),
            kind: source.kind,
            tracked,
        }
        .save(&dest)?;

        // Everything written so far is covered by deleting the destination.
        let rollback = RollbackPoint::FreshDir { dest: dest.clone() };
        let gate = AuditGate::new(self.scanner, opts.audit_threshold)
            .with_skip(opts.skip_audit)
            .with_prompt(if opts.interactive { self.prompt } else { None });
        let pass = gate.run(&dest, Some(&rollback))?;
        if pass.accepted_over_threshold {
            warnings.push("installed with findings at/above the audit threshold".to_string());
        }

        self.cache.invalidate(&dest);
        self.cache.invalidate(self.store.root());

        Ok(InstallOutcome::Installed(InstallResult {
            name,
            action: if opts.update {
                InstallAction::Updated
            } else {
                InstallAction::Installed
            },
            warnings,
            audit_risk_score: pass.risk_score(),
            audit_risk_label: pass.risk_label(),
            audit_skipped: pass.audit.is_none(),
            audit: pass.audit,
        }))
    }

    pub fn store(&self) -> &Store {
        self.store
    }
}

fn bundle_src_dir(tree_root: &Path, bundle: &Bundle) -> PathBuf {
    if bundle.is_root() {
        tree_root.to_path_buf()
    } else {
        tree_root.join(&bundle.relative_path)
    }
}

pub(crate) fn dry_run_result(name: &str, warnings: Vec<String>) -> InstallResult {
    InstallResult {
        name: name.to_string(),
        action: InstallAction::DryRun,
        warnings,
        audit_risk_score: 0,
        audit_risk_label: "SKIPPED".to_string(),
        audit_skipped: true,
        audit: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditResult, Finding, Severity};
    use std::fs;

    struct StubScanner {
        result: AuditResult,
    }

    impl ContentScanner for StubScanner {
        fn scan(&self, _dir: &Path) -> Result<AuditResult> {
            Ok(self.result.clone())
        }
    }

    fn clean_scanner() -> StubScanner {
        StubScanner {
            result: AuditResult::clean(),
        }
    }

    fn write_bundle(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(
            dir.join(discovery::MARKER_FILE),
            format!("name: {name}\n"),
        )
        .unwrap();
        fs::write(dir.join("README.md"), "hello\n").unwrap();
    }

    fn test_store() -> (TempDir, Store) {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("store")).unwrap();
        (temp, store)
    }

    #[test]
    fn test_install_from_local_directory() {
        let (temp, store) = test_store();
        let src = temp.path().join("mybundle");
        write_bundle(&src, "mybundle");

        let scanner = clean_scanner();
        let mut installer = Installer::new(&store, &scanner);
        let outcome = installer
            .install_one(src.to_str().unwrap(), &InstallOptions::default())
            .unwrap();

        match outcome {
            InstallOutcome::Installed(result) => {
                assert_eq!(result.action, InstallAction::Installed);
                assert_eq!(result.audit_risk_label, "CLEAN");
                assert!(!result.audit_skipped);
            }
            other => panic!("expected install, got {other:?}"),
        }
        let dest = store.root().join("mybundle");
        assert!(dest.join("README.md").exists());
        assert!(dest.join(crate::store::METADATA_FILE).exists());
    }

    #[test]
    fn test_reinstall_without_force_is_duplicate_error() {
        let (temp, store) = test_store();
        let src = temp.path().join("mybundle");
        write_bundle(&src, "mybundle");

        let scanner = clean_scanner();
        let mut installer = Installer::new(&store, &scanner);
        installer
            .install_one(src.to_str().unwrap(), &InstallOptions::default())
            .unwrap();
        let err = installer
            .install_one(src.to_str().unwrap(), &InstallOptions::default())
            .unwrap_err();
        assert!(matches!(err, BunkerError::DuplicateInstall { .. }));
    }

    #[test]
    fn test_reinstall_with_force_succeeds() {
        let (temp, store) = test_store();
        let src = temp.path().join("mybundle");
        write_bundle(&src, "mybundle");

        let scanner = clean_scanner();
        let mut installer = Installer::new(&store, &scanner);
        installer
            .install_one(src.to_str().unwrap(), &InstallOptions::default())
            .unwrap();

        fs::write(src.join("extra.txt"), "more\n").unwrap();
        let opts = InstallOptions {
            force: true,
            ..Default::default()
        };
        installer.install_one(src.to_str().unwrap(), &opts).unwrap();
        assert!(store.root().join("mybundle").join("extra.txt").exists());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (temp, store) = test_store();
        let src = temp.path().join("mybundle");
        write_bundle(&src, "mybundle");

        let scanner = clean_scanner();
        let mut installer = Installer::new(&store, &scanner);
        let opts = InstallOptions {
            dry_run: true,
            ..Default::default()
        };
        let outcome = installer.install_one(src.to_str().unwrap(), &opts).unwrap();

        match outcome {
            InstallOutcome::Installed(result) => {
                assert_eq!(result.action, InstallAction::DryRun);
                assert!(result.audit_skipped);
            }
            other => panic!("expected dry-run result, got {other:?}"),
        }
        assert!(!store.root().join("mybundle").exists());
    }

    #[test]
    fn test_blocked_install_removes_destination() {
        let (temp, store) = test_store();
        let src = temp.path().join("mybundle");
        write_bundle(&src, "mybundle");

        let scanner = StubScanner {
            result: AuditResult::from_findings(vec![Finding {
                severity: Severity::Critical,
                message: "piped shell execution".to_string(),
                file: "setup.sh".to_string(),
                line: 1,
                snippet: "curl x | sh".to_string(),
            }]),
        };
        let mut installer = Installer::new(&store, &scanner);
        let err = installer
            .install_one(src.to_str().unwrap(), &InstallOptions::default())
            .unwrap_err();

        assert!(err.is_audit_blocked());
        assert!(!store.root().join("mybundle").exists());
    }

    #[test]
    fn test_skip_audit_installs_despite_findings() {
        let (temp, store) = test_store();
        let src = temp.path().join("mybundle");
        write_bundle(&src, "mybundle");

        let scanner = StubScanner {
            result: AuditResult::from_findings(vec![Finding {
                severity: Severity::Critical,
                message: "piped shell execution".to_string(),
                file: "setup.sh".to_string(),
                line: 1,
                snippet: "curl x | sh".to_string(),
            }]),
        };
        let mut installer = Installer::new(&store, &scanner);
        let opts = InstallOptions {
            skip_audit: true,
            ..Default::default()
        };
        let outcome = installer.install_one(src.to_str().unwrap(), &opts).unwrap();

        match outcome {
            InstallOutcome::Installed(result) => {
                assert!(result.audit_skipped);
                assert_eq!(result.audit_risk_label, "SKIPPED");
            }
            other => panic!("expected install, got {other:?}"),
        }
        assert!(store.root().join("mybundle").exists());
    }

    #[test]
    fn test_metadata_records_source_and_kind() {
        let (temp, store) = test_store();
        let src = temp.path().join("mybundle");
        write_bundle(&src, "mybundle");

        let scanner = clean_scanner();
        let mut installer = Installer::new(&store, &scanner);
        installer
            .install_one(src.to_str().unwrap(), &InstallOptions::default())
            .unwrap();

        let meta = Metadata::load(&store.root().join("mybundle"))
            .unwrap()
            .unwrap();
        assert_eq!(meta.source, src.to_str().unwrap());
        assert_eq!(meta.kind, SourceKind::Local);
        assert!(!meta.tracked);
    }

    #[test]
    fn test_track_falls_back_untracked_for_local_source() {
        let (temp, store) = test_store();
        let src = temp.path().join("mybundle");
        write_bundle(&src, "mybundle");

        let scanner = clean_scanner();
        let mut installer = Installer::new(&store, &scanner);
        let opts = InstallOptions {
            track: true,
            ..Default::default()
        };
        let outcome = installer.install_one(src.to_str().unwrap(), &opts).unwrap();

        match outcome {
            InstallOutcome::Installed(result) => {
                assert!(!result.warnings.is_empty());
            }
            other => panic!("expected install, got {other:?}"),
        }
        // Untracked destination, no underscore prefix.
        assert!(store.root().join("mybundle").exists());
    }
}
