//! Updating installed bundles
//!
//! Tracked bundles pull in place and gate the post-pull tree with a commit
//! rollback point. Non-tracked bundles reinstall from their recorded source.
//! Both paths end with a file-level change summary.

use crate::audit::{AuditGate, RollbackPoint};
use crate::error::{BunkerError, Result};
use crate::git;
use crate::store::InstalledEntry;

use super::diff::{self, FileChange};
use super::install::Installer;
use super::{InstallAction, InstallOptions, InstallOutcome, InstallResult};

/// Outcome of one update, with the file changes it applied.
#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub outcome: InstallOutcome,
    pub changes: Vec<FileChange>,
}

/// Update one installed bundle by name.
pub fn update_one(
    installer: &mut Installer<'_>,
    name: &str,
    opts: &InstallOptions,
) -> Result<UpdateReport> {
    let entry = installer
        .store()
        .find_by_name(name)?
        .ok_or_else(|| BunkerError::BundleNotFound {
            name: name.to_string(),
        })?;

    if entry.tracked {
        update_tracked(installer, &entry, opts)
    } else {
        reinstall(installer, &entry, opts)
    }
}

fn update_tracked(
    installer: &mut Installer<'_>,
    entry: &InstalledEntry,
    opts: &InstallOptions,
) -> Result<UpdateReport> {
    if opts.dry_run {
        // The dirty check is read-only and still worth surfacing early.
        let mut warnings = Vec::new();
        if git::has_uncommitted_changes(&entry.path)? {
            warnings.push("working copy has uncommitted changes; --force would discard them".to_string());
        }
        return Ok(UpdateReport {
            outcome: InstallOutcome::Installed(InstallResult {
                name: entry.name.clone(),
                action: InstallAction::DryRun,
                warnings,
                audit_risk_score: 0,
                audit_risk_label: "SKIPPED".to_string(),
                audit_skipped: true,
                audit: None,
            }),
            changes: Vec::new(),
        });
    }

    let before_snapshot = diff::snapshot(&entry.path)?;
    let (before, after) = git::pull(&entry.path, opts.force, opts.progress.clone())?;

    if before == after {
        return Ok(UpdateReport {
            outcome: InstallOutcome::Skipped {
                name: entry.name.clone(),
                reason: "already up to date".to_string(),
            },
            changes: Vec::new(),
        });
    }

    // Content changed on disk, so the gate covers the pulled tree and can
    // hard-reset back to the pre-pull commit.
    let rollback = RollbackPoint::Commit {
        repo_dir: entry.path.clone(),
        before_hash: before,
    };
    let gate = AuditGate::new(installer.scanner(), opts.audit_threshold)
        .with_skip(opts.skip_audit)
        .with_prompt(if opts.interactive {
            installer.prompt()
        } else {
            None
        });
    let pass = gate.run(&entry.path, Some(&rollback))?;
    let warnings = if pass.accepted_over_threshold {
        vec!["updated with findings at/above the audit threshold".to_string()]
    } else {
        Vec::new()
    };

    let after_snapshot = diff::snapshot(&entry.path)?;
    installer.cache_mut().invalidate(&entry.path);

    Ok(UpdateReport {
        outcome: InstallOutcome::Installed(InstallResult {
            name: entry.name.clone(),
            action: InstallAction::Updated,
            warnings,
            audit_risk_score: pass.risk_score(),
            audit_risk_label: pass.risk_label(),
            audit_skipped: pass.audit.is_none(),
            audit: pass.audit,
        }),
        changes: diff::diff_snapshots(&before_snapshot, &after_snapshot),
    })
}

fn reinstall(
    installer: &mut Installer<'_>,
    entry: &InstalledEntry,
    opts: &InstallOptions,
) -> Result<UpdateReport> {
    let metadata = entry
        .metadata
        .as_ref()
        .filter(|m| m.update_eligible())
        .ok_or_else(|| BunkerError::MetadataMissing {
            name: entry.name.clone(),
        })?;

    // Bundles installed under an --into subpath reinstall in place.
    let into = entry
        .path
        .parent()
        .and_then(|p| p.strip_prefix(installer.store().root()).ok())
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_string_lossy().replace('\\', "/"));

    let before_snapshot = diff::snapshot(&entry.path)?;
    let reinstall_opts = InstallOptions {
        force: true,
        update: true,
        track: false,
        into,
        ..opts.clone()
    };
    let outcome = installer.install_one(&metadata.source, &reinstall_opts)?;
    let after_snapshot = diff::snapshot(&entry.path)?;

    Ok(UpdateReport {
        outcome,
        changes: diff::diff_snapshots(&before_snapshot, &after_snapshot),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditResult, ContentScanner};
    use crate::discovery::MARKER_FILE;
    use crate::store::{Metadata, Store};
    use crate::source::SourceKind;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct CleanScanner;

    impl ContentScanner for CleanScanner {
        fn scan(&self, _dir: &Path) -> Result<AuditResult> {
            Ok(AuditResult::clean())
        }
    }

    #[test]
    fn test_update_unknown_bundle_fails() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("store")).unwrap();
        let scanner = CleanScanner;
        let mut installer = Installer::new(&store, &scanner);

        let err = update_one(&mut installer, "nope", &InstallOptions::default()).unwrap_err();
        assert!(matches!(err, BunkerError::BundleNotFound { .. }));
    }

    #[test]
    fn test_update_without_metadata_fails() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("store")).unwrap();
        let dest = store.root().join("orphan");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("file.txt"), "x").unwrap();

        let scanner = CleanScanner;
        let mut installer = Installer::new(&store, &scanner);
        let err = update_one(&mut installer, "orphan", &InstallOptions::default()).unwrap_err();
        assert!(matches!(err, BunkerError::MetadataMissing { .. }));
    }

    #[test]
    fn test_reinstall_from_recorded_local_source_picks_up_changes() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("store")).unwrap();
        let src = temp.path().join("mybundle");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join(MARKER_FILE), "name: mybundle\n").unwrap();
        fs::write(src.join("data.txt"), "v1").unwrap();

        let scanner = CleanScanner;
        let mut installer = Installer::new(&store, &scanner);
        installer
            .install_one(src.to_str().unwrap(), &InstallOptions::default())
            .unwrap();

        fs::write(src.join("data.txt"), "v2").unwrap();
        let report = update_one(&mut installer, "mybundle", &InstallOptions::default()).unwrap();

        match report.outcome {
            InstallOutcome::Installed(result) => {
                assert_eq!(result.action, InstallAction::Updated);
            }
            other => panic!("expected update, got {other:?}"),
        }
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].path, "data.txt");
        assert_eq!(
            fs::read_to_string(store.root().join("mybundle").join("data.txt")).unwrap(),
            "v2"
        );
    }

    #[test]
    fn test_metadata_source_must_be_nonempty() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("store")).unwrap();
        let dest = store.root().join("blank");
        fs::create_dir_all(&dest).unwrap();
        Metadata {
            source: String::new(),
            kind: SourceKind::Local,
            tracked: false,
        }
        .save(&dest)
        .unwrap();

        let scanner = CleanScanner;
        let mut installer = Installer::new(&store, &scanner);
        let err = update_one(&mut installer, "blank", &InstallOptions::default()).unwrap_err();
        assert!(matches!(err, BunkerError::MetadataMissing { .. }));
    }
}
