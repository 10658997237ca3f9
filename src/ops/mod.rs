//! Install, update, and batch operations over the store
//!
//! [`install`] owns the single-bundle pipeline (`install_one` is the shared
//! implementation used by both the interactive path and the batch loop),
//! [`update`] the tracked/non-tracked update flows, [`batch`] the sequential
//! multi-bundle runner, and [`diff`] the post-update change summary.

pub mod batch;
pub mod diff;
pub mod install;
pub mod update;

use crate::audit::{AuditResult, Severity};
use crate::progress::{self, ProgressSink};

/// Configuration for install and update operations.
#[derive(Clone)]
pub struct InstallOptions {
    /// Overwrite existing destinations and discard local changes on update
    pub force: bool,
    /// Reinstall in place, preserving identity
    pub update: bool,
    /// Simulate: perform only read/decision logic, report intended actions
    pub dry_run: bool,
    /// Keep the destination as a live git working copy for pull-based updates
    pub track: bool,
    /// Bypass the audit gate entirely
    pub skip_audit: bool,
    /// Minimum severity at/above which findings block the operation
    pub audit_threshold: Severity,
    /// Bundle name filters: install only these (empty = no restriction)
    pub only: Vec<String>,
    /// Bundle names to exclude
    pub exclude: Vec<String>,
    /// Destination subpath inside the store
    pub into: Option<String>,
    /// Whether findings at/above threshold may be confirmed interactively
    pub interactive: bool,
    /// Advisory fetch progress sink
    pub progress: ProgressSink,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            force: false,
            update: false,
            dry_run: false,
            track: false,
            skip_audit: false,
            audit_threshold: Severity::High,
            only: Vec::new(),
            exclude: Vec::new(),
            into: None,
            interactive: false,
            progress: progress::silent(),
        }
    }
}

impl std::fmt::Debug for InstallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallOptions")
            .field("force", &self.force)
            .field("update", &self.update)
            .field("dry_run", &self.dry_run)
            .field("track", &self.track)
            .field("skip_audit", &self.skip_audit)
            .field("audit_threshold", &self.audit_threshold)
            .field("only", &self.only)
            .field("exclude", &self.exclude)
            .field("into", &self.into)
            .field("interactive", &self.interactive)
            .finish_non_exhaustive()
    }
}

/// What an install/update invocation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallAction {
    Installed,
    Updated,
    DryRun,
}

impl std::fmt::Display for InstallAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            InstallAction::Installed => "installed",
            InstallAction::Updated => "updated",
            InstallAction::DryRun => "dry-run",
        };
        write!(f, "{label}")
    }
}

/// Result for one installed bundle.
#[derive(Debug, Clone)]
pub struct InstallResult {
    pub name: String,
    pub action: InstallAction,
    pub warnings: Vec<String>,
    pub audit_risk_score: u8,
    pub audit_risk_label: String,
    pub audit_skipped: bool,
    /// Full scan result, for batch aggregation
    pub audit: Option<AuditResult>,
}

/// Outcome of one install invocation: did work, or deliberately did nothing.
#[derive(Debug, Clone)]
pub enum InstallOutcome {
    Installed(InstallResult),
    /// A no-op, distinct from an error (e.g. same tracked repo already at
    /// the same destination)
    Skipped { name: String, reason: String },
}
