//! Error types and handling for Bunker
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! The taxonomy mirrors the install/update pipeline: source parsing, git
//! fetching, discovery, the audit gate, and store bookkeeping. The audit
//! gate's blocking outcome is a dedicated variant so callers can branch on
//! kind via [`BunkerError::is_audit_blocked`] instead of matching message
//! text.

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for Bunker operations
#[derive(Error, Diagnostic, Debug)]
pub enum BunkerError {
    // Source errors
    #[error("Invalid source: {input}: {reason}")]
    #[diagnostic(
        code(bunker::source::invalid),
        help(
            "Valid formats: ./path, owner/repo, owner/repo/subdir, https://github.com/owner/repo.git, https://host/repo.git//subdir"
        )
    )]
    InvalidSource { input: String, reason: String },

    // Discovery errors
    #[error("Failed to discover bundles under '{root}': {reason}")]
    #[diagnostic(code(bunker::discovery::failed))]
    DiscoveryFailed { root: String, reason: String },

    #[error("Bundle '{name}' not found")]
    #[diagnostic(
        code(bunker::bundle::not_found),
        help("Check the bundle name against what the source actually contains")
    )]
    BundleNotFound { name: String },

    // Audit gate sentinel. Always wraps the underlying blocking cause; a
    // rollback failure is appended, never substituted.
    #[error("Blocked by security audit: {cause}{}", rollback_warning.as_ref().map(|w| format!("; {w}")).unwrap_or_default())]
    #[diagnostic(
        code(bunker::audit::blocked),
        help("Re-run with --skip-audit or a higher --audit-threshold to override")
    )]
    AuditBlocked {
        cause: String,
        /// Set when rollback itself failed; content may remain on disk.
        rollback_warning: Option<String>,
    },

    // Store errors
    #[error("Source '{url}' is already installed as '{existing}'")]
    #[diagnostic(
        code(bunker::store::duplicate_install),
        help("Use --force to install a second copy anyway")
    )]
    DuplicateInstall { url: String, existing: String },

    #[error("Bundle '{name}' has no recorded source and cannot be updated")]
    #[diagnostic(
        code(bunker::store::metadata_missing),
        help("Reinstall the bundle from its original source instead")
    )]
    MetadataMissing { name: String },

    // Git errors
    #[error("Git operation failed: {message}")]
    #[diagnostic(code(bunker::git::operation_failed))]
    GitOperationFailed { message: String },

    #[error("Failed to clone repository: {url}: {reason}")]
    #[diagnostic(
        code(bunker::git::clone_failed),
        help("Check that URL is correct and you have access to repository")
    )]
    GitCloneFailed { url: String, reason: String },

    #[error("Failed to pull '{path}': {reason}")]
    #[diagnostic(code(bunker::git::pull_failed))]
    GitPullFailed { path: String, reason: String },

    #[error("'{path}' has uncommitted changes")]
    #[diagnostic(
        code(bunker::git::uncommitted_changes),
        help("Commit or stash the changes, or pass --force to discard them")
    )]
    UncommittedChanges { path: String },

    #[error("Failed to open repository at '{path}': {reason}")]
    #[diagnostic(code(bunker::git::open_failed))]
    GitOpenFailed { path: String, reason: String },

    // Scanner errors (wrapped into AuditBlocked by the gate; surfaced raw
    // only when scanning is invoked outside the gate)
    #[error("Content scan failed: {reason}")]
    #[diagnostic(code(bunker::audit::scan_failed))]
    ScanFailed { reason: String },

    #[error("Unknown audit threshold: {value}")]
    #[diagnostic(
        code(bunker::audit::bad_threshold),
        help("Accepted: critical, high, medium, low, info (or c/h/m/l/i, crit, med)")
    )]
    BadThreshold { value: String },

    // File system errors
    #[error("Failed to read file: {path}")]
    #[diagnostic(code(bunker::fs::read_failed))]
    FileReadFailed { path: String, reason: String },

    #[error("Failed to write file: {path}")]
    #[diagnostic(code(bunker::fs::write_failed))]
    FileWriteFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(bunker::fs::io_error))]
    IoError { message: String },
}

impl BunkerError {
    /// True iff this error is the audit gate's blocking sentinel.
    pub fn is_audit_blocked(&self) -> bool {
        matches!(self, BunkerError::AuditBlocked { .. })
    }

    /// Append a rollback failure to an existing blocking error. The original
    /// cause is preserved; the warning rides alongside it.
    pub fn with_rollback_warning(self, warning: impl Into<String>) -> Self {
        match self {
            BunkerError::AuditBlocked { cause, .. } => BunkerError::AuditBlocked {
                cause,
                rollback_warning: Some(warning.into()),
            },
            other => other,
        }
    }
}

impl From<std::io::Error> for BunkerError {
    fn from(err: std::io::Error) -> Self {
        BunkerError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BunkerError {
    fn from(err: serde_json::Error) -> Self {
        BunkerError::FileReadFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<git2::Error> for BunkerError {
    fn from(err: git2::Error) -> Self {
        BunkerError::GitOperationFailed {
            message: err.to_string(),
        }
    }
}

impl From<inquire::InquireError> for BunkerError {
    fn from(err: inquire::InquireError) -> Self {
        BunkerError::IoError {
            message: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, BunkerError>;
