//! The audit gate: threshold policy, decision logic, rollback
//!
//! State machine: `Scanning -> {Clean, BelowThreshold, AtOrAboveThreshold,
//! ScanError}`. At/above threshold an interactive session may accept;
//! non-interactive sessions always auto-decline. Every blocked outcome rolls
//! back partially-applied state (git reset for tracked repos, deletion for
//! fresh installs) and surfaces the `AuditBlocked` sentinel wrapping the
//! underlying cause. A rollback failure is appended to the blocking reason,
//! never substituted for it.

use std::path::{Path, PathBuf};

use console::style;

use crate::error::{BunkerError, Result};
use crate::git;

use super::scanner::{AuditResult, ContentScanner, Finding, Severity};

/// How to undo partially-applied state when the gate blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackPoint {
    /// Tracked repository: hard-reset the working copy to the pre-operation
    /// commit.
    Commit {
        repo_dir: PathBuf,
        before_hash: String,
    },
    /// Fresh non-tracked install: delete the freshly written destination.
    FreshDir { dest: PathBuf },
}

impl RollbackPoint {
    fn apply(&self) -> Result<()> {
        match self {
            RollbackPoint::Commit {
                repo_dir,
                before_hash,
            } => git::reset_hard(repo_dir, before_hash),
            RollbackPoint::FreshDir { dest } => {
                crate::common::fs::remove_dir_if_exists(dest).map_err(|e| {
                    BunkerError::IoError {
                        message: format!("failed to remove {}: {}", dest.display(), e),
                    }
                })
            }
        }
    }
}

/// Decision seam for findings at/above the threshold.
///
/// The gate asks the prompt only in interactive mode; everything that is not
/// an explicit "yes" declines.
pub trait Prompt {
    fn confirm(&self, over_threshold: &[&Finding], threshold: Severity) -> Result<bool>;
}

/// Terminal prompt: prints the offending findings and asks for confirmation.
pub struct TerminalPrompt;

impl Prompt for TerminalPrompt {
    fn confirm(&self, over_threshold: &[&Finding], threshold: Severity) -> Result<bool> {
        eprintln!(
            "{} {} finding(s) at or above {}:",
            style("!").yellow().bold(),
            over_threshold.len(),
            threshold
        );
        for finding in over_threshold {
            eprintln!(
                "  [{}] {} ({}:{})",
                style(finding.severity).red().bold(),
                finding.message,
                finding.file,
                finding.line
            );
            if !finding.snippet.is_empty() {
                eprintln!("      {}", style(&finding.snippet).dim());
            }
        }
        let accepted = inquire::Confirm::new("Install anyway?")
            .with_default(false)
            .prompt()?;
        Ok(accepted)
    }
}

/// Result of a passed gate.
#[derive(Debug, Clone)]
pub struct GatePass {
    /// Scan result; `None` when the audit was skipped outright
    pub audit: Option<AuditResult>,
    /// The user explicitly accepted findings at/above the threshold
    pub accepted_over_threshold: bool,
}

impl GatePass {
    /// Risk score for reporting, 0 when skipped.
    pub fn risk_score(&self) -> u8 {
        self.audit.as_ref().map_or(0, |a| a.risk_score)
    }

    /// Risk label for reporting, "SKIPPED" when the audit was skipped.
    pub fn risk_label(&self) -> String {
        self.audit
            .as_ref()
            .map_or_else(|| "SKIPPED".to_string(), |a| a.risk_label.clone())
    }
}

/// Wraps a [`ContentScanner`] with threshold policy and rollback.
pub struct AuditGate<'a> {
    scanner: &'a dyn ContentScanner,
    threshold: Severity,
    skip: bool,
    /// `None` means non-interactive: findings at/above threshold always
    /// auto-decline (fail-closed for unattended runs).
    prompt: Option<&'a dyn Prompt>,
}

impl<'a> AuditGate<'a> {
    pub fn new(scanner: &'a dyn ContentScanner, threshold: Severity) -> Self {
        Self {
            scanner,
            threshold,
            skip: false,
            prompt: None,
        }
    }

    /// Skip scanning entirely; the gate passes unconditionally.
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Enable interactive decisions through `prompt`.
    pub fn with_prompt(mut self, prompt: Option<&'a dyn Prompt>) -> Self {
        self.prompt = prompt;
        self
    }

    /// Run the gate against `dir`.
    ///
    /// `rollback` is the pre-operation restore point. `None` means no
    /// rollback target exists; a blocked outcome then reports that the
    /// on-disk state is unknown rather than pretending cleanup happened.
    pub fn run(&self, dir: &Path, rollback: Option<&RollbackPoint>) -> Result<GatePass> {
        if self.skip {
            return Ok(GatePass {
                audit: None,
                accepted_over_threshold: false,
            });
        }

        let audit = match self.scanner.scan(dir) {
            Ok(audit) => audit,
            // Fail closed: a scan error is worst-case findings
            Err(scan_err) => {
                return Err(self.block(format!("scan failed: {scan_err}"), rollback));
            }
        };

        let over = audit.at_or_above(self.threshold);
        if over.is_empty() {
            return Ok(GatePass {
                audit: Some(audit),
                accepted_over_threshold: false,
            });
        }

        if let Some(prompt) = self.prompt {
            // A failed prompt (interrupted, closed stdin) is a decline, not a
            // plain error: the blocking path must still roll back.
            match prompt.confirm(&over, self.threshold) {
                Ok(true) => {
                    return Ok(GatePass {
                        audit: Some(audit),
                        accepted_over_threshold: true,
                    });
                }
                Ok(false) => {}
                Err(prompt_err) => {
                    let cause = format!(
                        "{} finding(s) at/above {}; confirmation failed: {prompt_err}",
                        over.len(),
                        self.threshold
                    );
                    return Err(self.block(cause, rollback));
                }
            }
        }

        let cause = format!(
            "{} finding(s) at/above {}",
            over.len(),
            self.threshold
        );
        Err(self.block(cause, rollback))
    }

    /// Roll back (when possible) and build the blocking sentinel.
    fn block(&self, cause: String, rollback: Option<&RollbackPoint>) -> BunkerError {
        let Some(point) = rollback else {
            return BunkerError::AuditBlocked {
                cause: format!("{cause}; no rollback point, on-disk state unknown"),
                rollback_warning: None,
            };
        };

        let blocked = BunkerError::AuditBlocked {
            cause,
            rollback_warning: None,
        };
        match point.apply() {
            Ok(()) => blocked,
            Err(rollback_err) => blocked.with_rollback_warning(format!(
                "rollback failed, content may remain: {rollback_err}"
            )),
        }
    }
}
