//! Shared terminal reporting for install and update commands

use console::style;

use crate::audit::AuditResult;
use crate::ops::batch::{BATCH_DISPLAY_THRESHOLD, BatchReport, BundleOutcome};
use crate::ops::diff::FileChange;
use crate::ops::{InstallAction, InstallOutcome, InstallResult};

pub fn print_outcome(outcome: &InstallOutcome, verbose: bool) {
    match outcome {
        InstallOutcome::Installed(result) => print_result(result, verbose),
        InstallOutcome::Skipped { name, reason } => {
            println!("{} {} skipped: {}", style("-").dim(), style(name).bold(), reason);
        }
    }
}

pub fn print_result(result: &InstallResult, verbose: bool) {
    match result.action {
        InstallAction::DryRun => {
            println!(
                "{} would install {}",
                style("~").cyan(),
                style(&result.name).bold()
            );
        }
        action => {
            println!(
                "{} {} {} (risk: {}, score {})",
                style("✓").green(),
                action,
                style(&result.name).bold(),
                result.audit_risk_label,
                result.audit_risk_score
            );
        }
    }
    for warning in &result.warnings {
        println!("  {} {}", style("warning:").yellow().bold(), warning);
    }
    if let Some(audit) = &result.audit {
        if verbose || audit.findings.len() <= BATCH_DISPLAY_THRESHOLD {
            print_findings(audit);
        } else {
            print_finding_counts(audit);
        }
    }
}

fn print_findings(audit: &AuditResult) {
    for finding in &audit.findings {
        println!(
            "  {} {}:{} {}",
            style(format!("[{}]", finding.severity)).magenta(),
            finding.file,
            finding.line,
            finding.message
        );
    }
}

fn print_finding_counts(audit: &AuditResult) {
    let counts: Vec<String> = audit
        .counts_by_severity()
        .into_iter()
        .map(|(severity, count)| format!("{count} {severity}"))
        .collect();
    println!("  {} findings: {}", audit.findings.len(), counts.join(", "));
}

pub fn print_batch_report(report: &BatchReport, verbose: bool) {
    for outcome in &report.outcomes {
        match outcome {
            BundleOutcome::Succeeded(result) => print_result(result, verbose),
            BundleOutcome::Failed { name, error } => {
                println!(
                    "{} {} failed: {}",
                    style("✗").red().bold(),
                    style(name).bold(),
                    error
                );
            }
            BundleOutcome::Skipped { name, reason } => {
                println!("{} {} skipped: {}", style("-").dim(), style(name).bold(), reason);
            }
        }
    }

    println!();
    let failed = report.failed_names();
    let skipped = report.skipped_names();
    println!(
        "Installed {} bundle(s), {} failed, {} skipped",
        report.installed_count(),
        failed.len(),
        skipped.len()
    );
    if report.total_findings() > 0 {
        let counts: Vec<String> = report
            .finding_counts()
            .into_iter()
            .map(|(severity, count)| format!("{count} {severity}"))
            .collect();
        println!("Audit findings across batch: {}", counts.join(", "));
    }
    if report.blocked_count() > 0 {
        println!(
            "{} {} bundle(s) blocked by the security audit",
            style("✗").red().bold(),
            report.blocked_count()
        );
    }
    if !failed.is_empty() && !verbose {
        println!("Run with --verbose for full error details");
    }
}

pub fn print_changes(changes: &[FileChange]) {
    if changes.is_empty() {
        return;
    }
    println!("  {} file(s) changed:", changes.len());
    for change in changes {
        println!("    {} {}", change.kind, change.path);
    }
}
