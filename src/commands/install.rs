//! Install command implementation
//!
//! Resolves the source, runs the single-bundle or batch pipeline, and
//! reports per-bundle results. A batch where any bundle fails exits
//! non-zero after the rest of the batch has been attempted.

use std::path::PathBuf;

use crate::audit::{PatternScanner, Severity, gate::TerminalPrompt};
use crate::cli::InstallArgs;
use crate::error::{BunkerError, Result};
use crate::ops::batch;
use crate::ops::install::Installer;
use crate::ops::InstallOptions;
use crate::progress;
use crate::store::Store;

use super::report;

pub fn run(store_root: Option<PathBuf>, args: InstallArgs, verbose: bool) -> Result<()> {
    let threshold = Severity::parse_cli(&args.audit_threshold)?;
    let store = Store::open(store_root.unwrap_or_else(Store::default_root))?;
    let scanner = PatternScanner::new();
    let prompt = TerminalPrompt;
    let mut installer = Installer::new(&store, &scanner).with_prompt(&prompt);

    let attended = console::user_attended();
    let opts = InstallOptions {
        force: args.force,
        update: false,
        dry_run: args.dry_run,
        track: args.track,
        skip_audit: args.skip_audit,
        audit_threshold: threshold,
        only: args.bundles,
        exclude: args.exclude,
        into: args.into,
        interactive: attended && !args.non_interactive,
        progress: if attended {
            progress::spinner()
        } else {
            progress::silent()
        },
    };

    let batch_mode = args.all || !opts.only.is_empty() || !opts.exclude.is_empty();
    if batch_mode {
        let report = batch::run_batch(&mut installer, &args.source, &opts)?;
        report::print_batch_report(&report, verbose);
        if !report.is_success() {
            return Err(BunkerError::IoError {
                message: format!("{} bundle(s) failed to install", report.failed_names().len()),
            });
        }
    } else {
        let outcome = installer.install_one(&args.source, &opts)?;
        report::print_outcome(&outcome, verbose);
    }

    Ok(())
}
