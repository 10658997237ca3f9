//! Update command implementation

use std::path::PathBuf;

use console::style;

use crate::audit::{PatternScanner, Severity, gate::TerminalPrompt};
use crate::cli::UpdateArgs;
use crate::error::{BunkerError, Result};
use crate::ops::update::update_one;
use crate::ops::install::Installer;
use crate::ops::{InstallOptions, InstallOutcome};
use crate::progress;
use crate::store::Store;

use super::report;

pub fn run(store_root: Option<PathBuf>, args: UpdateArgs, verbose: bool) -> Result<()> {
    if args.names.is_empty() && !args.all {
        return Err(BunkerError::IoError {
            message: "nothing to update: pass bundle names or --all".to_string(),
        });
    }

    let threshold = Severity::parse_cli(&args.audit_threshold)?;
    let store = Store::open(store_root.unwrap_or_else(Store::default_root))?;
    let scanner = PatternScanner::new();
    let prompt = TerminalPrompt;
    let mut installer = Installer::new(&store, &scanner).with_prompt(&prompt);

    let attended = console::user_attended();
    let opts = InstallOptions {
        force: args.force,
        update: true,
        dry_run: args.dry_run,
        skip_audit: args.skip_audit,
        audit_threshold: threshold,
        interactive: attended && !args.non_interactive,
        progress: if attended {
            progress::spinner()
        } else {
            progress::silent()
        },
        ..Default::default()
    };

    let names: Vec<String> = if args.all {
        store
            .entries()?
            .into_iter()
            .filter(|e| e.tracked || e.update_eligible())
            .map(|e| e.name)
            .collect()
    } else {
        args.names
    };

    if names.is_empty() {
        println!("No updatable bundles installed.");
        return Ok(());
    }

    // One bundle failing never aborts the rest.
    let mut failed = Vec::new();
    for name in &names {
        match update_one(&mut installer, name, &opts) {
            Ok(update) => {
                report::print_outcome(&update.outcome, verbose);
                if matches!(update.outcome, InstallOutcome::Installed(_)) {
                    report::print_changes(&update.changes);
                }
            }
            Err(error) => {
                println!(
                    "{} {} failed: {}",
                    style("✗").red().bold(),
                    style(name).bold(),
                    error
                );
                failed.push(name.clone());
            }
        }
    }

    if !failed.is_empty() {
        return Err(BunkerError::IoError {
            message: format!("{} bundle(s) failed to update", failed.len()),
        });
    }
    Ok(())
}
