//! List command implementation

use std::path::PathBuf;

use console::style;

use crate::cli::ListArgs;
use crate::error::Result;
use crate::store::{InstalledEntry, Store};

pub fn run(store_root: Option<PathBuf>, args: ListArgs) -> Result<()> {
    let store = Store::open(store_root.unwrap_or_else(Store::default_root))?;
    let entries = store.entries()?;

    if entries.is_empty() {
        println!("No bundles installed.");
        return Ok(());
    }

    println!("Installed bundles ({}):", entries.len());
    println!();
    for entry in &entries {
        if args.detailed {
            display_detailed(entry);
        } else {
            display_simple(entry);
        }
    }
    Ok(())
}

fn display_simple(entry: &InstalledEntry) {
    let tracked = if entry.tracked {
        format!(" {}", style("(tracked)").cyan())
    } else {
        String::new()
    };
    println!("  {}{}", style(&entry.name).bold(), tracked);
}

fn display_detailed(entry: &InstalledEntry) {
    display_simple(entry);
    if let Ok(bundles) = crate::discovery::discover(&entry.path) {
        if let Some(root) = crate::discovery::find_root(&bundles) {
            if let Some(description) = &root.description {
                println!("    desc:   {description}");
            }
            if let Some(license) = &root.license {
                println!("    license: {license}");
            }
        }
    }
    match &entry.metadata {
        Some(metadata) => {
            println!("    source: {}", metadata.source);
        }
        None => {
            println!("    source: {}", style("unknown (not updatable)").dim());
        }
    }
    println!("    path:   {}", entry.path.display());
    if let Ok(dir_hash) = crate::hash::hash_directory(&entry.path) {
        println!("    hash:   {dir_hash}");
    }
    println!();
}
