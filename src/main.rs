//! Bunker - audited bundle manager
//!
//! Installs content bundles from local directories and git hosts into a
//! local store, with every install and update passing through a mandatory
//! security audit gate.

use clap::Parser;

mod audit;
mod cli;
mod commands;
mod common;
mod discovery;
mod error;
mod git;
mod hash;
mod ops;
mod progress;
mod source;
mod store;
mod temp;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Install(args) => commands::install::run(cli.store, args, cli.verbose),
        Commands::Update(args) => commands::update::run(cli.store, args, cli.verbose),
        Commands::List(args) => commands::list::run(cli.store, args),
        Commands::Version => commands::version::run(),
        Commands::Completions(args) => commands::completions::run(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
