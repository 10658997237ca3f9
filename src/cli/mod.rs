//! CLI definitions using clap derive API

use clap::builder::{Styles, styling::AnsiColor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Bunker - audited bundle manager
///
/// Install and update portable content bundles behind a mandatory security
/// audit gate.
#[derive(Parser, Debug)]
#[command(
    name = "bunker",
    author,
    version,
    color = clap::ColorChoice::Always,
    styles = Styles::styled()
        .header(AnsiColor::Green.on_default().bold())
        .usage(AnsiColor::Green.on_default().bold())
        .literal(AnsiColor::Cyan.on_default().bold())
        .placeholder(AnsiColor::Cyan.on_default()),
    about = "Audited package manager for portable content bundles",
    long_about = "Bunker installs content bundles from local directories and git hosts into a \
                  local store. Every install and update passes through a security audit gate \
                  that scans the fetched content and rolls back anything it blocks.",
    after_help = "\x1b[1m\x1b[32mExamples:\x1b[0m\n    \
                  bunker install owner/repo\n    \
                  bunker install ./local-bundle\n    \
                  bunker install owner/repo/tools/linter\n    \
                  bunker update my-bundle\n    \
                  bunker list"
)]
pub struct Cli {
    /// Store directory (defaults to ~/.bunker/store)
    #[arg(long, short = 's', global = true, env = "BUNKER_STORE")]
    pub store: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install bundles from a source
    Install(InstallArgs),

    /// Update installed bundles
    Update(UpdateArgs),

    /// List installed bundles
    List(ListArgs),

    /// Show version information
    Version,

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the install command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Install from a host shorthand:\n    bunker install owner/repo\n\n\
                  Install a repository subdirectory:\n    bunker install owner/repo/tools/linter\n\n\
                  Install from a local directory:\n    bunker install ./my-bundle\n\n\
                  Install from a git URL:\n    bunker install https://github.com/owner/repo.git\n\n\
                  Install every bundle in the source:\n    bunker install owner/repo --all\n\n\
                  Install selected bundles:\n    bunker install owner/repo --bundle linter formatter\n\n\
                  Track the repository for pull-based updates:\n    bunker install owner/repo --track\n\n\
                  Tighten the audit gate:\n    bunker install owner/repo --audit-threshold medium")]
pub struct InstallArgs {
    /// Bundle source (path, URL, or owner/repo[/subdir])
    pub source: String,

    /// Install only the named bundles
    #[arg(long = "bundle", short = 'b', value_name = "NAME", num_args = 1..)]
    pub bundles: Vec<String>,

    /// Exclude the named bundles
    #[arg(long, value_name = "NAME", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Install every bundle the source contains
    #[arg(long, short = 'a')]
    pub all: bool,

    /// Overwrite an existing install of the same source
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Keep the install as a live git working copy for pull-based updates
    #[arg(long, short = 't')]
    pub track: bool,

    /// Report what would happen without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Bypass the security audit gate
    #[arg(long)]
    pub skip_audit: bool,

    /// Severity at/above which audit findings block (critical, high, medium, low, info)
    #[arg(long, value_name = "SEVERITY", default_value = "high")]
    pub audit_threshold: String,

    /// Install under this subpath of the store
    #[arg(long, value_name = "DIR")]
    pub into: Option<String>,

    /// Never prompt; findings at/above the threshold always block
    #[arg(long)]
    pub non_interactive: bool,
}

/// Arguments for the update command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Update one bundle:\n    bunker update my-bundle\n\n\
                  Update everything updatable:\n    bunker update --all\n\n\
                  Discard local changes in a tracked bundle:\n    bunker update my-bundle --force\n\n\
                  Preview an update:\n    bunker update my-bundle --dry-run")]
pub struct UpdateArgs {
    /// Bundle names to update
    pub names: Vec<String>,

    /// Update every bundle with a recorded source
    #[arg(long, short = 'a')]
    pub all: bool,

    /// Discard uncommitted changes in tracked bundles
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Report what would happen without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Bypass the security audit gate
    #[arg(long)]
    pub skip_audit: bool,

    /// Severity at/above which audit findings block (critical, high, medium, low, info)
    #[arg(long, value_name = "SEVERITY", default_value = "high")]
    pub audit_threshold: String,

    /// Never prompt; findings at/above the threshold always block
    #[arg(long)]
    pub non_interactive: bool,
}

/// Arguments for the list command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  List all installed bundles:\n    bunker list\n\n\
                  Show sources and paths:\n    bunker list --detailed")]
pub struct ListArgs {
    /// Show sources and store paths
    #[arg(long)]
    pub detailed: bool,
}

/// Arguments for completions command
#[derive(Parser, Debug)]
#[command(after_help = "EXAMPLES:\n  \
                  Generate bash completions:\n    bunker completions --shell bash > ~/.bash_completion.d/bunker\n\n\
                  Generate zsh completions:\n    bunker completions --shell zsh > ~/.zfunc/_bunker\n\n\
                  Generate fish completions:\n    bunker completions --shell fish > ~/.config/fish/completions/bunker.fish")]
pub struct CompletionsArgs {
    /// Shell type (bash, elvish, fish, powershell, zsh)
    #[arg(long)]
    pub shell: String,
}
