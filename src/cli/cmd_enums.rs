use crate::cli::type_enums::{InstallMethod, InstallType};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Defines the command-line interface (CLI) for 'komodo-codex-env'.
/// `#[derive(Parser)]` automatically generates argument parsing code via `clap`.
#[derive(Parser)]
#[command(name = "komodo-codex-env")]
#[command(version)]
#[command(about = "Flutter, Android and KDF development environment setup for Komodo projects")]
pub struct Cli {
    /// Enables detailed debug output for troubleshooting and development.
    #[arg(short, long, global = true)]
    pub(crate) debug: bool,

    /// Defines available subcommands for 'komodo-codex-env'.
    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Enumerates all supported subcommands with their specific arguments and options.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the complete environment setup.
    /// System dependencies, git, Flutter/Android, KDF, PATH, documentation and project build.
    Setup {
        /// Flutter version to install through FVM (e.g. "3.32.0" or "stable").
        #[arg(long)]
        flutter_version: Option<String>,
        /// Flutter installation method [git, precompiled].
        #[arg(long)]
        install_method: Option<InstallMethod>,
        /// Installation type [ALL, KW, KDF, KDF-SDK].
        #[arg(long)]
        install_type: Option<InstallType>,
        /// Disable parallel execution of the Flutter and Android phases.
        #[arg(long)]
        no_parallel: bool,
        /// Comma-separated list of platforms to set up (e.g. web,android,linux).
        #[arg(long)]
        platforms: Option<String>,
        /// Skip fetching git branches.
        #[arg(long)]
        no_git_fetch: bool,
        /// Skip documentation fetching.
        #[arg(long)]
        no_docs: bool,
        /// Fetch the KDF API documentation as well.
        #[arg(long)]
        kdf_docs: bool,
        /// Maximum expected execution time in seconds (used for the summary).
        #[arg(long)]
        max_time: Option<u64>,
        /// Print the effective configuration before running.
        #[arg(short, long)]
        verbose: bool,
    },
    /// Fetch documentation files only.
    FetchDocs {
        /// Target directory for documentation.
        #[arg(long, default_value = ".")]
        target: PathBuf,
        /// Skip AGENTS.md.
        #[arg(long)]
        no_agents: bool,
        /// Include KDF API documentation.
        #[arg(long)]
        kdf_docs: bool,
    },
    /// Check system dependencies.
    CheckDeps,
    /// Check Flutter installation status via FVM.
    FlutterStatus {
        /// Flutter version to compare against the active one.
        #[arg(long)]
        version: Option<String>,
    },
    /// Show Android SDK and Java status.
    AndroidStatus,
    /// Check for and download setup script updates.
    UpdateScript {
        /// Download without asking for confirmation.
        #[arg(long, short)]
        yes: bool,
    },
    /// List installed Flutter versions via FVM.
    FvmList,
    /// Install a specific Flutter version via FVM.
    FvmInstall {
        /// Flutter version to install.
        version: String,
    },
    /// Set the global Flutter version via FVM.
    FvmUse {
        /// Flutter version to activate globally.
        version: String,
    },
    /// List available Flutter releases via FVM.
    FvmReleases,
    /// Show the current version of the tool.
    Version,
}
