// Core building blocks shared by every subcommand.
// Installers in `crate::installers` are assembled from these pieces.

// Reads the optional YAML config file.
pub mod config_loading;
// Detects the package manager and installs system packages.
pub mod dependencies;
// Fetches and saves AI agent and framework documentation.
pub mod documentation;
// Runs the phases of the `setup` command.
pub mod environment_setup;
// Runs external commands, alone or through a bounded worker pool.
pub mod executor;
// Git remote, fetch and exclude-file handling for the project checkout.
pub mod git;
// Appends PATH entries, exports and source lines to shell profiles.
pub mod shell_profile;
// Low-level helpers for paths, downloads and archives.
pub mod utilities;
