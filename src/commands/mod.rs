// Register application subcommands.
// Each module corresponds to a specific `komodo-codex-env` command-line action.

// Reports the Android SDK and Java status.
pub mod android_status;
// Shows system information and missing packages.
pub mod check_deps;
// Downloads documentation files without running the full setup.
pub mod fetch_docs;
// Reports FVM and Flutter status.
pub mod flutter_status;
// Wraps common FVM operations (list, install, use, releases).
pub mod fvm;
// Orchestrates the complete environment setup.
pub mod setup;
// Checks for and downloads a newer setup script.
pub mod update_script;
// Displays the version of the tool.
pub mod version;
