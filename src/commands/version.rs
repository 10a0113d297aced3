// This file handles `komodo-codex-env version`.
// The version is baked in at compile time from the package manifest.

/// Prints the tool version to stdout.
pub fn run() {
    println!("komodo-codex-env {}", env!("CARGO_PKG_VERSION"));
}
