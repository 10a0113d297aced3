use crate::{log_debug, log_warn};
use colored::Colorize;
use std::path::PathBuf;

/// Resolves paths that start with a tilde `~` or contain `$VAR` references.
///
/// # Arguments
/// * `path`: A string slice representing the path, e.g. `~/Android/Sdk` or `$HOME/.fvm`.
///
/// # Returns
/// * `PathBuf`: The expanded path. Unknown variables leave the input unchanged.
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(e) => {
            log_debug!("[Utils] Could not expand '{}': {}", path, e);
            PathBuf::from(shellexpand::tilde(path).as_ref())
        }
    }
}

/// Returns the per-user state directory, typically `~/.komodo-codex-env`.
/// Falls back to the current directory when no home directory can be determined.
pub fn get_app_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".komodo-codex-env"),
        None => {
            let fallback = std::env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".komodo-codex-env");
            log_warn!(
                "[Utils] Could not determine home directory. Using {}",
                fallback.display().to_string().yellow()
            );
            fallback
        }
    }
}
