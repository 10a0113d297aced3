use crate::{log_debug, log_error, log_info};
use colored::Colorize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Header written above every block this tool appends to a shell profile.
pub const PROFILE_HEADER: &str = "# Added by Komodo Codex Environment Setup";

/// Profile files updated by `add_to_path_for_multiple_users`.
const USER_PROFILES: [&str; 3] = [".bashrc", ".zshrc", ".profile"];

/// Appends `lines` to `rc_path` under the standard header.
///
/// Parent directories and the file itself are created when missing.
///
/// # Arguments
/// * `rc_path`: The profile file, e.g. `~/.bashrc`.
/// * `lines`: Lines to append, without trailing newlines.
pub fn append_to_rc_file(rc_path: &Path, lines: &[String]) -> std::io::Result<()> {
    if let Some(parent) = rc_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(rc_path)?;
    writeln!(file, "\n{PROFILE_HEADER}")?;
    for line in lines {
        writeln!(file, "{line}")?;
        log_debug!("[Profile] Appended to {}: {}", rc_path.display(), line.dimmed());
    }
    Ok(())
}

/// Current profile contents, or an empty string when it does not exist yet.
fn read_profile(profile: &Path) -> String {
    fs::read_to_string(profile).unwrap_or_default()
}

/// Adds `entry` to `PATH` in `profile` unless the entry already appears in it.
pub fn add_to_path(entry: &Path, profile: &Path) -> bool {
    let entry = entry.display().to_string();
    if read_profile(profile).contains(&entry) {
        log_debug!("[Profile] {} already in PATH configuration of {}", entry, profile.display());
        return true;
    }
    match append_to_rc_file(profile, &[format!("export PATH=\"$PATH:{entry}\"")]) {
        Ok(()) => {
            log_info!("[Profile] Added {} to PATH in {}", entry.green(), profile.display());
            true
        }
        Err(e) => {
            log_error!("[Profile] Failed to add {} to PATH in {}: {}", entry, profile.display(), e);
            false
        }
    }
}

/// Exports `name="value"` in `profile` unless `export name=` is already present.
pub fn add_environment_variable(name: &str, value: &str, profile: &Path) -> bool {
    if read_profile(profile).contains(&format!("export {name}=")) {
        log_debug!("[Profile] {} already configured in {}", name, profile.display());
        return true;
    }
    match append_to_rc_file(profile, &[format!("export {name}=\"{value}\"")]) {
        Ok(()) => {
            log_info!("[Profile] Added {} environment variable", name.green());
            true
        }
        Err(e) => {
            log_error!("[Profile] Failed to add environment variable {}: {}", name, e);
            false
        }
    }
}

/// Exports several variables in a single block.
/// Variables already assigned anywhere in the profile (`NAME=`) are left alone.
pub fn setup_environment_variables(vars: &[(String, String)], profile: &Path) -> bool {
    let existing = read_profile(profile);
    let new_lines: Vec<String> = vars
        .iter()
        .filter(|(name, _)| !existing.contains(&format!("{name}=")))
        .map(|(name, value)| format!("export {name}=\"{value}\""))
        .collect();

    if new_lines.is_empty() {
        return true;
    }
    match append_to_rc_file(profile, &new_lines) {
        Ok(()) => {
            log_info!("[Profile] Updated {}", profile.display().to_string().green());
            true
        }
        Err(e) => {
            log_error!("[Profile] Failed to update environment variables in {}: {}", profile.display(), e);
            false
        }
    }
}

/// Appends a raw line (e.g. `source "$HOME/.cargo/env"`) to an existing profile.
///
/// # Returns
/// * `false` when the profile does not exist or cannot be written. Existing lines count as success.
pub fn add_source_line(line: &str, profile: &Path) -> bool {
    if !profile.is_file() {
        return false;
    }
    if read_profile(profile).lines().any(|l| l.trim() == line) {
        return true;
    }
    match append_to_rc_file(profile, &[line.to_string()]) {
        Ok(()) => {
            log_info!("[Profile] Added '{}' to {}", line, profile.display());
            true
        }
        Err(e) => {
            log_error!("[Profile] Failed to update {}: {}", profile.display(), e);
            false
        }
    }
}

/// Adds `entry` to `PATH` in every common profile under `home`.
/// `.profile` is created when none of them exist so login shells still pick it up.
pub fn add_to_path_for_multiple_users(entry: &Path, home: &Path) -> bool {
    let existing: Vec<_> = USER_PROFILES
        .iter()
        .map(|name| home.join(name))
        .filter(|p| p.is_file())
        .collect();

    if existing.is_empty() {
        return add_to_path(entry, &home.join(".profile"));
    }
    existing
        .iter()
        .fold(true, |ok, profile| add_to_path(entry, profile) && ok)
}
