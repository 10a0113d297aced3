// Komodo DeFi Framework build prerequisites.
// Installs the native packages KDF links against, a Rust toolchain through rustup,
// the toolchain pinned by the project (if any) and the Zcash parameters KDF needs at runtime.

use crate::libs::dependencies::DependencyManager;
use crate::libs::executor::{CommandRunner, CommandSpec, prepend_to_session_path};
use crate::libs::shell_profile::add_source_line;
use crate::schemas::environment::EnvironmentConfig;
use crate::{log_debug, log_error, log_info, log_warn};
use colored::Colorize;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// System packages required to build KDF.
pub const KDF_PACKAGES: [&str; 3] = ["docker.io", "libudev-dev", "protobuf-compiler"];

const RUSTUP_SCRIPT: &str = "curl --proto '=https' --tlsv1.2 -sSf https://sh.rustup.rs | sh -s -- -y";
const CARGO_ENV_LINE: &str = "source \"$HOME/.cargo/env\"";
const CARGO_ENV_FISH_LINE: &str = "source \"$HOME/.cargo/env.fish\"";
const SHELL_PROFILES: [&str; 4] = [".bashrc", ".zshrc", ".profile", ".bash_profile"];
const RUSTUP_TIMEOUT: Duration = Duration::from_secs(600);
const FETCH_PARAMS_TIMEOUT: Duration = Duration::from_secs(900);

/// `rust-toolchain.toml` as written by rustup users.
#[derive(Debug, Deserialize)]
struct ToolchainFile {
    toolchain: ToolchainSection,
}

#[derive(Debug, Deserialize)]
struct ToolchainSection {
    channel: String,
}

pub struct KdfManager<'a> {
    config: &'a EnvironmentConfig,
    runner: &'a dyn CommandRunner,
    deps: DependencyManager<'a>,
}

impl<'a> KdfManager<'a> {
    pub fn new(config: &'a EnvironmentConfig, runner: &'a dyn CommandRunner) -> Self {
        Self {
            config,
            runner,
            deps: DependencyManager::new(runner),
        }
    }

    /// Installs packages, Rust and the pinned toolchain, then fetches the Zcash parameters.
    ///
    /// # Returns
    /// * `false` when the packages or rustup fail, or when `fetch_params.sh` is missing or fails.
    pub fn install_dependencies(&self) -> bool {
        log_info!("[KDF] {}", "Installing KDF dependencies...".bold());

        if !self.deps.install_dependencies(&KDF_PACKAGES) {
            log_error!("[KDF] Failed to install required packages");
            return false;
        }

        if self.runner.command_exists("rustc") {
            log_info!("[KDF] {}", "Rust already installed".green());
        } else if !self.install_rust() {
            return false;
        }

        self.install_pinned_toolchain();

        let Some(script) = self.fetch_params_script() else {
            log_error!(
                "[KDF] fetch_params.sh not found (looked in {})",
                self.fetch_params_candidates()
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return false;
        };
        log_info!("[KDF] Fetching Zcash parameters with {}...", script.display());
        let fetch = CommandSpec::new("bash")
            .arg(script.display().to_string())
            .timeout(FETCH_PARAMS_TIMEOUT)
            .unchecked();
        if !self.runner.run_ok(&fetch) {
            log_error!("[KDF] Failed to fetch Zcash parameters");
            return false;
        }

        log_info!("[KDF] {}", "KDF dependencies installed successfully".green());
        true
    }

    fn install_rust(&self) -> bool {
        log_info!("[KDF] Installing Rust toolchain via rustup...");
        let ok = self.runner.run_ok(
            &CommandSpec::shell(RUSTUP_SCRIPT)
                .timeout(RUSTUP_TIMEOUT)
                .unchecked(),
        );
        if !ok {
            log_error!("[KDF] Failed to install Rust");
            return false;
        }
        let cargo_bin = self.config.home_dir.join(".cargo").join("bin");
        prepend_to_session_path(&cargo_bin);
        self.update_shell_configs();
        true
    }

    /// Sources the cargo environment from every existing shell profile, fish included.
    pub fn update_shell_configs(&self) {
        let home = &self.config.home_dir;
        for name in SHELL_PROFILES {
            let profile = home.join(name);
            if profile.is_file() && !add_source_line(CARGO_ENV_LINE, &profile) {
                log_warn!("[KDF] Could not update {}", name);
            }
        }

        let fish_config = home.join(".config").join("fish").join("config.fish");
        if !fish_config.is_file() {
            return;
        }
        if !add_source_line(CARGO_ENV_FISH_LINE, &fish_config) {
            log_warn!("[KDF] Could not update fish config");
        }
        let cargo_dir = home.join(".cargo");
        let fish_env = cargo_dir.join("env.fish");
        if fish_env.exists() {
            return;
        }
        match fs::read_to_string(cargo_dir.join("env")) {
            Ok(posix_env) => {
                if let Err(e) = fs::write(&fish_env, fish_env_from_posix(&posix_env)) {
                    log_warn!("[KDF] Could not create {}: {}", fish_env.display(), e);
                }
            }
            Err(e) => log_debug!("[KDF] No cargo env file to translate for fish: {}", e),
        }
    }

    /// Installs the channel pinned by `rust-toolchain.toml` (or `rust-toolchain`) in the project.
    /// A pin that cannot be installed is only a warning.
    pub fn install_pinned_toolchain(&self) -> Option<String> {
        let channel = pinned_channel(&self.config.initial_dir)?;
        log_info!("[KDF] Installing pinned Rust toolchain {}...", channel.cyan());
        let ok = self.runner.run_ok(
            &CommandSpec::new("rustup")
                .args(["toolchain", "install", channel.as_str()])
                .cwd(&self.config.initial_dir)
                .timeout(RUSTUP_TIMEOUT)
                .unchecked(),
        );
        if !ok {
            log_warn!("[KDF] Could not install Rust toolchain {}", channel);
        }
        Some(channel)
    }

    fn fetch_params_candidates(&self) -> Vec<PathBuf> {
        vec![
            self.config.initial_dir.join("scripts").join("fetch_params.sh"),
            self.config.app_dir.join("scripts").join("fetch_params.sh"),
        ]
    }

    fn fetch_params_script(&self) -> Option<PathBuf> {
        self.fetch_params_candidates().into_iter().find(|p| p.is_file())
    }
}

/// Channel from `rust-toolchain.toml`, or from a legacy `rust-toolchain` file which may
/// hold either TOML or a bare channel name.
pub fn pinned_channel(project_dir: &Path) -> Option<String> {
    for name in ["rust-toolchain.toml", "rust-toolchain"] {
        let Ok(contents) = fs::read_to_string(project_dir.join(name)) else {
            continue;
        };
        match toml::from_str::<ToolchainFile>(&contents) {
            Ok(file) => return Some(file.toolchain.channel),
            Err(e) if name == "rust-toolchain" => {
                let bare = contents.trim();
                if !bare.is_empty() && !bare.contains(['[', '=']) {
                    return Some(bare.to_string());
                }
                log_warn!("[KDF] Could not parse {}: {}", name, e);
            }
            Err(e) => log_warn!("[KDF] Could not parse {}: {}", name, e),
        }
    }
    None
}

/// Rewrites `export NAME=value` lines of cargo's POSIX env file into fish `set -gx`.
fn fish_env_from_posix(posix: &str) -> String {
    posix
        .lines()
        .filter_map(|line| line.trim().strip_prefix("export "))
        .filter_map(|assignment| assignment.split_once('='))
        .map(|(name, value)| format!("set -gx {name} {value}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::executor::CommandOutput;
    use crate::libs::executor::fake::ScriptedRunner;
    use tempfile::tempdir;

    fn config_in(home: &Path, project: &Path) -> EnvironmentConfig {
        EnvironmentConfig::with_home(home.to_path_buf(), project.to_path_buf())
    }

    fn apt_runner() -> ScriptedRunner {
        ScriptedRunner::new()
            .with_commands(&["apt-get", "rustc"])
            .reply("id -u", CommandOutput::ok("0\n"))
            .reply("dpkg -s", CommandOutput::failed(1, "not installed"))
    }

    #[test]
    fn toolchain_channel_from_toml() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("rust-toolchain.toml"),
            "[toolchain]\nchannel = \"nightly-2023-06-01\"\ncomponents = [\"rustfmt\"]\n",
        )
        .unwrap();
        assert_eq!(pinned_channel(dir.path()).as_deref(), Some("nightly-2023-06-01"));
    }

    #[test]
    fn toolchain_channel_from_legacy_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("rust-toolchain"), "1.72.0\n").unwrap();
        assert_eq!(pinned_channel(dir.path()).as_deref(), Some("1.72.0"));
        assert_eq!(pinned_channel(&dir.path().join("missing")), None);
    }

    #[test]
    fn fish_env_translation() {
        let posix = "#!/bin/sh\nexport PATH=\"$HOME/.cargo/bin:$PATH\"\n";
        assert_eq!(fish_env_from_posix(posix), "set -gx PATH \"$HOME/.cargo/bin:$PATH\"\n");
    }

    #[test]
    fn missing_fetch_params_script_fails() {
        let home = tempdir().unwrap();
        let project = tempdir().unwrap();
        let config = config_in(home.path(), project.path());
        let runner = apt_runner();
        assert_eq!(config.app_dir, home.path().join(".komodo-codex-env"));

        assert!(!KdfManager::new(&config, &runner).install_dependencies());
        assert!(runner.called("apt-get install -y docker.io libudev-dev protobuf-compiler"));
        assert!(!runner.called("bash "));
    }

    #[test]
    fn fetch_params_found_in_app_dir() {
        let home = tempdir().unwrap();
        let project = tempdir().unwrap();
        let config = config_in(home.path(), project.path());
        let scripts = config.app_dir.join("scripts");
        fs::create_dir_all(&scripts).unwrap();
        fs::write(scripts.join("fetch_params.sh"), "#!/bin/bash\n").unwrap();
        let runner = apt_runner();

        assert!(KdfManager::new(&config, &runner).install_dependencies());
        assert!(
            runner
                .calls()
                .iter()
                .any(|c| c.starts_with("bash ") && c.contains(".komodo-codex-env/scripts/fetch_params.sh"))
        );
    }

    #[test]
    fn full_install_runs_pin_and_fetch_params() {
        let home = tempdir().unwrap();
        let project = tempdir().unwrap();
        fs::create_dir(project.path().join("scripts")).unwrap();
        fs::write(project.path().join("scripts/fetch_params.sh"), "#!/bin/bash\n").unwrap();
        fs::write(project.path().join("rust-toolchain.toml"), "[toolchain]\nchannel = \"1.80.0\"\n").unwrap();
        let config = config_in(home.path(), project.path());
        let runner = apt_runner();

        assert!(KdfManager::new(&config, &runner).install_dependencies());
        assert!(runner.called("rustup toolchain install 1.80.0"));
        assert!(runner.called("bash "));
        assert!(!runner.called("bash -c"));
    }

    #[test]
    fn rustup_runs_when_rustc_missing_and_profiles_are_sourced() {
        let home = tempdir().unwrap();
        let project = tempdir().unwrap();
        fs::write(home.path().join(".bashrc"), "# bash\n").unwrap();
        fs::create_dir_all(home.path().join(".config/fish")).unwrap();
        fs::write(home.path().join(".config/fish/config.fish"), "").unwrap();
        fs::create_dir_all(home.path().join(".cargo")).unwrap();
        fs::write(home.path().join(".cargo/env"), "export PATH=\"$HOME/.cargo/bin:$PATH\"\n").unwrap();

        let config = config_in(home.path(), project.path());
        let runner = ScriptedRunner::new().with_commands(&["apt-get"]);
        let kdf = KdfManager::new(&config, &runner);
        assert!(kdf.install_rust());
        assert!(runner.called("bash -c \"curl --proto"));

        let bashrc = fs::read_to_string(home.path().join(".bashrc")).unwrap();
        assert!(bashrc.contains(CARGO_ENV_LINE));
        assert!(!home.path().join(".zshrc").exists());
        assert!(home.path().join(".cargo/env.fish").is_file());
    }

    #[test]
    fn rustup_failure_stops_install() {
        let home = tempdir().unwrap();
        let config = config_in(home.path(), home.path());
        let runner = ScriptedRunner::new()
            .with_commands(&["apt-get"])
            .reply("id -u", CommandOutput::ok("0\n"))
            .reply("bash -c \"curl", CommandOutput::failed(1, "network unreachable"));
        assert!(!KdfManager::new(&config, &runner).install_dependencies());
        assert!(!runner.called("rustup toolchain"));
    }
}
