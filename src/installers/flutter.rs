//! Flutter SDK management through FVM (Flutter Version Management).
//!
//! FVM owns every Flutter checkout under `~/.fvm`; this installer makes sure FVM itself is
//! present, installs the requested version, marks it as the global default and configures
//! the platforms the project targets.

use crate::cli::type_enums::KNOWN_PLATFORMS;
use crate::errors::CommandError;
use crate::libs::dependencies::DependencyManager;
use crate::libs::executor::{CommandRunner, CommandSpec, prepend_to_session_path, run_commands};
use crate::libs::shell_profile::add_to_path_for_multiple_users;
use crate::schemas::environment::{EnvironmentConfig, flutter_semver};
use crate::{log_debug, log_error, log_info, log_warn};
use colored::Colorize;
use serde::Deserialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

const FVM_INSTALL_SCRIPT: &str = "curl -fsSL https://fvm.app/install.sh | bash";
/// Free space needed in the home directory before a Flutter SDK download.
const REQUIRED_DISK_GB: f64 = 1.5;
const INSTALL_TIMEOUT: Duration = Duration::from_secs(600);
const BUILD_TIMEOUT: Duration = Duration::from_secs(300);
const WEB_BUILD_TIMEOUT: Duration = Duration::from_secs(120);

/// Subset of `flutter --version --machine`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlutterVersionInfo {
    framework_version: Option<String>,
}

pub struct FlutterManager<'a> {
    config: &'a EnvironmentConfig,
    runner: &'a dyn CommandRunner,
    deps: DependencyManager<'a>,
    version: String,
}

impl<'a> FlutterManager<'a> {
    pub fn new(config: &'a EnvironmentConfig, runner: &'a dyn CommandRunner) -> Self {
        Self {
            config,
            runner,
            deps: DependencyManager::new(runner),
            version: config.flutter_version.clone(),
        }
    }

    /// The Flutter version this manager installs. Updated by `switch_version`.
    pub fn version(&self) -> &str {
        &self.version
    }

    fn fvm(&self) -> CommandSpec {
        CommandSpec::new("fvm")
    }

    fn fvm_flutter(&self) -> CommandSpec {
        self.fvm().arg("flutter")
    }

    /// Whether FVM can be run.
    ///
    /// Besides `PATH`, the usual install locations are probed. A hit there is added to the
    /// session `PATH` so later `fvm` invocations resolve.
    pub fn is_fvm_installed(&self) -> bool {
        if self.runner.command_exists("fvm") {
            return true;
        }
        for candidate in self.fvm_candidates() {
            if candidate.is_file() && File::open(&candidate).is_ok() {
                if let Some(dir) = candidate.parent() {
                    prepend_to_session_path(dir);
                }
                log_debug!("[Flutter] Found FVM at {}", candidate.display());
                return true;
            }
        }
        false
    }

    fn fvm_candidates(&self) -> Vec<PathBuf> {
        let mut paths = vec![
            self.config.pub_cache_bin_dir().join("fvm"),
            self.config.fvm_dir.join("fvm"),
        ];
        if self.deps.is_root() {
            paths.push(PathBuf::from("/root/.pub-cache/bin/fvm"));
        }
        paths
    }

    /// Installs FVM: Homebrew on macOS when available, otherwise the official install script.
    pub fn install_fvm(&self) -> bool {
        if self.is_fvm_installed() {
            log_info!("[Flutter] {}", "FVM is already installed".green());
            return true;
        }
        log_info!("[Flutter] Installing FVM (Flutter Version Management)...");

        let is_macos = self
            .deps
            .system_info()
            .os
            .map(|os| os.to_lowercase().contains("darwin"))
            .unwrap_or(false);
        if is_macos && self.runner.command_exists("brew") {
            log_info!("[Flutter] Installing FVM via Homebrew...");
            let tapped = self.runner.run_ok(&CommandSpec::new("brew").args(["tap", "leoafarias/fvm"]));
            let installed = tapped
                && self.runner.run_ok(
                    &CommandSpec::new("brew")
                        .args(["install", "fvm"])
                        .timeout(INSTALL_TIMEOUT),
                );
            if installed && self.is_fvm_installed() {
                log_info!("[Flutter] {}", "FVM installed successfully via Homebrew!".green());
                return true;
            }
            log_warn!("[Flutter] Homebrew installation failed, trying official installer...");
        }

        log_info!("[Flutter] Installing FVM via official installer script...");
        let user = std::env::var("USER").unwrap_or_else(|_| {
            if self.deps.is_root() { "root".to_string() } else { String::new() }
        });
        let script = CommandSpec::shell(FVM_INSTALL_SCRIPT)
            .env("HOME", self.config.home_dir.display().to_string())
            .env("USER", user)
            .timeout(Duration::from_secs(300))
            .unchecked();
        if !self.runner.run_ok(&script) {
            log_error!("[Flutter] Failed to install FVM via official installer");
            return false;
        }

        let pub_cache_bin = self.config.pub_cache_bin_dir();
        add_to_path_for_multiple_users(&pub_cache_bin, &self.config.home_dir);
        if pub_cache_bin.is_dir() {
            prepend_to_session_path(&pub_cache_bin);
        }

        if self.is_fvm_installed() {
            log_info!("[Flutter] {}", "FVM installed successfully via official installer!".green());
            true
        } else {
            log_error!("[Flutter] FVM installer completed but FVM was not found");
            false
        }
    }

    /// Whether `fvm flutter --version` runs successfully.
    pub fn is_flutter_installed(&self) -> bool {
        self.is_fvm_installed()
            && self.runner.run_ok(
                &self
                    .fvm_flutter()
                    .arg("--version")
                    .timeout(Duration::from_secs(120))
                    .unchecked(),
            )
    }

    /// The active Flutter version: the marked row of `fvm list`, falling back to
    /// `frameworkVersion` from `fvm flutter --version --machine`.
    pub fn installed_version(&self) -> Option<String> {
        if !self.is_flutter_installed() {
            return None;
        }
        let list = self.runner.run(&self.fvm().arg("list").unchecked()).ok();
        if let Some(version) = list
            .filter(|out| out.success())
            .and_then(|out| parse_active_version(&out.stdout))
        {
            return Some(version);
        }

        let machine = self
            .runner
            .run(&self.fvm_flutter().args(["--version", "--machine"]).unchecked())
            .ok()?;
        if !machine.success() {
            return None;
        }
        match serde_json::from_str::<FlutterVersionInfo>(&machine.stdout) {
            Ok(info) => info.framework_version,
            Err(e) => {
                log_warn!("[Flutter] Could not determine Flutter version: {}", e);
                None
            }
        }
    }

    /// Release versions reported by `fvm releases`.
    pub fn list_available_versions(&self) -> Vec<String> {
        if !self.is_fvm_installed() {
            return Vec::new();
        }
        match self.runner.run(&self.fvm().arg("releases").timeout(Duration::from_secs(120)).unchecked()) {
            Ok(out) if out.success() => parse_releases(&out.stdout),
            Ok(_) => Vec::new(),
            Err(e) => {
                log_warn!("[Flutter] Could not list Flutter versions: {}", e);
                Vec::new()
            }
        }
    }

    /// Installs FVM if needed, then the configured Flutter version, and makes it the global default.
    pub fn install_flutter(&self) -> bool {
        if !self.install_fvm() {
            log_error!("[Flutter] Cannot install Flutter without FVM");
            return false;
        }
        if !self.deps.check_disk_space(REQUIRED_DISK_GB, &self.config.home_dir) {
            log_error!("[Flutter] Not enough disk space for Flutter installation");
            return false;
        }

        log_info!("[Flutter] Installing Flutter {} via FVM...", self.version.cyan());
        let install = self
            .fvm()
            .args(["install", self.version.as_str()])
            .timeout(INSTALL_TIMEOUT)
            .unchecked();
        if !self.runner.run_ok(&install) {
            log_error!("[Flutter] Failed to install Flutter {}", self.version);
            return false;
        }

        log_info!("[Flutter] Setting Flutter {} as global default...", self.version);
        if !self.runner.run_ok(&self.fvm().args(["global", self.version.as_str()]).unchecked()) {
            log_warn!("[Flutter] Could not set Flutter as global default");
        }

        if !self.is_flutter_installed() {
            log_error!("[Flutter] Flutter installation verification failed");
            return false;
        }
        log_info!("[Flutter] {}", format!("Flutter {} installed successfully via FVM!", self.version).green());
        true
    }

    /// Disables analytics, enables the configured platforms, precaches their artifacts,
    /// runs `flutter doctor` and puts the FVM binaries on `PATH`.
    pub fn configure_flutter(&self) -> bool {
        if !self.is_flutter_installed() {
            log_error!("[Flutter] Flutter is not installed");
            return false;
        }
        log_info!("[Flutter] Configuring Flutter...");
        match self.apply_configuration() {
            Ok(()) => {
                self.setup_fvm_path();
                true
            }
            Err(e) => {
                log_error!("[Flutter] Flutter configuration failed: {}", e);
                false
            }
        }
    }

    fn apply_configuration(&self) -> Result<(), CommandError> {
        self.runner.run(&self.fvm_flutter().args(["config", "--no-analytics"]))?;
        for flag in enable_flags(&self.config.platforms) {
            self.runner.run(&self.fvm_flutter().args(["config", flag]))?;
        }

        log_info!(
            "[Flutter] Pre-caching Flutter assets for {}...",
            self.config.platforms.join(", ").cyan()
        );
        self.runner.run(
            &self
                .fvm_flutter()
                .arg("precache")
                .args(precache_args(&self.config.platforms))
                .timeout(Duration::from_secs(300)),
        )?;

        self.run_doctor();
        Ok(())
    }

    /// Runs `flutter doctor`. A failing doctor is reported as a warning only.
    ///
    /// # Returns
    /// * `true` when the doctor passed without issues.
    pub fn run_doctor(&self) -> bool {
        log_info!("[Flutter] Running Flutter doctor...");
        let doctor = self
            .fvm_flutter()
            .args(["doctor", "--no-analytics"])
            .timeout(Duration::from_secs(60))
            .unchecked();
        if self.runner.run_ok(&doctor) {
            log_info!("[Flutter] {}", "Flutter doctor passed".green());
            true
        } else {
            log_warn!("[Flutter] Flutter doctor completed with warnings");
            false
        }
    }

    fn setup_fvm_path(&self) {
        let default_bin = self.config.flutter_bin_dir();
        if default_bin.exists() {
            add_to_path_for_multiple_users(&default_bin, &self.config.home_dir);
        }
        add_to_path_for_multiple_users(&self.config.pub_cache_bin_dir(), &self.config.home_dir);
    }

    /// Builds the project at `project_path` for each platform.
    ///
    /// # Returns
    /// * `false` when Flutter is missing or any build failed. Unknown platforms are skipped.
    pub fn build_project(&self, project_path: &Path, platforms: &[String]) -> bool {
        if !self.is_flutter_installed() {
            log_error!("[Flutter] Flutter is not installed");
            return false;
        }
        let active = flutter_semver(&self.version);
        let mut success = true;
        for platform in platforms {
            let attempts = build_attempts(platform, active.as_ref());
            if attempts.is_empty() {
                log_warn!("[Flutter] Unsupported platform: {}", platform.yellow());
                continue;
            }
            log_info!("[Flutter] Building for {}...", platform.cyan());
            let built = attempts.into_iter().enumerate().any(|(i, (args, timeout))| {
                if i > 0 {
                    log_warn!("[Flutter] Profile build failed, trying regular build...");
                }
                let spec = self
                    .fvm_flutter()
                    .args(args)
                    .cwd(project_path)
                    .timeout(timeout)
                    .unchecked();
                self.runner.run_ok(&spec)
            });
            if built {
                log_info!("[Flutter] {}", format!("Build for {platform} completed successfully").green());
            } else {
                log_warn!("[Flutter] Build for {} failed (expected for initial setup)", platform);
                success = false;
            }
        }
        success
    }

    /// Installs `version` if FVM does not list it yet, then makes it the global default.
    pub fn switch_version(&mut self, version: &str) -> bool {
        if !self.is_fvm_installed() {
            log_error!("[Flutter] FVM is not installed");
            return false;
        }
        log_info!("[Flutter] Switching to Flutter {}...", version.cyan());

        if let Ok(list) = self.runner.run(&self.fvm().arg("list").unchecked()) {
            if list.success() && !list.stdout.contains(version) {
                log_info!("[Flutter] Flutter {} not installed, installing now...", version);
                let install = self
                    .fvm()
                    .args(["install", version])
                    .timeout(INSTALL_TIMEOUT)
                    .unchecked();
                if !self.runner.run_ok(&install) {
                    log_error!("[Flutter] Failed to install Flutter {}", version);
                    return false;
                }
            }
        }

        if self.runner.run_ok(&self.fvm().args(["global", version]).unchecked()) {
            log_info!("[Flutter] {}", format!("Switched to Flutter {version}").green());
            self.version = version.to_string();
            true
        } else {
            log_error!("[Flutter] Failed to switch to Flutter {}", version);
            false
        }
    }

    pub fn is_melos_installed(&self) -> bool {
        self.runner.command_exists("melos") || self.config.pub_cache_bin_dir().join("melos").exists()
    }

    /// Activates melos globally with FVM's Dart.
    pub fn install_melos(&self) -> bool {
        if self.is_melos_installed() {
            log_info!("[Flutter] {}", "Melos already installed".green());
            return true;
        }
        log_info!("[Flutter] Installing Melos...");
        let spec = self
            .fvm()
            .args(["dart", "pub", "global", "activate", "melos"])
            .timeout(INSTALL_TIMEOUT)
            .unchecked();
        if self.runner.run_ok(&spec) {
            log_info!("[Flutter] {}", "Melos installed successfully".green());
            true
        } else {
            log_error!("[Flutter] Failed to install Melos");
            false
        }
    }

    /// First output line of `fvm --version`, `fvm flutter --version` and `fvm dart --version`.
    /// The probes are independent and share the configured worker pool.
    pub fn tool_versions(&self) -> Vec<(&'static str, Option<String>)> {
        let probes = [
            ("fvm", self.fvm().arg("--version")),
            ("flutter", self.fvm_flutter().arg("--version")),
            ("dart", self.fvm().args(["dart", "--version"])),
        ];
        let (names, specs): (Vec<&'static str>, Vec<CommandSpec>) = probes
            .into_iter()
            .map(|(name, spec)| (name, spec.timeout(Duration::from_secs(120)).unchecked()))
            .unzip();
        match run_commands(
            self.runner,
            specs,
            self.config.parallel_execution,
            self.config.max_parallel_jobs,
        ) {
            Ok(outputs) => names
                .into_iter()
                .zip(outputs)
                .map(|(name, out)| (name, if out.success() { out.first_line() } else { None }))
                .collect(),
            Err(e) => {
                log_warn!("[Flutter] Could not query tool versions: {}", e);
                names.into_iter().map(|name| (name, None)).collect()
            }
        }
    }
}

/// `flutter config` flags enabling the selected platforms.
pub fn enable_flags(platforms: &[String]) -> Vec<&'static str> {
    platforms
        .iter()
        .filter_map(|p| match p.as_str() {
            "web" => Some("--enable-web"),
            "linux" => Some("--enable-linux-desktop"),
            "macos" => Some("--enable-macos-desktop"),
            "windows" => Some("--enable-windows-desktop"),
            _ => None,
        })
        .collect()
}

/// `flutter precache` arguments: `--<p>` for every selected platform, then `--no-<p>` for the rest.
pub fn precache_args(platforms: &[String]) -> Vec<String> {
    let selected = |p: &&str| platforms.iter().any(|s| s == p);
    KNOWN_PLATFORMS
        .iter()
        .copied()
        .filter(selected)
        .map(|p| format!("--{p}"))
        .chain(
            KNOWN_PLATFORMS
                .iter()
                .copied()
                .filter(|p| !selected(p))
                .map(|p| format!("--no-{p}")),
        )
        .collect()
}

/// Build commands to try, in order, for `platform`. Empty for unsupported platforms.
///
/// Web first tries a CanvasKit profile build and falls back to a plain release build.
/// `--web-renderer` was removed in Flutter 3.29, so it is only passed to older pinned versions.
pub fn build_attempts(platform: &str, flutter: Option<&semver::Version>) -> Vec<(Vec<String>, Duration)> {
    let args = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    match platform {
        "web" => {
            let mut profile = args(&["build", "web", "--dart-define=FLUTTER_WEB_USE_SKIA=true"]);
            if flutter.is_some_and(|v| *v < semver::Version::new(3, 29, 0)) {
                profile.push("--web-renderer=canvaskit".to_string());
            }
            profile.push("--profile".to_string());
            vec![
                (profile, WEB_BUILD_TIMEOUT),
                (args(&["build", "web"]), WEB_BUILD_TIMEOUT),
            ]
        }
        "android" => vec![(args(&["build", "apk"]), BUILD_TIMEOUT)],
        "linux" | "macos" | "windows" => vec![(args(&["build", platform]), BUILD_TIMEOUT)],
        "ios" => vec![(args(&["build", "ios", "--no-codesign"]), BUILD_TIMEOUT)],
        _ => Vec::new(),
    }
}

/// Finds the version on the row `fvm list` marks as active (`→`, `*` or `●`).
pub fn parse_active_version(list_output: &str) -> Option<String> {
    const MARKERS: [char; 3] = ['→', '*', '●'];
    list_output
        .lines()
        .filter(|line| line.contains(MARKERS))
        .flat_map(|line| {
            line.split(|c: char| c.is_whitespace() || c == '│' || c == '|')
                .map(str::trim)
                .filter(|tok| !tok.is_empty() && !tok.contains(MARKERS))
                .find(|tok| tok.starts_with(|c: char| c.is_ascii_digit()))
        })
        .next()
        .map(str::to_string)
}

/// Version tokens from `fvm releases`: the first field of rows that start with a digit.
pub fn parse_releases(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| line.trim().trim_start_matches(['│', '|']).trim())
        .filter(|line| !line.starts_with("Flutter") && !line.starts_with("---"))
        .filter_map(|line| line.split(|c: char| c.is_whitespace() || c == '│' || c == '|').next())
        .filter(|tok| tok.starts_with(|c: char| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::executor::CommandOutput;
    use crate::libs::executor::fake::ScriptedRunner;
    use tempfile::tempdir;

    fn config(home: &Path) -> EnvironmentConfig {
        EnvironmentConfig::with_home(home.to_path_buf(), home.join("project"))
    }

    const ROOMY_DF: &str = "Filesystem 1K-blocks Used Available Use% Mounted on\n/dev/sda1 1 1 52428800 1% /\n";

    #[test]
    fn precache_includes_selected_and_excludes_the_rest() {
        let args = precache_args(&["web".to_string(), "android".to_string()]);
        assert_eq!(
            args,
            vec!["--android", "--web", "--no-ios", "--no-fuchsia", "--no-linux", "--no-macos", "--no-windows"]
        );
    }

    #[test]
    fn enable_flags_skip_mobile_platforms() {
        let platforms = ["android".to_string(), "web".to_string(), "linux".to_string()];
        assert_eq!(enable_flags(&platforms), vec!["--enable-web", "--enable-linux-desktop"]);
    }

    #[test]
    fn web_renderer_flag_only_for_old_versions() {
        let old = semver::Version::new(3, 24, 5);
        let new = semver::Version::new(3, 32, 0);
        assert!(build_attempts("web", Some(&old))[0].0.contains(&"--web-renderer=canvaskit".to_string()));
        assert!(!build_attempts("web", Some(&new))[0].0.contains(&"--web-renderer=canvaskit".to_string()));
        assert_eq!(build_attempts("web", None).len(), 2);
        assert!(build_attempts("tizen", None).is_empty());
        assert_eq!(build_attempts("ios", None)[0].0, vec!["build", "ios", "--no-codesign"]);
    }

    #[test]
    fn active_version_from_fvm_list_table() {
        let table = "┌─────────┬─────────┬────────┐\n│ Version │ Channel │ Global │\n├─────────┼─────────┼────────┤\n│ 3.29.2  │ stable  │        │\n│ 3.32.0  │ stable  │ ●      │\n└─────────┴─────────┴────────┘\n";
        assert_eq!(parse_active_version(table).as_deref(), Some("3.32.0"));
        assert_eq!(parse_active_version("→ 3.24.5\n  3.22.0\n").as_deref(), Some("3.24.5"));
        assert_eq!(parse_active_version("3.22.0\n"), None);
    }

    #[test]
    fn releases_keep_version_rows_only() {
        let output = "Flutter Releases\n---------------\n3.32.0  May 20, 2025  stable\n3.33.0-0.1.pre  beta\nChannel: stable\n";
        assert_eq!(parse_releases(output), vec!["3.32.0", "3.33.0-0.1.pre"]);
    }

    #[test]
    fn fvm_found_outside_path_is_added_to_session() {
        let home = tempdir().unwrap();
        let bin = home.path().join(".pub-cache/bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("fvm"), "#!/bin/sh\n").unwrap();

        let config = config(home.path());
        let runner = ScriptedRunner::new();
        assert!(FlutterManager::new(&config, &runner).is_fvm_installed());
        assert!(crate::libs::executor::session_path()
            .to_string_lossy()
            .contains(&*bin.to_string_lossy()));
    }

    #[test]
    fn install_flutter_runs_install_then_global() {
        let home = tempdir().unwrap();
        let config = config(home.path());
        let runner = ScriptedRunner::new()
            .with_commands(&["fvm"])
            .reply("df -k", CommandOutput::ok(ROOMY_DF));
        assert!(FlutterManager::new(&config, &runner).install_flutter());
        let calls = runner.calls();
        let install = calls.iter().position(|c| c == "fvm install 3.32.0").unwrap();
        let global = calls.iter().position(|c| c == "fvm global 3.32.0").unwrap();
        assert!(install < global);
    }

    #[test]
    fn install_flutter_fails_without_disk_space() {
        let home = tempdir().unwrap();
        let config = config(home.path());
        let tight = "Filesystem 1K-blocks Used Available Use% Mounted on\n/dev/sda1 1 1 1024 99% /\n";
        let runner = ScriptedRunner::new()
            .with_commands(&["fvm"])
            .reply("df -k", CommandOutput::ok(tight));
        assert!(!FlutterManager::new(&config, &runner).install_flutter());
        assert!(!runner.called("fvm install"));
    }

    #[test]
    fn install_flutter_fails_when_fvm_install_fails() {
        let home = tempdir().unwrap();
        let config = config(home.path());
        let runner = ScriptedRunner::new()
            .with_commands(&["fvm"])
            .reply("df -k", CommandOutput::ok(ROOMY_DF))
            .reply("fvm install", CommandOutput::failed(1, "download failed"));
        assert!(!FlutterManager::new(&config, &runner).install_flutter());
        assert!(!runner.called("fvm global"));
    }

    #[test]
    fn configure_stops_on_failed_config_command() {
        let home = tempdir().unwrap();
        let config = config(home.path());
        let runner = ScriptedRunner::new()
            .with_commands(&["fvm"])
            .reply("fvm flutter config --enable-web", CommandOutput::failed(1, "bad flag"));
        assert!(!FlutterManager::new(&config, &runner).configure_flutter());
        assert!(!runner.called("fvm flutter precache"));
    }

    #[test]
    fn build_project_reports_failures_but_continues() {
        let home = tempdir().unwrap();
        let config = config(home.path());
        let runner = ScriptedRunner::new()
            .with_commands(&["fvm"])
            .reply("fvm flutter build web", CommandOutput::failed(1, "web failed"));
        let platforms = vec!["web".to_string(), "tizen".to_string(), "android".to_string()];
        assert!(!FlutterManager::new(&config, &runner).build_project(home.path(), &platforms));
        assert!(runner.called("fvm flutter build apk"));
        assert_eq!(runner.calls().iter().filter(|c| c.starts_with("fvm flutter build web")).count(), 2);
    }

    #[test]
    fn switch_version_installs_missing_version() {
        let home = tempdir().unwrap();
        let config = config(home.path());
        let runner = ScriptedRunner::new()
            .with_commands(&["fvm"])
            .reply("fvm list", CommandOutput::ok("3.29.2\n"));
        let mut flutter = FlutterManager::new(&config, &runner);
        assert!(flutter.switch_version("3.24.5"));
        assert!(runner.called("fvm install 3.24.5"));
        assert_eq!(flutter.version(), "3.24.5");
    }

    #[test]
    fn web_build_follows_switched_version() {
        let home = tempdir().unwrap();
        let config = config(home.path());
        let runner = ScriptedRunner::new()
            .with_commands(&["fvm"])
            .reply("fvm list", CommandOutput::ok("3.24.5\n"));
        let mut flutter = FlutterManager::new(&config, &runner);
        assert!(flutter.switch_version("3.24.5"));
        assert!(flutter.build_project(home.path(), &["web".to_string()]));
        let web = runner.calls().into_iter().find(|c| c.starts_with("fvm flutter build web")).unwrap();
        assert!(web.contains("--web-renderer=canvaskit"));
    }

    #[test]
    fn doctor_warnings_do_not_fail_configuration() {
        let home = tempdir().unwrap();
        let config = config(home.path());
        let runner = ScriptedRunner::new()
            .with_commands(&["fvm"])
            .reply("fvm flutter doctor", CommandOutput::failed(1, "Android toolchain missing"));
        let flutter = FlutterManager::new(&config, &runner);
        assert!(!flutter.run_doctor());
        assert!(flutter.configure_flutter());
    }

    #[test]
    fn melos_detected_in_pub_cache() {
        let home = tempdir().unwrap();
        let config = config(home.path());
        let runner = ScriptedRunner::new();
        let flutter = FlutterManager::new(&config, &runner);
        assert!(!flutter.is_melos_installed());
        std::fs::create_dir_all(config.pub_cache_bin_dir()).unwrap();
        std::fs::write(config.pub_cache_bin_dir().join("melos"), "").unwrap();
        assert!(flutter.is_melos_installed());
    }

    #[test]
    fn tool_versions_keep_probe_order() {
        let home = tempdir().unwrap();
        let config = config(home.path());
        let runner = ScriptedRunner::new()
            .reply("fvm --version", CommandOutput::ok("3.2.1\n"))
            .reply("fvm flutter --version", CommandOutput::ok("Flutter 3.32.0 • channel stable\n"))
            .reply("fvm dart --version", CommandOutput::failed(127, "dart: not found"));
        let versions = FlutterManager::new(&config, &runner).tool_versions();
        assert_eq!(
            versions,
            vec![
                ("fvm", Some("3.2.1".to_string())),
                ("flutter", Some("Flutter 3.32.0 • channel stable".to_string())),
                ("dart", None),
            ]
        );
    }
}
