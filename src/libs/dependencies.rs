//! System package detection and installation.
//!
//! Dependencies are named with their Debian package names (`xz-utils`, `libglu1-mesa`, ...)
//! and mapped to the local package manager's names at install time.

use crate::libs::executor::{CommandRunner, CommandSpec};
use crate::{log_debug, log_error, log_info, log_warn};
use colored::Colorize;
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// Upper bound for a single package manager invocation.
const INSTALL_TIMEOUT: Duration = Duration::from_secs(1800);

/// Supported system package managers, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Brew,
    Pacman,
}

impl PackageManager {
    pub const ALL: [PackageManager; 3] = [PackageManager::Apt, PackageManager::Brew, PackageManager::Pacman];

    /// Executable used to detect this package manager.
    pub fn binary(self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Brew => "brew",
            PackageManager::Pacman => "pacman",
        }
    }

    /// Maps a generic (Debian) dependency name to this package manager's package.
    ///
    /// # Returns
    /// * `Some(name)`: the package to install. Unmapped names pass through unchanged.
    /// * `None`: the dependency is not needed on this platform.
    pub fn package_name(self, generic: &str) -> Option<&str> {
        let mapped = match (self, generic) {
            (PackageManager::Brew, "xz-utils") => "xz",
            (PackageManager::Brew, "libglu1-mesa") => "",
            (PackageManager::Brew, "build-essential") => "",
            (PackageManager::Brew, "nodejs") => "node",
            (PackageManager::Pacman, "xz-utils") => "xz",
            (PackageManager::Pacman, "libglu1-mesa") => "glu",
            (PackageManager::Pacman, "build-essential") => "base-devel",
            (_, other) => other,
        };
        (!mapped.is_empty()).then_some(mapped)
    }

    /// Command that exits 0 when `package` is installed.
    pub fn query_spec(self, package: &str) -> CommandSpec {
        let spec = match self {
            PackageManager::Apt => CommandSpec::new("dpkg").args(["-s", package]),
            PackageManager::Brew => CommandSpec::new("brew").args(["list", package]),
            PackageManager::Pacman => CommandSpec::new("pacman").args(["-Q", package]),
        };
        spec.unchecked().timeout(Duration::from_secs(60))
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PackageManager::Apt => write!(f, "apt"),
            PackageManager::Brew => write!(f, "brew"),
            PackageManager::Pacman => write!(f, "pacman"),
        }
    }
}

/// Basic facts about the host, as reported by `uname` and the distribution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemInfo {
    pub os: Option<String>,
    pub arch: Option<String>,
    pub distro: Option<String>,
}

/// Checks for and installs system packages through whichever package manager is present.
pub struct DependencyManager<'a> {
    runner: &'a dyn CommandRunner,
    root: OnceLock<bool>,
}

impl<'a> DependencyManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self {
            runner,
            root: OnceLock::new(),
        }
    }

    /// First available package manager among apt, brew and pacman.
    pub fn detect_package_manager(&self) -> Option<PackageManager> {
        PackageManager::ALL
            .into_iter()
            .find(|pm| self.runner.command_exists(pm.binary()))
    }

    /// Whether the process runs as root, in which case `sudo` is not needed.
    pub fn is_root(&self) -> bool {
        *self.root.get_or_init(|| {
            self.runner
                .run(&CommandSpec::new("id").arg("-u").unchecked())
                .map(|out| out.stdout.trim() == "0")
                .unwrap_or(false)
        })
    }

    /// Prefixes `program` with `sudo` unless already root.
    fn privileged(&self, program: &str) -> CommandSpec {
        if self.is_root() {
            CommandSpec::new(program)
        } else {
            CommandSpec::new("sudo").arg(program)
        }
    }

    /// Reports which dependencies are present, in input order.
    pub fn check_dependencies(&self, deps: &[&str]) -> Vec<(String, bool)> {
        let pm = self.detect_package_manager();
        deps.iter()
            .map(|dep| {
                let installed = match *dep {
                    "curl" | "git" | "unzip" | "zip" | "npm" => self.runner.command_exists(dep),
                    "xz-utils" => self.runner.command_exists("xz"),
                    "nodejs" => self.runner.command_exists("node"),
                    "libglu1-mesa" if pm == Some(PackageManager::Brew) => true,
                    "libglu1-mesa" => self.is_package_installed(pm, dep),
                    other => self.runner.command_exists(other) || self.is_package_installed(pm, other),
                };
                log_debug!("[Deps] {} installed: {}", dep, installed);
                (dep.to_string(), installed)
            })
            .collect()
    }

    fn is_package_installed(&self, pm: Option<PackageManager>, package: &str) -> bool {
        let Some(pm) = pm else { return false };
        let Some(name) = pm.package_name(package) else {
            return true;
        };
        self.runner.run_ok(&pm.query_spec(name))
    }

    /// Installs whichever of `deps` are missing.
    ///
    /// # Returns
    /// * `true` when nothing was missing or the package manager reported success.
    /// * `false` when no package manager is available or installation failed.
    pub fn install_dependencies(&self, deps: &[&str]) -> bool {
        let missing: Vec<String> = self
            .check_dependencies(deps)
            .into_iter()
            .filter(|(_, installed)| !installed)
            .map(|(dep, _)| dep)
            .collect();

        if missing.is_empty() {
            log_info!("[Deps] {}", "All required dependencies are already installed.".green());
            return true;
        }
        log_info!("[Deps] Installing missing dependencies: {}", missing.join(", ").cyan());

        let Some(pm) = self.detect_package_manager() else {
            log_error!("[Deps] No supported package manager found (apt, brew or pacman).");
            return false;
        };

        let packages: Vec<String> = missing
            .iter()
            .filter_map(|dep| pm.package_name(dep))
            .map(str::to_string)
            .collect();
        if packages.is_empty() {
            log_info!("[Deps] No packages need to be installed on this platform.");
            return true;
        }

        match pm {
            PackageManager::Apt => self.install_with_apt(&packages),
            PackageManager::Brew => self.install_with_brew(&packages),
            PackageManager::Pacman => self.install_with_pacman(&packages),
        }
    }

    fn install_with_apt(&self, packages: &[String]) -> bool {
        log_info!("[Deps] Updating package list...");
        let update = self.privileged("apt-get").args(["update", "-y"]).timeout(INSTALL_TIMEOUT);
        let install = self
            .privileged("apt-get")
            .args(["install", "-y"])
            .args(packages.iter().cloned())
            .env("DEBIAN_FRONTEND", "noninteractive")
            .timeout(INSTALL_TIMEOUT);
        self.run_all("APT", &[update, install])
    }

    fn install_with_brew(&self, packages: &[String]) -> bool {
        for package in packages {
            log_info!("[Deps] Installing {} with Homebrew...", package.cyan());
            let spec = CommandSpec::new("brew")
                .args(["install", package.as_str()])
                .unchecked()
                .timeout(INSTALL_TIMEOUT);
            if !self.runner.run_ok(&spec) {
                log_warn!("[Deps] Could not install {} via Homebrew", package.yellow());
            }
        }
        true
    }

    fn install_with_pacman(&self, packages: &[String]) -> bool {
        log_info!("[Deps] Updating package database...");
        let sync = self.privileged("pacman").arg("-Sy").timeout(INSTALL_TIMEOUT);
        let install = self
            .privileged("pacman")
            .args(["-S", "--noconfirm"])
            .args(packages.iter().cloned())
            .timeout(INSTALL_TIMEOUT);
        self.run_all("Pacman", &[sync, install])
    }

    fn run_all(&self, label: &str, specs: &[CommandSpec]) -> bool {
        for spec in specs {
            if let Err(e) = self.runner.run(spec) {
                log_error!("[Deps] {} installation failed: {}", label, e);
                return false;
            }
        }
        true
    }

    /// Whether `path` has at least `required_gb` gigabytes free.
    /// When `df` fails or its output cannot be parsed, there is assumed to be enough space.
    pub fn check_disk_space(&self, required_gb: f64, path: &Path) -> bool {
        let spec = CommandSpec::new("df")
            .arg("-k")
            .arg(path.to_string_lossy())
            .timeout(Duration::from_secs(30));
        let available_kb = match self.runner.run(&spec) {
            Ok(out) => parse_df_available_kb(&out.stdout),
            Err(e) => {
                log_warn!("[Deps] Could not check disk space: {}", e);
                return true;
            }
        };
        let Some(kb) = available_kb else {
            log_warn!("[Deps] Could not parse disk space for {}", path.display());
            return true;
        };
        let available_gb = kb as f64 / (1024.0 * 1024.0);
        log_info!("[Deps] Available space: {:.1}GB, Required: {}GB", available_gb, required_gb);
        available_gb >= required_gb
    }

    /// Collects OS, architecture and (on Linux) the distribution name.
    pub fn system_info(&self) -> SystemInfo {
        let first_line = |spec: CommandSpec| {
            self.runner
                .run(&spec.unchecked())
                .ok()
                .filter(|out| out.success())
                .map(|out| out.stdout.trim().trim_matches('"').to_string())
                .filter(|s| !s.is_empty())
        };

        let os = first_line(CommandSpec::new("uname").arg("-s"));
        let arch = first_line(CommandSpec::new("uname").arg("-m"));
        let distro = if os.as_deref() == Some("Linux") {
            first_line(CommandSpec::new("lsb_release").args(["-d", "-s"])).or_else(|| {
                std::fs::read_to_string("/etc/os-release")
                    .ok()
                    .and_then(|contents| parse_pretty_name(&contents))
            })
        } else {
            None
        };
        SystemInfo { os, arch, distro }
    }
}

/// Extracts the "Available" column (KiB) from `df -k` output.
pub fn parse_df_available_kb(stdout: &str) -> Option<u64> {
    stdout.lines().nth(1)?.split_whitespace().nth(3)?.parse().ok()
}

/// Reads `PRETTY_NAME` from the contents of `/etc/os-release`.
pub fn parse_pretty_name(os_release: &str) -> Option<String> {
    os_release
        .lines()
        .find_map(|line| line.strip_prefix("PRETTY_NAME="))
        .map(|v| v.trim().trim_matches('"').to_string())
        .filter(|v| !v.is_empty())
}
