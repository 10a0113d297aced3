//! Android SDK provisioning for Flutter's Android builds.
//!
//! Google's command-line tools are downloaded into `<android_home>/cmdline-tools/latest`,
//! `sdkmanager` then installs the platform tools, one platform and one build-tools release.

use crate::libs::dependencies::DependencyManager;
use crate::libs::executor::{CommandRunner, CommandSpec};
use crate::libs::shell_profile::{add_to_path, setup_environment_variables};
use crate::libs::utilities::assets::download_file;
use crate::libs::utilities::compression::extract_zip;
use crate::schemas::environment::EnvironmentConfig;
use crate::{log_debug, log_error, log_info, log_warn};
use colored::Colorize;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// Build number of the command-line tools release that is downloaded.
pub const CMDLINE_TOOLS_BUILD: &str = "11076708";
const REPOSITORY_URL: &str = "https://dl.google.com/android/repository";
const JAVA_PACKAGE: &str = "openjdk-17-jdk";
const LICENSE_TIMEOUT: Duration = Duration::from_secs(60);
const PACKAGE_TIMEOUT: Duration = Duration::from_secs(300);

/// Snapshot of the Android toolchain reported by `android-status`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AndroidInfo {
    pub sdk_installed: bool,
    pub android_home: Option<PathBuf>,
    pub sdk_version: Option<String>,
    pub java_installed: bool,
    pub java_version: Option<String>,
}

impl AndroidInfo {
    /// `(label, value)` rows in display order.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        let status = |installed: bool| {
            let label = if installed { "installed" } else { "not_installed" };
            label.to_string()
        };
        let mut rows = vec![("status", status(self.sdk_installed))];
        if let Some(home) = &self.android_home {
            rows.push(("android_home", home.display().to_string()));
        }
        if let Some(version) = &self.sdk_version {
            rows.push(("sdk_version", version.clone()));
        }
        rows.push(("java_status", status(self.java_installed)));
        if let Some(version) = &self.java_version {
            rows.push(("java_version", version.clone()));
        }
        rows
    }
}

pub struct AndroidManager<'a> {
    config: &'a EnvironmentConfig,
    runner: &'a dyn CommandRunner,
    deps: DependencyManager<'a>,
}

impl<'a> AndroidManager<'a> {
    pub fn new(config: &'a EnvironmentConfig, runner: &'a dyn CommandRunner) -> Self {
        Self {
            config,
            runner,
            deps: DependencyManager::new(runner),
        }
    }

    pub fn android_home(&self) -> &Path {
        &self.config.android_home
    }

    fn cmdline_tools_dir(&self) -> PathBuf {
        self.android_home().join("cmdline-tools").join("latest")
    }

    fn platform_tools_dir(&self) -> PathBuf {
        self.android_home().join("platform-tools")
    }

    fn tools_dir(&self) -> PathBuf {
        self.android_home().join("tools")
    }

    fn sdkmanager(&self) -> PathBuf {
        self.cmdline_tools_dir().join("bin").join("sdkmanager")
    }

    fn sdkmanager_command(&self) -> CommandSpec {
        let home = self.android_home().display().to_string();
        CommandSpec::new(self.sdkmanager().display().to_string())
            .env("ANDROID_HOME", home.clone())
            .env("ANDROID_SDK_ROOT", home)
    }

    pub fn is_android_sdk_installed(&self) -> bool {
        self.android_home().is_dir() && self.cmdline_tools_dir().is_dir() && self.sdkmanager().exists()
    }

    pub fn is_java_installed(&self) -> bool {
        self.runner.command_exists("java") && self.runner.command_exists("javac")
    }

    /// The quoted version from `java -version`, e.g. `17.0.11`.
    pub fn java_version(&self) -> Option<String> {
        if !self.is_java_installed() {
            return None;
        }
        let out = self
            .runner
            .run(&CommandSpec::new("java").arg("-version").unchecked())
            .ok()
            .filter(|out| out.success())?;
        // The JVM prints its version banner on stderr.
        let banner = if out.stderr.trim().is_empty() { &out.stdout } else { &out.stderr };
        parse_java_version(banner).or_else(|| out.first_line())
    }

    fn os_name(&self) -> String {
        self.deps.system_info().os.unwrap_or_default().to_lowercase()
    }

    /// Installs OpenJDK 17: the system package manager on Linux, Homebrew on macOS.
    pub fn install_java(&self) -> bool {
        log_info!("[Android] Installing Java Development Kit...");
        match self.os_name().as_str() {
            "linux" => {
                let ok = self.deps.install_dependencies(&[JAVA_PACKAGE]);
                if ok {
                    log_info!("[Android] {}", "Java Development Kit installed".green());
                } else {
                    log_error!("[Android] Failed to install Java Development Kit");
                }
                ok
            }
            "darwin" => {
                if self.runner.command_exists("brew")
                    && self.runner.run_ok(
                        &CommandSpec::new("brew")
                            .args(["install", "openjdk@17"])
                            .timeout(PACKAGE_TIMEOUT)
                            .unchecked(),
                    )
                {
                    let linked = self.runner.run_ok(
                        &CommandSpec::new("sudo")
                            .args([
                                "ln",
                                "-sfn",
                                "/opt/homebrew/opt/openjdk@17/libexec/openjdk.jdk",
                                "/Library/Java/JavaVirtualMachines/openjdk-17.jdk",
                            ])
                            .unchecked(),
                    );
                    if !linked {
                        log_warn!("[Android] Could not link openjdk@17 into /Library/Java/JavaVirtualMachines");
                    }
                    log_info!("[Android] {}", "Java installed via Homebrew".green());
                    return true;
                }
                log_warn!("[Android] Please install Java manually on macOS");
                log_info!("[Android] Visit: {}", "https://adoptium.net/temurin/releases/".cyan());
                false
            }
            other => {
                log_warn!("[Android] Unsupported OS for automatic Java installation: {}", other);
                false
            }
        }
    }

    pub fn cmdline_tools_url(&self) -> String {
        cmdline_tools_url_for(&self.os_name())
    }

    /// Downloads the command-line tools archive and installs it as `cmdline-tools/latest`.
    pub fn download_and_extract_cmdline_tools(&self) -> bool {
        log_info!("[Android] Downloading Android SDK command line tools...");
        let url = self.cmdline_tools_url();
        let scratch = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                log_error!("[Android] Could not create a temporary directory: {}", e);
                return false;
            }
        };
        let archive = scratch.path().join("cmdline-tools.zip");
        if let Err(e) = download_file(&url, &archive) {
            log_error!("[Android] Failed to download command line tools from {}: {}", url, e);
            return false;
        }

        log_info!("[Android] Extracting command line tools...");
        let unpacked = scratch.path().join("unpacked");
        if let Err(e) = extract_zip(&archive, &unpacked) {
            log_error!("[Android] Failed to extract command line tools: {}", e);
            return false;
        }
        match install_cmdline_tools(&unpacked, &self.cmdline_tools_dir()) {
            Ok(()) => {
                log_info!("[Android] {}", "Android command line tools extracted".green());
                true
            }
            Err(e) => {
                log_error!("[Android] {}", e);
                false
            }
        }
    }

    pub fn environment_variables(&self) -> Vec<(String, String)> {
        let home = self.android_home().display().to_string();
        vec![
            ("ANDROID_HOME".to_string(), home.clone()),
            ("ANDROID_SDK_ROOT".to_string(), home),
        ]
    }

    /// Exports the SDK variables and puts the SDK tools on `PATH` in the shell profile.
    pub fn setup_environment_variables(&self) -> bool {
        log_info!("[Android] Setting up Android environment variables...");
        let profile = self.config.shell_profile();
        if !setup_environment_variables(&self.environment_variables(), &profile) {
            log_warn!("[Android] Failed to export ANDROID_HOME in {}", profile.display());
        }
        for dir in [
            self.cmdline_tools_dir().join("bin"),
            self.platform_tools_dir(),
            self.tools_dir().join("bin"),
        ] {
            if !add_to_path(&dir, &profile) {
                log_warn!("[Android] Failed to add {} to PATH", dir.display());
            }
        }
        log_info!("[Android] {}", "Android environment variables configured".green());
        true
    }

    /// Packages installed through `sdkmanager`.
    pub fn sdk_packages(&self) -> Vec<String> {
        vec![
            "platform-tools".to_string(),
            format!("platforms;android-{}", self.config.android_api_level),
            format!("build-tools;{}", self.config.android_build_tools_version),
        ]
    }

    /// Accepts the SDK licences and installs `sdk_packages`.
    /// A package that fails to install is reported but does not fail the step.
    pub fn install_sdk_packages(&self) -> bool {
        log_info!("[Android] Accepting Android SDK licenses...");
        let licenses = self
            .sdkmanager_command()
            .arg("--licenses")
            .stdin("y\n".repeat(20))
            .timeout(LICENSE_TIMEOUT)
            .unchecked();
        if !self.runner.run_ok(&licenses) {
            log_warn!("[Android] sdkmanager --licenses did not complete cleanly");
        }

        for package in self.sdk_packages() {
            log_info!("[Android] Installing {}...", package.cyan());
            let spec = self
                .sdkmanager_command()
                .arg(package.as_str())
                .timeout(PACKAGE_TIMEOUT)
                .unchecked();
            if self.runner.run_ok(&spec) {
                log_info!("[Android] {} installed", package.green());
            } else {
                log_warn!("[Android] Failed to install {}", package);
            }
        }
        log_info!("[Android] Android SDK packages installation completed");
        true
    }

    pub fn verify_installation(&self) -> bool {
        log_info!("[Android] Verifying Android SDK installation...");
        for tool in [self.sdkmanager(), self.platform_tools_dir().join("adb")] {
            if !tool.exists() {
                log_error!("[Android] Missing tool: {}", tool.display());
                return false;
            }
        }
        for (dir, what) in [("platforms", "platforms"), ("build-tools", "build tools")] {
            if !has_entries(&self.android_home().join(dir)) {
                log_error!("[Android] No Android {} installed", what);
                return false;
            }
        }
        log_info!("[Android] {}", "Android SDK installation verified".green());
        true
    }

    /// Full installation: Java, command-line tools, profile variables, packages, verification.
    pub fn install_android_sdk(&self) -> bool {
        log_info!("[Android] {}", "Installing Android SDK...".bold());
        if self.is_android_sdk_installed() {
            log_info!("[Android] {}", "Android SDK already installed".green());
            return self.verify_installation();
        }

        if self.is_java_installed() {
            log_info!(
                "[Android] Java already installed: {}",
                self.java_version().unwrap_or_else(|| "unknown".into()).green()
            );
        } else if !self.install_java() {
            log_error!("[Android] Java installation failed");
            return false;
        }

        self.download_and_extract_cmdline_tools()
            && self.setup_environment_variables()
            && self.install_sdk_packages()
            && self.verify_installation()
    }

    pub fn android_info(&self) -> AndroidInfo {
        let mut info = AndroidInfo::default();
        if self.is_android_sdk_installed() {
            info.sdk_installed = true;
            info.android_home = Some(self.android_home().to_path_buf());
            info.sdk_version = self
                .runner
                .run(&self.sdkmanager_command().arg("--version").unchecked())
                .ok()
                .filter(|out| out.success())
                .map(|out| out.stdout.trim().to_string())
                .filter(|v| !v.is_empty());
        }
        info.java_installed = self.is_java_installed();
        if info.java_installed {
            info.java_version = self.java_version();
        }
        info
    }
}

/// Download URL of the command-line tools for an OS name as reported by `uname -s`.
/// Unknown systems get the Linux build.
pub fn cmdline_tools_url_for(os: &str) -> String {
    let flavour = match os.to_lowercase().as_str() {
        "darwin" => "mac",
        "windows" => "win",
        _ => "linux",
    };
    format!("{REPOSITORY_URL}/commandlinetools-{flavour}-{CMDLINE_TOOLS_BUILD}_latest.zip")
}

/// Extracts `X` from a `version "X"` line.
pub fn parse_java_version(banner: &str) -> Option<String> {
    banner
        .lines()
        .filter(|line| line.to_lowercase().contains("version"))
        .find_map(|line| {
            let rest = &line[line.find("version \"")? + "version \"".len()..];
            rest.find('"').map(|end| rest[..end].to_string())
        })
}

/// Moves the directory containing `bin/sdkmanager` found under `unpacked` to `target`.
fn install_cmdline_tools(unpacked: &Path, target: &Path) -> Result<(), String> {
    let source = WalkDir::new(unpacked)
        .into_iter()
        .filter_map(Result::ok)
        .find(|entry| {
            entry.file_name() == "sdkmanager"
                && entry.path().parent().and_then(Path::file_name) == Some(OsStr::new("bin"))
        })
        .and_then(|entry| entry.path().parent()?.parent().map(Path::to_path_buf))
        .ok_or_else(|| "SDK manager not found after extraction".to_string())?;
    log_debug!("[Android] Found command line tools at {}", source.display());

    if target.exists() {
        fs::remove_dir_all(target).map_err(|e| format!("Could not replace {}: {}", target.display(), e))?;
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| format!("Could not create {}: {}", parent.display(), e))?;
    }
    // The scratch directory may sit on another filesystem, where rename fails.
    if fs::rename(&source, target).is_err() {
        copy_dir(&source, target).map_err(|e| format!("Could not copy command line tools: {e}"))?;
    }
    if target.join("bin").join("sdkmanager").exists() {
        Ok(())
    } else {
        Err("SDK manager not found after extraction".to_string())
    }
}

fn copy_dir(src: &Path, dest: &Path) -> std::io::Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(std::io::Error::other)?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let to = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&to)?;
        } else {
            fs::copy(entry.path(), &to)?;
        }
    }
    Ok(())
}

fn has_entries(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::executor::CommandOutput;
    use crate::libs::executor::fake::ScriptedRunner;
    use tempfile::tempdir;

    fn config_in(home: &Path) -> EnvironmentConfig {
        EnvironmentConfig::with_home(home.to_path_buf(), home.to_path_buf())
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn cmdline_tools_url_per_os() {
        assert_eq!(
            cmdline_tools_url_for("Linux"),
            "https://dl.google.com/android/repository/commandlinetools-linux-11076708_latest.zip"
        );
        assert!(cmdline_tools_url_for("Darwin").contains("commandlinetools-mac-"));
        assert!(cmdline_tools_url_for("FreeBSD").contains("commandlinetools-linux-"));
    }

    #[test]
    fn java_version_from_banner() {
        let banner = "openjdk version \"17.0.11\" 2024-04-16\nOpenJDK Runtime Environment (build 17.0.11+9)";
        assert_eq!(parse_java_version(banner).as_deref(), Some("17.0.11"));
        assert_eq!(parse_java_version("java 1.8").as_deref(), None);
    }

    #[test]
    fn java_version_is_read_from_stderr() {
        let runner = ScriptedRunner::new().with_commands(&["java", "javac"]).reply(
            "java -version",
            CommandOutput {
                code: 0,
                stdout: String::new(),
                stderr: "openjdk version \"17.0.2\" 2022-01-18\n".into(),
            },
        );
        let home = tempdir().unwrap();
        let config = config_in(home.path());
        let android = AndroidManager::new(&config, &runner);
        assert_eq!(android.java_version().as_deref(), Some("17.0.2"));
    }

    #[test]
    fn sdk_packages_follow_config() {
        let home = tempdir().unwrap();
        let mut config = config_in(home.path());
        config.android_api_level = "34".into();
        config.android_build_tools_version = "34.0.0".into();
        let runner = ScriptedRunner::new();
        let android = AndroidManager::new(&config, &runner);
        assert_eq!(
            android.sdk_packages(),
            vec!["platform-tools", "platforms;android-34", "build-tools;34.0.0"]
        );
    }

    #[test]
    fn licenses_are_accepted_through_stdin_and_package_failures_tolerated() {
        let home = tempdir().unwrap();
        let config = config_in(home.path());
        let sdkmanager = config
            .android_home
            .join("cmdline-tools/latest/bin/sdkmanager")
            .display()
            .to_string();
        let runner = ScriptedRunner::new()
            .reply(&format!("{sdkmanager} build-tools"), CommandOutput::failed(1, "network"));
        let android = AndroidManager::new(&config, &runner);
        assert!(android.install_sdk_packages());

        let calls = runner.calls();
        assert_eq!(calls[0], format!("{sdkmanager} --licenses"));
        assert!(calls.contains(&format!("{sdkmanager} platforms;android-35")));
        assert_eq!(calls.len(), 4);
    }

    #[test]
    fn verify_requires_tools_and_packages() {
        let home = tempdir().unwrap();
        let config = config_in(home.path());
        let runner = ScriptedRunner::new();
        let android = AndroidManager::new(&config, &runner);
        let sdk = config.android_home.clone();

        touch(&sdk.join("cmdline-tools/latest/bin/sdkmanager"));
        touch(&sdk.join("platform-tools/adb"));
        assert!(android.is_android_sdk_installed());
        assert!(!android.verify_installation());

        touch(&sdk.join("platforms/android-35/android.jar"));
        touch(&sdk.join("build-tools/35.0.1/aapt"));
        assert!(android.verify_installation());
    }

    #[test]
    fn installed_sdk_skips_download() {
        let home = tempdir().unwrap();
        let config = config_in(home.path());
        let sdk = config.android_home.clone();
        for file in [
            "cmdline-tools/latest/bin/sdkmanager",
            "platform-tools/adb",
            "platforms/android-35/android.jar",
            "build-tools/35.0.1/aapt",
        ] {
            touch(&sdk.join(file));
        }
        let runner = ScriptedRunner::new();
        assert!(AndroidManager::new(&config, &runner).install_android_sdk());
        assert!(!runner.called("java"));
    }

    #[test]
    fn extracted_tools_move_to_latest() {
        let scratch = tempdir().unwrap();
        let unpacked = scratch.path().join("unpacked");
        touch(&unpacked.join("cmdline-tools/bin/sdkmanager"));
        touch(&unpacked.join("cmdline-tools/lib/sdkmanager-classpath.jar"));

        let sdk = tempdir().unwrap();
        let target = sdk.path().join("cmdline-tools/latest");
        install_cmdline_tools(&unpacked, &target).unwrap();
        assert!(target.join("bin/sdkmanager").is_file());
        assert!(target.join("lib/sdkmanager-classpath.jar").is_file());
    }

    #[test]
    fn missing_sdkmanager_is_an_error() {
        let scratch = tempdir().unwrap();
        touch(&scratch.path().join("cmdline-tools/README"));
        let target = scratch.path().join("sdk/cmdline-tools/latest");
        assert!(install_cmdline_tools(scratch.path(), &target).is_err());
    }

    #[test]
    fn info_rows_report_missing_sdk() {
        let home = tempdir().unwrap();
        let config = config_in(home.path());
        let runner = ScriptedRunner::new();
        let info = AndroidManager::new(&config, &runner).android_info();
        assert_eq!(
            info.rows(),
            vec![
                ("status", "not_installed".to_string()),
                ("java_status", "not_installed".to_string()),
            ]
        );
    }
}
