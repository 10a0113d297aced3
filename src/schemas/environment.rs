//! The configuration record that drives a setup run.
//!
//! `EnvironmentConfig` is built once at start-up from, in increasing order of
//! precedence: built-in defaults, the optional YAML config file, environment
//! variables, and finally CLI flags. It is then shared read-only by every manager.

use crate::cli::type_enums::{InstallMethod, InstallType, KNOWN_PLATFORMS, parse_platform_list};
use crate::errors::ConfigError;
use crate::schemas::file_config::FileConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Raw gist hosting the setup script and the AGENTS.md guide.
pub const DEFAULT_GIST_BASE_URL: &str =
    "https://gist.githubusercontent.com/CharlVS/14233fff7e9b3d66a7268d578cc34b36/raw";
/// Plain-text dump of the KDF API reference.
pub const DEFAULT_KDF_API_DOCS_URL: &str = "https://raw.githubusercontent.com/KomodoPlatform/komodo-docs-mdx/refs/heads/dev/data-for-gpts/komodefi-api/all-api-content.txt";
pub const DEFAULT_REMOTE_BASE_URL: &str = "https://github.com/KomodoPlatform";
pub const DEFAULT_FLUTTER_VERSION: &str = "3.32.0";

/// Configuration settings for the environment setup.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentConfig {
    // Script configuration
    pub script_version: String,
    pub auto_update_script: bool,
    pub skip_recursive_update: bool,
    /// Expected upper bound for a full run, in seconds. Used for reporting only.
    pub max_execution_time: u64,

    // Parallel execution settings
    pub parallel_execution: bool,
    pub max_parallel_jobs: usize,

    // Flutter configuration
    pub flutter_version: String,
    pub flutter_install_method: InstallMethod,
    pub install_type: InstallType,
    pub platforms: Vec<String>,

    // Android configuration
    pub install_android_sdk: bool,
    pub android_api_level: String,
    pub android_build_tools_version: String,

    // Git configuration
    pub fetch_all_remote_branches: bool,
    pub remote_base_url: String,

    // Documentation fetching
    pub should_fetch_agents_docs: bool,
    pub should_fetch_kdf_api_docs: bool,
    pub gist_base_url: String,
    pub kdf_api_docs_url: String,

    // Paths
    pub home_dir: PathBuf,
    pub flutter_dir: PathBuf,
    pub fvm_dir: PathBuf,
    pub android_home: PathBuf,
    pub initial_dir: PathBuf,
    /// Per-user state directory holding `config.yaml` and bundled `scripts/`.
    pub app_dir: PathBuf,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let initial_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::with_home(home_dir, initial_dir)
    }
}

impl EnvironmentConfig {
    /// Builds the default configuration rooted at an explicit home directory.
    /// Every home-relative path (FVM, Flutter, Android SDK, app dir) is derived from `home_dir`.
    pub fn with_home(home_dir: PathBuf, initial_dir: PathBuf) -> Self {
        Self {
            script_version: env!("CARGO_PKG_VERSION").to_string(),
            auto_update_script: false,
            skip_recursive_update: false,
            max_execution_time: 300,
            parallel_execution: true,
            max_parallel_jobs: default_parallel_jobs(),
            flutter_version: DEFAULT_FLUTTER_VERSION.to_string(),
            flutter_install_method: InstallMethod::Precompiled,
            install_type: InstallType::All,
            platforms: vec!["web".to_string(), "android".to_string()],
            install_android_sdk: true,
            android_api_level: "35".to_string(),
            android_build_tools_version: "35.0.1".to_string(),
            fetch_all_remote_branches: true,
            remote_base_url: DEFAULT_REMOTE_BASE_URL.to_string(),
            should_fetch_agents_docs: true,
            should_fetch_kdf_api_docs: false,
            gist_base_url: DEFAULT_GIST_BASE_URL.to_string(),
            kdf_api_docs_url: DEFAULT_KDF_API_DOCS_URL.to_string(),
            flutter_dir: home_dir.join("flutter"),
            fvm_dir: home_dir.join(".fvm"),
            android_home: home_dir.join("Android").join("Sdk"),
            app_dir: home_dir.join(".komodo-codex-env"),
            initial_dir,
            home_dir,
        }
    }

    /// Creates configuration from defaults, the optional config file and the process environment.
    pub fn from_environment() -> Self {
        let mut config = Self::default();
        if let Some(file_config) = crate::libs::config_loading::load_file_config() {
            config.apply_file_config(&file_config);
        }
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Overlays values from a parsed YAML config file. Absent keys leave the field untouched.
    pub fn apply_file_config(&mut self, file: &FileConfig) {
        if let Some(v) = file.parallel_execution {
            self.parallel_execution = v;
        }
        if let Some(v) = file.max_parallel_jobs.filter(|v| *v > 0) {
            self.max_parallel_jobs = v;
        }
        if let Some(v) = &file.flutter_version {
            self.flutter_version = v.clone();
        }
        if let Some(v) = file.flutter_install_method {
            self.flutter_install_method = v;
        }
        if let Some(v) = file.install_type {
            self.install_type = v;
        }
        if let Some(v) = &file.platforms {
            self.platforms = v.iter().map(|p| p.trim().to_lowercase()).collect();
        }
        if let Some(v) = file.install_android_sdk {
            self.install_android_sdk = v;
        }
        if let Some(v) = &file.android_api_level {
            self.android_api_level = v.clone();
        }
        if let Some(v) = &file.android_build_tools_version {
            self.android_build_tools_version = v.clone();
        }
        if let Some(v) = file.fetch_all_remote_branches {
            self.fetch_all_remote_branches = v;
        }
        if let Some(v) = &file.remote_base_url {
            self.remote_base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = file.should_fetch_agents_docs {
            self.should_fetch_agents_docs = v;
        }
        if let Some(v) = file.should_fetch_kdf_api_docs {
            self.should_fetch_kdf_api_docs = v;
        }
        if let Some(v) = file.max_execution_time {
            self.max_execution_time = v;
        }
        if let Some(p) = file.expanded_android_home() {
            self.android_home = p;
        }
        if let Some(p) = file.expanded_fvm_dir() {
            self.fvm_dir = p;
        }
    }

    /// Overlays values from environment variables, read through `lookup`.
    ///
    /// Boolean variables are `true` only when their lower-cased value is exactly `"true"`.
    /// `MAX_PARALLEL_JOBS` is honoured only when it is a plain positive integer.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str, current: bool| match lookup(key) {
            Some(v) => v.trim().eq_ignore_ascii_case("true"),
            None => current,
        };

        self.auto_update_script = flag("AUTO_UPDATE_SCRIPT", self.auto_update_script);
        self.skip_recursive_update = flag("SKIP_RECURSIVE_UPDATE", self.skip_recursive_update);
        self.parallel_execution = flag("PARALLEL_EXECUTION", self.parallel_execution);
        self.fetch_all_remote_branches =
            flag("FETCH_ALL_REMOTE_BRANCHES", self.fetch_all_remote_branches);
        self.should_fetch_agents_docs =
            flag("SHOULD_FETCH_AGENTS_DOCS", self.should_fetch_agents_docs);
        self.should_fetch_kdf_api_docs =
            flag("SHOULD_FETCH_KDF_API_DOCS", self.should_fetch_kdf_api_docs);
        self.install_android_sdk = flag("INSTALL_ANDROID_SDK", self.install_android_sdk);

        if let Some(method) = lookup("FLUTTER_INSTALL_METHOD").and_then(|v| v.parse().ok()) {
            self.flutter_install_method = method;
        }
        if let Some(install_type) = lookup("INSTALL_TYPE").and_then(|v| v.parse().ok()) {
            self.install_type = install_type;
        }
        if let Some(version) = lookup("FLUTTER_VERSION").filter(|v| !v.trim().is_empty()) {
            self.flutter_version = version.trim().to_string();
        }
        if let Some(platforms) = lookup("PLATFORMS").filter(|v| !v.trim().is_empty()) {
            self.platforms = parse_platform_list(&platforms);
        }
        if let Some(jobs) = lookup("MAX_PARALLEL_JOBS")
            .filter(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()))
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|v| *v > 0)
        {
            self.max_parallel_jobs = jobs;
        }
        if let Some(level) = lookup("ANDROID_API_LEVEL").filter(|v| !v.trim().is_empty()) {
            self.android_api_level = level.trim().to_string();
        }
        if let Some(bt) = lookup("ANDROID_BUILD_TOOLS_VERSION").filter(|v| !v.trim().is_empty()) {
            self.android_build_tools_version = bt.trim().to_string();
        }
        if let Some(home) = lookup("ANDROID_HOME").filter(|v| !v.trim().is_empty()) {
            self.android_home = PathBuf::from(home.trim());
        }
    }

    /// Checks the values that later phases rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flutter_version.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "flutter_version",
                value: self.flutter_version.clone(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.max_parallel_jobs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_parallel_jobs",
                value: "0".to_string(),
                reason: "at least one worker is required".to_string(),
            });
        }
        for platform in &self.platforms {
            if !KNOWN_PLATFORMS.contains(&platform.as_str()) {
                return Err(ConfigError::UnknownPlatform(
                    platform.clone(),
                    KNOWN_PLATFORMS.join(", "),
                ));
            }
        }
        Ok(())
    }

    /// URL of the bash setup script whose `SCRIPT_VERSION` is used for update checks.
    pub fn script_gist_url(&self) -> String {
        format!("{}/komodo_flutter_codex_env_setup.sh", self.gist_base_url)
    }

    pub fn agents_gist_url(&self) -> String {
        format!("{}/AGENTS.md", self.gist_base_url)
    }

    /// Flutter bin directory of the FVM global default.
    pub fn flutter_bin_dir(&self) -> PathBuf {
        self.fvm_dir.join("default").join("bin")
    }

    pub fn pub_cache_bin_dir(&self) -> PathBuf {
        self.home_dir.join(".pub-cache").join("bin")
    }

    pub fn fvm_flutter_bin(&self) -> PathBuf {
        self.flutter_bin_dir().join("flutter")
    }

    /// The configured Flutter version as a semantic version.
    /// Channel names such as `stable` or `beta` return `None`.
    pub fn has_platform(&self, platform: &str) -> bool {
        self.platforms.iter().any(|p| p == platform)
    }

    /// Whether the Android SDK phase should run at all.
    pub fn wants_android(&self) -> bool {
        self.install_android_sdk && self.has_platform("android")
    }

    /// Picks the shell profile to edit, based on the `SHELL` environment variable.
    pub fn shell_profile(&self) -> PathBuf {
        profile_for_shell(&self.home_dir, &std::env::var("SHELL").unwrap_or_default())
    }
}

/// Parses a pinned Flutter version. Channel names such as `stable` yield `None`.
pub fn flutter_semver(version: &str) -> Option<semver::Version> {
    semver::Version::parse(version.trim()).ok()
}

/// Maps a login shell path to the profile file under `home`.
pub fn profile_for_shell(home: &Path, shell: &str) -> PathBuf {
    if shell.contains("zsh") {
        home.join(".zshrc")
    } else if shell.contains("bash") {
        home.join(".bashrc")
    } else {
        home.join(".profile")
    }
}

/// Half of the physical cores, never less than one.
fn default_parallel_jobs() -> usize {
    jobs_for_physical_cores(num_cpus::get_physical())
}

fn jobs_for_physical_cores(cores: usize) -> usize {
    (cores / 2).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> EnvironmentConfig {
        EnvironmentConfig::with_home(PathBuf::from("/home/dev"), PathBuf::from("/work/app"))
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_the_supported_toolchain() {
        let config = config();
        assert!(config.install_android_sdk);
        assert_eq!(config.android_api_level, "35");
        assert_eq!(config.android_build_tools_version, "35.0.1");
        assert_eq!(config.android_home, PathBuf::from("/home/dev/Android/Sdk"));
        assert_eq!(config.flutter_bin_dir(), PathBuf::from("/home/dev/.fvm/default/bin"));
        assert_eq!(config.pub_cache_bin_dir(), PathBuf::from("/home/dev/.pub-cache/bin"));
        assert!(config.has_platform("android"));
        assert!(config.max_parallel_jobs >= 1);
        assert_eq!(config.app_dir, PathBuf::from("/home/dev/.komodo-codex-env"));
    }

    #[test]
    fn parallel_jobs_are_half_the_physical_cores() {
        assert_eq!(jobs_for_physical_cores(0), 1);
        assert_eq!(jobs_for_physical_cores(1), 1);
        assert_eq!(jobs_for_physical_cores(8), 4);
        assert_eq!(jobs_for_physical_cores(12), 6);
    }

    #[test]
    fn env_overrides_booleans_and_android_values() {
        let mut config = config();
        let vars = env(&[
            ("INSTALL_ANDROID_SDK", "false"),
            ("ANDROID_API_LEVEL", "34"),
            ("ANDROID_BUILD_TOOLS_VERSION", "34.0.0"),
            ("PARALLEL_EXECUTION", "TRUE"),
            ("SHOULD_FETCH_KDF_API_DOCS", "yes"),
        ]);
        config.apply_env(|k| vars.get(k).cloned());

        assert!(!config.install_android_sdk);
        assert_eq!(config.android_api_level, "34");
        assert_eq!(config.android_build_tools_version, "34.0.0");
        assert!(config.parallel_execution);
        // Only the literal "true" enables a flag.
        assert!(!config.should_fetch_kdf_api_docs);
    }

    #[test]
    fn env_platforms_and_jobs_are_sanitised() {
        let mut config = config();
        let vars = env(&[("PLATFORMS", "web, linux ,"), ("MAX_PARALLEL_JOBS", "4x")]);
        let before = config.max_parallel_jobs;
        config.apply_env(|k| vars.get(k).cloned());
        assert_eq!(config.platforms, vec!["web", "linux"]);
        assert_eq!(config.max_parallel_jobs, before);

        let vars = env(&[("MAX_PARALLEL_JOBS", "6")]);
        config.apply_env(|k| vars.get(k).cloned());
        assert_eq!(config.max_parallel_jobs, 6);
    }

    #[test]
    fn android_requires_flag_and_platform() {
        let mut config = config();
        assert!(config.wants_android());
        config.platforms = vec!["web".into(), "linux".into()];
        assert!(!config.wants_android());
        config.platforms.push("android".into());
        config.install_android_sdk = false;
        assert!(!config.wants_android());
    }

    #[test]
    fn validate_rejects_unknown_platform() {
        let mut config = config();
        config.platforms.push("amiga".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownPlatform(p, _)) if p == "amiga"
        ));
    }

    #[test]
    fn shell_profile_follows_login_shell() {
        let home = Path::new("/home/dev");
        assert_eq!(profile_for_shell(home, "/usr/bin/zsh"), home.join(".zshrc"));
        assert_eq!(profile_for_shell(home, "/bin/bash"), home.join(".bashrc"));
        assert_eq!(profile_for_shell(home, "/usr/bin/fish"), home.join(".profile"));
    }

    #[test]
    fn flutter_semver_ignores_channels() {
        assert_eq!(flutter_semver(&config().flutter_version), Some(semver::Version::new(3, 32, 0)));
        assert_eq!(flutter_semver("stable"), None);
    }
}
