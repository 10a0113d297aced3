// This file drives the `setup` command.
// It runs the installation phases in order (system packages, git, Flutter and Android,
// KDF, shell environment, documentation, project bootstrap) and prints a summary at the end.

use crate::installers::android::AndroidManager;
use crate::installers::flutter::FlutterManager;
use crate::installers::kdf::KdfManager;
use crate::libs::dependencies::DependencyManager;
use crate::libs::documentation::DocumentationManager;
use crate::libs::executor::{CommandRunner, CommandSpec};
use crate::libs::git::GitManager;
use crate::libs::shell_profile::add_to_path;
use crate::schemas::environment::EnvironmentConfig;
use crate::{log_debug, log_error, log_info, log_warn};
use chrono::Local;
use colored::Colorize;
use std::thread;
use std::time::{Duration, Instant};

const BUILD_RUNNER_TIMEOUT: Duration = Duration::from_secs(120);
const GIT_FETCH_TIMEOUT: Duration = Duration::from_secs(120);

/// The Flutter half of the Flutter/Android fan-out.
pub trait FlutterProvisioner: Sync {
    fn install(&self) -> bool;
    fn configure(&self) -> bool;
}

/// The Android half of the Flutter/Android fan-out.
pub trait AndroidProvisioner: Sync {
    fn install(&self) -> bool;
}

impl FlutterProvisioner for FlutterManager<'_> {
    fn install(&self) -> bool {
        self.install_flutter()
    }

    fn configure(&self) -> bool {
        self.configure_flutter()
    }
}

impl AndroidProvisioner for AndroidManager<'_> {
    fn install(&self) -> bool {
        self.install_android_sdk()
    }
}

/// Inputs of the Flutter/Android phase that come from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutPolicy {
    pub parallel: bool,
    pub android: bool,
}

impl FanOutPolicy {
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        Self {
            parallel: config.parallel_execution,
            android: config.wants_android(),
        }
    }
}

/// Installs Flutter and, when requested, the Android SDK.
///
/// The Flutter branch installs and then configures; configuration is skipped when the install
/// fails and a configuration failure is only a warning. An Android failure is a warning too.
///
/// # Returns
/// * Whether Flutter was installed.
pub fn flutter_and_android(
    policy: FanOutPolicy,
    flutter: &dyn FlutterProvisioner,
    android: &dyn AndroidProvisioner,
) -> bool {
    let flutter_branch = || {
        if !flutter.install() {
            log_error!("[Setup] Flutter installation failed");
            return false;
        }
        if flutter.configure() {
            log_info!("[Setup] {}", "Flutter installed and configured".green());
        } else {
            log_warn!("[Setup] Flutter installed but configuration had issues");
        }
        true
    };
    let android_branch = || {
        let ok = android.install();
        if ok {
            log_info!("[Setup] {}", "Android SDK installed".green());
        } else {
            log_warn!("[Setup] Android SDK installation failed, continuing without Android support");
        }
        ok
    };

    if !policy.android {
        log_debug!("[Setup] Android SDK not requested, installing Flutter only");
        return flutter_branch();
    }
    if !policy.parallel {
        let flutter_ok = flutter_branch();
        android_branch();
        return flutter_ok;
    }

    log_info!("[Setup] Installing Flutter and Android SDK in parallel...");
    thread::scope(|scope| {
        let android_handle = scope.spawn(android_branch);
        let flutter_ok = flutter_branch();
        if android_handle.join().is_err() {
            log_warn!("[Setup] Android SDK installation aborted unexpectedly");
        }
        flutter_ok
    })
}

/// System packages needed before anything else runs.
pub fn system_dependencies(os: Option<&str>, platforms: &[String]) -> Vec<&'static str> {
    let mut deps = vec!["curl", "git", "unzip", "xz-utils", "zip"];
    if os == Some("Linux") {
        deps.extend(["libglu1-mesa", "build-essential"]);
    }
    if platforms.iter().any(|p| p == "web") {
        deps.extend(["nodejs", "npm"]);
    }
    deps.push("dart");
    deps
}

/// Runs every setup phase against one configuration.
pub struct EnvironmentSetup<'a> {
    config: &'a EnvironmentConfig,
    runner: &'a dyn CommandRunner,
    started: Instant,
}

impl<'a> EnvironmentSetup<'a> {
    pub fn new(config: &'a EnvironmentConfig, runner: &'a dyn CommandRunner) -> Self {
        Self {
            config,
            runner,
            started: Instant::now(),
        }
    }

    /// Runs all phases, stopping at the first fatal failure.
    pub fn run_setup(&self) -> bool {
        log_info!(
            "{} {}",
            format!("Komodo Codex Environment Setup v{}", self.config.script_version).bold().blue(),
            format!("(started {})", Local::now().format("%Y-%m-%d %H:%M:%S")).dimmed()
        );
        log_info!(
            "[Setup] Setting up Flutter {} environment ({} install)",
            self.config.flutter_version.cyan(),
            self.config.install_type.to_string().cyan()
        );

        if !self.setup_system_dependencies() {
            return false;
        }
        self.setup_git_operations();

        let install_type = self.config.install_type;
        if install_type.includes_flutter() && !self.setup_flutter() {
            return false;
        }
        if install_type.includes_kdf() {
            self.setup_kdf();
        }
        if install_type.includes_flutter() {
            self.setup_environment();
        }
        if !self.setup_documentation() {
            return false;
        }
        if install_type.includes_flutter() {
            self.setup_project();
        }

        self.print_completion_summary();
        true
    }

    fn phase(&self, number: u8, title: &str) {
        log_info!("{}", format!("Phase {number}: {title}").bold().blue());
    }

    fn setup_system_dependencies(&self) -> bool {
        self.phase(1, "System Dependencies");
        let deps = DependencyManager::new(self.runner);
        let info = deps.system_info();
        log_info!(
            "[Setup] System: {} {}",
            info.os.as_deref().unwrap_or("Unknown"),
            info.arch.as_deref().unwrap_or("Unknown")
        );
        if let Some(distro) = &info.distro {
            log_info!("[Setup] Distribution: {}", distro);
        }

        let required = system_dependencies(info.os.as_deref(), &self.config.platforms);
        if deps.install_dependencies(&required) {
            log_info!("[Setup] {}", "System dependencies installed".green());
            true
        } else {
            log_error!("[Setup] Failed to install system dependencies");
            false
        }
    }

    fn setup_git_operations(&self) {
        self.phase(2, "Git Operations");
        let git = GitManager::new(self.runner, &self.config.initial_dir);
        if !git.is_git_repo() {
            log_warn!("[Setup] Not in a Git repository, skipping Git operations");
            return;
        }
        let Some(repo) = git.repo_name() else {
            log_warn!("[Setup] Could not determine the repository name");
            return;
        };
        log_info!("[Setup] Repository: {}", repo.cyan());
        if let Some(branch) = git.current_branch() {
            log_debug!("[Setup] Current branch: {}", branch);
        }
        git.configure_safe_directory();

        if self.config.fetch_all_remote_branches {
            git.add_remote("origin", &format!("{}/{}.git", self.config.remote_base_url, repo));
            if git.fetch_all_branches(GIT_FETCH_TIMEOUT) {
                log_info!("[Setup] {}", "Git branches fetched".green());
            } else {
                log_warn!("[Setup] Git fetch completed with warnings");
            }
        }
    }

    fn setup_flutter(&self) -> bool {
        self.phase(3, "Flutter Installation");
        let flutter = FlutterManager::new(self.config, self.runner);
        let android = AndroidManager::new(self.config, self.runner);
        if !flutter_and_android(FanOutPolicy::from_config(self.config), &flutter, &android) {
            return false;
        }
        if self.config.install_type.includes_melos() && !flutter.install_melos() {
            log_warn!("[Setup] Melos installation failed");
        }
        true
    }

    fn setup_kdf(&self) {
        self.phase(4, "KDF Dependencies");
        if !KdfManager::new(self.config, self.runner).install_dependencies() {
            log_warn!("[Setup] KDF dependency installation had issues");
        }
    }

    fn setup_environment(&self) {
        self.phase(5, "Environment Configuration");
        let profile = self.config.shell_profile();
        log_info!("[Setup] Shell profile: {}", profile.display());
        let flutter_ok = add_to_path(&self.config.flutter_bin_dir(), &profile);
        let pub_cache_ok = add_to_path(&self.config.pub_cache_bin_dir(), &profile);
        if flutter_ok && pub_cache_ok {
            log_info!("[Setup] {}", "Environment variables configured".green());
        } else {
            log_warn!("[Setup] Environment configuration had issues");
        }
    }

    fn setup_documentation(&self) -> bool {
        self.phase(6, "Documentation");
        let docs = DocumentationManager::new(self.config);
        let documents = docs.fetch_all_documentation();
        if documents.is_empty() {
            log_warn!("[Setup] No documentation was fetched");
            return true;
        }

        let target = &self.config.initial_dir;
        if !docs.save_documentation(&documents, target) {
            log_warn!("[Setup] Documentation setup had issues");
            return false;
        }
        docs.create_combined_documentation(&documents, target);
        docs.update_git_exclude(target, None);
        log_info!("[Setup] {}", format!("Documentation saved ({} files)", documents.len()).green());
        true
    }

    fn setup_project(&self) {
        self.phase(7, "Project Setup");
        let project = &self.config.initial_dir;
        if !project.join("pubspec.yaml").is_file() {
            log_warn!("[Setup] No pubspec.yaml found, skipping Flutter project setup");
            return;
        }

        log_info!("[Setup] Getting Flutter dependencies...");
        let pub_get = CommandSpec::new("fvm")
            .args(["flutter", "pub", "get"])
            .cwd(project)
            .unchecked();
        if self.runner.run_ok(&pub_get) {
            log_info!("[Setup] {}", "Dependencies installed".green());
        } else {
            log_warn!("[Setup] Dependency installation had issues");
        }

        log_info!("[Setup] Running build_runner...");
        let build_runner = CommandSpec::new("fvm")
            .args(["dart", "run", "build_runner", "build", "--delete-conflicting-outputs"])
            .cwd(project)
            .timeout(BUILD_RUNNER_TIMEOUT)
            .unchecked();
        if self.runner.run_ok(&build_runner) {
            log_info!("[Setup] {}", "Code generation completed".green());
        } else {
            log_warn!("[Setup] Code generation had issues");
        }

        if self.config.platforms.is_empty() {
            return;
        }
        log_info!("[Setup] Building for platforms: {}", self.config.platforms.join(", ").cyan());
        let flutter = FlutterManager::new(self.config, self.runner);
        if flutter.build_project(project, &self.config.platforms) {
            log_info!("[Setup] {}", "Project builds completed".green());
        } else {
            log_warn!("[Setup] Some builds failed (expected for initial setup)");
        }
    }

    fn print_completion_summary(&self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        let budget = self.config.max_execution_time.max(1) as f64;
        let percentage = elapsed / budget * 100.0;

        log_info!("{}", "Environment setup completed successfully!".bold().green());
        log_info!("[Setup] Execution time: {:.1}s ({:.1}% of max time)", elapsed, percentage);
        if elapsed > budget {
            log_warn!(
                "[Setup] Setup took longer than the expected {}s",
                self.config.max_execution_time
            );
        }
        if self.config.install_type.includes_flutter() {
            log_info!("[Setup] Flutter version: {} (via FVM)", self.config.flutter_version);
            if !self.config.platforms.is_empty() {
                log_info!("[Setup] Configured platforms: {}", self.config.platforms.join(", "));
            }
        }

        log_info!("{}", "Next steps:".bold());
        for line in next_steps(&self.config.shell_profile().display().to_string()) {
            eprintln!("  {line}");
        }
    }
}

fn next_steps(profile: &str) -> Vec<String> {
    vec![
        "To use Flutter in your current session:".to_string(),
        format!("  source {profile}"),
        "Or restart your terminal to apply PATH changes.".to_string(),
        "Verify installation with:".to_string(),
        "  fvm flutter doctor".to_string(),
        "FVM commands:".to_string(),
        "  fvm list          - List installed Flutter versions".to_string(),
        "  fvm global <ver>  - Set global Flutter version".to_string(),
        "  fvm use <ver>     - Use Flutter version for current project".to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::libs::executor::CommandOutput;
    use crate::libs::executor::fake::ScriptedRunner;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeFlutter {
        install_ok: bool,
        configure_ok: bool,
        installs: AtomicUsize,
        configures: AtomicUsize,
        log: Option<&'static Mutex<Vec<&'static str>>>,
    }

    impl FakeFlutter {
        fn new(install_ok: bool) -> Self {
            Self {
                install_ok,
                configure_ok: true,
                ..Self::default()
            }
        }
    }

    impl FlutterProvisioner for FakeFlutter {
        fn install(&self) -> bool {
            self.installs.fetch_add(1, Ordering::SeqCst);
            if let Some(log) = self.log {
                log.lock().unwrap().push("flutter");
            }
            self.install_ok
        }

        fn configure(&self) -> bool {
            self.configures.fetch_add(1, Ordering::SeqCst);
            self.configure_ok
        }
    }

    #[derive(Default)]
    struct FakeAndroid {
        ok: bool,
        installs: AtomicUsize,
        log: Option<&'static Mutex<Vec<&'static str>>>,
    }

    impl AndroidProvisioner for FakeAndroid {
        fn install(&self) -> bool {
            self.installs.fetch_add(1, Ordering::SeqCst);
            if let Some(log) = self.log {
                log.lock().unwrap().push("android");
            }
            self.ok
        }
    }

    fn android(ok: bool) -> FakeAndroid {
        FakeAndroid {
            ok,
            ..FakeAndroid::default()
        }
    }

    const BOTH_PARALLEL: FanOutPolicy = FanOutPolicy { parallel: true, android: true };

    #[test]
    fn parallel_runs_both_branches() {
        let flutter = FakeFlutter::new(true);
        let android = android(true);
        assert!(flutter_and_android(BOTH_PARALLEL, &flutter, &android));
        assert_eq!(flutter.installs.load(Ordering::SeqCst), 1);
        assert_eq!(flutter.configures.load(Ordering::SeqCst), 1);
        assert_eq!(android.installs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sequential_runs_flutter_first() {
        static LOG: Mutex<Vec<&'static str>> = Mutex::new(Vec::new());
        let flutter = FakeFlutter {
            log: Some(&LOG),
            ..FakeFlutter::new(true)
        };
        let android = FakeAndroid {
            log: Some(&LOG),
            ..android(true)
        };
        let policy = FanOutPolicy { parallel: false, android: true };
        assert!(flutter_and_android(policy, &flutter, &android));
        assert_eq!(*LOG.lock().unwrap(), vec!["flutter", "android"]);
    }

    #[test]
    fn android_skipped_when_not_a_platform() {
        let home = tempdir().unwrap();
        let mut config = EnvironmentConfig::with_home(home.path().to_path_buf(), home.path().to_path_buf());
        config.platforms = vec!["web".to_string()];
        let policy = FanOutPolicy::from_config(&config);
        assert!(!policy.android);

        let flutter = FakeFlutter::new(true);
        let android = android(true);
        assert!(flutter_and_android(policy, &flutter, &android));
        assert_eq!(android.installs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn android_skipped_when_disabled() {
        let home = tempdir().unwrap();
        let mut config = EnvironmentConfig::with_home(home.path().to_path_buf(), home.path().to_path_buf());
        config.install_android_sdk = false;
        let policy = FanOutPolicy::from_config(&config);

        let flutter = FakeFlutter::new(true);
        let android = android(true);
        assert!(flutter_and_android(policy, &flutter, &android));
        assert_eq!(android.installs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn flutter_failure_skips_configure() {
        let flutter = FakeFlutter::new(false);
        let android = android(true);
        assert!(!flutter_and_android(BOTH_PARALLEL, &flutter, &android));
        assert_eq!(flutter.configures.load(Ordering::SeqCst), 0);
        assert_eq!(android.installs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn android_failure_is_tolerated() {
        let flutter = FakeFlutter {
            configure_ok: false,
            ..FakeFlutter::new(true)
        };
        let android = android(false);
        assert!(flutter_and_android(BOTH_PARALLEL, &flutter, &android));
        let sequential = FanOutPolicy { parallel: false, android: true };
        assert!(flutter_and_android(sequential, &flutter, &android));
    }

    #[test]
    fn system_dependencies_depend_on_os_and_platforms() {
        let web = vec!["web".to_string()];
        assert_eq!(
            system_dependencies(Some("Linux"), &web),
            vec!["curl", "git", "unzip", "xz-utils", "zip", "libglu1-mesa", "build-essential", "nodejs", "npm", "dart"]
        );
        assert_eq!(
            system_dependencies(Some("Darwin"), &["android".to_string()]),
            vec!["curl", "git", "unzip", "xz-utils", "zip", "dart"]
        );
    }

    #[test]
    fn project_phase_skips_without_pubspec() {
        let home = tempdir().unwrap();
        let config = EnvironmentConfig::with_home(home.path().to_path_buf(), home.path().to_path_buf());
        let runner = ScriptedRunner::new();
        EnvironmentSetup::new(&config, &runner).setup_project();
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn project_phase_tolerates_failures() {
        let home = tempdir().unwrap();
        std::fs::write(home.path().join("pubspec.yaml"), "name: komodo_wallet\n").unwrap();
        let mut config = EnvironmentConfig::with_home(home.path().to_path_buf(), home.path().to_path_buf());
        config.platforms = vec!["linux".to_string()];
        let runner = ScriptedRunner::new()
            .with_commands(&["fvm"])
            .reply("fvm flutter pub get", CommandOutput::failed(1, "pub failed"));
        EnvironmentSetup::new(&config, &runner).setup_project();
        assert!(runner.called("fvm dart run build_runner build --delete-conflicting-outputs"));
        assert!(runner.called("fvm flutter build linux"));
    }

    #[test]
    fn next_steps_mention_profile() {
        assert!(next_steps("/home/dev/.zshrc").contains(&"  source /home/dev/.zshrc".to_string()));
    }
}
