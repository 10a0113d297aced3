// This file implements the `fvm-*` subcommands, thin wrappers over FVM
// that reuse the installer's detection of FVM outside `PATH`.

use crate::installers::flutter::FlutterManager;
use crate::libs::executor::{CommandRunner, CommandSpec, SystemRunner};
use crate::log_info;
use crate::schemas::environment::EnvironmentConfig;
use anyhow::{bail, ensure};
use colored::Colorize;
use std::time::Duration;

const FVM_INSTALL_TIMEOUT: Duration = Duration::from_secs(600);

fn require_fvm(flutter: &FlutterManager) -> anyhow::Result<()> {
    ensure!(
        flutter.is_fvm_installed(),
        "FVM is not installed, run 'komodo-codex-env setup' first"
    );
    Ok(())
}

/// `fvm-list`: prints FVM's own listing of installed versions.
pub fn list() -> anyhow::Result<()> {
    let config = EnvironmentConfig::from_environment();
    let runner = SystemRunner;
    require_fvm(&FlutterManager::new(&config, &runner))?;
    let out = runner.run(&CommandSpec::new("fvm").arg("list"))?;
    println!("{}", out.stdout.trim_end());
    Ok(())
}

/// `fvm-install <version>`.
pub fn install(version: &str) -> anyhow::Result<()> {
    let config = EnvironmentConfig::from_environment();
    let runner = SystemRunner;
    require_fvm(&FlutterManager::new(&config, &runner))?;
    log_info!("[FVM] Installing Flutter {}...", version.cyan());
    runner.run(
        &CommandSpec::new("fvm")
            .args(["install", version])
            .timeout(FVM_INSTALL_TIMEOUT),
    )?;
    log_info!("[FVM] {}", format!("Flutter {version} installed").green());
    Ok(())
}

/// `fvm-use <version>`: installs when needed and makes the version global.
pub fn use_version(version: &str) -> anyhow::Result<()> {
    let config = EnvironmentConfig::from_environment();
    let runner = SystemRunner;
    let mut flutter = FlutterManager::new(&config, &runner);
    require_fvm(&flutter)?;
    if !flutter.switch_version(version) {
        bail!("could not switch to Flutter {}", version);
    }
    Ok(())
}

/// `fvm-releases`: prints the release versions FVM knows about.
pub fn releases() -> anyhow::Result<()> {
    let config = EnvironmentConfig::from_environment();
    let runner = SystemRunner;
    let flutter = FlutterManager::new(&config, &runner);
    require_fvm(&flutter)?;
    let versions = flutter.list_available_versions();
    ensure!(!versions.is_empty(), "FVM did not report any Flutter releases");
    for version in versions {
        println!("{version}");
    }
    Ok(())
}
