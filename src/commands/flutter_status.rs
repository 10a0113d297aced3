// This file implements `komodo-codex-env flutter-status`.
// It reports whether FVM and Flutter are usable, which version is active and what `flutter doctor` says.

use crate::installers::flutter::FlutterManager;
use crate::libs::executor::SystemRunner;
use crate::schemas::environment::EnvironmentConfig;
use crate::{log_info, log_warn};
use colored::Colorize;
use prettytable::{Table, row};

/// Prints the FVM/Flutter status, comparing the active version with `version` when given.
pub fn run(version: Option<String>) -> anyhow::Result<()> {
    let mut config = EnvironmentConfig::from_environment();
    if let Some(v) = version {
        config.flutter_version = v;
    }
    let runner = SystemRunner;
    let flutter = FlutterManager::new(&config, &runner);

    if !flutter.is_fvm_installed() {
        log_warn!("[Flutter] FVM is not installed. Run '{}' first.", "komodo-codex-env setup".bold());
        return Ok(());
    }
    log_info!("[Flutter] {}", "FVM is installed".green());

    let Some(active) = flutter.installed_version() else {
        log_warn!("[Flutter] Flutter is not installed via FVM");
        return Ok(());
    };
    if active == flutter.version() {
        log_info!("[Flutter] Flutter {} is active", active.green());
    } else {
        log_warn!(
            "[Flutter] Active Flutter version {} differs from the requested {}",
            active.yellow(),
            flutter.version()
        );
    }

    let mut table = Table::new();
    table.set_titles(row!["Tool", "Version"]);
    for (tool, version) in flutter.tool_versions() {
        table.add_row(row![tool, version.unwrap_or_else(|| "unavailable".into())]);
    }
    table.printstd();

    if flutter.run_doctor() {
        log_info!("[Flutter] {}", "Flutter environment is healthy".green());
    } else {
        log_warn!("[Flutter] Flutter doctor reported issues. Run '{}' for details.", "fvm flutter doctor -v".bold());
    }
    Ok(())
}
