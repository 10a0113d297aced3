// This file implements `komodo-codex-env check-deps`.
// It prints host information and a table of the system packages `setup` would install.

use crate::libs::dependencies::DependencyManager;
use crate::libs::environment_setup::system_dependencies;
use crate::libs::executor::SystemRunner;
use crate::log_info;
use crate::schemas::environment::EnvironmentConfig;
use colored::Colorize;
use prettytable::{Table, row};

pub fn run() -> anyhow::Result<()> {
    let config = EnvironmentConfig::from_environment();
    let runner = SystemRunner;
    let deps = DependencyManager::new(&runner);

    let info = deps.system_info();
    log_info!(
        "[Deps] System: {} {}",
        info.os.as_deref().unwrap_or("Unknown"),
        info.arch.as_deref().unwrap_or("Unknown")
    );
    if let Some(distro) = &info.distro {
        log_info!("[Deps] Distribution: {}", distro);
    }
    match deps.detect_package_manager() {
        Some(pm) => log_info!("[Deps] Package manager: {}", pm.to_string().cyan()),
        None => log_info!("[Deps] Package manager: {}", "none found".yellow()),
    }

    let required = system_dependencies(info.os.as_deref(), &config.platforms);
    let mut table = Table::new();
    table.set_titles(row!["Dependency", "Status"]);
    for (name, installed) in deps.check_dependencies(&required) {
        let status = if installed { "installed".green() } else { "missing".red() };
        table.add_row(row![name, status]);
    }
    table.printstd();
    Ok(())
}
