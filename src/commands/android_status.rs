// This file implements `komodo-codex-env android-status`.

use crate::installers::android::AndroidManager;
use crate::libs::executor::SystemRunner;
use crate::schemas::environment::EnvironmentConfig;
use prettytable::{Table, row};

/// Prints the Android SDK and Java status as a two-column table.
pub fn run() -> anyhow::Result<()> {
    let config = EnvironmentConfig::from_environment();
    let runner = SystemRunner;
    let info = AndroidManager::new(&config, &runner).android_info();

    let mut table = Table::new();
    table.set_titles(row!["Property", "Value"]);
    for (label, value) in info.rows() {
        table.add_row(row![label, value]);
    }
    table.printstd();
    Ok(())
}
