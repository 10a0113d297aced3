// This file implements `komodo-codex-env update-script`.
// It compares the published setup script's version with ours and, once confirmed,
// saves the new script to the home directory.

use crate::libs::documentation::DocumentationManager;
use crate::log_info;
use crate::schemas::environment::EnvironmentConfig;
use anyhow::{Context, bail};
use colored::Colorize;
use dialoguer::Confirm;

/// File name the downloaded script is saved under, in the home directory.
pub const SCRIPT_FILE_NAME: &str = "komodo_flutter_codex_env_setup.sh";

/// Checks for a newer script and downloads it, asking first unless `yes` is set.
pub fn run(yes: bool) -> anyhow::Result<()> {
    let config = EnvironmentConfig::from_environment();
    let docs = DocumentationManager::new(&config);

    let Some(latest) = docs.check_for_script_updates() else {
        return Ok(());
    };
    let confirmed = yes
        || Confirm::new()
            .with_prompt(format!("Download setup script {latest}?"))
            .default(true)
            .interact()
            .context("could not read confirmation")?;
    if !confirmed {
        log_info!("[Update] Update skipped");
        return Ok(());
    }

    let target = config.home_dir.join(SCRIPT_FILE_NAME);
    if !docs.download_script_update(&target) {
        bail!("failed to download setup script {}", latest);
    }
    log_info!("[Update] {}", format!("Saved setup script {} to {}", latest, target.display()).green());
    Ok(())
}
