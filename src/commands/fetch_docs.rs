// This file implements `komodo-codex-env fetch-docs`.
// It runs only the documentation phase of `setup`, against an arbitrary target directory.

use crate::libs::documentation::DocumentationManager;
use crate::schemas::environment::EnvironmentConfig;
use crate::{log_info, log_warn};
use anyhow::bail;
use colored::Colorize;
use std::path::Path;

/// Fetches the enabled documents and saves them under `target`.
pub fn run(target: &Path, no_agents: bool, kdf_docs: bool) -> anyhow::Result<()> {
    let mut config = EnvironmentConfig::from_environment();
    if no_agents {
        config.should_fetch_agents_docs = false;
    }
    if kdf_docs {
        config.should_fetch_kdf_api_docs = true;
    }

    let docs = DocumentationManager::new(&config);
    let documents = docs.fetch_all_documentation();
    if documents.is_empty() {
        log_warn!("[Docs] No documentation was fetched");
        return Ok(());
    }
    if !docs.save_documentation(&documents, target) {
        bail!("failed to save documentation to {}", target.display());
    }
    docs.create_combined_documentation(&documents, target);
    docs.update_git_exclude(target, None);
    log_info!(
        "[Docs] {}",
        format!("Documentation saved to {} ({} files)", target.display(), documents.len()).green()
    );
    Ok(())
}
