// This file contains the logic for the `komodo-codex-env setup` command.
// It layers command-line overrides on top of the resolved configuration,
// validates the result and hands it to the phase orchestrator.

use crate::cli::type_enums::{InstallMethod, InstallType, parse_platform_list};
use crate::libs::documentation::DocumentationManager;
use crate::libs::environment_setup::EnvironmentSetup;
use crate::libs::executor::SystemRunner;
use crate::schemas::environment::EnvironmentConfig;
use crate::{log_debug, log_info, log_warn};
use anyhow::{Context, bail};
use colored::Colorize;

/// Values given on the command line for a single `setup` run.
#[derive(Debug, Default, Clone)]
pub struct SetupOverrides {
    pub flutter_version: Option<String>,
    pub install_method: Option<InstallMethod>,
    pub install_type: Option<InstallType>,
    pub no_parallel: bool,
    pub platforms: Option<String>,
    pub no_git_fetch: bool,
    pub no_docs: bool,
    pub kdf_docs: bool,
    pub max_time: Option<u64>,
    pub verbose: bool,
}

impl SetupOverrides {
    /// Applies the overrides; flags only ever switch features off (or KDF docs on).
    pub fn apply(&self, config: &mut EnvironmentConfig) {
        if let Some(version) = &self.flutter_version {
            config.flutter_version = version.clone();
        }
        if let Some(method) = self.install_method {
            config.flutter_install_method = method;
        }
        if let Some(install_type) = self.install_type {
            config.install_type = install_type;
        }
        if self.no_parallel {
            config.parallel_execution = false;
        }
        if let Some(raw) = &self.platforms {
            config.platforms = parse_platform_list(raw);
        }
        if self.no_git_fetch {
            config.fetch_all_remote_branches = false;
        }
        if self.no_docs {
            config.should_fetch_agents_docs = false;
        }
        if self.kdf_docs {
            config.should_fetch_kdf_api_docs = true;
        }
        if let Some(seconds) = self.max_time {
            config.max_execution_time = seconds;
        }
    }
}

/// Entry point for `setup`.
pub fn run(overrides: SetupOverrides) -> anyhow::Result<()> {
    let mut config = EnvironmentConfig::from_environment();
    overrides.apply(&mut config);
    config.validate().context("invalid setup configuration")?;

    if overrides.verbose {
        let rendered = serde_json::to_string_pretty(&config).context("could not render configuration")?;
        log_info!("[Setup] Effective configuration:\n{}", rendered);
    } else {
        log_debug!("[Setup] Effective configuration: {:?}", config);
    }

    if config.auto_update_script && !config.skip_recursive_update {
        if let Some(latest) = DocumentationManager::new(&config).check_for_script_updates() {
            log_warn!(
                "[Setup] Setup script {} is available, run '{}' to download it",
                latest.yellow(),
                "komodo-codex-env update-script".bold()
            );
        }
    }

    let runner = SystemRunner;
    if !EnvironmentSetup::new(&config, &runner).run_setup() {
        bail!("environment setup failed");
    }
    Ok(())
}
