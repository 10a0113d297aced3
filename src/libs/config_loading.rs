use crate::errors::ConfigError;
use crate::libs::utilities::path_helpers::{expand_path, get_app_dir};
use crate::schemas::file_config::FileConfig;
use crate::{log_debug, log_error, log_warn};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable that points at an alternative config file.
pub const CONFIG_PATH_ENV: &str = "KCE_CONFIG_PATH";

/// Resolves where the YAML config file is expected to live.
///
/// `KCE_CONFIG_PATH` wins when set (tilde and `$VAR` references are expanded);
/// otherwise the file is `~/.komodo-codex-env/config.yaml`.
pub fn config_file_path() -> PathBuf {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(p) if !p.trim().is_empty() => expand_path(p.trim()),
        _ => get_app_dir().join("config.yaml"),
    }
}

/// Reads and parses a config file.
///
/// # Arguments
/// * `path`: The YAML file to read.
///
/// # Returns
/// * `Ok(FileConfig)` with every key present in the file set.
/// * `Err(ConfigError)` when the file cannot be read or is not valid YAML for `FileConfig`.
pub fn read_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads the config file if there is one.
///
/// A missing file is normal and silently yields `None`. A file that exists but
/// cannot be parsed is reported and then ignored so a typo never blocks a setup run.
pub fn load_file_config() -> Option<FileConfig> {
    let path = config_file_path();
    if !path.exists() {
        log_debug!("[Config] No config file at {}", path.display().to_string().cyan());
        return None;
    }
    match read_file_config(&path) {
        Ok(cfg) => {
            log_debug!("[Config] Loaded {}: {:?}", path.display().to_string().green(), cfg);
            Some(cfg)
        }
        Err(e @ ConfigError::Parse { .. }) => {
            log_error!("{}. Please check its YAML syntax.", e);
            log_warn!("[Config] Continuing with defaults and environment variables.");
            None
        }
        Err(e) => {
            log_warn!("[Config] {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::type_enums::InstallType;
    use tempfile::tempdir;

    #[test]
    fn reads_valid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "install_type: KW\nmax_parallel_jobs: 3\n").unwrap();
        let cfg = read_file_config(&path).unwrap();
        assert_eq!(cfg.install_type, Some(InstallType::Kw));
        assert_eq!(cfg.max_parallel_jobs, Some(3));
    }

    #[test]
    fn empty_file_is_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "\n").unwrap();
        assert_eq!(read_file_config(&path).unwrap(), FileConfig::default());
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "install_type: [not, a, type\n").unwrap();
        assert!(matches!(read_file_config(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let dir = tempdir().unwrap();
        let result = read_file_config(&dir.path().join("absent.yaml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }
}
