// Shape of the optional `~/.komodo-codex-env/config.yaml` file.
use crate::cli::type_enums::{InstallMethod, InstallType};
use crate::libs::utilities::path_helpers::expand_path;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Values a user may pin in the YAML config file.
///
/// Every field is optional; anything left out keeps its built-in default and can
/// still be overridden by environment variables or CLI flags.
///
/// # Example
/// ```yaml
/// flutter_version: "3.32.0"
/// install_type: KW
/// platforms: [web, android, linux]
/// android_home: ~/Android/Sdk
/// ```
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub parallel_execution: Option<bool>,
    pub max_parallel_jobs: Option<usize>,
    pub flutter_version: Option<String>,
    pub flutter_install_method: Option<InstallMethod>,
    pub install_type: Option<InstallType>,
    pub platforms: Option<Vec<String>>,
    pub install_android_sdk: Option<bool>,
    pub android_api_level: Option<String>,
    pub android_build_tools_version: Option<String>,
    /// Accepts `~` and `$VAR` references.
    pub android_home: Option<String>,
    pub fvm_dir: Option<String>,
    pub fetch_all_remote_branches: Option<bool>,
    pub remote_base_url: Option<String>,
    pub should_fetch_agents_docs: Option<bool>,
    pub should_fetch_kdf_api_docs: Option<bool>,
    pub max_execution_time: Option<u64>,
}

impl FileConfig {
    pub fn expanded_android_home(&self) -> Option<PathBuf> {
        self.android_home.as_deref().map(expand_path)
    }

    pub fn expanded_fvm_dir(&self) -> Option<PathBuf> {
        self.fvm_dir.as_deref().map(expand_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_partial_file() {
        let yaml = "flutter_version: \"3.29.2\"\ninstall_type: KDF-SDK\nplatforms: [web, linux]\n";
        let cfg: FileConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.flutter_version.as_deref(), Some("3.29.2"));
        assert_eq!(cfg.install_type, Some(InstallType::KdfSdk));
        assert_eq!(cfg.platforms, Some(vec!["web".to_string(), "linux".to_string()]));
        assert_eq!(cfg.android_home, None);
    }

    #[test]
    fn rejects_unknown_keys() {
        let yaml = "flutter_versoin: \"3.29.2\"\n";
        assert!(serde_yaml::from_str::<FileConfig>(yaml).is_err());
    }

    #[test]
    fn absolute_android_home_is_kept() {
        let cfg = FileConfig {
            android_home: Some("/opt/android-sdk".into()),
            ..Default::default()
        };
        assert_eq!(cfg.expanded_android_home(), Some(PathBuf::from("/opt/android-sdk")));
    }
}
