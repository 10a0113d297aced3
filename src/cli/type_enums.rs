use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which slice of the Komodo toolchain a `setup` run provisions.
/// Each variant enables a different combination of phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InstallType {
    /// Everything: Flutter/Android, melos and KDF build dependencies.
    #[default]
    #[serde(rename = "ALL")]
    All,
    /// Komodo Wallet: Flutter (and Android when requested).
    #[serde(rename = "KW")]
    Kw,
    /// Komodo DeFi Framework: Rust toolchain and native build dependencies.
    #[serde(rename = "KDF")]
    Kdf,
    /// KDF SDK packages: Flutter plus melos.
    #[serde(rename = "KDF-SDK")]
    KdfSdk,
}

impl InstallType {
    /// Whether this install type needs the Flutter SDK (and optionally Android).
    pub fn includes_flutter(self) -> bool {
        matches!(self, InstallType::All | InstallType::Kw | InstallType::KdfSdk)
    }

    /// Whether melos should be activated globally.
    pub fn includes_melos(self) -> bool {
        matches!(self, InstallType::All | InstallType::KdfSdk)
    }

    /// Whether the KDF Rust/native build dependencies should be installed.
    pub fn includes_kdf(self) -> bool {
        matches!(self, InstallType::All | InstallType::Kdf)
    }
}

/// Implementation of string parsing for InstallType enum.
/// Allows converting CLI arguments and environment values to strongly-typed variants.
impl FromStr for InstallType {
    type Err = String;

    /// Parses a string into an InstallType enum variant (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ALL" => Ok(InstallType::All),
            "KW" => Ok(InstallType::Kw),
            "KDF" => Ok(InstallType::Kdf),
            "KDF-SDK" | "KDF_SDK" => Ok(InstallType::KdfSdk),
            _ => {
                let valid_types = ["ALL", "KW", "KDF", "KDF-SDK"].join(", ");
                Err(format!(
                    "Invalid install type '{s}'. Must be one of: {valid_types}",
                ))
            }
        }
    }
}

impl fmt::Display for InstallType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InstallType::All => write!(f, "ALL"),
            InstallType::Kw => write!(f, "KW"),
            InstallType::Kdf => write!(f, "KDF"),
            InstallType::KdfSdk => write!(f, "KDF-SDK"),
        }
    }
}

/// How the Flutter SDK is obtained by FVM.
/// Kept for compatibility with existing environment files; FVM handles both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallMethod {
    Git,
    #[default]
    Precompiled,
}

impl FromStr for InstallMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "git" => Ok(InstallMethod::Git),
            "precompiled" => Ok(InstallMethod::Precompiled),
            _ => Err(format!(
                "Invalid install method '{s}'. Must be one of: git, precompiled"
            )),
        }
    }
}

impl fmt::Display for InstallMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InstallMethod::Git => write!(f, "git"),
            InstallMethod::Precompiled => write!(f, "precompiled"),
        }
    }
}

/// Every Flutter target platform the installer knows how to configure, precache or build.
pub const KNOWN_PLATFORMS: [&str; 7] =
    ["android", "ios", "fuchsia", "linux", "macos", "windows", "web"];

/// Splits a comma-separated platform list, trimming entries and dropping empty ones.
pub fn parse_platform_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect()
}
