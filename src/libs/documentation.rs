//! Fetching reference documentation into a project checkout.
//!
//! Fetched files land next to the project (`AGENTS.md`, `docs/*.md`,
//! `KDF_API_DOCUMENTATION.md`) and are hidden from git through `.git/info/exclude`.

use crate::errors::DocsError;
use crate::libs::git;
use crate::libs::utilities::assets::fetch_text;
use crate::schemas::environment::EnvironmentConfig;
use crate::{log_debug, log_error, log_info, log_warn};
use colored::Colorize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;

const BLOC_DOCS_BASE: &str =
    "https://raw.githubusercontent.com/felangel/bloc/refs/heads/master/docs/src/content/docs";
const COMMIT_CONVENTIONS_URL: &str = "https://raw.githubusercontent.com/conventional-commits/conventionalcommits.org/refs/heads/master/content/v1.0.0/index.md";

/// Bloc documents appended to the combined agents file, in this order.
const BLOC_KEYS: [&str; 4] = ["bloc_conventions", "bloc_modeling", "bloc_testing", "bloc_concepts"];

/// Patterns added to `.git/info/exclude` for downloaded documentation.
pub const DEFAULT_EXCLUDE_PATTERNS: [&str; 5] = [
    "AGENTS.md",
    "AGENTS_*.md",
    "KDF_API_DOCUMENTATION.md",
    "docs/bloc_*.md",
    "docs/commit_*.md",
];

const EXCLUDE_HEADER: &str = "# Documentation files added by Komodo Codex Environment Setup";

pub struct DocumentationManager<'a> {
    config: &'a EnvironmentConfig,
}

impl<'a> DocumentationManager<'a> {
    pub fn new(config: &'a EnvironmentConfig) -> Self {
        Self { config }
    }

    /// Every documentation source as `(name, url)`, before config gating.
    pub fn doc_sources(&self) -> Vec<(&'static str, String)> {
        vec![
            ("agents", self.config.agents_gist_url()),
            ("bloc_conventions", format!("{BLOC_DOCS_BASE}/naming-conventions.mdx")),
            ("bloc_modeling", format!("{BLOC_DOCS_BASE}/modeling-state.mdx")),
            ("bloc_testing", format!("{BLOC_DOCS_BASE}/testing.mdx")),
            ("bloc_concepts", format!("{BLOC_DOCS_BASE}/flutter-bloc-concepts.mdx")),
            ("commit_conventions", COMMIT_CONVENTIONS_URL.to_string()),
            ("kdf_api", self.config.kdf_api_docs_url.clone()),
        ]
    }

    /// Sources that the current configuration asks for.
    pub fn enabled_sources(&self) -> Vec<(&'static str, String)> {
        self.doc_sources()
            .into_iter()
            .filter(|(name, _)| match *name {
                "agents" => self.config.should_fetch_agents_docs,
                "kdf_api" => self.config.should_fetch_kdf_api_docs,
                _ => true,
            })
            .collect()
    }

    /// Fetches every enabled document concurrently over HTTP.
    pub fn fetch_all_documentation(&self) -> BTreeMap<String, String> {
        self.fetch_all_with(fetch_text)
    }

    /// Fetches every enabled document concurrently with `fetch`.
    /// Failures and empty bodies are logged and left out of the result.
    pub fn fetch_all_with<F>(&self, fetch: F) -> BTreeMap<String, String>
    where
        F: Fn(&str) -> Result<String, DocsError> + Sync,
    {
        log_info!("[Docs] Fetching documentation files...");
        let sources = self.enabled_sources();
        let fetch = &fetch;

        let results: Vec<(&'static str, Result<String, DocsError>)> = thread::scope(|scope| {
            let handles: Vec<_> = sources
                .iter()
                .map(|(name, url)| (*name, scope.spawn(move || fetch(url))))
                .collect();
            handles
                .into_iter()
                .map(|(name, handle)| {
                    let result = handle.join().unwrap_or_else(|_| {
                        Err(DocsError::Http {
                            url: name.to_string(),
                            message: "fetch thread panicked".to_string(),
                        })
                    });
                    (name, result)
                })
                .collect()
        });

        let mut documents = BTreeMap::new();
        for (name, result) in results {
            match result {
                Ok(content) if content.trim().is_empty() => {
                    log_warn!("[Docs] Empty content for {}", name.yellow());
                }
                Ok(content) => {
                    log_info!("[Docs] Fetched {} ({} characters)", name.green(), content.chars().count());
                    documents.insert(name.to_string(), content);
                }
                Err(e) => log_error!("[Docs] Failed to fetch {}: {}", name, e),
            }
        }
        documents
    }

    /// Writes fetched documents under `target_dir`.
    ///
    /// `agents` goes to the next free `AGENTS*.md`, `kdf_api` to `KDF_API_DOCUMENTATION.md`
    /// and everything else to `docs/<name>.md`. Content identical to a file already on disk
    /// is not written again.
    pub fn save_documentation(&self, documents: &BTreeMap<String, String>, target_dir: &Path) -> bool {
        match save_all(documents, target_dir) {
            Ok(()) => true,
            Err(e) => {
                log_error!("[Docs] Failed to save documentation: {}", e);
                false
            }
        }
    }

    /// Builds one agents file containing the agents guide plus the bloc and commit conventions.
    ///
    /// # Returns
    /// * `false` when the agents guide was not fetched or the file cannot be written.
    pub fn create_combined_documentation(&self, documents: &BTreeMap<String, String>, target_dir: &Path) -> bool {
        let Some(combined) = combine_documents(documents) else {
            log_warn!("[Docs] No AGENTS documentation to combine with");
            return false;
        };
        if find_identical(&agents_candidates(target_dir), &combined).is_some() {
            log_debug!("[Docs] Combined documentation already up to date");
            return true;
        }
        let path = agents_file_path(target_dir);
        match fs::write(&path, combined) {
            Ok(()) => {
                log_info!("[Docs] Created combined documentation: {}", path.display().to_string().green());
                true
            }
            Err(e) => {
                log_error!("[Docs] Failed to create combined documentation: {}", e);
                false
            }
        }
    }

    /// Hides downloaded documentation from git in `target_dir`'s repository.
    /// Returns `false` when `target_dir` has no `.git/info` directory.
    pub fn update_git_exclude(&self, target_dir: &Path, patterns: Option<&[&str]>) -> bool {
        let patterns = patterns.unwrap_or(&DEFAULT_EXCLUDE_PATTERNS);
        git::update_git_exclude(target_dir, patterns, Some(EXCLUDE_HEADER))
    }

    /// Returns the published script version when it is newer than (or, when either
    /// side is not semver, different from) the running version.
    pub fn check_for_script_updates(&self) -> Option<String> {
        let content = match fetch_text(&self.config.script_gist_url()) {
            Ok(c) => c,
            Err(e) => {
                log_warn!("[Docs] Could not check for script updates: {}", e);
                return None;
            }
        };
        let latest = parse_script_version(&content)?;
        if is_newer(&latest, &self.config.script_version) {
            log_warn!(
                "[Docs] Script update available: {} (current: {})",
                latest.yellow(),
                self.config.script_version
            );
            Some(latest)
        } else {
            log_info!("[Docs] Script is up to date: {}", self.config.script_version.green());
            None
        }
    }

    /// Downloads the setup script to `target_path` and marks it executable.
    pub fn download_script_update(&self, target_path: &Path) -> bool {
        let result = fetch_text(&self.config.script_gist_url())
            .and_then(|content| write_executable(target_path, &content).map_err(DocsError::from));
        match result {
            Ok(()) => {
                log_info!("[Docs] Downloaded updated script to {}", target_path.display().to_string().green());
                true
            }
            Err(e) => {
                log_error!("[Docs] Failed to download script update: {}", e);
                false
            }
        }
    }
}

fn save_all(documents: &BTreeMap<String, String>, target_dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(target_dir)?;
    for (name, content) in documents {
        let path = match name.as_str() {
            "agents" => {
                if let Some(existing) = find_identical(&agents_candidates(target_dir), content) {
                    log_debug!("[Docs] {} unchanged", existing.display());
                    continue;
                }
                agents_file_path(target_dir)
            }
            "kdf_api" => target_dir.join("KDF_API_DOCUMENTATION.md"),
            other => {
                let docs_dir = target_dir.join("docs");
                fs::create_dir_all(&docs_dir)?;
                docs_dir.join(format!("{other}.md"))
            }
        };
        if find_identical(std::slice::from_ref(&path), content).is_some() {
            log_debug!("[Docs] {} unchanged", path.display());
            continue;
        }
        fs::write(&path, content)?;
        log_info!("[Docs] Saved {} to {}", name.green(), path.display());
    }
    Ok(())
}

/// `AGENTS.md` when free, otherwise `AGENTS_<n+1>.md` where `n` is the highest existing suffix.
pub fn agents_file_path(target_dir: &Path) -> PathBuf {
    let base = target_dir.join("AGENTS.md");
    if !base.exists() {
        return base;
    }
    let max = agents_versions(target_dir).into_iter().max().unwrap_or(0);
    let versioned = target_dir.join(format!("AGENTS_{}.md", max + 1));
    log_warn!("[Docs] AGENTS.md exists, saving to {}", versioned.display());
    versioned
}

/// Numeric suffixes of `AGENTS_<n>.md` files in `dir`.
fn agents_versions(dir: &Path) -> Vec<u32> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            name.strip_prefix("AGENTS_")?.strip_suffix(".md")?.parse().ok()
        })
        .collect()
}

fn agents_candidates(dir: &Path) -> Vec<PathBuf> {
    let mut paths = vec![dir.join("AGENTS.md")];
    paths.extend(
        agents_versions(dir)
            .into_iter()
            .map(|n| dir.join(format!("AGENTS_{n}.md"))),
    );
    paths
}

fn digest(bytes: &[u8]) -> Vec<u8> {
    Sha256::digest(bytes).to_vec()
}

/// First of `paths` whose contents hash the same as `content`.
fn find_identical<'p>(paths: &'p [PathBuf], content: &str) -> Option<&'p PathBuf> {
    let wanted = digest(content.as_bytes());
    paths
        .iter()
        .find(|p| fs::read(p).map(|bytes| digest(&bytes) == wanted).unwrap_or(false))
}

/// The agents guide followed by the bloc and commit convention sections.
pub fn combine_documents(documents: &BTreeMap<String, String>) -> Option<String> {
    let mut combined = documents.get("agents")?.clone();

    let bloc: Vec<&str> = BLOC_KEYS
        .iter()
        .filter_map(|k| documents.get(*k).map(String::as_str))
        .collect();
    if !bloc.is_empty() {
        combined.push_str("\n\n# Bloc Framework Documentation\n\n");
        combined.push_str(&bloc.join("\n\n"));
    }
    if let Some(commits) = documents.get("commit_conventions") {
        combined.push_str("\n\n# Commit Conventions\n\n");
        combined.push_str(commits);
    }
    Some(combined)
}

/// Extracts `x` from a `SCRIPT_VERSION="x"` assignment.
pub fn parse_script_version(script: &str) -> Option<String> {
    let start = script.find("SCRIPT_VERSION=\"")? + "SCRIPT_VERSION=\"".len();
    let rest = &script[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string()).filter(|v| !v.is_empty())
}

fn is_newer(latest: &str, current: &str) -> bool {
    match (semver::Version::parse(latest), semver::Version::parse(current)) {
        (Ok(l), Ok(c)) => l > c,
        _ => latest != current,
    }
}

fn write_executable(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}
