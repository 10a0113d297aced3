use crate::libs::executor::{CommandRunner, CommandSpec};
use crate::{log_debug, log_error, log_info, log_warn};
use colored::Colorize;
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Git operations on the project checkout the installer runs in.
pub struct GitManager<'a> {
    runner: &'a dyn CommandRunner,
    path: PathBuf,
}

impl<'a> GitManager<'a> {
    pub fn new(runner: &'a dyn CommandRunner, path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            path: path.into(),
        }
    }

    fn git(&self) -> CommandSpec {
        CommandSpec::new("git").cwd(&self.path).unchecked()
    }

    /// Trimmed stdout of a successful git command.
    fn git_output(&self, args: &[&str]) -> Option<String> {
        let spec = self.git().args(args.iter().copied());
        match self.runner.run(&spec) {
            Ok(out) if out.success() => Some(out.stdout.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                log_debug!("[Git] {}", e);
                None
            }
        }
    }

    /// Whether the directory is the top level of a git work tree.
    /// A subdirectory of some enclosing repository does not count.
    pub fn is_git_repo(&self) -> bool {
        if self.git_output(&["rev-parse", "--is-inside-work-tree"]).as_deref() != Some("true") {
            return false;
        }
        match self.git_output(&["rev-parse", "--show-toplevel"]) {
            Some(top) => same_path(Path::new(&top), &self.path),
            None => false,
        }
    }

    pub fn repo_name(&self) -> Option<String> {
        if !self.is_git_repo() {
            return None;
        }
        let top = self.git_output(&["rev-parse", "--show-toplevel"])?;
        Path::new(&top)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }

    pub fn remote_url(&self, remote: &str) -> Option<String> {
        if !self.is_git_repo() {
            return None;
        }
        self.git_output(&["remote", "get-url", remote])
            .filter(|url| !url.is_empty())
    }

    /// Adds `name`, or points it at `url` when it already exists with another URL.
    pub fn add_remote(&self, name: &str, url: &str) -> bool {
        let spec = match self.remote_url(name) {
            Some(existing) if existing == url => return true,
            Some(_) => {
                log_info!("[Git] Updating remote {} URL to {}", name, url.cyan());
                self.git().args(["remote", "set-url", name, url])
            }
            None => {
                log_info!("[Git] Adding remote {} ({})", name, url.cyan());
                self.git().args(["remote", "add", name, url])
            }
        };
        if self.runner.run_ok(&spec) {
            true
        } else {
            log_error!("[Git] Failed to configure remote {}", name);
            false
        }
    }

    pub fn fetch_all_branches(&self, timeout: Duration) -> bool {
        if !self.is_git_repo() {
            log_warn!("[Git] Not in a Git repository, skipping fetch");
            return false;
        }
        log_info!("[Git] Fetching all remote branches...");
        let ok = self
            .runner
            .run_ok(&self.git().args(["fetch", "--all"]).timeout(timeout));
        if !ok {
            log_warn!("[Git] Git fetch failed or timed out");
        }
        ok
    }

    /// Checks out `branch`. With `create`, a new local branch is made, tracking
    /// `origin/<branch>` when that remote branch exists.
    pub fn checkout_branch(&self, branch: &str, create: bool) -> bool {
        let spec = if create {
            let remote_branch = format!("origin/{branch}");
            let tracks_remote = self
                .git_output(&["branch", "-r"])
                .map(|out| out.lines().any(|l| l.trim() == remote_branch))
                .unwrap_or(false);
            let spec = self.git().args(["checkout", "-b", branch]);
            if tracks_remote { spec.arg(remote_branch) } else { spec }
        } else {
            self.git().args(["checkout", branch])
        };
        self.runner.run_ok(&spec)
    }

    pub fn current_branch(&self) -> Option<String> {
        self.git_output(&["branch", "--show-current"])
            .filter(|b| !b.is_empty())
    }

    /// Appends patterns missing from `.git/info/exclude`.
    pub fn update_git_exclude(&self, patterns: &[&str]) -> bool {
        self.is_git_repo() && update_git_exclude(&self.path, patterns, None)
    }

    /// Marks the directory as safe for git despite ownership differences (common in containers).
    pub fn configure_safe_directory(&self) -> bool {
        let dir = self.path.display().to_string();
        self.runner.run_ok(
            &CommandSpec::new("git")
                .args(["config", "--global", "--add", "safe.directory", dir.as_str()])
                .unchecked(),
        )
    }
}

/// Appends patterns missing from `repo_dir/.git/info/exclude`, optionally under `header`.
///
/// # Returns
/// * `false` when `repo_dir` has no `.git/info` directory or the file cannot be written.
pub fn update_git_exclude(repo_dir: &Path, patterns: &[&str], header: Option<&str>) -> bool {
    let info_dir = repo_dir.join(".git").join("info");
    if !info_dir.is_dir() {
        log_warn!("[Git] Not in a git repository, skipping git exclude update");
        return false;
    }
    match append_exclude_patterns(&info_dir.join("exclude"), patterns, header) {
        Ok(_) => true,
        Err(e) => {
            log_warn!("[Git] Could not update git exclude file: {}", e);
            false
        }
    }
}

/// Appends every pattern not already listed in `exclude_file`, optionally under `header`.
///
/// # Returns
/// * `Ok(n)`: number of patterns added.
fn append_exclude_patterns(
    exclude_file: &Path,
    patterns: &[&str],
    header: Option<&str>,
) -> std::io::Result<usize> {
    if let Some(parent) = exclude_file.parent() {
        fs::create_dir_all(parent)?;
    }
    let existing = fs::read_to_string(exclude_file).unwrap_or_default();
    let mut seen: HashSet<&str> = existing.lines().map(str::trim).collect();
    let new_patterns: Vec<&str> = patterns
        .iter()
        .copied()
        .filter(|p| seen.insert(*p))
        .collect();

    if new_patterns.is_empty() {
        return Ok(0);
    }
    log_info!(
        "[Git] Adding {} patterns to {}",
        new_patterns.len(),
        exclude_file.display().to_string().cyan()
    );
    let mut file = OpenOptions::new().create(true).append(true).open(exclude_file)?;
    if !existing.is_empty() && !existing.ends_with('\n') {
        writeln!(file)?;
    }
    if let Some(header) = header {
        writeln!(file, "\n{header}")?;
    }
    for pattern in &new_patterns {
        writeln!(file, "{pattern}")?;
    }
    Ok(new_patterns.len())
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
