//! Running external programs.
//!
//! Every manager talks to the outside world (`apt-get`, `fvm`, `flutter`, `sdkmanager`, `git`)
//! through the [`CommandRunner`] trait. [`SystemRunner`] spawns real processes; tests swap in
//! a scripted runner so installer logic can be exercised without touching the machine.

use crate::errors::CommandError;
use crate::log_debug;
use std::ffi::OsString;
use std::fmt;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Directories discovered during this run (e.g. FVM's pub-cache bin) that every child
/// process should see ahead of the inherited `PATH`.
static SESSION_PATH: Mutex<Vec<PathBuf>> = Mutex::new(Vec::new());

/// Makes `dir` visible to `command_exists` and to every command spawned afterwards.
pub fn prepend_to_session_path(dir: &Path) {
    let mut dirs = SESSION_PATH.lock().unwrap_or_else(|e| e.into_inner());
    if !dirs.iter().any(|d| d == dir) {
        log_debug!("[Exec] Adding {} to the session PATH", dir.display());
        dirs.insert(0, dir.to_path_buf());
    }
}

/// The inherited `PATH` with session directories in front.
pub fn session_path() -> OsString {
    let extra = SESSION_PATH.lock().unwrap_or_else(|e| e.into_inner()).clone();
    let inherited = std::env::var_os("PATH").unwrap_or_default();
    let all = extra
        .into_iter()
        .chain(std::env::split_paths(&inherited))
        .collect::<Vec<_>>();
    std::env::join_paths(all).unwrap_or(inherited)
}

/// Description of a single external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
    /// Written to the child's stdin, which is then closed.
    pub stdin: Option<String>,
    pub timeout: Option<Duration>,
    /// When set, a non-zero exit status becomes `CommandError::Failed`.
    pub check: bool,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            stdin: None,
            timeout: None,
            check: true,
        }
    }

    /// A pipeline or other shell construct, run through `bash -c`.
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("bash").arg("-c").arg(script)
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Return the output even when the exit status is non-zero.
    pub fn unchecked(mut self) -> Self {
        self.check = false;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// First non-empty line of stdout, falling back to stderr.
    /// Tools such as `java -version` print their banner on stderr.
    pub fn first_line(&self) -> Option<String> {
        self.stdout
            .lines()
            .chain(self.stderr.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
    }
}

/// The seam between installer logic and the operating system.
pub trait CommandRunner: Send + Sync {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;

    /// Whether `name` resolves to an executable on `PATH`.
    fn command_exists(&self, name: &str) -> bool {
        find_in_path(name).is_some()
    }

    /// Runs `name flag` and returns the first line of its output.
    fn command_version(&self, name: &str, flag: &str) -> Option<String> {
        if !self.command_exists(name) {
            return None;
        }
        self.run(&CommandSpec::new(name).arg(flag).timeout(Duration::from_secs(30)))
            .ok()
            .and_then(|out| out.first_line())
    }

    /// Runs a command and reports only whether it succeeded, logging the error otherwise.
    fn run_ok(&self, spec: &CommandSpec) -> bool {
        match self.run(spec) {
            Ok(out) => out.success(),
            Err(e) => {
                log_debug!("[Exec] {}", e);
                false
            }
        }
    }
}

/// Looks `name` up in each directory of `PATH`.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    if name.contains('/') {
        let p = PathBuf::from(name);
        return p.is_file().then_some(p);
    }
    let path = session_path();
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Spawns real processes with captured output and an optional timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let rendered = spec.to_string();
        log_debug!("[Exec] Executing: {}", rendered);
        let span = tracing::debug_span!("command", cmd = %rendered);
        let _guard = span.enter();
        tracing::debug!(cwd = ?spec.cwd, timeout = ?spec.timeout, "spawning");
        let started = Instant::now();

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        command.env("PATH", session_path());
        for (k, v) in &spec.env {
            command.env(k, v);
        }

        let mut child = command.spawn().map_err(|source| CommandError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let io_err = |source| CommandError::Io {
            command: rendered.clone(),
            source,
        };

        // Pipes are drained on their own threads so a chatty child never blocks on a full buffer.
        let stdin_writer = match (child.stdin.take(), spec.stdin.clone()) {
            (Some(mut pipe), Some(input)) => Some(thread::spawn(move || {
                // The child may exit before reading everything, which surfaces as a broken pipe.
                let _ = pipe.write_all(input.as_bytes());
            })),
            _ => None,
        };
        let stdout_reader = child.stdout.take().map(spawn_reader);
        let stderr_reader = child.stderr.take().map(spawn_reader);

        let status = loop {
            if let Some(status) = child.try_wait().map_err(io_err)? {
                break status;
            }
            if let Some(limit) = spec.timeout {
                if started.elapsed() >= limit {
                    let _ = child.kill();
                    let _ = child.wait();
                    tracing::warn!(seconds = limit.as_secs(), "command timed out");
                    return Err(CommandError::TimedOut {
                        command: rendered,
                        seconds: limit.as_secs(),
                    });
                }
            }
            thread::sleep(POLL_INTERVAL);
        };

        if let Some(handle) = stdin_writer {
            let _ = handle.join();
        }
        let stdout = stdout_reader.map(join_reader).unwrap_or_default();
        let stderr = stderr_reader.map(join_reader).unwrap_or_default();
        let code = status.code().unwrap_or(-1);
        tracing::debug!(code, elapsed_ms = started.elapsed().as_millis() as u64, "finished");
        if code != 0 {
            log_debug!("[Exec] '{}' exited with {}: {}", rendered, code, stderr.trim());
        }

        if spec.check && code != 0 {
            return Err(CommandError::Failed {
                command: rendered,
                code,
                stderr,
            });
        }
        Ok(CommandOutput {
            code,
            stdout,
            stderr,
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = source.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join_reader(handle: thread::JoinHandle<String>) -> String {
    handle.join().unwrap_or_default()
}

/// Applies `task` to every item using at most `max_workers` threads.
///
/// Results come back in the same order as `items`. With one worker (or one item)
/// everything runs on the calling thread.
pub fn run_parallel<T, R, F>(items: Vec<T>, max_workers: usize, task: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let workers = max_workers.max(1).min(items.len());
    if workers <= 1 {
        return items.into_iter().map(task).collect();
    }

    let total = items.len();
    let queue = Mutex::new(items.into_iter().enumerate());
    let results: Mutex<Vec<Option<R>>> = Mutex::new((0..total).map(|_| None).collect());

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| {
                loop {
                    let next = queue.lock().unwrap_or_else(|e| e.into_inner()).next();
                    let Some((index, item)) = next else { break };
                    let value = task(item);
                    results.lock().unwrap_or_else(|e| e.into_inner())[index] = Some(value);
                }
            });
        }
    });

    results
        .into_inner()
        .unwrap_or_else(|e| e.into_inner())
        .into_iter()
        .flatten()
        .collect()
}

/// Runs a static list of independent commands.
///
/// With `parallel` off (or a single command) they run one after another. Every command
/// runs to completion either way; the first error in input order is returned afterwards.
pub fn run_commands(
    runner: &dyn CommandRunner,
    specs: Vec<CommandSpec>,
    parallel: bool,
    max_workers: usize,
) -> Result<Vec<CommandOutput>, CommandError> {
    let workers = if parallel { max_workers } else { 1 };
    run_parallel(specs, workers, |spec| runner.run(&spec))
        .into_iter()
        .collect()
}

#[cfg(test)]
pub mod fake {
    //! A scripted `CommandRunner` for unit tests.

    use super::*;
    use std::collections::HashSet;

    /// Replies to commands whose rendered form starts with a registered prefix.
    /// Unmatched commands succeed with empty output. Every call is recorded.
    #[derive(Default)]
    pub struct ScriptedRunner {
        replies: Vec<(String, Result<CommandOutput, String>)>,
        available: HashSet<String>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Marks programs as present on `PATH`.
        pub fn with_commands(mut self, names: &[&str]) -> Self {
            self.available.extend(names.iter().map(|n| n.to_string()));
            self
        }

        pub fn reply(mut self, prefix: &str, output: CommandOutput) -> Self {
            self.replies.push((prefix.to_string(), Ok(output)));
            self
        }

        /// Makes matching commands fail to spawn.
        pub fn spawn_error(mut self, prefix: &str, message: &str) -> Self {
            self.replies.push((prefix.to_string(), Err(message.to_string())));
            self
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn called(&self, prefix: &str) -> bool {
            self.calls().iter().any(|c| c.starts_with(prefix))
        }
    }

    impl CommandRunner for ScriptedRunner {
        fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
            let rendered = spec.to_string();
            self.calls.lock().unwrap().push(rendered.clone());
            let reply = self
                .replies
                .iter()
                .find(|(prefix, _)| rendered.starts_with(prefix.as_str()))
                .map(|(_, r)| r.clone())
                .unwrap_or_else(|| Ok(CommandOutput::ok("")));
            match reply {
                Err(message) => Err(CommandError::Spawn {
                    program: spec.program.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, message),
                }),
                Ok(out) if spec.check && out.code != 0 => Err(CommandError::Failed {
                    command: rendered,
                    code: out.code,
                    stderr: out.stderr,
                }),
                Ok(out) => Ok(out),
            }
        }

        fn command_exists(&self, name: &str) -> bool {
            self.available.contains(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let spec = CommandSpec::shell("curl -fsSL https://fvm.app/install.sh | bash");
        assert_eq!(
            spec.to_string(),
            "bash -c \"curl -fsSL https://fvm.app/install.sh | bash\""
        );
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_exit_code() {
        let out = SystemRunner
            .run(&CommandSpec::shell("echo hello; echo oops >&2; exit 3").unchecked())
            .unwrap();
        assert_eq!(out.code, 3);
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[cfg(unix)]
    #[test]
    fn checked_failure_is_an_error() {
        let err = SystemRunner.run(&CommandSpec::shell("exit 2")).unwrap_err();
        assert!(matches!(err, CommandError::Failed { code: 2, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn stdin_is_fed_to_the_child() {
        let out = SystemRunner
            .run(&CommandSpec::new("cat").stdin("y\ny\n"))
            .unwrap();
        assert_eq!(out.stdout, "y\ny\n");
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_the_child() {
        let started = Instant::now();
        let err = SystemRunner
            .run(&CommandSpec::new("sleep").arg("5").timeout(Duration::from_millis(200)))
            .unwrap_err();
        assert!(matches!(err, CommandError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let err = SystemRunner
            .run(&CommandSpec::new("kce-definitely-not-a-real-program"))
            .unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
        assert!(!SystemRunner.command_exists("kce-definitely-not-a-real-program"));
    }

    #[cfg(unix)]
    #[test]
    fn session_path_makes_tools_visible() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("kce-session-tool");
        std::fs::write(&tool, "#!/bin/sh\necho found\n").unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        assert!(!SystemRunner.command_exists("kce-session-tool"));
        prepend_to_session_path(dir.path());
        assert!(SystemRunner.command_exists("kce-session-tool"));
        assert!(session_path().to_string_lossy().starts_with(&*dir.path().to_string_lossy()));
    }

    #[test]
    fn first_line_falls_back_to_stderr() {
        let out = CommandOutput {
            code: 0,
            stdout: "\n".into(),
            stderr: "openjdk version \"17.0.8\" 2023-07-18\nOpenJDK Runtime".into(),
        };
        assert_eq!(out.first_line().unwrap(), "openjdk version \"17.0.8\" 2023-07-18");
    }

    #[test]
    fn run_parallel_preserves_order() {
        let squares = run_parallel((1..=20).collect(), 4, |n: u64| n * n);
        assert_eq!(squares, (1..=20).map(|n| n * n).collect::<Vec<_>>());
    }

    #[test]
    fn run_parallel_respects_worker_bound() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let active = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        run_parallel((0..12).collect(), 3, |_: i32| {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            active.fetch_sub(1, Ordering::SeqCst);
        });
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn run_commands_reports_first_error_after_all_ran() {
        let runner = fake::ScriptedRunner::new().reply("false", CommandOutput::failed(1, ""));
        let specs = vec![
            CommandSpec::new("echo").arg("a"),
            CommandSpec::new("false"),
            CommandSpec::new("echo").arg("b"),
        ];
        let result = run_commands(&runner, specs, true, 2);
        assert!(matches!(result, Err(CommandError::Failed { .. })));
        assert_eq!(runner.calls().len(), 3);
    }

    #[test]
    fn scripted_runner_records_calls() {
        let runner = fake::ScriptedRunner::new()
            .reply("fvm --version", CommandOutput::ok("3.2.1\n"))
            .reply("fvm install", CommandOutput::failed(1, "network"));
        assert_eq!(
            runner.run(&CommandSpec::new("fvm").arg("--version")).unwrap().stdout,
            "3.2.1\n"
        );
        assert!(!runner.run_ok(&CommandSpec::new("fvm").args(["install", "3.32.0"])));
        assert_eq!(runner.calls(), vec!["fvm --version", "fvm install 3.32.0"]);
    }
}
