//! Error types shared across the installer.
//!
//! Most managers report success as a `bool` and log the reason for a failure on
//! the spot. These types cover the places where a caller needs to tell failures
//! apart: running external commands, loading configuration, and fetching
//! documentation over HTTP.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while running an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The process could not be started at all (missing binary, bad cwd, ...).
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The process exited unsuccessfully and the caller asked for a checked run.
    #[error("'{command}' failed with exit code {code}{}", stderr_suffix(.stderr))]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// The process exceeded its timeout and was killed.
    #[error("'{command}' timed out after {seconds} seconds")]
    TimedOut { command: String, seconds: u64 },

    /// Reading output or waiting on the child failed.
    #[error("I/O error while running '{command}': {source}")]
    Io {
        command: String,
        #[source]
        source: io::Error,
    },
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.trim().is_empty() {
        String::new()
    } else {
        format!("\nError: {}", stderr.trim())
    }
}

/// Errors raised while building or validating an `EnvironmentConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("unsupported platform '{0}' (expected one of: {1})")]
    UnknownPlatform(String, String),

    #[error("invalid value '{value}' for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

/// Errors raised while fetching or writing documentation.
#[derive(Debug, Error)]
pub enum DocsError {
    #[error("request to {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("empty response body from {0}")]
    Empty(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl From<ureq::Error> for DocsError {
    fn from(err: ureq::Error) -> Self {
        let url = match &err {
            ureq::Error::Status(_, response) => response.get_url().to_string(),
            ureq::Error::Transport(transport) => transport
                .url()
                .map(|u| u.to_string())
                .unwrap_or_default(),
        };
        DocsError::Http {
            url,
            message: err.to_string(),
        }
    }
}
