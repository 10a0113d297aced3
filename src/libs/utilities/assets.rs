use crate::errors::DocsError;
use crate::{log_debug, log_error, log_warn};
use colored::Colorize;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::time::Duration;

/// Timeout for the first attempt at fetching a text resource.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);
/// Longer timeout used for the single retry.
pub const RETRY_TIMEOUT: Duration = Duration::from_secs(15);

fn agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout(timeout)
        .user_agent(concat!("komodo-codex-env/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Downloads a file from a given URL and saves it to `dest`.
///
/// # Arguments
/// * `url`: The URL of the file to download.
/// * `dest`: Full destination path, including the file name.
///
/// # Returns
/// * `io::Result<()>`: `Ok(())` once the body has been streamed to disk.
pub fn download_file(url: &str, dest: &Path) -> io::Result<()> {
    log_debug!("[Utils] Starting download from URL: {}", url.blue());

    let response = match agent(Duration::from_secs(600)).get(url).call() {
        Ok(res) => res,
        Err(e) => {
            log_error!("[Utils] HTTP request failed for {}: {}", url.red(), e);
            return Err(io::Error::other(format!("HTTP error: {e}")));
        }
    };

    let mut file = File::create(dest)?;
    let mut reader = response.into_reader();
    io::copy(&mut reader, &mut file)?;

    log_debug!("[Utils] File downloaded successfully to {}", dest.to_string_lossy().green());
    Ok(())
}

/// Fetches a UTF-8 text resource.
///
/// A failed request is retried once with a longer timeout, except for a 404 which
/// will not change on retry. An empty body is an error.
pub fn fetch_text(url: &str) -> Result<String, DocsError> {
    log_debug!("[Utils] Fetching {}", url.blue());
    let body = match read_body(agent(FETCH_TIMEOUT), url) {
        Err(ureq::Error::Status(404, response)) => {
            return Err(ureq::Error::Status(404, response).into());
        }
        Err(e) => {
            log_warn!("[Utils] Request to {} failed ({}). Retrying once.", url.yellow(), e);
            read_body(agent(RETRY_TIMEOUT), url)?
        }
        Ok(body) => body,
    };
    if body.trim().is_empty() {
        return Err(DocsError::Empty(url.to_string()));
    }
    Ok(body)
}

fn read_body(agent: ureq::Agent, url: &str) -> Result<String, ureq::Error> {
    let response = agent.get(url).call()?;
    let mut body = String::new();
    response
        .into_reader()
        .read_to_string(&mut body)
        .map_err(ureq::Error::from)?;
    Ok(body)
}
