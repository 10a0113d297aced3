use crate::log_debug;
use colored::Colorize;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use zip::ZipArchive;

/// Extracts a ZIP archive directly into `dest`.
///
/// # Arguments
/// * `src`: The archive to extract.
/// * `dest`: Directory receiving the archive contents. Created when missing.
///
/// # Returns
/// * `io::Result<()>`: An error when `src` is not a readable ZIP archive or `dest` is not writable.
pub fn extract_zip(src: &Path, dest: &Path) -> io::Result<()> {
    log_debug!(
        "[Utils] Extracting archive {} into {}",
        src.display().to_string().blue(),
        dest.display().to_string().cyan()
    );

    fs::create_dir_all(dest)?;

    // Unix permission bits are restored from the archive, so bundled scripts stay executable.
    let mut archive = ZipArchive::new(File::open(src)?)?;
    archive.extract(dest)?;

    log_debug!("[Utils] Archive contents available at: {}", dest.display().to_string().green());
    Ok(())
}
