//! File utility functions for listing and filtering files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Supported FITS file extensions.
pub const FITS_EXTENSIONS: &[&str] = &["fit", "fits", "fts"];

/// Returns paths to all regular files in `dir` whose file name starts with `prefix`.
///
/// This is a plain prefix match, not a glob. An empty prefix matches every file.
/// Paths are sorted so repeated scans of the same directory iterate in the same order.
pub fn files_with_prefix(dir: &Path, prefix: &str) -> io::Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry.path()),
            Err(e) => {
                tracing::debug!("Skipping unreadable entry in {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(prefix))
        })
        .collect();

    paths.sort();
    Ok(paths)
}

/// Returns true if the path has one of the FITS extensions (case-insensitive).
pub fn is_fits_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| FITS_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}
