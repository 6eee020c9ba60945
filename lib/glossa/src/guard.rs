//! Clean-slate precondition for the output location.

use crate::error::{GlossaError, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::info;

/// Removes whatever sits at `location`: a directory tree or a single file.
/// Returns whether something was deleted. The location is not recreated.
pub fn clear_output(location: &Path) -> Result<bool> {
    let meta = match fs::symlink_metadata(location) {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(GlossaError::storage("stat", location, e)),
    };
    let removed = if meta.is_dir() {
        fs::remove_dir_all(location).map_err(|e| GlossaError::storage("remove_dir_all", location, e))
    } else {
        fs::remove_file(location).map_err(|e| GlossaError::storage("remove_file", location, e))
    };
    removed?;
    info!(output = %location.display(), "cleared pre-existing output");
    Ok(true)
}
