//! Build context packaging.

use std::path::Path;
use streamdock_core::{Error, Result};

/// Pack the contents of `dir` into an uncompressed tar archive.
///
/// Entries are stored relative to `dir`, which is what the Docker build
/// endpoint expects.
///
/// # Errors
///
/// Returns an error if `dir` is not a directory or cannot be read.
pub fn archive_directory(dir: &Path) -> Result<Vec<u8>> {
    if !dir.is_dir() {
        return Err(Error::Config(format!(
            "build directory does not exist: {}",
            dir.display()
        )));
    }

    let mut builder = tar::Builder::new(Vec::new());
    builder.follow_symlinks(true);
    builder.append_dir_all(".", dir)?;
    Ok(builder.into_inner()?)
}
