//! Embedded build context assets.

use std::path::{Path, PathBuf};
use streamdock_core::{Error, Result};

/// One file of the build context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Asset {
    /// File name inside the build directory.
    pub file_name: &'static str,
    /// What the file is for.
    pub description: &'static str,
    /// Exact file contents.
    pub contents: &'static str,
}

/// Every file the image build needs.
pub const BUILD_CONTEXT: &[Asset] = &[
    Asset {
        file_name: "Dockerfile",
        description: "image build recipe",
        contents: include_str!("../assets/Dockerfile"),
    },
    Asset {
        file_name: "torrc",
        description: "Tor SOCKS proxy configuration",
        contents: include_str!("../assets/torrc"),
    },
    Asset {
        file_name: "start_with_tor.py",
        description: "container entrypoint",
        contents: include_str!("../assets/start_with_tor.py"),
    },
    Asset {
        file_name: "kick.py",
        description: "streamlink plugin for kick.com",
        contents: include_str!("../assets/kick.py"),
    },
];

/// Write the build context into `dir`, creating it if needed.
///
/// Existing files with the same names are overwritten. Returns the paths
/// written, in [`BUILD_CONTEXT`] order.
///
/// # Errors
///
/// Returns an error if `dir` is empty or any file cannot be written.
pub fn write_build_context(dir: &Path) -> Result<Vec<PathBuf>> {
    if dir.as_os_str().is_empty() {
        return Err(Error::Config("build directory is not set".into()));
    }

    std::fs::create_dir_all(dir)?;

    let mut written = Vec::with_capacity(BUILD_CONTEXT.len());
    for asset in BUILD_CONTEXT {
        let path = dir.join(asset.file_name);
        std::fs::write(&path, asset.contents)?;
        tracing::debug!(path = %path.display(), "wrote {}", asset.description);
        written.push(path);
    }

    Ok(written)
}
