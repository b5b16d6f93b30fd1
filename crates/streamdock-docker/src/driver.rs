//! The container driver interface.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use streamdock_core::Result;
use tokio::sync::mpsc;

use crate::VolumeMap;

/// A locally available image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Repository tags. Empty for dangling images.
    pub tags: Vec<String>,
    /// Size in bytes.
    pub size: i64,
}

impl ImageInfo {
    /// Size in mebibytes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_mb(&self) -> f64 {
        self.size as f64 / (1024.0 * 1024.0)
    }

    /// Tags to display, `<none>` for untagged images.
    #[must_use]
    pub fn display_tags(&self) -> Vec<&str> {
        if self.tags.is_empty() {
            vec!["<none>"]
        } else {
            self.tags.iter().map(String::as_str).collect()
        }
    }
}

/// A container started by [`ContainerDriver::run_container`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHandle {
    /// Container id.
    pub id: String,
}

/// A container as listed by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    /// Container id.
    pub id: String,
    /// Runtime state string, e.g. `running` or `exited`.
    pub status: String,
}

/// Everything needed to start one session container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    /// Image to run.
    pub image: String,
    /// Container name.
    pub name: String,
    /// Environment variables.
    pub environment: HashMap<String, String>,
    /// Host directories to bind.
    pub volumes: VolumeMap,
    /// Let the daemon remove the container when it stops.
    pub auto_remove: bool,
}

/// Operations streamdock needs from a container runtime.
///
/// Every method may fail with
/// [`Error::RuntimeUnavailable`](streamdock_core::Error::RuntimeUnavailable)
/// when the daemon cannot be reached. Callers surface it; nothing here
/// retries.
#[async_trait]
pub trait ContainerDriver: Send + Sync {
    /// Check the daemon connection and return the engine version.
    async fn version(&self) -> Result<String>;

    /// Whether `image` exists locally.
    async fn image_exists(&self, image: &str) -> Result<bool>;

    /// Build `tag` from the directory `context`.
    ///
    /// Build output is sent to `lines` in the order the daemon produces it.
    async fn build_image(
        &self,
        context: &Path,
        tag: &str,
        lines: &mpsc::UnboundedSender<String>,
    ) -> Result<()>;

    /// Pull `image` from its registry.
    async fn pull_image(&self, image: &str) -> Result<()>;

    /// List local images.
    async fn list_images(&self) -> Result<Vec<ImageInfo>>;

    /// Create and start a detached container.
    async fn run_container(&self, spec: &RunSpec) -> Result<ContainerHandle>;

    /// Stop a container.
    ///
    /// Fails with [`Error::NotFound`](streamdock_core::Error::NotFound) if
    /// the container is gone.
    async fn stop_container(&self, id: &str, timeout_secs: i64) -> Result<()>;

    /// Remove a container.
    ///
    /// Fails with [`Error::NotFound`](streamdock_core::Error::NotFound) if
    /// the container is gone.
    async fn remove_container(&self, id: &str) -> Result<()>;

    /// The last `tail_lines` lines of a container's output.
    async fn fetch_logs(&self, id: &str, tail_lines: usize) -> Result<String>;

    /// List containers known to the runtime.
    async fn list_containers(&self, include_stopped: bool) -> Result<Vec<ContainerState>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_display() {
        let untagged = ImageInfo {
            tags: Vec::new(),
            size: 0,
        };
        assert_eq!(untagged.display_tags(), vec!["<none>"]);

        let tagged = ImageInfo {
            tags: vec!["streamlink-tor:latest".into()],
            size: 3 * 1024 * 1024,
        };
        assert_eq!(tagged.display_tags(), vec!["streamlink-tor:latest"]);
        assert!((tagged.size_mb() - 3.0).abs() < f64::EPSILON);
    }
}
