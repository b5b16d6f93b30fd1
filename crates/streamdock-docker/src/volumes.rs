//! Volume binding abstraction for Docker containers.

use std::collections::BTreeMap;

/// Access mode of a bind mount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VolumeMode {
    /// Read-write.
    #[default]
    ReadWrite,
    /// Read-only.
    ReadOnly,
}

impl VolumeMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::ReadWrite => "rw",
            Self::ReadOnly => "ro",
        }
    }
}

/// Where a host directory appears in the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBinding {
    /// Path inside the container.
    pub container_path: String,
    /// Access mode.
    pub mode: VolumeMode,
}

/// Host path -> container binding.
///
/// Hides bollard's `binds` string format from other crates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeMap {
    bindings: BTreeMap<String, VolumeBinding>,
}

impl VolumeMap {
    /// Create a new empty volume map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `host_path` at `container_path`.
    pub fn bind(
        &mut self,
        host_path: impl Into<String>,
        container_path: impl Into<String>,
        mode: VolumeMode,
    ) -> &mut Self {
        self.bindings.insert(
            host_path.into(),
            VolumeBinding {
                container_path: container_path.into(),
                mode,
            },
        );
        self
    }

    /// Look up the binding for a host path.
    #[must_use]
    pub fn get(&self, host_path: &str) -> Option<&VolumeBinding> {
        self.bindings.get(host_path)
    }

    /// Convert to bollard's `HostConfig::binds` format.
    pub(crate) fn to_bollard_binds(&self) -> Vec<String> {
        self.bindings
            .iter()
            .map(|(host, binding)| {
                format!("{host}:{}:{}", binding.container_path, binding.mode.as_str())
            })
            .collect()
    }

    /// Check if the volume map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Get the number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }
}
