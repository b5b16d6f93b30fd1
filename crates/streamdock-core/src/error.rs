//! Error types for streamdock.

use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in streamdock.
#[derive(Debug, Error)]
pub enum Error {
    /// The container engine cannot be reached.
    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    /// Container not found.
    #[error("container not found: {0}")]
    NotFound(String),

    /// Image not present locally.
    #[error("image not found: {0}")]
    ImageNotFound(String),

    /// A session with this container id is already registered.
    #[error("duplicate session id: {0}")]
    DuplicateId(String),

    /// Docker error.
    #[error("docker error: {0}")]
    Docker(String),

    /// Configuration or input error.
    #[error("config error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether the target container is already gone.
    ///
    /// Stop and remove treat this as having reached the desired state.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the daemon connection is down.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::RuntimeUnavailable(_))
    }
}
