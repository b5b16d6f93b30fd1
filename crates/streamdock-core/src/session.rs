//! Session and stream request types.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{Error, Result};

/// `OUTPUT_FILE` value that makes the container write to its stdout.
pub const STDOUT_SENTINEL: &str = "-";

/// Mount point of the output directory inside the container.
pub const OUTPUT_MOUNT: &str = "/output";

/// One tracked container execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Container id assigned by the runtime.
    pub id: String,
    /// Container name, `{prefix}-{sequence}`.
    pub name: String,
    /// Sequence number the name was derived from.
    pub sequence: u64,
    /// Stream URL.
    pub source_url: String,
    /// Requested streamlink quality.
    pub quality: String,
    /// `OUTPUT_FILE` passed to the container.
    pub output_target: String,
    /// When the container was created.
    pub created_at: DateTime<Local>,
    /// Last known runtime status.
    pub runtime_status: SessionStatus,
}

impl Session {
    /// First 12 characters of the container id.
    #[must_use]
    pub fn short_id(&self) -> &str {
        self.id.get(..12).unwrap_or(&self.id)
    }

    /// Whether output goes to the container's stdout.
    #[must_use]
    pub fn writes_to_stdout(&self) -> bool {
        self.output_target == STDOUT_SENTINEL
    }
}

/// Status of a session as last observed in the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// Container created but not yet running.
    Starting,
    /// Container is running.
    Running,
    /// Container no longer exists in the runtime.
    Missing,
    /// Container exists but is not running.
    Stopped,
}

impl SessionStatus {
    /// Map a Docker container state string.
    ///
    /// Returns `None` for states Docker does not document.
    #[must_use]
    pub fn from_runtime_state(state: &str) -> Option<Self> {
        match state.trim().to_ascii_lowercase().as_str() {
            "created" | "restarting" => Some(Self::Starting),
            "running" => Some(Self::Running),
            "paused" | "exited" | "dead" | "removing" => Some(Self::Stopped),
            _ => None,
        }
    }

    /// Whether the container may still be producing output.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Running => write!(f, "running"),
            Self::Missing => write!(f, "missing"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Where the stream is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// The container's standard output.
    #[default]
    Stdout,
    /// A file in the bound output directory.
    File,
}

impl std::str::FromStr for OutputMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" | "-" => Ok(Self::Stdout),
            "file" => Ok(Self::File),
            other => Err(Error::Config(format!("unknown output mode: {other}"))),
        }
    }
}

impl std::fmt::Display for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::File => write!(f, "file"),
        }
    }
}

/// A user request to start one or more sessions for the same stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Stream URL.
    pub url: String,
    /// Requested quality.
    pub quality: String,
    /// Output mode.
    pub output_mode: OutputMode,
    /// Host output directory, used in file mode.
    pub output_dir: Option<String>,
    /// Number of containers to start.
    pub count: usize,
}

impl StreamRequest {
    /// Create a single-container stdout request.
    pub fn new(url: impl Into<String>, quality: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            quality: quality.into(),
            output_mode: OutputMode::Stdout,
            output_dir: None,
            count: 1,
        }
    }

    /// Write to files under `dir`.
    #[must_use]
    pub fn to_directory(mut self, dir: impl Into<String>) -> Self {
        self.output_mode = OutputMode::File;
        self.output_dir = Some(dir.into());
        self
    }

    /// Start `count` containers.
    #[must_use]
    pub const fn with_count(mut self, count: usize) -> Self {
        self.count = count;
        self
    }

    /// Reject requests that cannot produce a single container.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an empty URL or a zero count.
    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::Config("stream URL is empty".into()));
        }
        if self.count == 0 {
            return Err(Error::Config("number of containers must be at least 1".into()));
        }
        Ok(())
    }

    /// Host directory to bind, when output goes to a file.
    #[must_use]
    pub fn bound_directory(&self) -> Option<&str> {
        match self.output_mode {
            OutputMode::File => self
                .output_dir
                .as_deref()
                .map(str::trim)
                .filter(|dir| !dir.is_empty()),
            OutputMode::Stdout => None,
        }
    }

    /// `OUTPUT_FILE` for the container with sequence number `sequence`.
    ///
    /// File mode without a directory falls back to stdout.
    #[must_use]
    pub fn output_target(&self, sequence: u64) -> String {
        if self.bound_directory().is_none() {
            return STDOUT_SENTINEL.to_string();
        }
        if self.count > 1 {
            format!("{OUTPUT_MOUNT}/stream_session_{sequence}.mp4")
        } else {
            format!("{OUTPUT_MOUNT}/stream.mp4")
        }
    }

    /// Environment passed to the container with sequence number `sequence`.
    #[must_use]
    pub fn environment(&self, sequence: u64) -> HashMap<String, String> {
        HashMap::from([
            ("STREAM_URL".to_string(), self.url.trim().to_string()),
            ("STREAM_QUALITY".to_string(), self.quality.clone()),
            ("OUTPUT_FILE".to_string(), self.output_target(sequence)),
        ])
    }
}
