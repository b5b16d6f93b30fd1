//! Append-only history of user-facing log lines.

use std::path::Path;

use chrono::{DateTime, Local};

use crate::Result;

/// A timestamped log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// When the line was recorded.
    pub timestamp: DateTime<Local>,
    /// The message.
    pub message: String,
}

impl std::fmt::Display for LogLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.message
        )
    }
}

/// Log history shown to the user.
///
/// The last line doubles as the status indicator.
#[derive(Debug, Default)]
pub struct LogBook {
    lines: Vec<LogLine>,
}

impl LogBook {
    /// Create an empty log book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line stamped with the current time.
    pub fn push(&mut self, message: impl Into<String>) {
        self.lines.push(LogLine {
            timestamp: Local::now(),
            message: message.into(),
        });
    }

    /// All lines, oldest first.
    #[must_use]
    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    /// The most recent message.
    #[must_use]
    pub fn last_message(&self) -> Option<&str> {
        self.lines.last().map(|line| line.message.as_str())
    }

    /// Number of lines.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the log book is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Drop all lines.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Write every line to `path`, one per line.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn export(&self, path: &Path) -> Result<()> {
        let mut content = String::new();
        for line in &self.lines {
            content.push_str(&line.to_string());
            content.push('\n');
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}
