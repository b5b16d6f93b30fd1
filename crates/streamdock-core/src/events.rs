//! Messages from background workflows to the presentation layer.

use tokio::sync::mpsc;

use crate::{Session, SessionStatus};

/// Something the presentation layer should reflect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session was registered.
    Created(Session),
    /// A session's runtime status changed.
    Updated {
        /// Container id.
        id: String,
        /// New status.
        status: SessionStatus,
    },
    /// A session left the registry.
    Removed {
        /// Container id.
        id: String,
        /// Container name.
        name: String,
    },
    /// A user-facing log line.
    Log(String),
}

/// Sending half of the event channel.
///
/// Cloneable and usable from any task. Sends never fail: if nobody listens
/// the event is dropped, but log lines still reach `tracing`.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<SessionEvent>>,
}

impl EventSink {
    /// Create a sink and the receiver that drains it.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that only logs through `tracing`.
    #[must_use]
    pub const fn detached() -> Self {
        Self { tx: None }
    }

    /// Forward an event.
    pub fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    /// Emit a user-facing log line.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        self.emit(SessionEvent::Log(message));
    }

    /// Emit a user-facing log line for a failure.
    pub fn log_error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.emit(SessionEvent::Log(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_reaches_receiver() {
        let (sink, mut rx) = EventSink::channel();
        sink.log("hello");
        assert_eq!(rx.try_recv().unwrap(), SessionEvent::Log("hello".into()));
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.log("nobody listens");
        EventSink::detached().log("nor here");
    }
}
