use anyhow::Result;
use crossterm::event::{Event as CrosstermEvent, KeyEvent};
use futures::StreamExt;
use std::time::Duration;
use streamdock_core::SessionEvent;
use tokio::sync::mpsc;

/// Dashboard events
#[derive(Debug, Clone)]
pub enum Event {
    /// Terminal tick
    Tick,
    /// Key press event
    Key(KeyEvent),
    /// Terminal resize
    Resize(u16, u16),
    /// A workflow reported something
    Session(SessionEvent),
    /// Container output fetched for the log viewer
    ContainerLogs { title: String, text: String },
}

/// Merges terminal input, ticks and workflow events into one stream
#[derive(Debug)]
pub struct EventHandler {
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    /// Create a new event handler with the specified tick rate, forwarding
    /// everything received on `sessions`
    #[must_use]
    pub fn new(tick_rate: Duration, mut sessions: mpsc::UnboundedReceiver<SessionEvent>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let event_tx = tx.clone();

        tokio::spawn(async move {
            let mut reader = crossterm::event::EventStream::new();
            let mut tick = tokio::time::interval(tick_rate);

            loop {
                let tick_delay = tick.tick();
                let crossterm_event = reader.next();

                let event = tokio::select! {
                    _ = tick_delay => Event::Tick,
                    Some(session_event) = sessions.recv() => Event::Session(session_event),
                    Some(Ok(evt)) = crossterm_event => match evt {
                        CrosstermEvent::Key(key) => Event::Key(key),
                        CrosstermEvent::Resize(w, h) => Event::Resize(w, h),
                        _ => continue,
                    },
                };

                if event_tx.send(event).is_err() {
                    break;
                }
            }
        });

        Self { rx, tx }
    }

    /// Sender for posting events from background tasks
    #[must_use]
    pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
        self.tx.clone()
    }

    /// Receive the next event
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is closed
    pub async fn next(&mut self) -> Result<Event> {
        self.rx
            .recv()
            .await
            .ok_or_else(|| anyhow::anyhow!("Event channel closed"))
    }

    /// Take every event that is already queued
    pub fn drain(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}
