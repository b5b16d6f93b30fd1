use anyhow::Result;
use crossterm::event::{KeyCode, KeyEventKind};
use ratatui::prelude::*;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use streamdock_core::{LogBook, Session, SessionEvent, StreamRequest};
use tokio::sync::mpsc;

use crate::event::{Event, EventHandler};
use crate::session_manager::{LOG_TAIL_LINES, SessionManager};
use crate::ui;

/// Settings the dashboard starts with.
#[derive(Debug, Clone)]
pub struct DashboardOptions {
    /// Request used by the start key.
    pub request: StreamRequest,
    /// Where the build context lives.
    pub build_dir: PathBuf,
    /// Where exported logs are written.
    pub export_path: PathBuf,
}

/// UI mode - what screen we're showing
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum UiMode {
    /// Session table and log pane
    #[default]
    Main,
    /// Output of one container
    ContainerLogs { title: String, text: String },
}

/// Application state
pub struct App {
    /// Is the application running
    pub running: bool,
    /// Current UI mode
    pub ui_mode: UiMode,
    /// Workflows and the registry they own
    manager: Arc<SessionManager>,
    /// Posts results of background tasks back to the loop
    event_tx: mpsc::UnboundedSender<Event>,
    /// Dashboard settings
    pub options: DashboardOptions,
    /// Projection of the registry
    pub sessions: Vec<Session>,
    /// Selected session index
    pub selected: Option<usize>,
    /// User-facing log history
    pub log_book: LogBook,
    /// Scroll offset in the container log viewer
    pub log_scroll: u16,
}

impl App {
    #[must_use]
    pub fn new(
        manager: Arc<SessionManager>,
        event_tx: mpsc::UnboundedSender<Event>,
        options: DashboardOptions,
    ) -> Self {
        Self {
            running: true,
            ui_mode: UiMode::default(),
            manager,
            event_tx,
            options,
            sessions: Vec::new(),
            selected: None,
            log_book: LogBook::new(),
            log_scroll: 0,
        }
    }

    /// Initialize the app: check Docker in the background.
    pub fn init(&mut self) {
        self.log_book.push("Ready");
        self.spawn(|manager| async move { manager.check_runtime().await.map(drop) });
    }

    /// Run the main application loop
    ///
    /// # Errors
    ///
    /// Returns an error if drawing fails or the event channel closes
    pub async fn run<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        events: &mut EventHandler,
    ) -> Result<()> {
        while self.running {
            terminal.draw(|frame| ui::render(frame, self))?;

            let event = events.next().await?;
            self.handle_event(event);
            for event in events.drain() {
                self.handle_event(event);
            }
        }
        Ok(())
    }

    /// Stop every session before exit.
    pub async fn shutdown(&self) {
        let report = self.manager.shutdown().await;
        for (id, e) in report.errors {
            tracing::warn!(container = %id, "not stopped during shutdown: {e}");
        }
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key.code),
            Event::Session(event) => self.apply(event),
            Event::ContainerLogs { title, text } => {
                self.log_scroll = 0;
                self.ui_mode = UiMode::ContainerLogs { title, text };
            }
            Event::Key(_) | Event::Tick | Event::Resize(..) => {}
        }
    }

    /// Reflect a workflow event.
    fn apply(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Log(message) => self.log_book.push(message),
            SessionEvent::Created(_)
            | SessionEvent::Updated { .. }
            | SessionEvent::Removed { .. } => self.refresh_sessions(),
        }
    }

    /// Re-read the registry, keeping the selection in range.
    fn refresh_sessions(&mut self) {
        self.sessions = self.manager.sessions();
        self.selected = match (self.selected, self.sessions.len()) {
            (_, 0) => None,
            (None, _) => Some(0),
            (Some(idx), len) => Some(idx.min(len - 1)),
        };
    }

    fn selected_session(&self) -> Option<&Session> {
        self.selected.and_then(|idx| self.sessions.get(idx))
    }

    /// Run a workflow on a background task. Failures are already reported
    /// through the event sink.
    fn spawn<F, Fut>(&self, task: F)
    where
        F: FnOnce(Arc<SessionManager>) -> Fut,
        Fut: Future<Output = streamdock_core::Result<()>> + Send + 'static,
    {
        let fut = task(Arc::clone(&self.manager));
        tokio::spawn(async move {
            if let Err(e) = fut.await {
                tracing::debug!("background task failed: {e}");
            }
        });
    }

    fn handle_key(&mut self, code: KeyCode) {
        match self.ui_mode {
            UiMode::Main => self.handle_main_key(code),
            UiMode::ContainerLogs { .. } => self.handle_logs_key(code),
        }
    }

    fn handle_main_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.running = false,
            KeyCode::Up | KeyCode::Char('k') => self.select_prev(),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            KeyCode::Char('s') => {
                let request = self.options.request.clone();
                self.spawn(|manager| async move { manager.start_batch(&request).await.map(drop) });
            }
            KeyCode::Char('x') => {
                if let Some(id) = self.selected_session().map(|s| s.id.clone()) {
                    self.spawn(|manager| async move { manager.stop_session(&id).await });
                }
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                if let Some(id) = self.selected_session().map(|s| s.id.clone()) {
                    self.spawn(|manager| async move { manager.remove_session(&id).await });
                }
            }
            KeyCode::Char('X') => {
                if self.sessions.is_empty() {
                    self.log_book.push("No containers to stop");
                } else {
                    self.spawn(|manager| async move {
                        manager.stop_all().await;
                        Ok(())
                    });
                }
            }
            KeyCode::Char('r') => {
                self.spawn(|manager| async move { manager.reconcile().await.map(drop) });
            }
            KeyCode::Enter | KeyCode::Char('l') => self.view_selected_logs(),
            KeyCode::Char('y') => self.copy_selected_id(),
            KeyCode::Char('g') => {
                let dir = self.options.build_dir.clone();
                self.spawn(|manager| async move { manager.create_build_context(&dir).map(drop) });
            }
            KeyCode::Char('b') => {
                let dir = self.options.build_dir.clone();
                self.spawn(|manager| async move {
                    let tag = manager.config().docker_image.clone();
                    manager.build_image(&dir, &tag).await
                });
            }
            KeyCode::Char('p') => {
                self.spawn(|manager| async move {
                    let tag = manager.config().docker_image.clone();
                    manager.pull_image(&tag).await
                });
            }
            KeyCode::Char('i') => {
                self.spawn(|manager| async move { manager.list_images().await.map(drop) });
            }
            KeyCode::Char('c') => self.log_book.clear(),
            KeyCode::Char('e') => self.export_logs(),
            KeyCode::Char('w') => {
                if let Err(e) = self.manager.save_config() {
                    tracing::debug!("config not saved: {e}");
                }
            }
            _ => {}
        }
    }

    fn handle_logs_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => {
                // Return to main view
                self.ui_mode = UiMode::Main;
                self.log_scroll = 0;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.log_scroll = self.log_scroll.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.log_scroll = self.log_scroll.saturating_add(1);
            }
            KeyCode::PageUp => self.log_scroll = self.log_scroll.saturating_sub(20),
            KeyCode::PageDown => self.log_scroll = self.log_scroll.saturating_add(20),
            _ => {}
        }
    }

    fn select_prev(&mut self) {
        if let Some(idx) = self.selected {
            self.selected = Some(idx.saturating_sub(1));
        }
    }

    fn select_next(&mut self) {
        if self.sessions.is_empty() {
            return;
        }
        let last = self.sessions.len() - 1;
        self.selected = Some(self.selected.map_or(0, |idx| (idx + 1).min(last)));
    }

    fn view_selected_logs(&self) {
        let Some(session) = self.selected_session() else {
            return;
        };
        let id = session.id.clone();
        let title = format!("Container Logs - {}", session.name);
        let event_tx = self.event_tx.clone();

        self.spawn(|manager| async move {
            let text = manager.session_logs(&id, LOG_TAIL_LINES).await?;
            let _ = event_tx.send(Event::ContainerLogs { title, text });
            Ok(())
        });
    }

    fn copy_selected_id(&mut self) {
        let Some(id) = self.selected_session().map(|s| s.id.clone()) else {
            return;
        };
        match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(id.clone())) {
            Ok(()) => self.log_book.push(format!("Copied container id {id}")),
            Err(e) => self.log_book.push(format!("Clipboard unavailable: {e}")),
        }
    }

    fn export_logs(&mut self) {
        let path = self.options.export_path.clone();
        match self.log_book.export(&path) {
            Ok(()) => self.log_book.push(format!("Logs saved to {}", path.display())),
            Err(e) => self.log_book.push(format!("Failed to save logs: {e}")),
        }
    }
}
