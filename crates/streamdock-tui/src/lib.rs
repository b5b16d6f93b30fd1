//! Session workflows and the terminal dashboard for streamdock.

mod app;
mod event;
mod session_manager;
mod ui;

pub use app::{App, DashboardOptions};
pub use event::{Event, EventHandler};
pub use session_manager::{
    BatchReport, DEFAULT_LAUNCH_DELAY, LOG_TAIL_LINES, ReconcileReport, STOP_TIMEOUT_SECS,
    SessionManager, StopReport,
};

use std::sync::Arc;
use std::time::Duration;
use streamdock_core::SessionEvent;
use tokio::sync::mpsc;

/// Run the dashboard until the user quits, then stop all sessions.
///
/// `events` must be the receiver paired with the manager's event sink.
///
/// # Errors
///
/// Returns an error if the terminal cannot be drawn to.
pub async fn run(
    manager: Arc<SessionManager>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    options: DashboardOptions,
) -> anyhow::Result<()> {
    let mut handler = EventHandler::new(Duration::from_millis(250), events);
    let mut app = App::new(manager, handler.sender(), options);
    app.init();

    let mut terminal = ratatui::init();
    let result = app.run(&mut terminal, &mut handler).await;
    ratatui::restore();

    app.shutdown().await;
    result
}
