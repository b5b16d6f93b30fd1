//! Main layout rendering for the dashboard.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table, Wrap},
};
use streamdock_core::SessionStatus;

use crate::app::{App, UiMode};

/// Render the entire UI.
pub fn render(frame: &mut Frame, app: &App) {
    match &app.ui_mode {
        UiMode::Main => render_main(frame, app),
        UiMode::ContainerLogs { title, text } => render_container_logs(frame, app, title, text),
    }
}

/// Render the main application view.
fn render_main(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(55),
            Constraint::Min(5),
            Constraint::Length(3),
        ])
        .split(frame.area());

    render_sessions_panel(frame, app, chunks[0]);
    render_logs_panel(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);
}

const fn status_color(status: SessionStatus) -> Color {
    match status {
        SessionStatus::Starting => Color::Yellow,
        SessionStatus::Running => Color::Green,
        SessionStatus::Missing => Color::DarkGray,
        SessionStatus::Stopped => Color::Red,
    }
}

/// Render the active sessions table.
fn render_sessions_panel(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new([
        "Container ID",
        "Name",
        "URL",
        "Quality",
        "Status",
        "Output",
        "Created",
    ])
    .style(
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    );

    let rows = app.sessions.iter().enumerate().map(|(idx, session)| {
        let style = if app.selected == Some(idx) {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Row::new([
            Cell::from(session.short_id().to_string()),
            Cell::from(session.name.clone()),
            Cell::from(session.source_url.clone()),
            Cell::from(session.quality.clone()),
            Cell::from(session.runtime_status.to_string())
                .style(Style::default().fg(status_color(session.runtime_status))),
            Cell::from(session.output_target.clone()),
            Cell::from(session.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
        ])
        .style(style)
    });

    let widths = [
        Constraint::Length(14),
        Constraint::Length(24),
        Constraint::Min(20),
        Constraint::Length(8),
        Constraint::Length(9),
        Constraint::Length(30),
        Constraint::Length(20),
    ];

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .title(format!(" Active Containers ({}) ", app.sessions.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    );

    frame.render_widget(table, area);
}

/// Render the log pane, newest lines at the bottom.
fn render_logs_panel(frame: &mut Frame, app: &App, area: Rect) {
    let visible = usize::from(area.height.saturating_sub(2));
    let lines = app.log_book.lines();
    let skip = lines.len().saturating_sub(visible);

    let items: Vec<ListItem> = lines[skip..]
        .iter()
        .map(|line| ListItem::new(line.to_string()))
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" Logs ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );
    frame.render_widget(list, area);
}

/// Render the status bar: last log line plus key help.
fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let status = app.log_book.last_message().unwrap_or("Ready");

    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Cyan));
    let text = Line::from(vec![
        Span::styled(status.to_string(), Style::default().fg(Color::White)),
        Span::raw("  |  "),
        key("s"),
        Span::raw(" start  "),
        key("x"),
        Span::raw(" stop  "),
        key("d"),
        Span::raw(" remove  "),
        key("X"),
        Span::raw(" stop all  "),
        key("r"),
        Span::raw(" refresh  "),
        key("l"),
        Span::raw(" logs  "),
        key("y"),
        Span::raw(" copy id  "),
        key("g/b/p/i"),
        Span::raw(" files/build/pull/images  "),
        key("c/e/w"),
        Span::raw(" clear/export/save config  "),
        key("q"),
        Span::raw(" quit"),
    ]);

    let paragraph = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
    frame.render_widget(paragraph, area);
}

/// Render the container log viewer.
fn render_container_logs(frame: &mut Frame, app: &App, title: &str, text: &str) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    let body = if text.is_empty() {
        Paragraph::new("(no output yet)").style(Style::default().fg(Color::DarkGray))
    } else {
        Paragraph::new(text.to_string())
    };

    let body = body
        .wrap(Wrap { trim: false })
        .scroll((app.log_scroll, 0))
        .block(
            Block::default()
                .title(format!(" {title} "))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan)),
        );
    frame.render_widget(body, chunks[0]);

    let help = Line::from(vec![
        Span::styled("↑↓/PgUp/PgDn", Style::default().fg(Color::Cyan)),
        Span::raw(": Scroll  |  "),
        Span::styled("Esc", Style::default().fg(Color::Red)),
        Span::raw(": Back"),
    ]);
    frame.render_widget(Paragraph::new(help), chunks[1]);
}
