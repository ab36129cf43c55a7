//! # Settings UI
//!
//! Background presence toggle and host connection details.

use crate::tui::ui::titled_block;
use crate::tui::App;
use ratatui::prelude::*;
use ratatui::widgets::{Paragraph, Wrap};

/// Render the settings screen
pub fn render_settings(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(0)])
        .split(area);

    let (flag, flag_style) = match app.background_enabled {
        Some(true) => ("[x] enabled", Style::default().fg(Color::Green)),
        Some(false) => ("[ ] disabled", Style::default().fg(Color::Yellow)),
        None => ("[?] unknown", Style::default().fg(Color::DarkGray)),
    };

    let lines = vec![
        Line::from(vec![
            Span::styled("> ", Style::default().fg(Color::Yellow)),
            Span::raw("Run in background:  "),
            Span::styled(flag, flag_style.add_modifier(Modifier::BOLD)),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "Keep the host alive after this window closes so reminders still fire.",
            Style::default().fg(Color::DarkGray),
        )),
    ];
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(titled_block("Background Presence"));
    frame.render_widget(paragraph, chunks[0]);

    let heartbeat = app
        .last_heartbeat
        .and_then(|ts| chrono::DateTime::from_timestamp(ts, 0))
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "none yet".to_string());
    let host = vec![
        Line::from(vec![
            Span::raw("Connected:       "),
            if app.connected {
                Span::styled("yes", Style::default().fg(Color::Green))
            } else {
                Span::styled("no", Style::default().fg(Color::Red))
            },
        ]),
        Line::from(vec![Span::raw("Last heartbeat:  "), Span::raw(heartbeat)]),
    ];
    frame.render_widget(Paragraph::new(host).block(titled_block("Host")), chunks[1]);
}
