//! # Backups UI
//!
//! Backup listing and a preview of the selected snapshot.

use crate::tui::ui::{format_bytes, titled_block};
use crate::tui::App;
use chrono::{Local, TimeZone};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph, Wrap};

/// Render the backups screen
pub fn render_backups(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    render_list(frame, app, chunks[0]);
    render_preview(frame, app, chunks[1]);
}

fn render_list(frame: &mut Frame, app: &App, area: Rect) {
    let title = format!("Backups ({})", app.backups.len());
    if app.backups.is_empty() {
        let paragraph = Paragraph::new("No backups. Press 's' to save one.")
            .style(Style::default().fg(Color::DarkGray))
            .block(titled_block(&title));
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = app
        .backups
        .iter()
        .map(|b| {
            let saved = Local
                .timestamp_millis_opt(b.time as i64)
                .single()
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_default();
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:<20}", saved), Style::default().fg(Color::Cyan)),
                Span::styled(format!("{:>9} ", format_bytes(b.size)), Style::default().fg(Color::Yellow)),
                Span::raw(b.name.clone()),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(titled_block(&title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(app.selected_index.min(app.backups.len() - 1)));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_preview(frame: &mut Frame, app: &App, area: Rect) {
    let (title, body) = match &app.backup_preview {
        Some((name, content)) => (name.as_str(), content.as_str()),
        None => ("Preview", "Press Enter to view the selected backup."),
    };
    let paragraph = Paragraph::new(body)
        .wrap(Wrap { trim: false })
        .block(titled_block(title));
    frame.render_widget(paragraph, area);
}
