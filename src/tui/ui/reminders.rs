//! # Reminders UI
//!
//! Reminder list with status, due time and the activity feed.

use crate::features::reminders::when::describe_until;
use crate::features::reminders::Reminder;
use crate::tui::ui::{titled_block, truncate_text};
use crate::tui::App;
use chrono::{Local, Utc};
use ratatui::prelude::*;
use ratatui::widgets::{List, ListItem, ListState, Paragraph, Wrap};

/// Render the reminders screen
pub fn render_reminders(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(chunks[1]);

    render_list(frame, app, chunks[0]);
    render_details(frame, app, right[0]);
    render_activity_feed(frame, app, right[1]);
}

fn status_span(reminder: &Reminder) -> Span<'static> {
    if reminder.fired {
        Span::styled("fired   ", Style::default().fg(Color::DarkGray))
    } else if !reminder.enabled {
        Span::styled("off     ", Style::default().fg(Color::Yellow))
    } else if !reminder.is_schedulable() {
        Span::styled("invalid ", Style::default().fg(Color::Red))
    } else {
        Span::styled("armed   ", Style::default().fg(Color::Green))
    }
}

fn due_label(reminder: &Reminder) -> String {
    match reminder.fire_instant() {
        Some(at) => at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => reminder.time.clone().unwrap_or_else(|| "no time".to_string()),
    }
}

fn render_list(frame: &mut Frame, app: &App, area: Rect) {
    let reminders = app.scheduler.reminders();
    let title = format!("Reminders ({})", reminders.len());

    if reminders.is_empty() {
        let paragraph = Paragraph::new("No reminders yet. Press 'a' to add one.")
            .style(Style::default().fg(Color::DarkGray))
            .block(titled_block(&title));
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = reminders
        .iter()
        .map(|r| {
            ListItem::new(Line::from(vec![
                status_span(r),
                Span::styled(
                    format!("{:<17}", truncate_text(&due_label(r), 17)),
                    Style::default().fg(Color::Cyan),
                ),
                Span::raw(" "),
                Span::raw(truncate_text(r.display_title(), 40)),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(titled_block(&title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(Some(app.selected_index.min(reminders.len() - 1)));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_details(frame: &mut Frame, app: &App, area: Rect) {
    let lines = match app.selected_reminder() {
        Some(r) => {
            let due = match r.fire_instant() {
                Some(_) if r.fired => "already fired".to_string(),
                Some(at) => describe_until(at, Utc::now()),
                None => "will not fire (no valid time)".to_string(),
            };
            vec![
                Line::from(Span::styled(
                    r.display_title().to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(r.display_body().to_string()),
                Line::from(""),
                Line::from(vec![Span::raw("Due: "), Span::styled(due, Style::default().fg(Color::Cyan))]),
            ]
        }
        None => vec![Line::from("Nothing selected")],
    };
    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(titled_block("Details"));
    frame.render_widget(paragraph, area);
}

fn render_activity_feed(frame: &mut Frame, app: &App, area: Rect) {
    let height = area.height.saturating_sub(2) as usize;
    let items: Vec<ListItem> = app
        .activity_log
        .iter()
        .rev()
        .take(height)
        .map(|entry| ListItem::new(entry.as_str()))
        .collect();

    let list = List::new(items).block(titled_block("Activity"));
    frame.render_widget(list, area);
}
