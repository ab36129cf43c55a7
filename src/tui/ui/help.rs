//! # Help UI
//!
//! Keybindings and usage help.

use crate::tui::ui::titled_block;
use crate::tui::App;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Render the help screen
pub fn render_help(frame: &mut Frame, _app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    render_navigation_help(frame, chunks[0]);
    render_screen_help(frame, chunks[1]);
}

fn render_navigation_help(frame: &mut Frame, area: Rect) {
    let keybindings = vec![
        (
            "General",
            vec![
                ("q / Ctrl+c", "Close window"),
                ("Q", "Quit host and window"),
                ("?", "Show this help"),
                ("1-3", "Switch screens"),
                ("Esc", "Go back / Cancel"),
            ],
        ),
        (
            "Navigation",
            vec![
                ("j / Down", "Move down"),
                ("k / Up", "Move up"),
                ("g / Home", "Go to top"),
                ("G / End", "Go to bottom"),
            ],
        ),
        (
            "Text Input",
            vec![
                ("Enter", "Submit input"),
                ("Esc", "Cancel input"),
                ("Backspace", "Delete character"),
            ],
        ),
    ];

    let mut lines = vec![];

    for (section, bindings) in keybindings {
        lines.push(Line::from(vec![Span::styled(
            section,
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )]));
        lines.push(Line::from(""));

        for (key, desc) in bindings {
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<15}", key), Style::default().fg(Color::Cyan)),
                Span::raw(desc),
            ]));
        }

        lines.push(Line::from(""));
    }

    let paragraph = Paragraph::new(lines)
        .block(titled_block("Keybindings"))
        .style(Style::default().fg(Color::White));

    frame.render_widget(paragraph, area);
}

fn render_screen_help(frame: &mut Frame, area: Rect) {
    let screens = vec![
        (
            "Reminders [1]",
            vec![
                "a: New reminder as title | note | when",
                "   when: +30m, +1h30m, 17:45 or RFC 3339",
                "t / Space: Enable or disable",
                "d: Delete reminder",
            ],
        ),
        (
            "Backups [2]",
            vec![
                "s: Save a backup of the board",
                "Enter: View backup contents",
                "o: Restore reminders from backup",
                "d: Delete backup, X: delete all",
                "r: Refresh list",
            ],
        ),
        (
            "Settings [3]",
            vec![
                "t / Enter: Toggle background presence",
                "",
                "While enabled, closing this window",
                "keeps the host running and firing",
                "reminders in the background.",
            ],
        ),
    ];

    let mut lines = vec![];

    for (screen, help) in screens {
        lines.push(Line::from(vec![Span::styled(
            screen,
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )]));

        for line in help {
            if line.is_empty() {
                lines.push(Line::from(""));
            } else {
                lines.push(Line::from(vec![Span::raw("  "), Span::raw(line.to_string())]));
            }
        }

        lines.push(Line::from(""));
    }

    lines.push(Line::from(vec![Span::styled(
        format!("Nodeboard v{}", env!("CARGO_PKG_VERSION")),
        Style::default().fg(Color::DarkGray),
    )]));

    let paragraph = Paragraph::new(lines)
        .block(titled_block("Screen Guide"))
        .style(Style::default().fg(Color::White));

    frame.render_widget(paragraph, area);
}
