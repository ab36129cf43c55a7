//! # Nodeboard TUI
//!
//! Terminal reminder board. Connects to the host, hydrates from its
//! persisted reminders, fires local timers and pushes every change back.
//!
//! Usage: `cargo run --features tui --bin nodeboard-tui`

use anyhow::Result;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dotenvy::dotenv;
use log::{error, info, warn};
use ratatui::prelude::*;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use nodeboard::core::Config;
use nodeboard::features::notifications::{DesktopNotifier, NotificationDispatcher};
use nodeboard::features::presence::CloseDecision;
use nodeboard::ipc::{connect_with_retry, HostBridgeNotifier, IpcHandle};
use nodeboard::tui::app::InputMode;
use nodeboard::tui::event::{map_key_event, KeyAction};
use nodeboard::tui::{App, Event, EventHandler, Screen};

/// TUI refresh rate
const TICK_RATE: Duration = Duration::from_millis(250);

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv().ok();
    let config = Config::from_env()?;
    init_file_logging(&config);

    info!("Starting Nodeboard TUI...");

    let (mut app, due_rx) = App::new();
    let events = EventHandler::new(TICK_RATE);
    events.forward_due_timers(due_rx);

    // Try to connect to the host
    app.add_activity("Connecting to host...".to_string());
    let handle: Option<IpcHandle> =
        match connect_with_retry(&config.socket_path, 3, Duration::from_secs(1)).await {
            Ok(client) => {
                let (handle, event_rx) = client.split();
                events.forward_ipc(event_rx);
                app.set_connected(true);
                app.add_activity("Connected to host".to_string());
                Some(handle)
            }
            Err(e) => {
                warn!("Running without host: {:#}", e);
                app.add_activity(format!("Failed to connect: {}", e));
                app.error_message = Some("Not connected to host; changes will not persist".to_string());
                None
            }
        };

    let dispatcher = build_dispatcher(handle.as_ref());

    if let Some(handle) = &handle {
        hydrate(&mut app, handle).await;
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut events = events;
    let result = run_app(&mut terminal, &mut app, &mut events, handle.as_ref(), &dispatcher).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        error!("Application error: {}", e);
        return Err(e);
    }

    if app.close_decision == Some(CloseDecision::Hide) {
        println!("Nodeboard keeps running in the background; reminders will still fire.");
    }
    info!("Nodeboard TUI shutdown complete");
    Ok(())
}

/// The terminal belongs to the UI, so logs go to a file in the data dir
fn init_file_logging(config: &Config) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    let opened = std::fs::create_dir_all(&config.data_dir).and_then(|_| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.tui_log_file())
    });
    match opened {
        Ok(file) => {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }
        Err(_) => {
            builder.filter_level(log::LevelFilter::Off);
        }
    }
    builder.init();
}

/// Host bridge first while connected, then in-process desktop notifications
fn build_dispatcher(handle: Option<&IpcHandle>) -> NotificationDispatcher {
    let dispatcher = NotificationDispatcher::default();
    let dispatcher = match handle {
        Some(handle) => dispatcher.with_provider(Arc::new(HostBridgeNotifier::new(handle.clone()))),
        None => dispatcher,
    };
    dispatcher.with_provider(Arc::new(DesktopNotifier))
}

/// Cold start: the host's persisted set wins when it has one
async fn hydrate(app: &mut App, handle: &IpcHandle) {
    match handle.get_persisted_reminders().await {
        Ok(reminders) => {
            let count = reminders.len();
            if app.scheduler.hydrate_from_host(reminders) {
                app.add_activity(format!("Loaded {} reminders from host", count));
            }
        }
        Err(e) => {
            warn!("Failed to fetch persisted reminders: {:#}", e);
            app.error_message = Some(format!("Could not load reminders: {}", e));
        }
    }
    match handle.get_background_presence_enabled().await {
        Ok(enabled) => app.background_enabled = Some(enabled),
        Err(e) => warn!("Failed to fetch background presence flag: {:#}", e),
    }
    refresh_backups(app, handle).await;
}

async fn push_pending(app: &mut App, handle: Option<&IpcHandle>) {
    let Some(reminders) = app.scheduler.take_pending_push() else {
        return;
    };
    let Some(handle) = handle else {
        return;
    };
    if !app.connected {
        return;
    }
    match handle.persist_reminders(reminders).await {
        Ok(true) => {}
        Ok(false) => {
            app.error_message = Some("Host could not save reminders".to_string());
        }
        Err(e) => {
            warn!("persist-reminders failed: {:#}", e);
            app.error_message = Some(format!("Sync failed: {}", e));
        }
    }
}

async fn refresh_backups(app: &mut App, handle: &IpcHandle) {
    match handle.list_backups().await {
        Ok(backups) => app.set_backups(backups),
        Err(e) => app.error_message = Some(format!("Could not list backups: {}", e)),
    }
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    events: &mut EventHandler,
    handle: Option<&IpcHandle>,
    dispatcher: &NotificationDispatcher,
) -> Result<()> {
    loop {
        // Push the list to the host once per iteration when it changed
        push_pending(app, handle).await;

        // Draw UI
        terminal.draw(|frame| {
            nodeboard::tui::ui::render(frame, app);
        })?;

        if let Some(event) = events.next().await {
            match event {
                Event::Key(key) => {
                    if app.dismiss_alert() {
                        continue;
                    }
                    let action = map_key_event(key, app.input_mode == InputMode::Editing);
                    handle_action(app, action, handle).await?;
                }
                Event::ReminderDue(due) => {
                    let outcome = app.scheduler.on_timer_elapsed(due, dispatcher).await;
                    app.on_fire_outcome(outcome);
                }
                Event::Ipc(host_event) => {
                    app.handle_host_event(host_event);
                }
                Event::Tick => {}
                Event::Resize(_, _) => {
                    // Terminal will redraw automatically
                }
                Event::Disconnected => {
                    if app.connected {
                        app.set_connected(false);
                        app.add_activity("IPC connection lost".to_string());
                    }
                }
            }
        }

        if app.should_quit {
            push_pending(app, handle).await;
            break;
        }
    }

    Ok(())
}

async fn handle_action(app: &mut App, action: KeyAction, handle: Option<&IpcHandle>) -> Result<()> {
    let connected = app.connected;
    let handle = handle.filter(|_| connected);

    match action {
        KeyAction::CloseWindow => {
            push_pending(app, handle).await;
            if let Some(handle) = handle {
                match handle.window_closing().await {
                    Ok(decision) => {
                        info!("Window close decision: {:?}", decision);
                        app.close_decision = Some(decision);
                    }
                    Err(e) => warn!("window-closing failed: {:#}", e),
                }
            }
            app.should_quit = true;
        }
        KeyAction::QuitHost => {
            push_pending(app, handle).await;
            if let Some(handle) = handle {
                if let Err(e) = handle.quit().await {
                    warn!("quit failed: {:#}", e);
                }
            }
            app.should_quit = true;
        }
        KeyAction::SwitchScreen(screen) => {
            app.switch_screen(screen);
            app.clear_error();
            app.clear_status();

            if let (Some(handle), Screen::Backups) = (handle, screen) {
                refresh_backups(app, handle).await;
            }
        }
        KeyAction::Up => app.select_previous(),
        KeyAction::Down => {
            let max = app.current_list_len();
            app.select_next(max);
        }
        KeyAction::Home => app.selected_index = 0,
        KeyAction::End => app.selected_index = app.current_list_len().saturating_sub(1),
        KeyAction::Back => {
            if app.backup_preview.take().is_none() && app.current_screen != Screen::Reminders {
                app.switch_screen(Screen::Reminders);
            }
        }
        KeyAction::StartInput => {
            if app.current_screen == Screen::Reminders {
                app.start_editing();
            }
        }
        KeyAction::SubmitInput => {
            let input = app.take_input();
            app.stop_editing();
            if !input.trim().is_empty() {
                match app.add_reminder_from_input(&input, chrono::Local::now()) {
                    Ok(_) => {
                        app.clear_error();
                        app.status_message = Some("Reminder added".to_string());
                    }
                    Err(e) => app.error_message = Some(e.to_string()),
                }
            }
        }
        KeyAction::CancelInput => {
            app.input_clear();
            app.stop_editing();
        }
        KeyAction::Char(c) => app.input_char(c),
        KeyAction::Backspace => app.input_backspace(),
        KeyAction::Toggle | KeyAction::Select => match app.current_screen {
            Screen::Reminders if action == KeyAction::Toggle => {
                if let Some(enabled) = app.toggle_selected_reminder() {
                    app.status_message =
                        Some(if enabled { "Reminder enabled" } else { "Reminder disabled" }.to_string());
                }
            }
            Screen::Backups if action == KeyAction::Select => {
                if let (Some(handle), Some(name)) =
                    (handle, app.selected_backup().map(|b| b.name.clone()))
                {
                    match handle.read_backup(&name).await {
                        Ok(outcome) if outcome.success => {
                            app.backup_preview = Some((name, outcome.content.unwrap_or_default()));
                        }
                        Ok(outcome) => {
                            app.error_message = Some(format!(
                                "Read failed: {}",
                                outcome.error.unwrap_or_default()
                            ));
                        }
                        Err(e) => app.error_message = Some(e.to_string()),
                    }
                }
            }
            Screen::Settings => {
                if let Some(handle) = handle {
                    let enabled = !app.background_enabled.unwrap_or(false);
                    match handle.set_background_presence_enabled(enabled).await {
                        Ok(ok) => {
                            app.background_enabled = Some(enabled);
                            if !ok {
                                app.error_message =
                                    Some("Setting applied but could not be saved".to_string());
                            }
                        }
                        Err(e) => app.error_message = Some(e.to_string()),
                    }
                } else {
                    app.error_message = Some("Background presence needs the host".to_string());
                }
            }
            _ => {}
        },
        KeyAction::Delete => match app.current_screen {
            Screen::Reminders => {
                if let Some(removed) = app.delete_selected_reminder() {
                    app.status_message = Some(format!("Deleted {}", removed.display_title()));
                }
            }
            Screen::Backups => {
                if let (Some(handle), Some(name)) =
                    (handle, app.selected_backup().map(|b| b.name.clone()))
                {
                    match handle.delete_backup(&name).await {
                        Ok(outcome) if outcome.success => {
                            app.backup_preview = None;
                            app.status_message = Some(format!("Deleted {}", name));
                        }
                        Ok(outcome) => {
                            app.error_message = Some(format!(
                                "Delete failed: {}",
                                outcome.error.unwrap_or_default()
                            ));
                        }
                        Err(e) => app.error_message = Some(e.to_string()),
                    }
                    refresh_backups(app, handle).await;
                }
            }
            _ => {}
        },
        KeyAction::DeleteAll => {
            if let (Some(handle), Screen::Backups) = (handle, app.current_screen) {
                match handle.delete_all_backups().await {
                    Ok(outcome) if outcome.success => {
                        app.backup_preview = None;
                        app.status_message = Some("All backups deleted".to_string());
                    }
                    Ok(outcome) => {
                        app.error_message = Some(format!(
                            "Delete failed: {}",
                            outcome.error.unwrap_or_default()
                        ));
                    }
                    Err(e) => app.error_message = Some(e.to_string()),
                }
                refresh_backups(app, handle).await;
            }
        }
        KeyAction::Save => {
            if let Some(handle) = handle {
                match handle.save_backup(app.snapshot()).await {
                    Ok(outcome) if outcome.success => {
                        app.status_message =
                            Some(format!("Saved {}", outcome.file.unwrap_or_default()));
                    }
                    Ok(outcome) => {
                        app.error_message = Some(format!(
                            "Backup failed: {}",
                            outcome.error.unwrap_or_default()
                        ));
                    }
                    Err(e) => app.error_message = Some(e.to_string()),
                }
                refresh_backups(app, handle).await;
            } else {
                app.error_message = Some("Backups need the host".to_string());
            }
        }
        KeyAction::Restore => {
            if let (Some(handle), Screen::Backups) = (handle, app.current_screen) {
                if let Some(name) = app.selected_backup().map(|b| b.name.clone()) {
                    match handle.read_backup(&name).await {
                        Ok(outcome) if outcome.success => {
                            let content = outcome.content.unwrap_or_default();
                            match app.restore_from_backup(&content) {
                                Ok(count) => {
                                    app.status_message =
                                        Some(format!("Restored {} reminders from {}", count, name));
                                    app.add_activity(format!("Restored {}", name));
                                }
                                Err(e) => app.error_message = Some(format!("{:#}", e)),
                            }
                        }
                        Ok(outcome) => {
                            app.error_message = Some(format!(
                                "Read failed: {}",
                                outcome.error.unwrap_or_default()
                            ));
                        }
                        Err(e) => app.error_message = Some(e.to_string()),
                    }
                }
            }
        }
        KeyAction::Refresh => {
            if let Some(handle) = handle {
                refresh_backups(app, handle).await;
                if let Ok(enabled) = handle.get_background_presence_enabled().await {
                    app.background_enabled = Some(enabled);
                }
                app.status_message = Some("Refreshed".to_string());
            }
        }
        KeyAction::None => {}
    }

    Ok(())
}
