//! # TUI Event Handling
//!
//! Keyboard input, tick, reminder timer and IPC event handling.

use crate::features::reminders::DueTimer;
use crate::ipc::HostEvent;
use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEvent, KeyModifiers};
use std::time::Duration;
use tokio::sync::mpsc;

/// TUI events
#[derive(Debug)]
pub enum Event {
    /// Keyboard input
    Key(KeyEvent),
    /// Terminal resize
    Resize(u16, u16),
    /// A local reminder timer elapsed
    ReminderDue(DueTimer),
    /// IPC event from the host
    Ipc(HostEvent),
    /// Tick for periodic updates
    Tick,
    /// IPC connection lost
    Disconnected,
}

/// Event handler that combines keyboard, timer, IPC, and tick events
pub struct EventHandler {
    /// Event receiver
    rx: mpsc::UnboundedReceiver<Event>,
    tx: mpsc::UnboundedSender<Event>,
}

impl EventHandler {
    /// Create a new event handler
    pub fn new(tick_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        // Spawn keyboard event handler
        let key_tx = tx.clone();
        std::thread::spawn(move || loop {
            if event::poll(tick_rate).unwrap_or(false) {
                match event::read() {
                    Ok(CrosstermEvent::Key(key)) => {
                        if key_tx.send(Event::Key(key)).is_err() {
                            break;
                        }
                    }
                    Ok(CrosstermEvent::Resize(w, h)) => {
                        if key_tx.send(Event::Resize(w, h)).is_err() {
                            break;
                        }
                    }
                    _ => {}
                }
            } else {
                // Send tick on poll timeout
                if key_tx.send(Event::Tick).is_err() {
                    break;
                }
            }
        });

        EventHandler { rx, tx }
    }

    /// Feed elapsed reminder timers into the event stream
    pub fn forward_due_timers(&self, mut due_rx: mpsc::UnboundedReceiver<DueTimer>) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(due) = due_rx.recv().await {
                if tx.send(Event::ReminderDue(due)).is_err() {
                    break;
                }
            }
        });
    }

    /// Feed pushed host events into the event stream; reports the disconnect
    pub fn forward_ipc(&self, mut event_rx: mpsc::Receiver<HostEvent>) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                if tx.send(Event::Ipc(event)).is_err() {
                    return;
                }
            }
            let _ = tx.send(Event::Disconnected);
        });
    }

    /// Receive the next event
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}

/// Key action result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// No action
    None,
    /// Close this window (host may stay resident)
    CloseWindow,
    /// Quit the host as well
    QuitHost,
    /// Switch to screen
    SwitchScreen(crate::tui::Screen),
    /// Move selection up
    Up,
    /// Move selection down
    Down,
    /// Select / Enter
    Select,
    /// Go back / Cancel
    Back,
    /// Start text input (new reminder)
    StartInput,
    /// Submit text input
    SubmitInput,
    /// Cancel text input
    CancelInput,
    /// Character input
    Char(char),
    /// Backspace
    Backspace,
    /// Refresh data
    Refresh,
    /// Toggle item
    Toggle,
    /// Delete item
    Delete,
    /// Delete every backup
    DeleteAll,
    /// Save a backup
    Save,
    /// Restore the selected backup
    Restore,
    /// Home
    Home,
    /// End
    End,
}

/// Map a key event to an action
pub fn map_key_event(key: KeyEvent, in_edit_mode: bool) -> KeyAction {
    if in_edit_mode {
        // In edit mode, handle text input
        match key.code {
            KeyCode::Esc => KeyAction::CancelInput,
            KeyCode::Enter => KeyAction::SubmitInput,
            KeyCode::Backspace => KeyAction::Backspace,
            KeyCode::Char(c) => KeyAction::Char(c),
            _ => KeyAction::None,
        }
    } else {
        // Normal mode navigation
        match (key.code, key.modifiers) {
            // Window lifecycle
            (KeyCode::Char('q'), KeyModifiers::NONE) => KeyAction::CloseWindow,
            (KeyCode::Char('c'), KeyModifiers::CONTROL) => KeyAction::CloseWindow,
            (KeyCode::Char('Q'), _) => KeyAction::QuitHost,

            // Screen switching
            (KeyCode::Char('1'), KeyModifiers::NONE) => {
                KeyAction::SwitchScreen(crate::tui::Screen::Reminders)
            }
            (KeyCode::Char('2'), KeyModifiers::NONE) => {
                KeyAction::SwitchScreen(crate::tui::Screen::Backups)
            }
            (KeyCode::Char('3'), KeyModifiers::NONE) => {
                KeyAction::SwitchScreen(crate::tui::Screen::Settings)
            }
            (KeyCode::Char('?'), _) => KeyAction::SwitchScreen(crate::tui::Screen::Help),

            // Navigation
            (KeyCode::Up, _) | (KeyCode::Char('k'), KeyModifiers::NONE) => KeyAction::Up,
            (KeyCode::Down, _) | (KeyCode::Char('j'), KeyModifiers::NONE) => KeyAction::Down,
            (KeyCode::Enter, _) => KeyAction::Select,
            (KeyCode::Esc, _) => KeyAction::Back,
            (KeyCode::Home, _) | (KeyCode::Char('g'), KeyModifiers::NONE) => KeyAction::Home,
            (KeyCode::End, _) | (KeyCode::Char('G'), _) => KeyAction::End,

            // Text input
            (KeyCode::Char('a'), KeyModifiers::NONE) => KeyAction::StartInput,
            (KeyCode::Char('i'), KeyModifiers::NONE) => KeyAction::StartInput,

            // Actions
            (KeyCode::Char('r'), KeyModifiers::NONE) => KeyAction::Refresh,
            (KeyCode::Char('t'), KeyModifiers::NONE) | (KeyCode::Char(' '), KeyModifiers::NONE) => {
                KeyAction::Toggle
            }
            (KeyCode::Char('d'), KeyModifiers::NONE) => KeyAction::Delete,
            (KeyCode::Char('X'), _) => KeyAction::DeleteAll,
            (KeyCode::Char('s'), KeyModifiers::NONE) => KeyAction::Save,
            (KeyCode::Char('o'), KeyModifiers::NONE) => KeyAction::Restore,

            _ => KeyAction::None,
        }
    }
}
