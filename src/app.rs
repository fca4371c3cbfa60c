//! Application state and logic.
//!
//! Owns the engine handle and the UI controller, and turns terminal
//! events into engine triggers and view changes.

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::backend::Backend;
use ratatui::Terminal;
use tracing::warn;

use crate::config::AppConfig;
use crate::engine::{DisplayWindow, Monitor};
use crate::event::{Event, EventHandler};
use crate::ui::{Ui, UpdateKind};

/// Main application.
pub struct App {
    /// Engine handle
    monitor: Monitor,
    /// Persisted configuration (target plus display window)
    config: AppConfig,
    /// View controller
    ui: Ui,
    /// Should the application exit?
    should_quit: bool,
}

impl App {
    pub fn new(monitor: Monitor, config: AppConfig) -> Self {
        Self {
            monitor,
            config,
            ui: Ui::new(),
            should_quit: false,
        }
    }

    /// Runs the application main loop.
    pub async fn run(
        &mut self,
        terminal: &mut Terminal<impl Backend>,
        events: &mut EventHandler,
    ) -> Result<()> {
        while !self.should_quit {
            terminal.draw(|frame| self.ui.render(frame, &self.monitor, self.config.window))?;

            if let Some(event) = events.next().await {
                self.handle_event(event);
            }
        }
        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => self.handle_key_event(key),
            // Redraw happens every loop turn; nothing else to do.
            Event::Tick | Event::Resize(_, _) => {}
        }
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL)
            && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('d'))
        {
            self.should_quit = true;
            return;
        }

        match self.ui.handle_key_event(key, self.config.window) {
            UpdateKind::Quit => self.should_quit = true,
            UpdateKind::Refresh => self.monitor.refresh_now(),
            UpdateKind::CycleWindow => {
                self.config.window = next_window(self.config.window);
                if let Err(err) = self.config.save() {
                    warn!(error = %err, "could not persist window selection");
                }
            }
            UpdateKind::Other => {}
        }
    }
}

/// Advance to the next display window, wrapping around.
fn next_window(window: DisplayWindow) -> DisplayWindow {
    let all = DisplayWindow::ALL;
    let position = all.iter().position(|w| *w == window).unwrap_or(0);
    all[(position + 1) % all.len()]
}
