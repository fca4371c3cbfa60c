//! UI components for the vramwatch terminal interface.
//!
//! Organized as a small view state machine: a dashboard with the latest
//! readings, a per-GPU history view, and a combined overlay. Every view
//! is a read-only consumer of the engine's query API.

mod charts;
pub mod combined;
pub mod dashboard;
pub mod history_view;
pub mod theme;

pub use combined::CombinedView;
pub use dashboard::DashboardView;
pub use history_view::HistoryView;
pub use theme::Theme;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::text::Span;
use ratatui::widgets::Paragraph;
use ratatui::Frame;

use crate::engine::{DisplayWindow, EngineStatus, Monitor};

/// The result of updating the UI in response to user input.
pub enum UpdateKind {
    /// Quit the application
    Quit,
    /// Trigger an immediate fetch
    Refresh,
    /// Advance to the next display window
    CycleWindow,
    /// Other update (no action needed)
    Other,
}

/// Available views in the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    /// Latest readings and connection status
    Dashboard,
    /// Charts for one GPU
    History,
    /// Charts for all GPUs overlaid
    Combined,
}

/// Main UI controller.
pub struct Ui {
    view: ViewState,
    theme: Theme,
    dashboard: DashboardView,
    history: HistoryView,
    combined: CombinedView,
}

impl Ui {
    pub fn new() -> Self {
        Self {
            view: ViewState::Dashboard,
            theme: Theme::default(),
            dashboard: DashboardView::default(),
            history: HistoryView::default(),
            combined: CombinedView::default(),
        }
    }

    pub fn current_view(&self) -> ViewState {
        self.view
    }

    /// Handle keyboard input.
    pub fn handle_key_event(&mut self, key: KeyEvent, window: DisplayWindow) -> UpdateKind {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return UpdateKind::Quit,
            KeyCode::Char('r') => return UpdateKind::Refresh,
            KeyCode::Char('w') => return UpdateKind::CycleWindow,
            KeyCode::Char('d') => {
                self.view = ViewState::Dashboard;
                return UpdateKind::Other;
            }
            KeyCode::Char('h') => {
                self.view = ViewState::History;
                return UpdateKind::Other;
            }
            KeyCode::Char('c') => {
                self.view = ViewState::Combined;
                return UpdateKind::Other;
            }
            _ => {}
        }

        // View-specific keys.
        match self.view {
            ViewState::Dashboard => {
                if key.code == KeyCode::Char('o') {
                    self.dashboard.toggle_raw();
                }
            }
            ViewState::History => match key.code {
                KeyCode::Char('g') | KeyCode::Tab => self.history.next_gpu(),
                KeyCode::Left => self.history.move_probe(window, -1),
                KeyCode::Right => self.history.move_probe(window, 1),
                KeyCode::Char('x') => self.history.clear_probe(),
                _ => {}
            },
            ViewState::Combined => match key.code {
                KeyCode::Left => self.combined.move_probe(window, -1),
                KeyCode::Right => self.combined.move_probe(window, 1),
                KeyCode::Char('x') => self.combined.clear_probe(),
                _ => {}
            },
        }
        UpdateKind::Other
    }

    /// Render the current view plus the status/help footer.
    pub fn render(&self, frame: &mut Frame, monitor: &Monitor, window: DisplayWindow) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(5), Constraint::Length(1), Constraint::Length(1)])
            .split(frame.size());

        match self.view {
            ViewState::Dashboard => {
                self.dashboard.render(frame, chunks[0], monitor, &self.theme)
            }
            ViewState::History => {
                self.history
                    .render(frame, chunks[0], monitor, window, &self.theme)
            }
            ViewState::Combined => {
                self.combined
                    .render(frame, chunks[0], monitor, window, &self.theme)
            }
        }

        let status = match monitor.status() {
            EngineStatus::Connected => Span::styled("connected", self.theme.connected_style),
            EngineStatus::SetupRequired => {
                Span::styled("setup required", self.theme.setup_style)
            }
            EngineStatus::Error(message) => {
                Span::styled(format!("error: {message}"), self.theme.error_style)
            }
        };
        frame.render_widget(Paragraph::new(status), chunks[1]);

        let help = format!(
            "q quit | r refresh | d dashboard | h history | c combined | w window ({}) | g gpu | \u{2190}/\u{2192} probe | x clear | o raw",
            window.label()
        );
        frame.render_widget(
            Paragraph::new(help).style(self.theme.help_style),
            chunks[2],
        );
    }
}

impl Default for Ui {
    fn default() -> Self {
        Self::new()
    }
}
