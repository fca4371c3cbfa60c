//! Dashboard view: per-GPU readout plus connection status.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

use crate::engine::{EngineStatus, Monitor};

use super::theme::{usage_style, Theme};

/// Overview of the latest reading per GPU, in the shape of the original
/// menu readout: `GPU n:  Mem x% (a/b GB)  |  Util y%`.
#[derive(Debug, Default)]
pub struct DashboardView {
    /// Show the raw source text for diagnostics.
    pub show_raw: bool,
}

impl DashboardView {
    pub fn toggle_raw(&mut self) {
        self.show_raw = !self.show_raw;
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, monitor: &Monitor, theme: &Theme) {
        let chunks = if self.show_raw {
            Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(4), Constraint::Percentage(50)])
                .split(area)
        } else {
            Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(4)])
                .split(area)
        };

        let mut lines: Vec<Line> = Vec::new();
        match monitor.status() {
            EngineStatus::SetupRequired => {
                lines.push(Line::from(Span::styled("Status: Setup required", theme.setup_style)));
                lines.push(Line::from(Span::styled(
                    "Run `vramwatch user@host` or edit ~/.vramwatch.json",
                    theme.help_style,
                )));
            }
            EngineStatus::Error(message) => {
                lines.push(Line::from(Span::styled("Status: Error", theme.error_style)));
                lines.push(Line::from(Span::styled(message, theme.error_style)));
            }
            EngineStatus::Connected => {
                let readings = monitor.current_readings();
                if readings.is_empty() {
                    lines.push(Line::from(Span::styled(
                        "Connected; no GPUs reported",
                        theme.connected_style,
                    )));
                }
                for sample in readings {
                    let used_gb = sample.memory_used_mib as f64 / 1024.0;
                    let total_gb = sample.memory_total_mib as f64 / 1024.0;
                    let usage = sample.usage_percent();
                    lines.push(Line::from(vec![
                        Span::styled(format!("GPU {}:  ", sample.gpu_index), theme.label_style),
                        Span::styled(
                            format!("Mem {usage}% ({used_gb:.1}/{total_gb:.0} GB)"),
                            usage_style(theme, usage),
                        ),
                        Span::styled("  |  ", theme.label_style),
                        Span::styled(
                            format!("Util {}%", sample.utilization_percent),
                            theme.value_style,
                        ),
                    ]));
                }
            }
        }

        let list = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("GPUs"))
            .style(theme.normal_text);
        frame.render_widget(list, chunks[0]);

        if self.show_raw {
            let raw = monitor.last_raw_output();
            let body = if raw.is_empty() { "No Data".to_string() } else { raw };
            let raw_panel = Paragraph::new(body)
                .block(Block::default().borders(Borders::ALL).title("Raw Output"))
                .style(theme.help_style)
                .wrap(Wrap { trim: false });
            frame.render_widget(raw_panel, chunks[1]);
        }
    }
}
