//! Single-GPU history view: memory and utilization charts with an
//! arrow-key probe that snaps to the nearest sample.

use chrono::{DateTime, Utc};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::symbols;
use ratatui::text::Span;
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph};
use ratatui::Frame;

use crate::engine::{DisplayWindow, GpuSample, Monitor, RENDER_POINT_BUDGET};

use super::charts;
use super::theme::Theme;

/// Per-GPU usage history with cursor probing.
#[derive(Debug, Default)]
pub struct HistoryView {
    /// Position in the ascending GPU id list, wrapped at render time.
    pub gpu_slot: usize,
    /// Probe timestamp; readout snaps to the nearest sample.
    pub probe: Option<DateTime<Utc>>,
}

impl HistoryView {
    pub fn next_gpu(&mut self) {
        self.gpu_slot = self.gpu_slot.wrapping_add(1);
    }

    /// Move the probe by one step, clamped to the display window.
    pub fn move_probe(&mut self, window: DisplayWindow, steps: i32) {
        let now = Utc::now();
        let step = window.duration() / 60;
        let position = self.probe.unwrap_or(now) + step * steps;
        self.probe = Some(position.clamp(now - window.duration(), now));
    }

    pub fn clear_probe(&mut self) {
        self.probe = None;
    }

    pub fn render(
        &self,
        frame: &mut Frame,
        area: Rect,
        monitor: &Monitor,
        window: DisplayWindow,
        theme: &Theme,
    ) {
        let ids = monitor.resource_ids();
        if ids.is_empty() {
            let empty = Paragraph::new("No history yet")
                .block(Block::default().borders(Borders::ALL).title("Usage History"))
                .style(theme.help_style);
            frame.render_widget(empty, area);
            return;
        }
        let gpu_index = ids[self.gpu_slot % ids.len()];

        // One reduction, selected by used memory, feeds both charts so
        // they stay aligned on the x-axis.
        let display = monitor.downsampled(gpu_index, window, RENDER_POINT_BUDGET);
        let probed = self
            .probe
            .and_then(|query| monitor.nearest(gpu_index, window, query));

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Percentage(50),
                Constraint::Percentage(50),
            ])
            .split(area);

        let header = match probed {
            Some(sample) => format!(
                "GPU {gpu_index} Usage History [{}]   probe {}: Mem {}%  Util {}%",
                window.label(),
                charts::time_label(sample.timestamp),
                sample.usage_percent(),
                sample.utilization_percent,
            ),
            None => format!("GPU {gpu_index} Usage History [{}]", window.label()),
        };
        frame.render_widget(
            Paragraph::new(header).style(theme.header_style),
            chunks[0],
        );

        if display.is_empty() {
            let empty = Paragraph::new("No data for this time period")
                .block(Block::default().borders(Borders::ALL))
                .style(theme.help_style);
            frame.render_widget(empty, chunks[1]);
            return;
        }

        let now = Utc::now();
        let memory_points =
            charts::series_points(&display, |s| f64::from(s.usage_percent()));
        let memory_probe = probe_points(probed, |s| f64::from(s.usage_percent()));
        self.render_chart(
            frame,
            chunks[1],
            "Memory Usage",
            &memory_points,
            &memory_probe,
            charts::memory_y_max(&display),
            window,
            now,
            theme,
            theme.memory_style,
        );

        let utilization_points =
            charts::series_points(&display, |s| f64::from(s.utilization_percent));
        let utilization_probe = probe_points(probed, |s| f64::from(s.utilization_percent));
        self.render_chart(
            frame,
            chunks[2],
            "GPU Utilization",
            &utilization_points,
            &utilization_probe,
            100.0,
            window,
            now,
            theme,
            theme.utilization_style,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn render_chart(
        &self,
        frame: &mut Frame,
        area: Rect,
        title: &str,
        points: &[(f64, f64)],
        probe: &[(f64, f64)],
        y_max: f64,
        window: DisplayWindow,
        now: DateTime<Utc>,
        theme: &Theme,
        line_style: ratatui::style::Style,
    ) {
        let mut datasets = vec![Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(line_style)
            .data(points)];
        if !probe.is_empty() {
            datasets.push(
                Dataset::default()
                    .marker(symbols::Marker::Block)
                    .graph_type(GraphType::Scatter)
                    .style(theme.probe_style)
                    .data(probe),
            );
        }

        let bounds = charts::x_bounds(window, now);
        let chart = Chart::new(datasets)
            .block(Block::default().borders(Borders::ALL).title(title.to_string()))
            .x_axis(
                Axis::default()
                    .bounds(bounds)
                    .labels(vec![
                        Span::styled(
                            charts::time_label(now - window.duration()),
                            theme.label_style,
                        ),
                        Span::styled(charts::time_label(now), theme.label_style),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .bounds([0.0, y_max])
                    .labels(vec![
                        Span::styled("0", theme.label_style),
                        Span::styled(format!("{y_max:.0}"), theme.label_style),
                    ]),
            );
        frame.render_widget(chart, area);
    }
}

fn probe_points<F>(probed: Option<GpuSample>, metric: F) -> Vec<(f64, f64)>
where
    F: Fn(&GpuSample) -> f64,
{
    probed
        .map(|sample| vec![(sample.timestamp.timestamp() as f64, metric(&sample))])
        .unwrap_or_default()
}
