//! Combined view: every GPU overlaid on shared memory and utilization
//! charts, colored by ascending GPU id.

use chrono::{DateTime, Utc};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Style;
use ratatui::symbols;
use ratatui::text::Span;
use ratatui::widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph};
use ratatui::Frame;

use crate::engine::{DisplayWindow, GpuSample, Monitor, RENDER_POINT_BUDGET};

use super::charts;
use super::theme::{gpu_color, Theme};

/// All-GPUs overlay with a shared probe timestamp.
#[derive(Debug, Default)]
pub struct CombinedView {
    pub probe: Option<DateTime<Utc>>,
}

struct GpuSeries {
    gpu_index: u32,
    color_slot: usize,
    display: Vec<GpuSample>,
}

impl CombinedView {
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
                .block(Block::default().borders(Borders::ALL).title("All GPUs"))
                .style(theme.help_style);
            frame.render_widget(empty, area);
            return;
        }

        let series: Vec<GpuSeries> = ids
            .iter()
            .enumerate()
            .map(|(slot, &gpu_index)| GpuSeries {
                gpu_index,
                color_slot: slot,
                display: monitor.downsampled(gpu_index, window, RENDER_POINT_BUDGET),
            })
            .collect();

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Percentage(50),
                Constraint::Percentage(50),
            ])
            .split(area);

        let header = match self.probe {
            Some(query) => {
                // Per-GPU readout at the probed instant, like the
                // original's shared hover tooltip.
                let mut parts = vec![format!("All GPUs [{}]  ", window.label())];
                for s in &series {
                    if let Some(sample) = monitor.nearest(s.gpu_index, window, query) {
                        parts.push(format!(
                            "GPU {}: M {}% U {}%  ",
                            s.gpu_index,
                            sample.usage_percent(),
                            sample.utilization_percent,
                        ));
                    }
                }
                parts.concat()
            }
            None => format!("All GPUs Usage History [{}]", window.label()),
        };
        frame.render_widget(Paragraph::new(header).style(theme.header_style), chunks[0]);

        let now = Utc::now();
        let memory_series: Vec<(Style, Vec<(f64, f64)>)> = series
            .iter()
            .map(|s| {
                (
                    Style::default().fg(gpu_color(s.color_slot)),
                    charts::series_points(&s.display, |p| f64::from(p.usage_percent())),
                )
            })
            .collect();
        render_overlay(frame, chunks[1], "Memory Usage", &memory_series, window, now, theme);

        let utilization_series: Vec<(Style, Vec<(f64, f64)>)> = series
            .iter()
            .map(|s| {
                (
                    Style::default().fg(gpu_color(s.color_slot)),
                    charts::series_points(&s.display, |p| f64::from(p.utilization_percent)),
                )
            })
            .collect();
        render_overlay(
            frame,
            chunks[2],
            "GPU Utilization",
            &utilization_series,
            window,
            now,
            theme,
        );
    }
}

fn render_overlay(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    series: &[(Style, Vec<(f64, f64)>)],
    window: DisplayWindow,
    now: DateTime<Utc>,
    theme: &Theme,
) {
    let datasets: Vec<Dataset> = series
        .iter()
        .map(|(style, points)| {
            Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(*style)
                .data(points)
        })
        .collect();

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .x_axis(Axis::default().bounds(charts::x_bounds(window, now)).labels(vec![
            Span::styled(charts::time_label(now - window.duration()), theme.label_style),
            Span::styled(charts::time_label(now), theme.label_style),
        ]))
        .y_axis(Axis::default().bounds([0.0, 100.0]).labels(vec![
            Span::styled("0", theme.label_style),
            Span::styled("100", theme.label_style),
        ]));
    frame.render_widget(chart, area);
}
