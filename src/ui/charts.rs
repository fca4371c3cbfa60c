//! Shared chart plumbing for the history views.

use chrono::{DateTime, Utc};

use crate::engine::{DisplayWindow, GpuSample};

/// Convert samples into `(unix seconds, percent)` chart points.
pub fn series_points<F>(samples: &[GpuSample], metric: F) -> Vec<(f64, f64)>
where
    F: Fn(&GpuSample) -> f64,
{
    samples
        .iter()
        .map(|sample| (sample.timestamp.timestamp() as f64, metric(sample)))
        .collect()
}

/// X-axis bounds spanning the display window ending at `now`.
pub fn x_bounds(window: DisplayWindow, now: DateTime<Utc>) -> [f64; 2] {
    [
        (now - window.duration()).timestamp() as f64,
        now.timestamp() as f64,
    ]
}

/// Memory y-axis ceiling: the window's peak usage rounded up to the
/// next multiple of ten, never below ten, so a mostly-idle GPU still
/// gets a readable scale.
pub fn memory_y_max(samples: &[GpuSample]) -> f64 {
    let peak = samples
        .iter()
        .map(GpuSample::usage_percent)
        .max()
        .unwrap_or(100);
    f64::from(((peak + 9) / 10 * 10).max(10))
}

pub fn time_label(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%H:%M").to_string()
}
