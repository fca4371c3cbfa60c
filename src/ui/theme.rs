//! UI theme definition.

use ratatui::style::{Color, Modifier, Style};

/// Palette used to color per-GPU series, assigned by ascending GPU
/// index so colors stay stable across redraws.
pub const GPU_COLORS: [Color; 8] = [
    Color::Blue,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Red,
    Color::Cyan,
    Color::LightMagenta,
    Color::LightYellow,
];

pub fn gpu_color(slot: usize) -> Color {
    GPU_COLORS[slot % GPU_COLORS.len()]
}

/// Theme for the application UI.
#[derive(Debug, Clone)]
pub struct Theme {
    pub normal_text: Style,
    pub header_style: Style,
    pub label_style: Style,
    pub value_style: Style,

    // Status styles
    pub connected_style: Style,
    pub error_style: Style,
    pub setup_style: Style,
    pub help_style: Style,

    // Chart styles
    pub memory_style: Style,
    pub utilization_style: Style,
    pub probe_style: Style,

    // Usage emphasis
    pub usage_high_style: Style,
    pub usage_mid_style: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            normal_text: Style::default().fg(Color::White),
            header_style: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            label_style: Style::default().fg(Color::Gray),
            value_style: Style::default().fg(Color::White),

            connected_style: Style::default().fg(Color::Green),
            error_style: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            setup_style: Style::default().fg(Color::Yellow),
            help_style: Style::default().fg(Color::Gray),

            memory_style: Style::default().fg(Color::Blue),
            utilization_style: Style::default().fg(Color::Green),
            probe_style: Style::default().fg(Color::Gray),

            usage_high_style: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            usage_mid_style: Style::default().fg(Color::Yellow),
        }
    }
}

/// Style tiers used by the per-GPU usage list, mirroring the
/// red-above-75, amber-above-50 emphasis of the compact readout.
pub fn usage_style(theme: &Theme, usage_percent: u16) -> Style {
    if usage_percent > 75 {
        theme.usage_high_style
    } else if usage_percent > 50 {
        theme.usage_mid_style
    } else {
        theme.value_style
    }
}
