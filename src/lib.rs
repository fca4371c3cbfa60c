//! vramwatch library
//!
//! Core components for monitoring remote GPU memory and utilization:
//! the telemetry engine (history, downsampling, nearest-sample lookup,
//! refresh scheduling), the ssh sample source, and the terminal UI.

pub mod app;
pub mod config;
pub mod engine;
pub mod event;
pub mod source;
pub mod ui;
